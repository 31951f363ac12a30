//! # Typed Iteration
//!
//! Per-arity iteration over query matches. Each fetched component resolves
//! per archetype to either a dense column slice or the component's sparse
//! set. Four flavours exist for arities one through ten:
//!
//! | Method | Callback | Granularity |
//! |--------|----------|-------------|
//! | `for_eachN` | `FnMut(&mut A, ..)` | row |
//! | `for_each_entityN` | `FnMut(Entity, &mut A, ..)` | row |
//! | `for_each_batchN` | `FnMut(&[Entity], &mut [A], ..)` | chunk |
//! | `par_for_eachN` | `Fn(Entity, &mut A, ..) + Send + Sync` | chunk, on the rayon pool |
//!
//! Batch and parallel runs stage sparse components (and filtered dense
//! rows) through scratch buffers and write them back afterwards.

use rayon::prelude::*;

use super::chunk::columns_disjoint;
use super::component::Component;
use super::entity::Entity;
use super::query::{Prepared, Query};
use super::sparse::SparseSet;
use super::storage::Column;

// ============================================================================
// ACCESS HELPERS
// ============================================================================

/// One fetched component within one chunk.
pub(crate) enum Fetch<'c, T> {
    Dense(&'c mut [T]),
    Sparse(&'c mut SparseSet),
}

impl<'c, T: Component> Fetch<'c, T> {
    /// Prefers the chunk column; falls back to the sparse set. `None` when
    /// the component is stored in neither.
    #[inline]
    pub(crate) fn new(
        column: Option<&'c mut Column>,
        set: Option<&'c mut SparseSet>,
        len: usize,
    ) -> Option<Self> {
        match (column, set) {
            (Some(column), _) => Some(Self::Dense(column.as_mut_slice(len))),
            (None, Some(set)) => Some(Self::Sparse(set)),
            (None, None) => None,
        }
    }

    #[inline]
    pub(crate) fn at(&mut self, row: usize, entity: Entity) -> Option<&mut T> {
        match self {
            Self::Dense(values) => Some(&mut values[row]),
            Self::Sparse(set) => set.get_mut::<T>(entity),
        }
    }

    #[inline]
    pub(crate) fn present(&self, entity: Entity) -> bool {
        match self {
            Self::Dense(_) => true,
            Self::Sparse(set) => set.contains(entity),
        }
    }

    /// Prepares a contiguous buffer for the selected rows.
    pub(crate) fn stage(self, selection: &Selection) -> Staged<'c, T> {
        match self {
            Self::Dense(values) if selection.complete => Staged::Direct(values),
            Self::Dense(values) => Staged::Rows {
                staged: selection.rows.iter().map(|&row| values[row]).collect(),
                values,
            },
            Self::Sparse(set) => Staged::Sparse {
                staged: gather(set, &selection.entities),
                set,
            },
        }
    }
}

/// A batch buffer and where to write it back.
pub(crate) enum Staged<'c, T> {
    Direct(&'c mut [T]),
    Rows { values: &'c mut [T], staged: Vec<T> },
    Sparse { set: &'c mut SparseSet, staged: Vec<T> },
}

impl<T: Component> Staged<'_, T> {
    #[inline]
    pub(crate) fn values(&mut self) -> &mut [T] {
        match self {
            Self::Direct(values) => values,
            Self::Rows { staged, .. } | Self::Sparse { staged, .. } => staged,
        }
    }

    pub(crate) fn commit(self, selection: &Selection) {
        match self {
            Self::Direct(_) => {}
            Self::Rows { values, staged } => {
                for (&row, value) in selection.rows.iter().zip(staged) {
                    values[row] = value;
                }
            }
            Self::Sparse { set, staged } => scatter(set, &selection.entities, staged),
        }
    }
}

/// One fetched component within one chunk, on a worker thread.
pub(crate) enum ParFetch<'c, 's, T> {
    Dense(&'c mut [T]),
    Sparse(&'s SparseSet),
}

impl<'c, 's, T: Component> ParFetch<'c, 's, T> {
    #[inline]
    pub(crate) fn new(
        column: Option<&'c mut Column>,
        set: Option<&'s SparseSet>,
        len: usize,
    ) -> Option<Self> {
        match (column, set) {
            (Some(column), _) => Some(Self::Dense(column.as_mut_slice(len))),
            (None, Some(set)) => Some(Self::Sparse(set)),
            (None, None) => None,
        }
    }

    #[inline]
    pub(crate) fn present(&self, entity: Entity) -> bool {
        match self {
            Self::Dense(_) => true,
            Self::Sparse(set) => set.contains(entity),
        }
    }

    /// Copies sparse values of the selected entities into a local buffer.
    pub(crate) fn gather(self, selection: &Selection) -> ParSlot<'c, T> {
        match self {
            Self::Dense(values) => ParSlot::Dense(values),
            Self::Sparse(set) => ParSlot::Gathered(gather(set, &selection.entities)),
        }
    }
}

/// Worker-side access: dense rows in place, sparse values gathered.
pub(crate) enum ParSlot<'c, T> {
    Dense(&'c mut [T]),
    Gathered(Vec<T>),
}

impl<T: Component> ParSlot<'_, T> {
    /// Value at chunk `row`, which is the `nth` selected row.
    #[inline]
    pub(crate) fn at(&mut self, row: usize, nth: usize) -> &mut T {
        match self {
            Self::Dense(values) => &mut values[row],
            Self::Gathered(values) => &mut values[nth],
        }
    }

    /// Gathered values awaiting write-back.
    pub(crate) fn into_gathered(self) -> Option<Vec<T>> {
        match self {
            Self::Dense(_) => None,
            Self::Gathered(values) => Some(values),
        }
    }
}

/// Rows of one chunk that passed the query's per-row checks.
pub(crate) struct Selection {
    pub(crate) rows: Vec<usize>,
    pub(crate) entities: Vec<Entity>,
    /// Every row of the chunk was selected.
    pub(crate) complete: bool,
}

impl Selection {
    pub(crate) fn collect(entities: &[Entity], mut accept: impl FnMut(Entity) -> bool) -> Self {
        let mut rows = Vec::with_capacity(entities.len());
        let mut picked = Vec::with_capacity(entities.len());
        for (row, &entity) in entities.iter().enumerate() {
            if accept(entity) {
                rows.push(row);
                picked.push(entity);
            }
        }
        let complete = rows.len() == entities.len();
        Self { rows, entities: picked, complete }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn gather<T: Component>(set: &SparseSet, entities: &[Entity]) -> Vec<T> {
    entities.iter().filter_map(|&entity| set.get::<T>(entity).copied()).collect()
}

fn scatter<T: Component>(set: &mut SparseSet, entities: &[Entity], values: Vec<T>) {
    for (&entity, value) in entities.iter().zip(values) {
        if let Some(slot) = set.get_mut::<T>(entity) {
            *slot = value;
        }
    }
}

// ============================================================================
// ARITY EXPANSION
// ============================================================================

macro_rules! impl_query_arity {
    ($each:ident, $each_entity:ident, $batch:ident, $par:ident; $(($ty:ident, $var:ident, $set:ident)),+) => {
        impl<'w> Query<'w> {
            /// Calls `f` with mutable access to the listed components of
            /// every match.
            ///
            /// # Panics
            ///
            /// Panics if a component type is listed twice.
            pub fn $each<$($ty: Component),+>(self, mut f: impl FnMut($(&mut $ty),+)) {
                self.$each_entity::<$($ty),+>(|_, $($var),+| f($($var),+));
            }

            /// Like the plain variant, also passing each match's entity.
            ///
            /// # Panics
            ///
            /// Panics if a component type is listed twice.
            pub fn $each_entity<$($ty: Component),+>(
                mut self,
                mut f: impl FnMut(Entity, $(&mut $ty),+),
            ) {
                let ids = [$(self.world.registry.id_of::<$ty>()),+];
                let Some(Prepared { archetypes, graph, fetched, rows }) = self.prepare(ids) else {
                    return;
                };
                let [$(mut $set),+] = fetched;
                for &archetype_id in archetypes.iter() {
                    let archetype = graph.get_mut(archetype_id);
                    let any_hit = rows.any_hit(archetype.mask());
                    let columns = ids.map(|id| archetype.column_index(id));
                    for chunk in archetype.chunks_mut() {
                        let len = chunk.len();
                        let (entities, chunk_columns) = chunk.split_mut();
                        let [$($var),+] = columns_disjoint(chunk_columns, columns);
                        $(
                            let Some(mut $var) = Fetch::<$ty>::new($var, $set.as_deref_mut(), len) else {
                                continue;
                            };
                        )+
                        for (row, &entity) in entities.iter().enumerate() {
                            if !rows.accepts(entity, any_hit) {
                                continue;
                            }
                            f(entity, $(match $var.at(row, entity) {
                                Some(value) => value,
                                None => continue,
                            }),+);
                        }
                    }
                }
            }

            /// Calls `f` once per chunk with the chunk's matching entities
            /// and parallel component slices.
            ///
            /// # Panics
            ///
            /// Panics if a component type is listed twice.
            pub fn $batch<$($ty: Component),+>(
                mut self,
                mut f: impl FnMut(&[Entity], $(&mut [$ty]),+),
            ) {
                let ids = [$(self.world.registry.id_of::<$ty>()),+];
                let Some(Prepared { archetypes, graph, fetched, rows }) = self.prepare(ids) else {
                    return;
                };
                let [$(mut $set),+] = fetched;
                for &archetype_id in archetypes.iter() {
                    let archetype = graph.get_mut(archetype_id);
                    let any_hit = rows.any_hit(archetype.mask());
                    let columns = ids.map(|id| archetype.column_index(id));
                    for chunk in archetype.chunks_mut() {
                        let len = chunk.len();
                        let (entities, chunk_columns) = chunk.split_mut();
                        let [$($var),+] = columns_disjoint(chunk_columns, columns);
                        $(
                            let Some($var) = Fetch::<$ty>::new($var, $set.as_deref_mut(), len) else {
                                continue;
                            };
                        )+
                        let selection = Selection::collect(entities, |entity| {
                            rows.accepts(entity, any_hit) $(&& $var.present(entity))+
                        });
                        if selection.is_empty() {
                            continue;
                        }
                        $(let mut $var = $var.stage(&selection);)+
                        f(&selection.entities, $($var.values()),+);
                        $($var.commit(&selection);)+
                    }
                }
            }

            /// Calls `f` for every match, chunks spread over the rayon pool.
            ///
            /// Rows within one chunk run sequentially. Sparse components
            /// are copied out per chunk and written back once every worker
            /// has finished.
            ///
            /// # Panics
            ///
            /// Panics if a component type is listed twice.
            pub fn $par<$($ty: Component),+>(
                mut self,
                f: impl Fn(Entity, $(&mut $ty),+) + Send + Sync,
            ) {
                let ids = [$(self.world.registry.id_of::<$ty>()),+];
                let Some(Prepared { archetypes, graph, fetched, rows }) = self.prepare(ids) else {
                    return;
                };

                let mut selected = vec![false; graph.len()];
                for id in archetypes.iter() {
                    selected[id.index()] = true;
                }
                let mut jobs = Vec::new();
                for archetype in graph.archetypes_mut() {
                    if !selected[archetype.id().index()] {
                        continue;
                    }
                    let any_hit = rows.any_hit(archetype.mask());
                    let columns = ids.map(|id| archetype.column_index(id));
                    for chunk in archetype.chunks_mut() {
                        if !chunk.is_empty() {
                            jobs.push((columns, any_hit, chunk));
                        }
                    }
                }

                let [$(mut $set),+] = fetched;
                let staged: Vec<_> = {
                    $(let $set = $set.as_deref();)+
                    jobs.into_par_iter()
                        .filter_map(|(columns, any_hit, chunk)| {
                            let len = chunk.len();
                            let (entities, chunk_columns) = chunk.split_mut();
                            let [$($var),+] = columns_disjoint(chunk_columns, columns);
                            $(let $var = ParFetch::<$ty>::new($var, $set, len)?;)+
                            let selection = Selection::collect(entities, |entity| {
                                rows.accepts(entity, any_hit) $(&& $var.present(entity))+
                            });
                            $(let mut $var = $var.gather(&selection);)+
                            for (nth, (&row, &entity)) in
                                selection.rows.iter().zip(&selection.entities).enumerate()
                            {
                                f(entity, $($var.at(row, nth)),+);
                            }
                            Some((selection.entities, ($($var.into_gathered(),)+)))
                        })
                        .collect()
                };

                for (entities, ($($var,)+)) in staged {
                    $(
                        if let (Some(values), Some(set)) = ($var, $set.as_deref_mut()) {
                            scatter::<$ty>(set, &entities, values);
                        }
                    )+
                }
            }
        }
    };
}

impl_query_arity!(for_each1, for_each_entity1, for_each_batch1, par_for_each1;
    (A, a, set_a));
impl_query_arity!(for_each2, for_each_entity2, for_each_batch2, par_for_each2;
    (A, a, set_a), (B, b, set_b));
impl_query_arity!(for_each3, for_each_entity3, for_each_batch3, par_for_each3;
    (A, a, set_a), (B, b, set_b), (C, c, set_c));
impl_query_arity!(for_each4, for_each_entity4, for_each_batch4, par_for_each4;
    (A, a, set_a), (B, b, set_b), (C, c, set_c), (D, d, set_d));
impl_query_arity!(for_each5, for_each_entity5, for_each_batch5, par_for_each5;
    (A, a, set_a), (B, b, set_b), (C, c, set_c), (D, d, set_d), (E, e, set_e));
impl_query_arity!(for_each6, for_each_entity6, for_each_batch6, par_for_each6;
    (A, a, set_a), (B, b, set_b), (C, c, set_c), (D, d, set_d), (E, e, set_e),
    (F, f_, set_f));
impl_query_arity!(for_each7, for_each_entity7, for_each_batch7, par_for_each7;
    (A, a, set_a), (B, b, set_b), (C, c, set_c), (D, d, set_d), (E, e, set_e),
    (F, f_, set_f), (G, g, set_g));
impl_query_arity!(for_each8, for_each_entity8, for_each_batch8, par_for_each8;
    (A, a, set_a), (B, b, set_b), (C, c, set_c), (D, d, set_d), (E, e, set_e),
    (F, f_, set_f), (G, g, set_g), (H, h, set_h));
impl_query_arity!(for_each9, for_each_entity9, for_each_batch9, par_for_each9;
    (A, a, set_a), (B, b, set_b), (C, c, set_c), (D, d, set_d), (E, e, set_e),
    (F, f_, set_f), (G, g, set_g), (H, h, set_h), (I, i, set_i));
impl_query_arity!(for_each10, for_each_entity10, for_each_batch10, par_for_each10;
    (A, a, set_a), (B, b, set_b), (C, c, set_c), (D, d, set_d), (E, e, set_e),
    (F, f_, set_f), (G, g, set_g), (H, h, set_h), (I, i, set_i), (J, j, set_j));
