//! # Queries
//!
//! A [`Query`] collects three masks (`all`, `any`, `none`) plus optional
//! per-entity predicates and relation filters, then either scans matching
//! entities or iterates their components (see the `for_each*` family).
//!
//! ## Matching
//!
//! An entity matches when its full component set, archetype mask plus
//! sparse-resident components, contains every id of `all`, at least one id
//! of `any` (if `any` is not empty) and no id of `none`.
//!
//! Residency is re-read on every execution. The archetype-resident part of
//! the masks selects archetypes through the world's query cache; the
//! sparse-resident part is checked per row against the sparse sets.

use std::sync::Arc;

use super::archetype::ArchetypeId;
use super::component::{Component, ComponentId, ComponentSet};
use super::entity::Entity;
use super::graph::ArchetypeGraph;
use super::mask::ComponentMask;
use super::relation::{RelationKind, RelationStore};
use super::sparse::SparseSet;
use super::world::World;
use crate::error::{CoreError, CoreResult};

/// Per-entity filter attached with [`Query::filter`].
pub type Predicate<'w> = Box<dyn Fn(Entity) -> bool + Send + Sync + 'w>;

/// Query builder and executor bound to one world.
///
/// # Example
///
/// ```rust,ignore
/// world
///     .query()
///     .without::<Frozen>()
///     .for_each2::<Position, Velocity>(|pos, vel| {
///         pos.x += vel.x;
///     });
/// ```
#[must_use = "queries do nothing until executed"]
pub struct Query<'w> {
    pub(crate) world: &'w mut World,
    all: ComponentMask,
    any: ComponentMask,
    none: ComponentMask,
    predicates: Vec<Predicate<'w>>,
    relations: Vec<(RelationKind, Entity)>,
}

impl<'w> Query<'w> {
    pub(crate) fn new(world: &'w mut World) -> Self {
        Self {
            world,
            all: ComponentMask::EMPTY,
            any: ComponentMask::EMPTY,
            none: ComponentMask::EMPTY,
            predicates: Vec::new(),
            relations: Vec::new(),
        }
    }

    // ========================================================================
    // BUILDER
    // ========================================================================

    /// Requires every component of `S`.
    pub fn all<S: ComponentSet>(mut self) -> Self {
        self.all |= S::mask(&self.world.registry);
        self
    }

    /// Requires at least one component of `S`.
    pub fn any<S: ComponentSet>(mut self) -> Self {
        self.any |= S::mask(&self.world.registry);
        self
    }

    /// Rejects entities carrying any component of `S`.
    pub fn none<S: ComponentSet>(mut self) -> Self {
        self.none |= S::mask(&self.world.registry);
        self
    }

    /// Requires component `T`.
    pub fn with<T: Component>(mut self) -> Self {
        self.all = self.all.with(self.world.registry.id_of::<T>());
        self
    }

    /// Rejects entities carrying component `T`.
    pub fn without<T: Component>(mut self) -> Self {
        self.none = self.none.with(self.world.registry.id_of::<T>());
        self
    }

    /// Keeps only entities for which `predicate` returns `true`.
    ///
    /// Predicates run per row and are never cached.
    pub fn filter(mut self, predicate: impl Fn(Entity) -> bool + Send + Sync + 'w) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Keeps only entities with a `kind` edge to `target`.
    pub fn with_relation(mut self, kind: RelationKind, target: Entity) -> Self {
        self.relations.push((kind, target));
        self
    }

    // ========================================================================
    // SCANS
    // ========================================================================

    /// Number of matching entities.
    #[must_use]
    pub fn count(mut self) -> usize {
        let mut count = 0;
        self.visit(|_| {
            count += 1;
            true
        });
        count
    }

    /// `true` if at least one entity matches.
    #[must_use]
    pub fn exists(mut self) -> bool {
        let mut found = false;
        self.visit(|_| {
            found = true;
            false
        });
        found
    }

    /// Every matching entity, in storage order.
    #[must_use]
    pub fn to_list(mut self) -> Vec<Entity> {
        let mut list = Vec::new();
        self.visit(|entity| {
            list.push(entity);
            true
        });
        list
    }

    /// The only matching entity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotSingle`] unless exactly one entity matches.
    pub fn single(mut self) -> CoreResult<Entity> {
        self.single_entity()
    }

    /// Component `T` of the only entity matching this query plus `T`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotSingle`] unless exactly one entity matches.
    pub fn single_component<T: Component>(self) -> CoreResult<&'w mut T> {
        let mut query = self.with::<T>();
        let entity = query.single_entity()?;
        let world = query.world;
        world.get_mut::<T>(entity).ok_or(CoreError::NotSingle { matched: 0 })
    }

    fn single_entity(&mut self) -> CoreResult<Entity> {
        let mut first = None;
        let mut matched = 0;
        self.visit(|entity| {
            matched += 1;
            first.get_or_insert(entity);
            matched < 2
        });
        match (matched, first) {
            (1, Some(entity)) => Ok(entity),
            _ => Err(CoreError::NotSingle { matched }),
        }
    }

    /// Calls `f` for every match until it returns `false`.
    fn visit(&mut self, mut f: impl FnMut(Entity) -> bool) {
        let Some(prepared) = self.prepare([]) else {
            return;
        };
        for &id in prepared.archetypes.iter() {
            let archetype = prepared.graph.get(id);
            let any_hit = prepared.rows.any_hit(archetype.mask());
            for chunk in archetype.chunks() {
                for &entity in chunk.entities() {
                    if prepared.rows.accepts(entity, any_hit) && !f(entity) {
                        return;
                    }
                }
            }
        }
    }

    // ========================================================================
    // EXECUTION PLAN
    // ========================================================================

    /// Resolves residency, selects archetypes and splits the sparse sets
    /// into the ones fetched mutably and the ones only tested per row.
    ///
    /// Returns `None` when nothing can match.
    ///
    /// # Panics
    ///
    /// Panics if `fetch` names the same component twice.
    pub(crate) fn prepare<const N: usize>(
        &mut self,
        fetch: [ComponentId; N],
    ) -> Option<Prepared<'_, N>> {
        for (i, id) in fetch.iter().enumerate() {
            if fetch[..i].contains(id) {
                let name = self.world.registry.info(*id).map_or("<unknown>", |info| info.name);
                panic!("component {name} requested twice in one query");
            }
        }
        self.world.flush();

        let fetched_mask: ComponentMask = fetch.iter().copied().collect();
        let all = self.all | fetched_mask;
        if all.has_any(&self.none) {
            return None;
        }
        // Fetched components already satisfy `any` when they overlap it.
        let any = if self.any.has_any(&all) { ComponentMask::EMPTY } else { self.any };

        let Self { world, none, predicates, relations, .. } = self;
        let resident = world.archive.archetype_resident();
        let archetypes = world.archive.matching(all, any, *none);

        let sparse_only = !resident;
        let required = all & sparse_only & !fetched_mask;
        let excluded = *none & sparse_only;
        let any_sparse = any & sparse_only;

        let World { archive, relations: store, .. } = &mut **world;
        let (graph, sets) = archive.split_mut();

        let mut fetched: [Option<&mut SparseSet>; N] = std::array::from_fn(|_| None);
        let mut rows = RowFilter {
            required: Vec::new(),
            excluded: Vec::new(),
            any_sparse: Vec::new(),
            any_dense: any & resident,
            any_active: !any.is_empty(),
            predicates: predicates.as_slice(),
            relations: relations.as_slice(),
            store,
        };
        for (index, set) in sets.iter_mut().enumerate() {
            let Some(set) = set.as_mut() else { continue };
            let id = index as ComponentId;
            if let Some(slot) = fetch.iter().position(|&wanted| wanted == id) {
                if sparse_only.has(id) {
                    fetched[slot] = Some(set);
                }
            } else if required.has(id) {
                rows.required.push(set);
            } else if excluded.has(id) {
                rows.excluded.push(set);
            } else if any_sparse.has(id) {
                rows.any_sparse.push(set);
            }
        }

        let missing_fetch = fetch
            .iter()
            .zip(&fetched)
            .any(|(&id, set)| sparse_only.has(id) && set.is_none());
        if missing_fetch || rows.required.len() < required.pop_count() {
            return None;
        }
        if rows.any_active && rows.any_dense.is_empty() && rows.any_sparse.is_empty() {
            return None;
        }
        Some(Prepared { archetypes, graph, fetched, rows })
    }
}

/// Everything one query execution borrows.
pub(crate) struct Prepared<'q, const N: usize> {
    pub(crate) archetypes: Arc<[ArchetypeId]>,
    pub(crate) graph: &'q mut ArchetypeGraph,
    /// Sparse sets of fetched sparse-resident components, by fetch slot.
    pub(crate) fetched: [Option<&'q mut SparseSet>; N],
    pub(crate) rows: RowFilter<'q>,
}

/// Per-row conditions the archetype mask cannot decide.
pub(crate) struct RowFilter<'q> {
    required: Vec<&'q SparseSet>,
    excluded: Vec<&'q SparseSet>,
    any_sparse: Vec<&'q SparseSet>,
    any_dense: ComponentMask,
    any_active: bool,
    predicates: &'q [Predicate<'q>],
    relations: &'q [(RelationKind, Entity)],
    store: &'q RelationStore,
}

impl RowFilter<'_> {
    /// `true` if an archetype with `mask` satisfies `any` on its own.
    #[inline]
    pub(crate) fn any_hit(&self, mask: &ComponentMask) -> bool {
        !self.any_active || mask.has_any(&self.any_dense)
    }

    #[inline]
    pub(crate) fn accepts(&self, entity: Entity, any_hit: bool) -> bool {
        self.required.iter().all(|set| set.contains(entity))
            && !self.excluded.iter().any(|set| set.contains(entity))
            && (any_hit || self.any_sparse.iter().any(|set| set.contains(entity)))
            && self.relations.iter().all(|&(kind, target)| self.store.has(entity, kind, target))
            && self.predicates.iter().all(|predicate| predicate(entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {}

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Velocity {
        x: f32,
        y: f32,
    }
    impl Component for Velocity {}

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Frozen;
    impl Component for Frozen {}

    fn scenario() -> (World, Entity, Entity, Entity) {
        let mut world = World::new();
        let a = world.spawn((Position::default(),));
        let b = world.spawn((Position::default(), Velocity::default()));
        let c = world.spawn((Velocity::default(),));
        (world, a, b, c)
    }

    #[test]
    fn test_all_selects_intersection() {
        let (mut world, a, b, _) = scenario();
        assert_eq!(world.query().all::<(Position, Velocity)>().to_list(), vec![b]);

        let mut with_position = world.query().all::<(Position,)>().to_list();
        with_position.sort();
        assert_eq!(with_position, vec![a, b]);
    }

    #[test]
    fn test_none_and_any() {
        let (mut world, a, b, c) = scenario();
        assert_eq!(world.query().with::<Position>().without::<Velocity>().to_list(), vec![a]);

        let mut either = world.query().any::<(Position, Velocity)>().to_list();
        either.sort();
        assert_eq!(either, vec![a, b, c]);
    }

    #[test]
    fn test_scans() {
        let (mut world, _, b, _) = scenario();
        assert_eq!(world.query().with::<Velocity>().count(), 2);
        assert!(world.query().with::<Velocity>().exists());
        assert!(!world.query().with::<Frozen>().exists());
        assert_eq!(world.query().all::<(Position, Velocity)>().single(), Ok(b));
        assert_eq!(
            world.query().with::<Velocity>().single(),
            Err(CoreError::NotSingle { matched: 2 })
        );
        assert_eq!(
            world.query().with::<Frozen>().single(),
            Err(CoreError::NotSingle { matched: 0 })
        );
    }

    #[test]
    fn test_filter_predicate() {
        let (mut world, a, _, _) = scenario();
        let list = world.query().with::<Position>().filter(move |e| e == a).to_list();
        assert_eq!(list, vec![a]);
    }

    #[test]
    fn test_single_component_gives_mutable_access() {
        let (mut world, _, b, _) = scenario();
        let velocity = world.query().with::<Position>().single_component::<Velocity>().unwrap();
        velocity.x = 3.0;
        assert_eq!(world.get_component::<Velocity>(b).x, 3.0);
    }

    #[test]
    fn test_contradictory_masks_match_nothing() {
        let (mut world, ..) = scenario();
        assert_eq!(world.query().with::<Position>().without::<Position>().count(), 0);
    }

    #[test]
    #[should_panic(expected = "requested twice")]
    fn test_duplicate_fetch_panics() {
        let (mut world, ..) = scenario();
        world.query().for_each2::<Position, Position>(|_, _| {});
    }
}
