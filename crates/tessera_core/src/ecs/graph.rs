//! # Archetype Graph
//!
//! Registry of every archetype, keyed by mask, with single-component
//! transition edges between archetypes whose masks differ by exactly one
//! id. Adding or removing one component follows an edge instead of
//! hashing a new mask.
//!
//! Creating an archetype bumps the structural version. Query caches compare
//! against it to decide whether their archetype lists are stale.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::archetype::{move_row, Archetype, ArchetypeId};
use super::component::{ComponentId, ComponentRegistry};
use super::entity::{Entity, EntityLocation};
use super::mask::ComponentMask;
use crate::error::{CoreError, CoreResult};

/// All archetypes of a world.
#[derive(Debug)]
pub struct ArchetypeGraph {
    archetypes: Vec<Archetype>,
    by_mask: HashMap<ComponentMask, ArchetypeId>,
    version: AtomicU64,
    chunk_capacity: usize,
    pool_limit: usize,
}

impl ArchetypeGraph {
    /// Creates a graph holding only the empty archetype.
    #[must_use]
    pub fn new(chunk_capacity: usize, pool_limit: usize) -> Self {
        let empty = Archetype::new(
            ArchetypeId::EMPTY,
            ComponentMask::EMPTY,
            Vec::new(),
            chunk_capacity,
            pool_limit,
        );
        let mut by_mask = HashMap::new();
        by_mask.insert(ComponentMask::EMPTY, ArchetypeId::EMPTY);
        Self {
            archetypes: vec![empty],
            by_mask,
            version: AtomicU64::new(0),
            chunk_capacity,
            pool_limit,
        }
    }

    /// Structural version; bumped whenever an archetype is created.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Number of archetypes, the empty one included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Always `false`: the empty archetype exists from the start.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// Archetype by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this graph.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ArchetypeId) -> &Archetype {
        &self.archetypes[id.index()]
    }

    /// Mutable archetype by id.
    #[inline]
    pub fn get_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        &mut self.archetypes[id.index()]
    }

    /// All archetypes in creation order.
    #[inline]
    #[must_use]
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    /// All archetypes, mutably.
    #[inline]
    pub fn archetypes_mut(&mut self) -> &mut [Archetype] {
        &mut self.archetypes
    }

    /// Archetype keyed by `mask`, if it exists.
    #[inline]
    #[must_use]
    pub fn find(&self, mask: &ComponentMask) -> Option<ArchetypeId> {
        self.by_mask.get(mask).copied()
    }

    /// Total number of allocated chunks.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.archetypes.iter().map(Archetype::chunk_count).sum()
    }

    /// Returns the archetype for `mask`, creating it and its transition
    /// edges on first request.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingMetadata`] if a component in `mask` has
    /// no registered layout.
    pub fn get_or_create(
        &mut self,
        mask: ComponentMask,
        registry: &ComponentRegistry,
    ) -> CoreResult<ArchetypeId> {
        if let Some(id) = self.find(&mask) {
            return Ok(id);
        }

        let infos = mask
            .components()
            .map(|component| registry.info(component).ok_or(CoreError::MissingMetadata(component)))
            .collect::<CoreResult<Vec<_>>>()?;

        let id = ArchetypeId::new(self.archetypes.len());
        let mut archetype =
            Archetype::new(id, mask, infos, self.chunk_capacity, self.pool_limit);

        for other in &mut self.archetypes {
            let diff = mask ^ *other.mask();
            if diff.pop_count() != 1 {
                continue;
            }
            let Some(component) = diff.first_set_bit() else { continue };
            if mask.has(component) {
                other.set_add_edge(component, id);
                archetype.set_remove_edge(component, other.id());
            } else {
                other.set_remove_edge(component, id);
                archetype.set_add_edge(component, other.id());
            }
        }

        self.archetypes.push(archetype);
        self.by_mask.insert(mask, id);
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(archetype = id.index(), ?mask, version, "created archetype");
        Ok(id)
    }

    /// Archetype reached from `from` by adding `component`.
    ///
    /// # Errors
    ///
    /// See [`get_or_create`](Self::get_or_create).
    pub fn transition_add(
        &mut self,
        from: ArchetypeId,
        component: ComponentId,
        registry: &ComponentRegistry,
    ) -> CoreResult<ArchetypeId> {
        let archetype = self.get(from);
        if let Some(to) = archetype.add_edge(component) {
            return Ok(to);
        }
        let mask = archetype.mask().with(component);
        self.get_or_create(mask, registry)
    }

    /// Archetype reached from `from` by removing `component`.
    ///
    /// # Errors
    ///
    /// See [`get_or_create`](Self::get_or_create).
    pub fn transition_remove(
        &mut self,
        from: ArchetypeId,
        component: ComponentId,
        registry: &ComponentRegistry,
    ) -> CoreResult<ArchetypeId> {
        let archetype = self.get(from);
        if let Some(to) = archetype.remove_edge(component) {
            return Ok(to);
        }
        let mask = archetype.mask().without(component);
        self.get_or_create(mask, registry)
    }

    /// Linear scan for archetypes with every id of `all`, at least one id
    /// of `any` (when `any` is not empty) and no id of `none`.
    #[must_use]
    pub fn archetypes_with(
        &self,
        all: &ComponentMask,
        any: &ComponentMask,
        none: &ComponentMask,
    ) -> Vec<ArchetypeId> {
        self.archetypes
            .iter()
            .filter(|archetype| {
                let mask = archetype.mask();
                mask.has_all(all)
                    && (any.is_empty() || mask.has_any(any))
                    && !mask.has_any(none)
            })
            .map(Archetype::id)
            .collect()
    }

    /// Moves the row at `from` into archetype `to`.
    ///
    /// # Returns
    ///
    /// The row's new location and the entity the swap-removal moved into
    /// `from`, if any.
    pub fn move_entity(
        &mut self,
        from: EntityLocation,
        to: ArchetypeId,
    ) -> (EntityLocation, Option<Entity>) {
        if from.archetype == to {
            return (from, None);
        }
        let (src, dst) = pair_mut(&mut self.archetypes, from.archetype.index(), to.index());
        let ((chunk, row), moved) = move_row(src, from.chunk as usize, from.row as usize, dst);
        (EntityLocation::new(to, chunk, row), moved)
    }
}

/// Two distinct elements of a slice, mutably.
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "pair_mut needs distinct indices");
    if a < b {
        let (head, tail) = items.split_at_mut(b);
        (&mut head[a], &mut tail[0])
    } else {
        let (head, tail) = items.split_at_mut(a);
        (&mut tail[0], &mut head[b])
    }
}
