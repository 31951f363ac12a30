//! # Archive
//!
//! Hybrid storage: every component id lives either in archetype columns or
//! in a sparse set, never both. New components start sparse. [`maintain`]
//! measures how many live entities carry each component and migrates ids
//! across the two representations when the density leaves the hysteresis
//! band:
//!
//! ```text
//! 0 ──── demote (0.05) ════ keep ════ promote (0.15) ──── 1
//!   sparse ◄───────                        ───────► archetype
//! ```
//!
//! Migration copies bytes verbatim and keeps entity handles; only storage
//! locations change.
//!
//! [`maintain`]: Archive::maintain

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::archetype::ArchetypeId;
use super::cache::{QueryCache, QueryKey};
use super::component::{ComponentId, ComponentInfo, ComponentRegistry};
use super::entity::{Entity, EntityLocation, EntityTable};
use super::graph::ArchetypeGraph;
use super::mask::ComponentMask;
use super::sparse::SparseSet;
use crate::config::{ArchiveConfig, WorldConfig};
use crate::error::{CoreError, CoreResult};

/// Where a component's values are stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Residency {
    /// Columns in every archetype whose mask holds the id.
    Archetype,
    /// One sparse set keyed by entity index.
    #[default]
    Sparse,
}

/// Outcome of one [`Archive::maintain`] pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaintainReport {
    /// Ids moved from sparse sets into archetypes.
    pub promoted: Vec<ComponentId>,
    /// Ids moved from archetypes into sparse sets.
    pub demoted: Vec<ComponentId>,
}

impl MaintainReport {
    /// `true` if nothing migrated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.promoted.is_empty() && self.demoted.is_empty()
    }
}

/// Archetype graph, sparse sets and the residency of every component.
#[derive(Debug)]
pub struct Archive {
    graph: ArchetypeGraph,
    sparse: Vec<Option<SparseSet>>,
    residency: Vec<Residency>,
    /// Ids with archetype residency.
    resident: ComponentMask,
    config: ArchiveConfig,
    cache: Mutex<QueryCache>,
}

impl Archive {
    /// Creates an archive holding only the empty archetype.
    #[must_use]
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            graph: ArchetypeGraph::new(config.chunk_capacity, config.chunk_pool_limit),
            sparse: Vec::new(),
            residency: Vec::new(),
            resident: ComponentMask::EMPTY,
            config: config.archive.clone(),
            cache: Mutex::new(QueryCache::new()),
        }
    }

    /// The archetype graph.
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &ArchetypeGraph {
        &self.graph
    }

    /// The archetype graph, mutably.
    #[inline]
    pub fn graph_mut(&mut self) -> &mut ArchetypeGraph {
        &mut self.graph
    }

    /// Graph and sparse sets borrowed apart.
    #[inline]
    pub(crate) fn split_mut(&mut self) -> (&mut ArchetypeGraph, &mut [Option<SparseSet>]) {
        (&mut self.graph, &mut self.sparse)
    }

    /// Current residency of `component`.
    #[inline]
    #[must_use]
    pub fn residency(&self, component: ComponentId) -> Residency {
        self.residency.get(usize::from(component)).copied().unwrap_or_default()
    }

    /// Mask of every id with archetype residency.
    #[inline]
    #[must_use]
    pub const fn archetype_resident(&self) -> ComponentMask {
        self.resident
    }

    fn set_residency_flag(&mut self, component: ComponentId, residency: Residency) {
        let index = usize::from(component);
        if index >= self.residency.len() {
            self.residency.resize(index + 1, Residency::default());
        }
        self.residency[index] = residency;
        self.resident = match residency {
            Residency::Archetype => self.resident.with(component),
            Residency::Sparse => self.resident.without(component),
        };
    }

    /// Sparse set of `component`, if it has one.
    #[inline]
    #[must_use]
    pub fn sparse_set(&self, component: ComponentId) -> Option<&SparseSet> {
        self.sparse.get(usize::from(component))?.as_ref()
    }

    /// Mutable sparse set of `component`, if it has one.
    #[inline]
    pub fn sparse_set_mut(&mut self, component: ComponentId) -> Option<&mut SparseSet> {
        self.sparse.get_mut(usize::from(component))?.as_mut()
    }

    /// Sparse set of the component described by `info`, created if absent.
    pub fn sparse_set_or_insert(&mut self, info: ComponentInfo) -> &mut SparseSet {
        let index = usize::from(info.id);
        if index >= self.sparse.len() {
            self.sparse.resize_with(index + 1, || None);
        }
        self.sparse[index].get_or_insert_with(|| SparseSet::new(info))
    }

    /// Number of allocated sparse sets.
    #[must_use]
    pub fn sparse_set_count(&self) -> usize {
        self.sparse.iter().flatten().count()
    }

    /// Number of entities carrying `component` in its current residency.
    #[must_use]
    pub fn population(&self, component: ComponentId) -> usize {
        match self.residency(component) {
            Residency::Sparse => self.sparse_set(component).map_or(0, SparseSet::len),
            Residency::Archetype => self
                .graph
                .archetypes()
                .iter()
                .filter(|archetype| archetype.mask().has(component))
                .map(|archetype| archetype.len())
                .sum(),
        }
    }

    /// Archetypes matching a query's masks, served from the cache.
    ///
    /// The masks are projected onto archetype-resident ids first; the
    /// caller checks sparse-resident ids per row.
    #[must_use]
    pub fn matching(
        &self,
        all: ComponentMask,
        any: ComponentMask,
        none: ComponentMask,
    ) -> Arc<[ArchetypeId]> {
        let key = QueryKey::project(all, any, none, self.resident);
        let version = self.graph.version();
        self.cache.lock().get_or_compute(key, version, |key| {
            self.graph.archetypes_with(&key.all, &key.any, &key.none)
        })
    }

    /// `(hits, misses)` of the query cache.
    #[must_use]
    pub fn cache_stats(&self) -> (u64, u64) {
        let cache = self.cache.lock();
        (cache.hits(), cache.misses())
    }

    /// Moves `entity`'s archetype row from `from` to archetype `to` and
    /// patches every record the move touches.
    pub fn relocate(
        &mut self,
        entities: &mut EntityTable,
        entity: Entity,
        from: EntityLocation,
        to: ArchetypeId,
    ) -> EntityLocation {
        let (location, moved) = self.graph.move_entity(from, to);
        if let Some(moved) = moved {
            entities.set_location(moved, from);
        }
        entities.set_location(entity, location);
        location
    }

    /// Swap-removes the archetype row at `location` and patches the entity
    /// moved into it.
    pub fn remove_row(&mut self, entities: &mut EntityTable, location: EntityLocation) {
        let archetype = self.graph.get_mut(location.archetype);
        if let Some(moved) = archetype.remove(location.chunk as usize, location.row as usize) {
            entities.set_location(moved, location);
        }
    }

    // ========================================================================
    // MIGRATION
    // ========================================================================

    /// Analyses component densities and migrates ids whose density left
    /// the hysteresis band.
    ///
    /// Does nothing below `min_entities_for_analysis` live entities. Tags
    /// are never analysed. A failed migration leaves the id where it was
    /// and is logged, not returned.
    pub fn maintain(
        &mut self,
        entities: &mut EntityTable,
        registry: &ComponentRegistry,
    ) -> MaintainReport {
        let mut report = MaintainReport::default();
        let live = entities.len();
        if live == 0 || live < self.config.min_entities_for_analysis {
            tracing::trace!(live, floor = self.config.min_entities_for_analysis, "skipping density analysis");
            return report;
        }

        for info in registry.infos() {
            if info.is_tag() {
                continue;
            }
            let component = info.id;
            let density = self.population(component) as f64 / live as f64;
            let target = match self.residency(component) {
                Residency::Sparse if density > self.config.promote_density => Residency::Archetype,
                Residency::Archetype if density < self.config.demote_density => Residency::Sparse,
                _ => continue,
            };
            match self.migrate(component, target, entities, registry) {
                Ok(()) if target == Residency::Archetype => report.promoted.push(component),
                Ok(()) => report.demoted.push(component),
                Err(err) => {
                    tracing::warn!(component, name = info.name, %err, "residency migration failed");
                }
            }
        }
        report
    }

    /// Forces `component` into `residency`, migrating existing values.
    ///
    /// # Returns
    ///
    /// `false` if the component already had that residency.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingMetadata`] for an unregistered id; the
    /// residency is unchanged.
    pub fn set_residency(
        &mut self,
        component: ComponentId,
        residency: Residency,
        entities: &mut EntityTable,
        registry: &ComponentRegistry,
    ) -> CoreResult<bool> {
        if self.residency(component) == residency {
            return Ok(false);
        }
        self.migrate(component, residency, entities, registry)?;
        Ok(true)
    }

    fn migrate(
        &mut self,
        component: ComponentId,
        target: Residency,
        entities: &mut EntityTable,
        registry: &ComponentRegistry,
    ) -> CoreResult<()> {
        let info = registry.info(component).ok_or(CoreError::MissingMetadata(component))?;
        let moved = match target {
            Residency::Archetype => self.promote(info, entities, registry)?,
            Residency::Sparse => self.demote(info, entities, registry)?,
        };
        tracing::info!(component, name = info.name, ?target, moved, "migrated component residency");
        Ok(())
    }

    /// Sparse set → archetype columns. Each member moves along the add
    /// edge of its archetype and its bytes are written into the new column.
    ///
    /// Every destination archetype is resolved before the set is taken, so
    /// an error leaves the component sparse with its values in place.
    fn promote(
        &mut self,
        info: ComponentInfo,
        entities: &mut EntityTable,
        registry: &ComponentRegistry,
    ) -> CoreResult<usize> {
        let component = info.id;
        let slot = usize::from(component);
        let sources: Vec<ArchetypeId> = match self.sparse.get(slot).and_then(Option::as_ref) {
            Some(set) => set
                .entities()
                .iter()
                .filter_map(|&entity| entities.record(entity))
                .map(|record| record.location.archetype)
                .collect(),
            None => Vec::new(),
        };
        let mut targets = HashMap::new();
        for source in sources {
            if let Entry::Vacant(vacant) = targets.entry(source) {
                vacant.insert(self.graph.transition_add(source, component, registry)?);
            }
        }

        let set = self.sparse.get_mut(slot).and_then(Option::take);
        self.set_residency_flag(component, Residency::Archetype);
        let Some(set) = set else {
            return Ok(0);
        };

        for (index, &entity) in set.entities().iter().enumerate() {
            let Some(record) = entities.record_mut(entity) else {
                continue;
            };
            record.sparse_mask = record.sparse_mask.without(component);
            let from = record.location;

            // Moving one member never changes another member's archetype
            let to = targets[&from.archetype];
            let location = self.relocate(entities, entity, from, to);
            let archetype = self.graph.get_mut(to);
            if let Some(column) = archetype.column_index(component) {
                archetype
                    .chunk_mut(location.chunk as usize)
                    .column_mut(column)
                    .write_row(location.row as usize, set.bytes_at(index));
            }
        }
        Ok(set.len())
    }

    /// Archetype columns → sparse set. Rows are taken from the end of each
    /// source archetype so no other entity is displaced.
    fn demote(
        &mut self,
        info: ComponentInfo,
        entities: &mut EntityTable,
        registry: &ComponentRegistry,
    ) -> CoreResult<usize> {
        let component = info.id;
        let sources: Vec<ArchetypeId> = self
            .graph
            .archetypes()
            .iter()
            .filter(|archetype| archetype.mask().has(component) && !archetype.is_empty())
            .map(|archetype| archetype.id())
            .collect();

        let mut set = SparseSet::new(info);
        for source in sources {
            let to = self.graph.transition_remove(source, component, registry)?;
            loop {
                let archetype = self.graph.get(source);
                let Some((chunk, row)) = archetype.last_row() else {
                    break;
                };
                let Some(column) = archetype.column(chunk, component) else {
                    break;
                };
                let entity = archetype.chunk(chunk).entities()[row];
                set.insert_bytes(entity, column.row(row));

                let from = EntityLocation::new(source, chunk, row);
                self.relocate(entities, entity, from, to);
                if let Some(record) = entities.record_mut(entity) {
                    record.sparse_mask = record.sparse_mask.with(component);
                }
            }
        }

        let moved = set.len();
        let index = usize::from(component);
        if index >= self.sparse.len() {
            self.sparse.resize_with(index + 1, || None);
        }
        self.sparse[index] = Some(set);
        self.set_residency_flag(component, Residency::Sparse);
        Ok(moved)
    }
}
