//! # ECS World
//!
//! The central container for entities, components, relations and stage
//! callbacks.
//!
//! ## Locking
//!
//! Entity allocation and location records sit behind one mutex so that
//! [`World::reserve_entity`] works through `&World`. Everything else that
//! changes structure takes `&mut World`. Reserved entities are placed in
//! the empty archetype by the next structural operation.

use parking_lot::Mutex;

use super::archetype::ArchetypeId;
use super::archive::{Archive, MaintainReport, Residency};
use super::bundle::Bundle;
use super::component::{Component, ComponentId, ComponentInfo, ComponentRegistry};
use super::entity::{Entity, EntityLocation, EntityRecord, EntityTable};
use super::mask::ComponentMask;
use super::query::Query;
use super::relation::{RelationKind, RelationStore};
use super::stage::{NamedCallback, Stage, StageCallbacks};
use crate::config::WorldConfig;
use crate::error::CoreResult;

/// Counters describing a world's storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldStats {
    /// Live entities, reserved ones included.
    pub entities: usize,
    /// Archetypes ever created, the empty one included.
    pub archetypes: usize,
    /// Allocated chunks across all archetypes.
    pub chunks: usize,
    /// Allocated sparse sets.
    pub sparse_sets: usize,
    /// Structural version of the archetype graph.
    pub structural_version: u64,
    /// Query cache hits.
    pub cache_hits: u64,
    /// Query cache misses.
    pub cache_misses: u64,
}

/// The ECS World - owner of all entity and component state.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new();
///
/// let entity = world.spawn((Position::default(), Velocity { x: 1.0, y: 0.0 }));
/// world.query().for_each2::<Position, Velocity>(|pos, vel| pos.x += vel.x);
/// assert_eq!(world.get_component::<Position>(entity).x, 1.0);
/// ```
pub struct World {
    pub(crate) registry: ComponentRegistry,
    pub(crate) entities: Mutex<EntityTable>,
    pub(crate) archive: Archive,
    pub(crate) relations: RelationStore,
    stages: StageCallbacks,
    config: WorldConfig,
}

impl Default for World {
    fn default() -> Self {
        Self::build(WorldConfig::default())
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("stats", &self.stats())
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

impl World {
    /// Creates a world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a world with `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`](crate::CoreError::InvalidConfig)
    /// if the configuration does not validate.
    pub fn with_config(config: WorldConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: WorldConfig) -> Self {
        Self {
            registry: ComponentRegistry::new(),
            entities: Mutex::new(EntityTable::new()),
            archive: Archive::new(&config),
            relations: RelationStore::new(),
            stages: StageCallbacks::default(),
            config,
        }
    }

    /// The configuration this world was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Component ids and layouts of this world.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Hybrid storage of this world.
    #[inline]
    #[must_use]
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    // =========================================================================
    // ENTITY LIFECYCLE
    // =========================================================================

    /// Places entities reserved through [`reserve_entity`](Self::reserve_entity)
    /// in the empty archetype.
    pub fn flush(&mut self) {
        let entities = self.entities.get_mut();
        if !entities.has_pending() {
            return;
        }
        let archetype = self.archive.graph_mut().get_mut(ArchetypeId::EMPTY);
        for entity in entities.take_pending() {
            if !entities.is_alive(entity) {
                continue;
            }
            let (chunk, row) = archetype.add(entity);
            let location = EntityLocation::new(ArchetypeId::EMPTY, chunk, row);
            entities.set_record(entity, EntityRecord::at(location));
        }
    }

    /// Creates an entity without components.
    pub fn create_entity(&mut self) -> Entity {
        self.flush();
        let entities = self.entities.get_mut();
        let entity = entities.allocate();
        let (chunk, row) = self.archive.graph_mut().get_mut(ArchetypeId::EMPTY).add(entity);
        let location = EntityLocation::new(ArchetypeId::EMPTY, chunk, row);
        entities.set_record(entity, EntityRecord::at(location));
        entity
    }

    /// Creates an entity holding every component of `bundle`.
    ///
    /// Archetype-resident members pick the destination archetype directly,
    /// without walking transition edges one component at a time.
    ///
    /// # Panics
    ///
    /// Panics if the bundle names a component type twice.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Entity {
        self.flush();
        let ids = B::component_ids(&self.registry);
        let resident = self.archive.archetype_resident();
        let mask: ComponentMask = ids.iter().copied().filter(|&id| resident.has(id)).collect();
        let archetype_id = known(self.archive.graph_mut().get_or_create(mask, &self.registry));

        let entities = self.entities.get_mut();
        let entity = entities.allocate();
        let archetype = self.archive.graph_mut().get_mut(archetype_id);
        let (chunk, row) = archetype.add(entity);
        let columns: Vec<Option<usize>> =
            ids.iter().map(|&id| archetype.column_index(id)).collect();
        let chunk_ref = archetype.chunk_mut(chunk);
        bundle.for_each_bytes(&mut |i, bytes| {
            if let Some(column) = columns[i] {
                chunk_ref.column_mut(column).write_row(row, bytes);
            }
        });

        let mut record = EntityRecord::at(EntityLocation::new(archetype_id, chunk, row));
        let registry = &self.registry;
        let archive = &mut self.archive;
        bundle.for_each_bytes(&mut |i, bytes| {
            let id = ids[i];
            if !resident.has(id) {
                archive.sparse_set_or_insert(metadata(registry, id)).insert_bytes(entity, bytes);
                record.sparse_mask = record.sparse_mask.with(id);
            }
        });
        entities.set_record(entity, record);
        entity
    }

    /// Spawns one entity per bundle, returning them in order.
    pub fn spawn_batch<B, I>(&mut self, bundles: I) -> Vec<Entity>
    where
        B: Bundle,
        I: IntoIterator<Item = B>,
    {
        bundles.into_iter().map(|bundle| self.spawn(bundle)).collect()
    }

    /// Reserves an entity handle through a shared reference.
    ///
    /// The entity is alive at once and gets storage on the next flush.
    pub fn reserve_entity(&self) -> Entity {
        self.entities.lock().reserve()
    }

    /// Destroys `entity`, its components and every relation edge touching
    /// it. Stale handles are ignored.
    pub fn destroy_entity(&mut self, entity: Entity) {
        self.flush();
        let entities = self.entities.get_mut();
        let Some(record) = entities.record(entity).copied() else {
            tracing::trace!(?entity, "destroy of dead entity ignored");
            return;
        };
        for component in record.sparse_mask.components() {
            if let Some(set) = self.archive.sparse_set_mut(component) {
                set.remove(entity);
            }
        }
        self.archive.remove_row(entities, record.location);
        self.relations.remove_entity(entity);
        entities.free(entity);
    }

    /// Checks whether `entity` is a live handle.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.lock().is_alive(entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.lock().len()
    }

    /// Archetype row of a live, placed entity.
    #[must_use]
    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        self.entities.lock().record(entity).map(|record| record.location)
    }

    fn record(&self, entity: Entity) -> Option<EntityRecord> {
        self.entities.lock().record(entity).copied()
    }

    // =========================================================================
    // COMPONENTS
    // =========================================================================

    /// Adds `value` to `entity`, overwriting an existing `T`.
    ///
    /// Dead entities are ignored.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) {
        self.flush();
        let component = self.registry.id_of::<T>();
        let entities = self.entities.get_mut();
        let Some(record) = entities.record(entity).copied() else {
            tracing::trace!(?entity, name = T::name(), "add_component on dead entity ignored");
            return;
        };

        match self.archive.residency(component) {
            Residency::Sparse => {
                let info = metadata(&self.registry, component);
                self.archive.sparse_set_or_insert(info).insert(entity, value);
                if let Some(record) = entities.record_mut(entity) {
                    record.sparse_mask = record.sparse_mask.with(component);
                }
            }
            Residency::Archetype => {
                let mut location = record.location;
                if !self.archive.graph().get(location.archetype).mask().has(component) {
                    let graph = self.archive.graph_mut();
                    let to = known(graph.transition_add(location.archetype, component, &self.registry));
                    location = self.archive.relocate(entities, entity, location, to);
                }
                let archetype = self.archive.graph_mut().get_mut(location.archetype);
                if let Some(column) = archetype.column_index(component) {
                    *archetype
                        .chunk_mut(location.chunk as usize)
                        .column_mut(column)
                        .get_mut::<T>(location.row as usize) = value;
                }
            }
        }
    }

    /// Removes `T` from `entity`, returning the old value.
    ///
    /// Returns `None` if the entity is dead or has no `T`.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.flush();
        let component = self.registry.lookup::<T>()?;
        let entities = self.entities.get_mut();
        let Some(record) = entities.record(entity).copied() else {
            tracing::trace!(?entity, name = T::name(), "remove_component on dead entity ignored");
            return None;
        };

        match self.archive.residency(component) {
            Residency::Sparse => {
                if !record.sparse_mask.has(component) {
                    return None;
                }
                let value = self.archive.sparse_set_mut(component)?.take::<T>(entity);
                if let Some(record) = entities.record_mut(entity) {
                    record.sparse_mask = record.sparse_mask.without(component);
                }
                value
            }
            Residency::Archetype => {
                let from = record.location;
                let column = self.archive.graph().get(from.archetype).column(from.chunk as usize, component)?;
                let value: T = bytemuck::pod_read_unaligned(column.row(from.row as usize));
                let graph = self.archive.graph_mut();
                let to = known(graph.transition_remove(from.archetype, component, &self.registry));
                self.archive.relocate(entities, entity, from, to);
                Some(value)
            }
        }
    }

    /// Reference to `entity`'s `T`.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead or has no `T`. See [`get`](Self::get).
    #[track_caller]
    #[must_use]
    pub fn get_component<T: Component>(&self, entity: Entity) -> &T {
        match self.get::<T>(entity) {
            Some(value) => value,
            None => panic!("{entity:?} has no component {}", T::name()),
        }
    }

    /// Mutable reference to `entity`'s `T`.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead or has no `T`. See [`get_mut`](Self::get_mut).
    #[track_caller]
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> &mut T {
        match self.get_mut::<T>(entity) {
            Some(value) => value,
            None => panic!("{entity:?} has no component {}", T::name()),
        }
    }

    /// Reference to `entity`'s `T`, if it is alive and has one.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let component = self.registry.lookup::<T>()?;
        let record = self.record(entity)?;
        match self.archive.residency(component) {
            Residency::Sparse => self.archive.sparse_set(component)?.get::<T>(entity),
            Residency::Archetype => {
                let location = record.location;
                let archetype = self.archive.graph().get(location.archetype);
                let column = archetype.column(location.chunk as usize, component)?;
                Some(column.get::<T>(location.row as usize))
            }
        }
    }

    /// Mutable reference to `entity`'s `T`, if it is alive and has one.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let component = self.registry.lookup::<T>()?;
        let record = self.entities.get_mut().record(entity).copied()?;
        match self.archive.residency(component) {
            Residency::Sparse => self.archive.sparse_set_mut(component)?.get_mut::<T>(entity),
            Residency::Archetype => {
                let location = record.location;
                let archetype = self.archive.graph_mut().get_mut(location.archetype);
                let column = archetype.column_index(component)?;
                Some(
                    archetype
                        .chunk_mut(location.chunk as usize)
                        .column_mut(column)
                        .get_mut::<T>(location.row as usize),
                )
            }
        }
    }

    /// Checks whether `entity` is alive and has a `T`.
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        let Some(component) = self.registry.lookup::<T>() else {
            return false;
        };
        let Some(record) = self.record(entity) else {
            return false;
        };
        match self.archive.residency(component) {
            Residency::Sparse => record.sparse_mask.has(component),
            Residency::Archetype => {
                self.archive.graph().get(record.location.archetype).mask().has(component)
            }
        }
    }

    // =========================================================================
    // STORAGE CONTROL
    // =========================================================================

    /// Current residency of `T`.
    #[must_use]
    pub fn residency<T: Component>(&self) -> Residency {
        self.archive.residency(self.registry.id_of::<T>())
    }

    /// Forces `T` into `residency`, migrating every stored value.
    ///
    /// # Returns
    ///
    /// `false` if `T` already had that residency.
    ///
    /// # Errors
    ///
    /// Propagates [`Archive::set_residency`] errors; the residency is then
    /// unchanged.
    pub fn set_residency<T: Component>(&mut self, residency: Residency) -> CoreResult<bool> {
        self.flush();
        let component = self.registry.id_of::<T>();
        self.archive.set_residency(component, residency, self.entities.get_mut(), &self.registry)
    }

    /// Runs one density analysis and migration pass.
    pub fn maintain(&mut self) -> MaintainReport {
        self.flush();
        self.archive.maintain(self.entities.get_mut(), &self.registry)
    }

    /// Storage counters.
    #[must_use]
    pub fn stats(&self) -> WorldStats {
        let graph = self.archive.graph();
        let (cache_hits, cache_misses) = self.archive.cache_stats();
        WorldStats {
            entities: self.entity_count(),
            archetypes: graph.len(),
            chunks: graph.chunk_count(),
            sparse_sets: self.archive.sparse_set_count(),
            structural_version: graph.version(),
            cache_hits,
            cache_misses,
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Starts a query over this world.
    pub fn query(&mut self) -> Query<'_> {
        Query::new(self)
    }

    // =========================================================================
    // RELATIONS
    // =========================================================================

    /// Registers a many-to-many relation kind, or returns the existing one.
    pub fn register_relation(&mut self, name: &str) -> RelationKind {
        self.relations.register(name)
    }

    /// Registers a kind whose sources have at most one target.
    pub fn register_exclusive_relation(&mut self, name: &str) -> RelationKind {
        self.relations.register_exclusive(name)
    }

    /// Relation edges of this world.
    #[inline]
    #[must_use]
    pub fn relations(&self) -> &RelationStore {
        &self.relations
    }

    /// Adds a `kind` edge from `source` to `target`. Ignored if either
    /// entity is dead.
    pub fn add_relation(&mut self, source: Entity, kind: RelationKind, target: Entity) {
        let entities = self.entities.get_mut();
        if !entities.is_alive(source) || !entities.is_alive(target) {
            tracing::trace!(?source, ?target, "add_relation on dead entity ignored");
            return;
        }
        self.relations.add(source, kind, target);
    }

    /// Removes a `kind` edge. Returns `false` if there was none.
    pub fn remove_relation(&mut self, source: Entity, kind: RelationKind, target: Entity) -> bool {
        self.relations.remove(source, kind, target)
    }

    /// Checks for a `kind` edge from `source` to `target`.
    #[must_use]
    pub fn has_relation(&self, source: Entity, kind: RelationKind, target: Entity) -> bool {
        self.relations.has(source, kind, target)
    }

    /// Makes `parent` the only parent of `child`.
    pub fn set_parent(&mut self, child: Entity, parent: Entity) {
        self.add_relation(child, RelationKind::CHILD_OF, parent);
    }

    /// Parent of `child`.
    ///
    /// # Panics
    ///
    /// Panics if `child` is dead.
    #[track_caller]
    #[must_use]
    pub fn parent(&self, child: Entity) -> Option<Entity> {
        assert!(self.is_alive(child), "parent of dead entity {child:?}");
        self.relations.targets(child, RelationKind::CHILD_OF).first().copied()
    }

    /// Children of `parent`, in the order they were attached.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is dead.
    #[track_caller]
    #[must_use]
    pub fn children(&self, parent: Entity) -> Vec<Entity> {
        assert!(self.is_alive(parent), "children of dead entity {parent:?}");
        self.relations.sources(parent, RelationKind::CHILD_OF).to_vec()
    }

    // =========================================================================
    // STAGES
    // =========================================================================

    /// Appends a callback to `stage`.
    pub fn add_stage_callback(
        &mut self,
        stage: Stage,
        name: impl Into<String>,
        callback: impl FnMut(&mut World) + Send + 'static,
    ) {
        self.stages.push(stage, name.into(), Box::new(callback));
    }

    /// Runs `stage`'s callbacks in registration order.
    ///
    /// Callbacks registered while the stage runs first execute on the next
    /// run.
    ///
    /// If a callback panics, the stage keeps all of its callbacks.
    pub fn run_stage(&mut self, stage: Stage) {
        let callbacks = self.stages.take(stage);
        let mut running = RunningStage { world: self, stage, callbacks };
        for callback in &mut running.callbacks {
            tracing::trace!(?stage, name = %callback.name, "running stage callback");
            (callback.run)(running.world);
        }
    }

    /// Names of `stage`'s callbacks in run order.
    #[must_use]
    pub fn stage_callback_names(&self, stage: Stage) -> Vec<&str> {
        self.stages.names(stage)
    }

    /// Total number of stage callbacks.
    #[must_use]
    pub fn stage_callback_count(&self) -> usize {
        self.stages.len()
    }
}

/// Stage callbacks taken out of a world while they run. Dropping it puts
/// them back, also when a callback unwinds.
struct RunningStage<'w> {
    world: &'w mut World,
    stage: Stage,
    callbacks: Vec<NamedCallback>,
}

impl Drop for RunningStage<'_> {
    fn drop(&mut self) {
        let callbacks = std::mem::take(&mut self.callbacks);
        self.world.stages.restore(self.stage, callbacks);
    }
}

/// Metadata of an id the registry handed out.
#[track_caller]
fn metadata(registry: &ComponentRegistry, component: ComponentId) -> ComponentInfo {
    match registry.info(component) {
        Some(info) => info,
        None => panic!("component {component} has no registered metadata"),
    }
}

/// Unwraps a graph lookup over ids the registry already knows.
#[track_caller]
fn known(result: CoreResult<ArchetypeId>) -> ArchetypeId {
    match result {
        Ok(id) => id,
        Err(err) => panic!("archetype graph out of sync with registry: {err}"),
    }
}
