//! # Entity Management
//!
//! Entities are lightweight handles consisting of:
//! - An index into the entity table
//! - A generation counter for safe reuse
//!
//! The [`EntityTable`] allocates handles and remembers where each live
//! entity's data is stored.

use std::fmt;

use super::archetype::ArchetypeId;
use super::mask::ComponentMask;

/// Unique handle for an entity.
///
/// The handle is split into two parts:
/// - Lower 32 bits: Index into the entity table
/// - Upper 32 bits: Generation counter for detecting stale references
///
/// Generations start at 1, so the all-zero value never names a live entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Entity(u64);

impl Entity {
    /// The null handle. Never alive.
    pub const NULL: Self = Self(0);

    /// Creates a handle from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - Slot in the entity table (0 to 2^32-1)
    /// * `generation` - Generation of that slot (1 to 2^32-1 for live entities)
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the handle.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the handle.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Checks if this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The packed 64-bit value.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuilds a handle from its packed value.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Entity(null)")
        } else {
            write!(f, "Entity({}v{})", self.index(), self.generation())
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

/// Where an entity's archetype row lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityLocation {
    /// Archetype holding the row.
    pub archetype: ArchetypeId,
    /// Chunk within the archetype.
    pub chunk: u32,
    /// Row within the chunk.
    pub row: u32,
}

impl EntityLocation {
    /// Creates a location.
    #[inline]
    #[must_use]
    pub const fn new(archetype: ArchetypeId, chunk: usize, row: usize) -> Self {
        Self { archetype, chunk: chunk as u32, row: row as u32 }
    }
}

/// Storage record of a materialized entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityRecord {
    /// Archetype row.
    pub location: EntityLocation,
    /// Components this entity holds in sparse sets.
    pub sparse_mask: ComponentMask,
}

impl EntityRecord {
    /// A record with no sparse components.
    #[inline]
    #[must_use]
    pub const fn at(location: EntityLocation) -> Self {
        Self { location, sparse_mask: ComponentMask::EMPTY }
    }
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    generation: u32,
    alive: bool,
    record: Option<EntityRecord>,
}

/// Handle allocation plus per-entity storage records.
///
/// Destroyed indices are recycled with a bumped generation. Entities
/// reserved from shared contexts stay pending until the world flushes
/// them into storage.
#[derive(Debug, Default)]
pub struct EntityTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    pending: Vec<Entity>,
    alive: usize,
}

impl EntityTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a live handle without a storage record.
    ///
    /// # Panics
    ///
    /// Panics once all 2^32 indices are in use.
    pub fn allocate(&mut self) -> Entity {
        self.alive += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            slot.record = None;
            return Entity::new(index, slot.generation);
        }
        let index = u32::try_from(self.slots.len()).expect("entity index space exhausted");
        self.slots.push(Slot { generation: 1, alive: true, record: None });
        Entity::new(index, 1)
    }

    /// Allocates a handle whose storage is created on the next flush.
    pub fn reserve(&mut self) -> Entity {
        let entity = self.allocate();
        self.pending.push(entity);
        entity
    }

    /// Takes the entities reserved since the last flush.
    pub fn take_pending(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.pending)
    }

    /// `true` if reserved entities await materialization.
    #[inline]
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Releases a live handle, returning its record.
    ///
    /// The slot's generation is bumped so the handle goes stale. Returns
    /// `None` (and does nothing) for dead or stale handles.
    pub fn free(&mut self, entity: Entity) -> Option<Option<EntityRecord>> {
        if !self.is_alive(entity) {
            return None;
        }
        let slot = &mut self.slots[entity.index() as usize];
        slot.alive = false;
        slot.generation = match slot.generation.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        self.free.push(entity.index());
        self.alive -= 1;
        Some(slot.record.take())
    }

    /// Checks whether `entity` is a live handle.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index() as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation())
    }

    /// Number of live entities, pending ones included.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.alive
    }

    /// `true` if no entity is alive.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.alive == 0
    }

    /// Storage record of a live, materialized entity.
    #[inline]
    #[must_use]
    pub fn record(&self, entity: Entity) -> Option<&EntityRecord> {
        if !self.is_alive(entity) {
            return None;
        }
        self.slots[entity.index() as usize].record.as_ref()
    }

    /// Mutable storage record of a live, materialized entity.
    #[inline]
    pub fn record_mut(&mut self, entity: Entity) -> Option<&mut EntityRecord> {
        if !self.is_alive(entity) {
            return None;
        }
        self.slots[entity.index() as usize].record.as_mut()
    }

    /// Installs the record of a live entity.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not alive.
    #[track_caller]
    pub fn set_record(&mut self, entity: Entity, record: EntityRecord) {
        assert!(self.is_alive(entity), "cannot place dead entity {entity:?}");
        self.slots[entity.index() as usize].record = Some(record);
    }

    /// Patches the archetype row of a live entity after it was moved.
    #[inline]
    pub fn set_location(&mut self, entity: Entity, location: EntityLocation) {
        if let Some(record) = self.record_mut(entity) {
            record.location = location;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_roundtrip() {
        let entity = Entity::new(12345, 67890);
        assert_eq!(entity.index(), 12345);
        assert_eq!(entity.generation(), 67890);
        assert_eq!(Entity::from_bits(entity.to_bits()), entity);
    }

    #[test]
    fn test_null_is_all_zero() {
        assert_eq!(Entity::NULL.to_bits(), 0);
        assert!(Entity::default().is_null());
        assert!(!EntityTable::new().is_alive(Entity::NULL));
    }

    #[test]
    fn test_generations_start_at_one() {
        let mut table = EntityTable::new();
        let entity = table.allocate();
        assert_eq!(entity.generation(), 1);
        assert!(!entity.is_null());
    }

    #[test]
    fn test_recycled_index_gets_new_generation() {
        let mut table = EntityTable::new();
        let first = table.allocate();
        assert!(table.free(first).is_some());
        let second = table.allocate();

        assert_eq!(second.index(), first.index());
        assert_eq!(second.generation(), first.generation() + 1);
        assert!(!table.is_alive(first));
        assert!(table.is_alive(second));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_free_stale_handle_is_ignored() {
        let mut table = EntityTable::new();
        let entity = table.allocate();
        table.free(entity);
        assert!(table.free(entity).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_freed_slot_is_not_alive_under_next_generation() {
        let mut table = EntityTable::new();
        let entity = table.allocate();
        table.free(entity);
        let forged = Entity::new(entity.index(), entity.generation() + 1);
        assert!(!table.is_alive(forged));
    }

    #[test]
    fn test_reserved_entities_are_pending() {
        let mut table = EntityTable::new();
        let reserved = table.reserve();
        assert!(table.is_alive(reserved));
        assert!(table.record(reserved).is_none());
        assert!(table.has_pending());
        assert_eq!(table.take_pending(), vec![reserved]);
        assert!(!table.has_pending());
    }

    #[test]
    fn test_records_follow_locations() {
        let mut table = EntityTable::new();
        let entity = table.allocate();
        table.set_record(entity, EntityRecord::at(EntityLocation::new(ArchetypeId::EMPTY, 0, 0)));
        table.set_location(entity, EntityLocation::new(ArchetypeId::EMPTY, 1, 7));
        let record = table.record(entity).unwrap();
        assert_eq!(record.location.chunk, 1);
        assert_eq!(record.location.row, 7);
    }
}
