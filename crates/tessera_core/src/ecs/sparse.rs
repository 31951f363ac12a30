//! # Sparse Sets
//!
//! Storage for components that too few entities carry to deserve an
//! archetype column.
//!
//! ```text
//! sparse: [ -  2  -  0  -  1 ]     indexed by entity index
//! dense:  [ e3 e5 e1 ]             packed entities
//! data:   [ c3 c5 c1 ]             packed component bytes
//! ```
//!
//! `sparse[e.index]` is meaningful only when `dense[sparse[e.index]] == e`,
//! so stale handles never alias a recycled index.

use bytemuck::Pod;

use super::component::{ComponentId, ComponentInfo};
use super::entity::Entity;
use super::storage::Column;

const EMPTY_SLOT: u32 = u32::MAX;

/// One component's sparse-resident values.
#[derive(Debug)]
pub struct SparseSet {
    info: ComponentInfo,
    sparse: Vec<u32>,
    dense: Vec<Entity>,
    data: Column,
}

impl SparseSet {
    /// Creates an empty set for the component described by `info`.
    #[must_use]
    pub fn new(info: ComponentInfo) -> Self {
        Self { info, sparse: Vec::new(), dense: Vec::new(), data: info.new_column(0) }
    }

    /// The stored component.
    #[inline]
    #[must_use]
    pub const fn component(&self) -> ComponentId {
        self.info.id
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// `true` if the set has no members.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Members in dense order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.dense
    }

    /// Dense slot of `entity`, if it is a member.
    #[inline]
    #[must_use]
    pub fn slot(&self, entity: Entity) -> Option<usize> {
        let slot = *self.sparse.get(entity.index() as usize)?;
        if slot == EMPTY_SLOT {
            return None;
        }
        let slot = slot as usize;
        (self.dense.get(slot) == Some(&entity)).then_some(slot)
    }

    /// Checks membership.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.slot(entity).is_some()
    }

    /// Inserts or overwrites the value bytes of `entity`.
    ///
    /// # Returns
    ///
    /// `true` if `entity` was not a member before.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is not exactly one value long.
    pub fn insert_bytes(&mut self, entity: Entity, bytes: &[u8]) -> bool {
        if let Some(slot) = self.slot(entity) {
            self.data.write_row(slot, bytes);
            return false;
        }
        let slot = self.dense.len();
        self.data.reserve(slot + 1);
        self.data.write_row(slot, bytes);
        self.dense.push(entity);

        let index = entity.index() as usize;
        if index >= self.sparse.len() {
            self.sparse.resize(index + 1, EMPTY_SLOT);
        }
        self.sparse[index] = slot as u32;
        true
    }

    /// Inserts or overwrites a typed value.
    pub fn insert<T: Pod>(&mut self, entity: Entity, value: T) -> bool {
        self.insert_bytes(entity, bytemuck::bytes_of(&value))
    }

    /// Removes `entity` by moving the last member into its slot.
    ///
    /// # Returns
    ///
    /// `false` if `entity` was not a member.
    pub fn remove(&mut self, entity: Entity) -> bool {
        let Some(slot) = self.slot(entity) else {
            return false;
        };
        let last = self.dense.len() - 1;
        self.data.copy_row_within(last, slot);
        self.dense.swap_remove(slot);
        if slot < last {
            let moved = self.dense[slot];
            self.sparse[moved.index() as usize] = slot as u32;
        }
        self.sparse[entity.index() as usize] = EMPTY_SLOT;
        true
    }

    /// Removes `entity` and returns its value.
    pub fn take<T: Pod>(&mut self, entity: Entity) -> Option<T> {
        let value = *self.get::<T>(entity)?;
        self.remove(entity);
        Some(value)
    }

    /// Raw bytes of the member at dense `slot`.
    #[inline]
    #[must_use]
    pub fn bytes_at(&self, slot: usize) -> &[u8] {
        self.data.row(slot)
    }

    /// Raw bytes of `entity`'s value.
    #[must_use]
    pub fn bytes(&self, entity: Entity) -> Option<&[u8]> {
        self.slot(entity).map(|slot| self.data.row(slot))
    }

    /// Typed value of `entity`.
    #[must_use]
    pub fn get<T: Pod>(&self, entity: Entity) -> Option<&T> {
        let slot = self.slot(entity)?;
        Some(self.data.get::<T>(slot))
    }

    /// Mutable typed value of `entity`.
    pub fn get_mut<T: Pod>(&mut self, entity: Entity) -> Option<&mut T> {
        let slot = self.slot(entity)?;
        Some(self.data.get_mut::<T>(slot))
    }

    /// Values in dense order, parallel to [`entities`](Self::entities).
    #[must_use]
    pub fn values<T: Pod>(&self) -> &[T] {
        self.data.as_slice::<T>(self.dense.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::{Component, ComponentRegistry};
    use bytemuck::Zeroable;

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Frozen(u32);
    impl Component for Frozen {}

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Marker;
    impl Component for Marker {}

    fn set<T: Component>() -> SparseSet {
        let registry = ComponentRegistry::new();
        SparseSet::new(registry.info(registry.id_of::<T>()).unwrap())
    }

    #[test]
    fn test_insert_get_overwrite() {
        let mut set = set::<Frozen>();
        let e = Entity::new(10, 1);
        assert!(set.insert(e, Frozen(1)));
        assert!(!set.insert(e, Frozen(2)));
        assert_eq!(set.get::<Frozen>(e), Some(&Frozen(2)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_remove_swaps_last_member_in() {
        let mut set = set::<Frozen>();
        let entities: Vec<Entity> = (0..3).map(|i| Entity::new(i * 4, 1)).collect();
        for (i, &e) in entities.iter().enumerate() {
            set.insert(e, Frozen(i as u32));
        }

        assert!(set.remove(entities[0]));
        assert!(!set.contains(entities[0]));
        assert_eq!(set.entities(), &[entities[2], entities[1]]);
        assert_eq!(set.get::<Frozen>(entities[2]), Some(&Frozen(2)));
        assert_eq!(set.values::<Frozen>(), &[Frozen(2), Frozen(1)]);
        assert!(!set.remove(entities[0]));
    }

    #[test]
    fn test_stale_handle_is_not_a_member() {
        let mut set = set::<Frozen>();
        set.insert(Entity::new(3, 1), Frozen(7));
        assert!(!set.contains(Entity::new(3, 2)));
        assert!(set.get::<Frozen>(Entity::new(3, 2)).is_none());
    }

    #[test]
    fn test_take_returns_value() {
        let mut set = set::<Frozen>();
        let e = Entity::new(0, 1);
        set.insert(e, Frozen(42));
        assert_eq!(set.take::<Frozen>(e), Some(Frozen(42)));
        assert!(set.is_empty());
        assert_eq!(set.take::<Frozen>(e), None);
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let mut set = set::<Frozen>();
        for i in 0..1000 {
            set.insert(Entity::new(i, 1), Frozen(i));
        }
        assert_eq!(set.len(), 1000);
        assert_eq!(set.get::<Frozen>(Entity::new(999, 1)), Some(&Frozen(999)));
        assert_eq!(set.bytes(Entity::new(1, 1)), Some(&1u32.to_ne_bytes()[..]));
    }

    #[test]
    fn test_tag_members() {
        let mut set = set::<Marker>();
        let e = Entity::new(5, 1);
        set.insert(e, Marker);
        assert!(set.contains(e));
        assert_eq!(set.get::<Marker>(e), Some(&Marker));
        assert!(set.remove(e));
    }
}
