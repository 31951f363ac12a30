//! # Archetype Chunks
//!
//! A chunk is a fixed-capacity block of parallel columns plus the entity
//! array that names each row. Row `i` of every column and `entities[i]`
//! together describe one entity; rows `[0, len)` are always dense.

use super::component::ComponentInfo;
use super::entity::Entity;
use super::storage::Column;

/// Fixed-capacity block of rows sharing one archetype layout.
#[derive(Debug)]
pub struct Chunk {
    entities: Vec<Entity>,
    columns: Vec<Column>,
    capacity: usize,
}

impl Chunk {
    /// Allocates a chunk with one column per component, in the given order.
    #[must_use]
    pub fn new(infos: &[ComponentInfo], capacity: usize) -> Self {
        Self {
            entities: Vec::with_capacity(capacity),
            columns: infos.iter().map(|info| info.new_column(capacity)).collect(),
            capacity,
        }
    }

    /// Number of occupied rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// `true` if no row is occupied.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Row capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// `true` if every row is occupied.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entities.len() >= self.capacity
    }

    /// Entities of the occupied rows.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Column at `index` (archetype column order).
    #[inline]
    #[must_use]
    pub fn column(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    /// Mutable column at `index`.
    #[inline]
    pub fn column_mut(&mut self, index: usize) -> &mut Column {
        &mut self.columns[index]
    }

    /// Entities and columns borrowed apart, for iteration that writes
    /// columns while reading entities.
    #[inline]
    pub fn split_mut(&mut self) -> (&[Entity], &mut [Column]) {
        (&self.entities, &mut self.columns)
    }

    /// Appends `entity` in a zeroed row and returns the row index.
    ///
    /// # Panics
    ///
    /// Panics if the chunk is full.
    pub fn push(&mut self, entity: Entity) -> usize {
        assert!(!self.is_full(), "push into a full chunk");
        let row = self.entities.len();
        for column in &mut self.columns {
            column.zero_row(row);
        }
        self.entities.push(entity);
        row
    }

    /// Removes `row` by moving this chunk's last row into it.
    ///
    /// Returns the entity now occupying `row`, or `None` if `row` was the
    /// last one.
    pub fn swap_remove(&mut self, row: usize) -> Option<Entity> {
        let last = self.entities.len() - 1;
        for column in &mut self.columns {
            column.copy_row_within(last, row);
        }
        self.entities.swap_remove(row);
        (row < last).then(|| self.entities[row])
    }

    /// Drops the last row and returns its entity.
    pub fn pop(&mut self) -> Option<Entity> {
        self.entities.pop()
    }

    /// Overwrites `row` with `src_row` of another chunk of the same layout.
    pub fn fill_from(&mut self, row: usize, src: &Chunk, src_row: usize) {
        for (dst, from) in self.columns.iter_mut().zip(&src.columns) {
            dst.copy_row_from(row, from, src_row);
        }
        self.entities[row] = src.entities[src_row];
    }

    /// Forgets every row. Column memory is kept for reuse.
    pub fn reset(&mut self) {
        self.entities.clear();
    }
}

/// Borrows up to `N` distinct columns mutably at once.
///
/// Slot `i` of the result holds the column at `wanted[i]`, or `None` when
/// `wanted[i]` is `None`. Indices must be distinct.
pub(crate) fn columns_disjoint<const N: usize>(
    columns: &mut [Column],
    wanted: [Option<usize>; N],
) -> [Option<&mut Column>; N] {
    let mut out: [Option<&mut Column>; N] = std::array::from_fn(|_| None);
    for (index, column) in columns.iter_mut().enumerate() {
        if let Some(slot) = wanted.iter().position(|w| *w == Some(index)) {
            out[slot] = Some(column);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::{Component, ComponentRegistry};
    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Mass(f32);
    impl Component for Mass {}

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Charge(i64);
    impl Component for Charge {}

    fn chunk(capacity: usize) -> Chunk {
        let registry = ComponentRegistry::new();
        let infos = [
            registry.info(registry.id_of::<Mass>()).unwrap(),
            registry.info(registry.id_of::<Charge>()).unwrap(),
        ];
        Chunk::new(&infos, capacity)
    }

    #[test]
    fn test_push_until_full() {
        let mut chunk = chunk(2);
        assert_eq!(chunk.push(Entity::new(0, 1)), 0);
        assert_eq!(chunk.push(Entity::new(1, 1)), 1);
        assert!(chunk.is_full());
        assert_eq!(chunk.len(), 2);
    }

    #[test]
    fn test_swap_remove_moves_last_row() {
        let mut chunk = chunk(4);
        for i in 0..3 {
            let row = chunk.push(Entity::new(i, 1));
            *chunk.column_mut(0).get_mut::<Mass>(row) = Mass(i as f32);
        }

        let moved = chunk.swap_remove(0);
        assert_eq!(moved, Some(Entity::new(2, 1)));
        assert_eq!(chunk.entities(), &[Entity::new(2, 1), Entity::new(1, 1)]);
        assert_eq!(*chunk.column(0).get::<Mass>(0), Mass(2.0));

        assert_eq!(chunk.swap_remove(1), None);
        assert_eq!(chunk.len(), 1);
    }

    #[test]
    fn test_pushed_rows_are_zeroed_after_reset() {
        let mut chunk = chunk(1);
        let row = chunk.push(Entity::new(0, 1));
        *chunk.column_mut(1).get_mut::<Charge>(row) = Charge(-9);
        chunk.reset();
        let row = chunk.push(Entity::new(1, 1));
        assert_eq!(*chunk.column(1).get::<Charge>(row), Charge(0));
    }

    #[test]
    fn test_fill_from_copies_all_columns() {
        let mut a = chunk(2);
        let mut b = chunk(2);
        let row = a.push(Entity::new(5, 1));
        *a.column_mut(0).get_mut::<Mass>(row) = Mass(1.5);
        *a.column_mut(1).get_mut::<Charge>(row) = Charge(3);
        b.push(Entity::new(6, 1));

        b.fill_from(0, &a, row);
        assert_eq!(b.entities()[0], Entity::new(5, 1));
        assert_eq!(*b.column(0).get::<Mass>(0), Mass(1.5));
        assert_eq!(*b.column(1).get::<Charge>(0), Charge(3));
    }

    #[test]
    fn test_columns_disjoint_picks_slots() {
        let mut chunk = chunk(1);
        chunk.push(Entity::new(0, 1));
        let (_, columns) = chunk.split_mut();
        let [charge, none, mass] = columns_disjoint(columns, [Some(1), None, Some(0)]);
        assert_eq!(charge.unwrap().item_size(), 8);
        assert!(none.is_none());
        assert_eq!(mass.unwrap().item_size(), 4);
    }
}
