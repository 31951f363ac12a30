//! # Archetype Storage
//!
//! Entities with the same archetype-resident component set are stored
//! together, one column per component, split into fixed-capacity chunks.
//!
//! ```text
//! Archetype (Position + Velocity), chunk capacity 4:
//!
//! chunk 0: entities [e0 e1 e2 e3]   Position [P0 P1 P2 P3]   Velocity [V0 V1 V2 V3]
//! chunk 1: entities [e4 e5]         Position [P4 P5]         Velocity [V4 V5]
//! ```
//!
//! Every chunk except the last is full. Removal fills the hole with the
//! archetype's very last row, so iteration stays linear over dense rows.

use std::collections::HashMap;

use super::chunk::Chunk;
use super::component::{ComponentId, ComponentInfo};
use super::entity::Entity;
use super::mask::ComponentMask;
use super::storage::Column;
use crate::memory::{Pool, PoolStats};

/// Index of an archetype inside its world's graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    /// The archetype with no archetype-resident components. Always exists.
    pub const EMPTY: Self = Self(0);

    #[inline]
    pub(crate) const fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Position in the graph's archetype list.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

// ============================================================================
// ARCHETYPE
// ============================================================================

/// A pool of chunks sharing one component mask.
#[derive(Debug)]
pub struct Archetype {
    id: ArchetypeId,
    mask: ComponentMask,
    /// Component ids in ascending order; defines column order.
    components: Vec<ComponentId>,
    infos: Vec<ComponentInfo>,
    chunks: Vec<Chunk>,
    chunk_capacity: usize,
    len: usize,
    pool: Pool<Chunk>,
    add_edges: HashMap<ComponentId, ArchetypeId>,
    remove_edges: HashMap<ComponentId, ArchetypeId>,
}

impl Archetype {
    /// Creates an empty archetype. `infos` must be sorted by id and match
    /// `mask` exactly.
    pub(crate) fn new(
        id: ArchetypeId,
        mask: ComponentMask,
        infos: Vec<ComponentInfo>,
        chunk_capacity: usize,
        pool_limit: usize,
    ) -> Self {
        debug_assert!(infos.windows(2).all(|w| w[0].id < w[1].id));
        debug_assert_eq!(infos.len(), mask.pop_count());
        Self {
            id,
            mask,
            components: infos.iter().map(|info| info.id).collect(),
            infos,
            chunks: Vec::new(),
            chunk_capacity,
            len: 0,
            pool: Pool::new(pool_limit),
            add_edges: HashMap::new(),
            remove_edges: HashMap::new(),
        }
    }

    /// This archetype's id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ArchetypeId {
        self.id
    }

    /// The component mask that keys this archetype.
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> &ComponentMask {
        &self.mask
    }

    /// Component ids in column order.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    /// Number of entities stored.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// `true` if no entity is stored.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of allocated chunks.
    #[inline]
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// All chunks in fill order.
    #[inline]
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// All chunks, mutably.
    #[inline]
    pub fn chunks_mut(&mut self) -> &mut [Chunk] {
        &mut self.chunks
    }

    /// Chunk at `index`.
    #[inline]
    #[must_use]
    pub fn chunk(&self, index: usize) -> &Chunk {
        &self.chunks[index]
    }

    /// Mutable chunk at `index`.
    #[inline]
    pub fn chunk_mut(&mut self, index: usize) -> &mut Chunk {
        &mut self.chunks[index]
    }

    /// Column index of `component`, if this archetype stores it.
    #[inline]
    #[must_use]
    pub fn column_index(&self, component: ComponentId) -> Option<usize> {
        self.mask.has(component).then(|| self.mask.rank(component))
    }

    /// Column holding `component` in the given chunk.
    #[must_use]
    pub fn column(&self, chunk: usize, component: ComponentId) -> Option<&Column> {
        let index = self.column_index(component)?;
        Some(self.chunks[chunk].column(index))
    }

    /// Position of the archetype's last row.
    #[must_use]
    pub fn last_row(&self) -> Option<(usize, usize)> {
        let chunk = self.chunks.len().checked_sub(1)?;
        let row = self.chunks[chunk].len().checked_sub(1)?;
        Some((chunk, row))
    }

    /// Appends `entity` in a zeroed row.
    ///
    /// # Returns
    ///
    /// `(chunk, row)` of the new row.
    pub fn add(&mut self, entity: Entity) -> (usize, usize) {
        if self.chunks.last().map_or(true, Chunk::is_full) {
            let chunk = match self.pool.acquire() {
                Some(chunk) => {
                    tracing::debug!(archetype = self.id.0, "reusing pooled chunk");
                    chunk
                }
                None => Chunk::new(&self.infos, self.chunk_capacity),
            };
            self.chunks.push(chunk);
        }
        let chunk = self.chunks.len() - 1;
        let row = self.chunks[chunk].push(entity);
        self.len += 1;
        (chunk, row)
    }

    /// Swap-removes the row at `(chunk, row)`.
    ///
    /// The archetype's last row is moved into the hole, possibly across
    /// chunks.
    ///
    /// # Returns
    ///
    /// The entity now stored at `(chunk, row)`, which the caller must
    /// re-index, or `None` if the removed row was the last one.
    ///
    /// # Panics
    ///
    /// Panics if the position is not occupied.
    pub fn remove(&mut self, chunk: usize, row: usize) -> Option<Entity> {
        assert!(row < self.chunks[chunk].len(), "row {row} of chunk {chunk} is not occupied");
        let last_chunk = self.chunks.len() - 1;
        let moved = if chunk == last_chunk {
            self.chunks[chunk].swap_remove(row)
        } else {
            let (head, tail) = self.chunks.split_at_mut(last_chunk);
            let last = &mut tail[0];
            let last_row = last.len() - 1;
            head[chunk].fill_from(row, last, last_row);
            last.pop();
            Some(head[chunk].entities()[row])
        };
        self.len -= 1;
        self.release_trailing_chunk();
        moved
    }

    fn release_trailing_chunk(&mut self) {
        if self.chunks.len() < 2 || !self.chunks.last().is_some_and(Chunk::is_empty) {
            return;
        }
        if let Some(mut chunk) = self.chunks.pop() {
            chunk.reset();
            if self.pool.release(chunk) {
                tracing::debug!(archetype = self.id.0, pooled = self.pool.len(), "released chunk to pool");
            }
        }
    }

    /// Archetype reached by adding `component`, if the edge is known.
    #[inline]
    #[must_use]
    pub fn add_edge(&self, component: ComponentId) -> Option<ArchetypeId> {
        self.add_edges.get(&component).copied()
    }

    /// Archetype reached by removing `component`, if the edge is known.
    #[inline]
    #[must_use]
    pub fn remove_edge(&self, component: ComponentId) -> Option<ArchetypeId> {
        self.remove_edges.get(&component).copied()
    }

    pub(crate) fn set_add_edge(&mut self, component: ComponentId, to: ArchetypeId) {
        self.add_edges.insert(component, to);
    }

    pub(crate) fn set_remove_edge(&mut self, component: ComponentId, to: ArchetypeId) {
        self.remove_edges.insert(component, to);
    }

    /// Chunk pool counters.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

/// Moves the row at `(src_chunk, src_row)` of `src` into a new row of
/// `dst`, copying every component both archetypes store. Components only
/// `dst` stores are left zeroed.
///
/// # Returns
///
/// The new `(chunk, row)` in `dst` and the entity displaced in `src` by the
/// swap-removal.
pub(crate) fn move_row(
    src: &mut Archetype,
    src_chunk: usize,
    src_row: usize,
    dst: &mut Archetype,
) -> ((usize, usize), Option<Entity>) {
    let entity = src.chunks[src_chunk].entities()[src_row];
    let (chunk, row) = dst.add(entity);
    for (dst_column, &component) in dst.components.iter().enumerate() {
        if let Some(src_column) = src.column_index(component) {
            let from = src.chunks[src_chunk].column(src_column);
            dst.chunks[chunk].column_mut(dst_column).copy_row_from(row, from, src_row);
        }
    }
    let moved = src.remove(src_chunk, src_row);
    ((chunk, row), moved)
}
