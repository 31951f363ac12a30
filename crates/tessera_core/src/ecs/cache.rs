//! # Query Cache
//!
//! Memoizes which archetypes match an `(all, any, none)` mask triple.
//!
//! Entries are validated lazily: each remembers the structural version it
//! was computed at, and a lookup under a newer version recomputes the list
//! in place. Nothing is pushed to the cache when archetypes are created.

use std::collections::HashMap;
use std::sync::Arc;

use super::archetype::ArchetypeId;
use super::mask::ComponentMask;

/// Cache key: the archetype-resident projection of a query's masks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueryKey {
    /// Every id required.
    pub all: ComponentMask,
    /// At least one id required (ignored when empty).
    pub any: ComponentMask,
    /// No id allowed.
    pub none: ComponentMask,
}

impl QueryKey {
    /// Projects query masks onto the archetype-resident ids.
    ///
    /// Sparse-resident ids cannot narrow the archetype list; they are
    /// checked per row instead. An `any` set that names a sparse-resident
    /// id is dropped entirely, since an entity may satisfy it from a sparse
    /// set regardless of its archetype.
    #[must_use]
    pub fn project(
        all: ComponentMask,
        any: ComponentMask,
        none: ComponentMask,
        resident: ComponentMask,
    ) -> Self {
        let any = if resident.has_all(&any) { any } else { ComponentMask::EMPTY };
        Self { all: all & resident, any, none: none & resident }
    }
}

#[derive(Debug)]
struct CacheEntry {
    archetypes: Arc<[ArchetypeId]>,
    version: u64,
}

/// Versioned archetype lists per query key.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl QueryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the archetype list for `key`, recomputing it with `compute`
    /// when absent or computed under an older `version`.
    pub fn get_or_compute(
        &mut self,
        key: QueryKey,
        version: u64,
        compute: impl FnOnce(&QueryKey) -> Vec<ArchetypeId>,
    ) -> Arc<[ArchetypeId]> {
        if let Some(entry) = self.entries.get_mut(&key) {
            if entry.version == version {
                self.hits += 1;
                return Arc::clone(&entry.archetypes);
            }
            tracing::trace!(from = entry.version, to = version, "rebuilding stale query cache entry");
            entry.archetypes = compute(&key).into();
            entry.version = version;
            self.misses += 1;
            return Arc::clone(&entry.archetypes);
        }

        let archetypes: Arc<[ArchetypeId]> = compute(&key).into();
        self.entries.insert(key, CacheEntry { archetypes: Arc::clone(&archetypes), version });
        self.misses += 1;
        archetypes
    }

    /// Lookups answered from a fresh entry.
    #[inline]
    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that had to compute.
    #[inline]
    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.misses
    }

    /// Number of cached keys.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is cached.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(all: &[u16]) -> QueryKey {
        QueryKey {
            all: ComponentMask::from_ids(all),
            any: ComponentMask::EMPTY,
            none: ComponentMask::EMPTY,
        }
    }

    #[test]
    fn test_hit_on_same_version() {
        let mut cache = QueryCache::new();
        let first = cache.get_or_compute(key(&[1]), 0, |_| vec![ArchetypeId::new(3)]);
        let second = cache.get_or_compute(key(&[1]), 0, |_| unreachable!("fresh entry"));
        assert_eq!(&*first, &*second);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
    }

    #[test]
    fn test_stale_entry_is_recomputed_in_place() {
        let mut cache = QueryCache::new();
        cache.get_or_compute(key(&[1]), 0, |_| vec![ArchetypeId::new(1)]);
        let fresh = cache.get_or_compute(key(&[1]), 1, |_| {
            vec![ArchetypeId::new(1), ArchetypeId::new(2)]
        });
        assert_eq!(fresh.len(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_projection_drops_sparse_ids() {
        let resident = ComponentMask::from_ids(&[1, 2]);
        let key = QueryKey::project(
            ComponentMask::from_ids(&[1, 5]),
            ComponentMask::from_ids(&[2, 6]),
            ComponentMask::from_ids(&[2, 7]),
            resident,
        );
        assert_eq!(key.all, ComponentMask::from_ids(&[1]));
        assert!(key.any.is_empty());
        assert_eq!(key.none, ComponentMask::from_ids(&[2]));
    }

    #[test]
    fn test_projection_keeps_resident_any() {
        let resident = ComponentMask::from_ids(&[1, 2]);
        let any = ComponentMask::from_ids(&[1, 2]);
        let key = QueryKey::project(ComponentMask::EMPTY, any, ComponentMask::EMPTY, resident);
        assert_eq!(key.any, any);
    }
}
