//! # Object Pool
//!
//! Bounded free list for objects that are expensive to build and cheap to
//! reset, such as archetype chunks.

/// A bounded pool of reusable objects.
///
/// Released objects are kept (up to `limit`) and handed out again by
/// [`acquire`](Self::acquire) instead of building new ones. The caller
/// resets an object before releasing it; the pool never inspects contents.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Each archetype owns its own pool.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: Pool<Vec<u8>> = Pool::new(4);
///
/// let buffer = pool.acquire().unwrap_or_else(|| Vec::with_capacity(1024));
/// // ... use, then clear ...
/// pool.release(buffer);
/// ```
#[derive(Debug)]
pub struct Pool<T> {
    /// Objects ready for reuse.
    free: Vec<T>,
    /// Maximum number of retained objects.
    limit: usize,
    /// Objects handed out from the free list.
    reused: u64,
    /// Released objects dropped because the pool was full.
    discarded: u64,
}

/// Counters describing pool traffic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Objects currently retained.
    pub retained: usize,
    /// Acquisitions served from the free list.
    pub reused: u64,
    /// Releases dropped at the limit.
    pub discarded: u64,
}

impl<T> Pool<T> {
    /// Creates an empty pool retaining at most `limit` objects.
    ///
    /// A limit of zero disables retention entirely.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self { free: Vec::new(), limit, reused: 0, discarded: 0 }
    }

    /// Maximum number of retained objects.
    #[inline]
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Number of objects currently retained.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.free.len()
    }

    /// `true` if nothing is retained.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Takes a retained object, if any.
    ///
    /// This is a **O(1)** operation.
    pub fn acquire(&mut self) -> Option<T> {
        let value = self.free.pop()?;
        self.reused += 1;
        Some(value)
    }

    /// Returns an object to the pool.
    ///
    /// # Returns
    ///
    /// `false` if the pool was at its limit and the object was dropped.
    pub fn release(&mut self, value: T) -> bool {
        if self.free.len() >= self.limit {
            self.discarded += 1;
            return false;
        }
        self.free.push(value);
        true
    }

    /// Drops every retained object.
    pub fn clear(&mut self) {
        self.free.clear();
    }

    /// Traffic counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats { retained: self.free.len(), reused: self.reused, discarded: self.discarded }
    }
}
