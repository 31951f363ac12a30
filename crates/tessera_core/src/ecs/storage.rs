//! # Column Storage
//!
//! Type-erased, aligned byte columns shared by archetype chunks and sparse
//! sets. A column knows only the size and alignment of its items; typed
//! views are produced on demand and checked against that layout.

// SAFETY: This module owns the raw allocations behind every column.
// Unsafe is confined to allocation, release and the byte view; every other
// accessor goes through bounds-checked slices.
#![allow(unsafe_code)]
//!
//! ## Layout
//!
//! ```text
//! | row 0 | row 1 | row 2 | ... | row capacity-1 |
//!   item_size bytes each, base pointer aligned to the item alignment
//! ```
//!
//! Fresh memory is zeroed, so every row holds a valid bit pattern for any
//! `Pod` component even before it is written.

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::ops::Range;
use std::ptr::NonNull;

use bytemuck::Pod;

/// An owned, aligned buffer of `capacity` fixed-size rows.
pub struct Column {
    /// Base of the allocation (dangling when nothing is allocated).
    storage: NonNull<u8>,
    /// Size of one row in bytes.
    item_size: usize,
    /// Alignment of the allocation.
    align: usize,
    /// Number of rows the allocation holds.
    capacity: usize,
}

impl Column {
    /// Creates a zeroed column for `capacity` items of the given layout.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two or the byte size overflows.
    #[must_use]
    pub fn new(item_size: usize, align: usize, capacity: usize) -> Self {
        assert!(align.is_power_of_two(), "column alignment must be a power of two");
        let storage = match Self::layout(item_size, align, capacity) {
            Some(layout) => Self::allocate(layout),
            None => NonNull::dangling(),
        };
        Self { storage, item_size, align, capacity }
    }

    fn layout(item_size: usize, align: usize, capacity: usize) -> Option<Layout> {
        let bytes = item_size.checked_mul(capacity).expect("column size overflow");
        if bytes == 0 {
            return None;
        }
        Some(Layout::from_size_align(bytes, align).expect("Invalid column layout"))
    }

    fn allocate(layout: Layout) -> NonNull<u8> {
        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        NonNull::new(ptr).unwrap_or_else(|| handle_alloc_error(layout))
    }

    /// Size of one row in bytes.
    #[inline]
    #[must_use]
    pub const fn item_size(&self) -> usize {
        self.item_size
    }

    /// Alignment of the rows.
    #[inline]
    #[must_use]
    pub const fn align(&self) -> usize {
        self.align
    }

    /// Number of rows the column can hold.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grows the column to hold at least `min_capacity` rows, preserving
    /// existing contents. New rows are zeroed.
    pub fn reserve(&mut self, min_capacity: usize) {
        if min_capacity <= self.capacity {
            return;
        }
        let new_capacity = min_capacity.max(self.capacity * 2).max(8);
        let mut grown = Self::new(self.item_size, self.align, new_capacity);
        let used = self.capacity * self.item_size;
        grown.bytes_mut()[..used].copy_from_slice(self.bytes());
        *self = grown;
    }

    /// The whole allocation as bytes.
    #[inline]
    fn bytes(&self) -> &[u8] {
        // SAFETY: `storage` points to `capacity * item_size` initialized
        // (zeroed or written) bytes, or is dangling with a zero length.
        unsafe { std::slice::from_raw_parts(self.storage.as_ptr(), self.capacity * self.item_size) }
    }

    /// The whole allocation as mutable bytes.
    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as in `bytes`, and `&mut self` guarantees exclusivity.
        unsafe {
            std::slice::from_raw_parts_mut(self.storage.as_ptr(), self.capacity * self.item_size)
        }
    }

    #[inline]
    #[track_caller]
    fn span(&self, row: usize) -> Range<usize> {
        assert!(row < self.capacity, "row {row} out of bounds (capacity {})", self.capacity);
        row * self.item_size..(row + 1) * self.item_size
    }

    /// Bytes of one row.
    ///
    /// # Panics
    ///
    /// Panics if `row >= capacity`.
    #[inline]
    #[must_use]
    #[track_caller]
    pub fn row(&self, row: usize) -> &[u8] {
        let span = self.span(row);
        &self.bytes()[span]
    }

    /// Mutable bytes of one row.
    ///
    /// # Panics
    ///
    /// Panics if `row >= capacity`.
    #[inline]
    #[track_caller]
    pub fn row_mut(&mut self, row: usize) -> &mut [u8] {
        let span = self.span(row);
        &mut self.bytes_mut()[span]
    }

    /// Overwrites one row.
    ///
    /// # Panics
    ///
    /// Panics if `row >= capacity` or `bytes` is not exactly one row long.
    #[inline]
    #[track_caller]
    pub fn write_row(&mut self, row: usize, bytes: &[u8]) {
        self.row_mut(row).copy_from_slice(bytes);
    }

    /// Resets one row to zero.
    #[inline]
    pub fn zero_row(&mut self, row: usize) {
        self.row_mut(row).fill(0);
    }

    /// Copies row `src` over row `dst` inside this column.
    ///
    /// This is the fill step of a swap-removal.
    #[inline]
    pub fn copy_row_within(&mut self, src: usize, dst: usize) {
        if src == dst {
            return;
        }
        let from = self.span(src);
        let to = self.span(dst).start;
        self.bytes_mut().copy_within(from, to);
    }

    /// Copies row `src_row` of another column with the same layout into
    /// row `dst_row` of this one.
    #[inline]
    #[track_caller]
    pub fn copy_row_from(&mut self, dst_row: usize, src: &Column, src_row: usize) {
        debug_assert_eq!(self.item_size, src.item_size, "column layout mismatch");
        self.row_mut(dst_row).copy_from_slice(src.row(src_row));
    }

    #[inline]
    #[track_caller]
    fn check_type<T: Pod>(&self, len: usize) {
        assert!(
            std::mem::size_of::<T>() == self.item_size && std::mem::align_of::<T>() <= self.align,
            "column holds {}-byte items, not {}",
            self.item_size,
            std::any::type_name::<T>()
        );
        assert!(len <= self.capacity, "view of {len} rows exceeds capacity {}", self.capacity);
    }

    /// Typed view of the first `len` rows.
    ///
    /// # Panics
    ///
    /// Panics if `T` does not match the column layout or `len > capacity`.
    #[must_use]
    #[track_caller]
    pub fn as_slice<T: Pod>(&self, len: usize) -> &[T] {
        self.check_type::<T>(len);
        if len == 0 {
            return &[];
        }
        if self.item_size == 0 {
            // SAFETY: zero-sized values need no backing memory; a dangling,
            // aligned pointer is a valid base for any length.
            return unsafe { std::slice::from_raw_parts(NonNull::<T>::dangling().as_ptr(), len) };
        }
        bytemuck::cast_slice(&self.bytes()[..len * self.item_size])
    }

    /// Mutable typed view of the first `len` rows.
    ///
    /// # Panics
    ///
    /// Panics if `T` does not match the column layout or `len > capacity`.
    #[track_caller]
    pub fn as_mut_slice<T: Pod>(&mut self, len: usize) -> &mut [T] {
        self.check_type::<T>(len);
        if len == 0 {
            return &mut [];
        }
        if self.item_size == 0 {
            // SAFETY: see `as_slice`.
            return unsafe {
                std::slice::from_raw_parts_mut(NonNull::<T>::dangling().as_ptr(), len)
            };
        }
        let bytes = len * self.item_size;
        bytemuck::cast_slice_mut(&mut self.bytes_mut()[..bytes])
    }

    /// Typed reference to one row.
    #[inline]
    #[must_use]
    #[track_caller]
    pub fn get<T: Pod>(&self, row: usize) -> &T {
        &self.as_slice::<T>(row + 1)[row]
    }

    /// Mutable typed reference to one row.
    #[inline]
    #[track_caller]
    pub fn get_mut<T: Pod>(&mut self, row: usize) -> &mut T {
        &mut self.as_mut_slice::<T>(row + 1)[row]
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        if let Some(layout) = Self::layout(self.item_size, self.align, self.capacity) {
            // SAFETY: the allocation was made with exactly this layout.
            unsafe { dealloc(self.storage.as_ptr(), layout) };
        }
    }
}

// SAFETY: Column owns its allocation exclusively; shared access only hands
// out shared byte views.
unsafe impl Send for Column {}
// SAFETY: `&Column` exposes no interior mutability.
unsafe impl Sync for Column {}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("item_size", &self.item_size)
            .field("align", &self.align)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_starts_zeroed() {
        let column = Column::new(8, 8, 4);
        assert!(column.as_slice::<u64>(4).iter().all(|&v| v == 0));
    }

    #[test]
    fn test_write_and_read_rows() {
        let mut column = Column::new(4, 4, 3);
        column.write_row(1, &7u32.to_ne_bytes());
        assert_eq!(*column.get::<u32>(1), 7);
        *column.get_mut::<u32>(2) = 9;
        assert_eq!(column.as_slice::<u32>(3), &[0, 7, 9]);
    }

    #[test]
    fn test_copy_row_within_fills_hole() {
        let mut column = Column::new(4, 4, 3);
        column.as_mut_slice::<u32>(3).copy_from_slice(&[1, 2, 3]);
        column.copy_row_within(2, 0);
        assert_eq!(column.as_slice::<u32>(3), &[3, 2, 3]);
    }

    #[test]
    fn test_copy_row_between_columns() {
        let mut a = Column::new(2, 2, 2);
        let mut b = Column::new(2, 2, 2);
        *a.get_mut::<u16>(1) = 0xBEEF;
        b.copy_row_from(0, &a, 1);
        assert_eq!(*b.get::<u16>(0), 0xBEEF);
    }

    #[test]
    fn test_reserve_preserves_contents() {
        let mut column = Column::new(4, 4, 2);
        column.as_mut_slice::<u32>(2).copy_from_slice(&[5, 6]);
        column.reserve(100);
        assert!(column.capacity() >= 100);
        assert_eq!(&column.as_slice::<u32>(3)[..], &[5, 6, 0]);
    }

    #[test]
    fn test_zero_sized_column() {
        let mut column = Column::new(0, 1, 16);
        assert_eq!(column.as_slice::<()>(16).len(), 16);
        assert_eq!(column.as_mut_slice::<()>(3).len(), 3);
        assert!(column.row(5).is_empty());
    }

    #[test]
    #[should_panic(expected = "not")]
    fn test_type_mismatch_panics() {
        let column = Column::new(4, 4, 1);
        let _ = column.as_slice::<u64>(1);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_row_out_of_bounds_panics() {
        let column = Column::new(4, 4, 1);
        let _ = column.row(1);
    }
}
