//! # Component Masks
//!
//! A fixed-width 256-bit set of component ids. Masks are the archetype key
//! and the query filter primitive, so every operation is O(1) over four
//! words and the word loops are left for the compiler to vectorize.
//!
//! ```text
//! word 0: ids   0..63     word 2: ids 128..191
//! word 1: ids  64..127    word 3: ids 192..255
//! ```

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, Not};

use super::ComponentId;
use crate::error::{CoreError, CoreResult};

/// Number of component ids a mask can hold.
pub const MASK_CAPACITY: usize = 256;

/// Number of `u64` words backing a mask.
const WORDS: usize = MASK_CAPACITY / 64;

/// Fixed-capacity bitset of component ids.
///
/// Equality and hashing cover all 256 bits. Aligned to 32 bytes so a mask
/// fits a single AVX register.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(C, align(32))]
pub struct ComponentMask {
    words: [u64; WORDS],
}

#[inline]
fn locate(id: usize) -> (usize, u64) {
    (id / 64, 1u64 << (id % 64))
}

#[inline]
#[track_caller]
fn checked(id: ComponentId) -> usize {
    let id = usize::from(id);
    assert!(
        id < MASK_CAPACITY,
        "component id {id} out of range: masks hold ids 0..{MASK_CAPACITY}"
    );
    id
}

impl ComponentMask {
    /// The empty mask.
    pub const EMPTY: Self = Self { words: [0; WORDS] };

    /// Creates an empty mask.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Builds a mask from a list of ids.
    ///
    /// # Panics
    ///
    /// Panics if any id is outside `0..256`.
    #[must_use]
    pub fn from_ids(ids: &[ComponentId]) -> Self {
        ids.iter().fold(Self::EMPTY, |mask, &id| mask.with(id))
    }

    /// Returns a copy with `id` set.
    ///
    /// # Panics
    ///
    /// Panics if `id` is outside `0..256`.
    #[inline]
    #[must_use]
    #[track_caller]
    pub fn with(mut self, id: ComponentId) -> Self {
        let (word, bit) = locate(checked(id));
        self.words[word] |= bit;
        self
    }

    /// Returns a copy with `id` cleared.
    ///
    /// # Panics
    ///
    /// Panics if `id` is outside `0..256`.
    #[inline]
    #[must_use]
    #[track_caller]
    pub fn without(mut self, id: ComponentId) -> Self {
        let (word, bit) = locate(checked(id));
        self.words[word] &= !bit;
        self
    }

    /// Checks whether `id` is set.
    ///
    /// # Panics
    ///
    /// Panics if `id` is outside `0..256`.
    #[inline]
    #[must_use]
    #[track_caller]
    pub fn has(&self, id: ComponentId) -> bool {
        let (word, bit) = locate(checked(id));
        self.words[word] & bit != 0
    }

    /// Non-panicking [`with`](Self::with) for ids of unknown provenance.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ComponentIdOutOfRange`] for ids outside `0..256`.
    pub fn try_with(self, id: usize) -> CoreResult<Self> {
        if id >= MASK_CAPACITY {
            return Err(CoreError::ComponentIdOutOfRange { id, capacity: MASK_CAPACITY });
        }
        Ok(self.with(id as ComponentId))
    }

    /// Non-panicking [`without`](Self::without).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ComponentIdOutOfRange`] for ids outside `0..256`.
    pub fn try_without(self, id: usize) -> CoreResult<Self> {
        if id >= MASK_CAPACITY {
            return Err(CoreError::ComponentIdOutOfRange { id, capacity: MASK_CAPACITY });
        }
        Ok(self.without(id as ComponentId))
    }

    /// Non-panicking [`has`](Self::has).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ComponentIdOutOfRange`] for ids outside `0..256`.
    pub fn try_has(&self, id: usize) -> CoreResult<bool> {
        if id >= MASK_CAPACITY {
            return Err(CoreError::ComponentIdOutOfRange { id, capacity: MASK_CAPACITY });
        }
        Ok(self.has(id as ComponentId))
    }

    /// `true` if every id in `other` is also in `self`.
    #[inline]
    #[must_use]
    pub fn has_all(&self, other: &Self) -> bool {
        (*self & *other) == *other
    }

    /// `true` if `self` and `other` share at least one id.
    #[inline]
    #[must_use]
    pub fn has_any(&self, other: &Self) -> bool {
        !(*self & *other).is_empty()
    }

    /// `true` if no id is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Number of ids set.
    #[inline]
    #[must_use]
    pub fn pop_count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Lowest id set, or `None` for the empty mask.
    #[must_use]
    pub fn first_set_bit(&self) -> Option<ComponentId> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, &w)| w != 0)
            .map(|(i, w)| (i * 64 + w.trailing_zeros() as usize) as ComponentId)
    }

    /// Number of ids set strictly below `id`.
    ///
    /// For an archetype this is the column index of `id`, because columns
    /// are laid out in ascending id order.
    ///
    /// # Panics
    ///
    /// Panics if `id` is outside `0..256`.
    #[inline]
    #[must_use]
    pub fn rank(&self, id: ComponentId) -> usize {
        let (word, bit) = locate(checked(id));
        let below: usize = self.words[..word].iter().map(|w| w.count_ones() as usize).sum();
        below + (self.words[word] & (bit - 1)).count_ones() as usize
    }

    /// Iterates the set ids in ascending order.
    #[must_use]
    pub fn components(&self) -> MaskIter {
        MaskIter {
            words: self.words,
            word_idx: 0,
            current_word: self.words[0],
        }
    }

    /// Collects the set ids in ascending order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<ComponentId> {
        self.components().collect()
    }

    /// Raw words, lowest ids first.
    #[inline]
    #[must_use]
    pub const fn words(&self) -> &[u64; WORDS] {
        &self.words
    }
}

/// Iterator over the ids set in a [`ComponentMask`].
///
/// Uses `trailing_zeros` to skip clear regions.
pub struct MaskIter {
    words: [u64; WORDS],
    word_idx: usize,
    current_word: u64,
}

impl Iterator for MaskIter {
    type Item = ComponentId;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1;
                return Some((self.word_idx * 64 + bit) as ComponentId);
            }

            self.word_idx += 1;
            if self.word_idx >= WORDS {
                return None;
            }
            self.current_word = self.words[self.word_idx];
        }
    }
}

impl BitAnd for ComponentMask {
    type Output = Self;

    #[inline]
    fn bitand(mut self, rhs: Self) -> Self {
        self &= rhs;
        self
    }
}

impl BitAndAssign for ComponentMask {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        for (a, b) in self.words.iter_mut().zip(rhs.words) {
            *a &= b;
        }
    }
}

impl BitOr for ComponentMask {
    type Output = Self;

    #[inline]
    fn bitor(mut self, rhs: Self) -> Self {
        self |= rhs;
        self
    }
}

impl BitOrAssign for ComponentMask {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        for (a, b) in self.words.iter_mut().zip(rhs.words) {
            *a |= b;
        }
    }
}

impl BitXor for ComponentMask {
    type Output = Self;

    #[inline]
    fn bitxor(mut self, rhs: Self) -> Self {
        for (a, b) in self.words.iter_mut().zip(rhs.words) {
            *a ^= b;
        }
        self
    }
}

impl Not for ComponentMask {
    type Output = Self;

    #[inline]
    fn not(mut self) -> Self {
        for w in &mut self.words {
            *w = !*w;
        }
        self
    }
}

impl FromIterator<ComponentId> for ComponentMask {
    fn from_iter<I: IntoIterator<Item = ComponentId>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.components()).finish()
    }
}
