//! Fixed-capacity sets of hart identifiers.
//!
//! A [`HartMask`] names the harts taking part in one cross-hart request. It
//! is bounded by the platform's configured hart count at construction time,
//! so it can never describe a hart that does not exist.
//!
//! # Examples
//!
//! ```
//! use hart_mask::{HartId, HartMask};
//!
//! let mask = HartMask::all_except(4, HartId::from_raw(0));
//! assert!(!mask.contains(HartId::from_raw(0)));
//! assert_eq!(mask.iter().map(HartId::value).collect::<Vec<_>>(), [1, 2, 3]);
//! ```

#![cfg_attr(not(test), no_std)]

use core::{error::Error, fmt};

use platform_cast::CastFrom as _;

/// Maximum number of harts a mask can describe.
pub const MAX_HARTS: usize = 128;

const WORD_BITS: usize = usize::BITS as usize;
const WORDS: usize = MAX_HARTS.div_ceil(WORD_BITS);

/// Identifier of one hardware thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct HartId(usize);

impl fmt::Display for HartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl HartId {
    #[must_use]
    pub const fn from_raw(value: usize) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> usize {
        self.0
    }
}

/// A set of harts out of the first `hart_count` hart identifiers.
///
/// Membership test, insertion and removal are O(1). Passing a hart outside
/// `0..hart_count` to any method is a contract violation and panics.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HartMask {
    bits: [usize; WORDS],
    hart_count: usize,
}

impl fmt::Debug for HartMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl HartMask {
    /// Creates an empty mask for a platform with `hart_count` harts.
    ///
    /// # Panics
    ///
    /// Panics if `hart_count` is greater than [`MAX_HARTS`].
    #[must_use]
    pub fn empty(hart_count: usize) -> Self {
        assert!(
            hart_count <= MAX_HARTS,
            "hart count {hart_count} exceeds capacity {MAX_HARTS}"
        );
        Self {
            bits: [0; WORDS],
            hart_count,
        }
    }

    /// Creates a mask containing every configured hart.
    #[must_use]
    pub fn all(hart_count: usize) -> Self {
        let mut mask = Self::empty(hart_count);
        for index in 0..hart_count {
            mask.bits[index / WORD_BITS] |= 1 << (index % WORD_BITS);
        }
        mask
    }

    /// Creates a mask containing every configured hart except `hart`.
    #[must_use]
    pub fn all_except(hart_count: usize, hart: HartId) -> Self {
        let mut mask = Self::all(hart_count);
        mask.remove(hart);
        mask
    }

    /// Creates a mask containing only `hart`.
    #[must_use]
    pub fn only(hart_count: usize, hart: HartId) -> Self {
        let mut mask = Self::empty(hart_count);
        mask.insert(hart);
        mask
    }

    /// Builds a mask from the SBI `(hart_mask, hart_mask_base)` convention.
    ///
    /// A base of `usize::MAX` selects every configured hart. Otherwise bit
    /// `i` of `hart_mask` selects hart `hart_mask_base + i`.
    pub fn from_sbi(
        hart_count: usize,
        hart_mask: usize,
        hart_mask_base: usize,
    ) -> Result<Self, InvalidHartMask> {
        if hart_mask_base == usize::MAX {
            return Ok(Self::all(hart_count));
        }
        let mut mask = Self::empty(hart_count);
        for bit in 0..WORD_BITS {
            if hart_mask & (1 << bit) == 0 {
                continue;
            }
            let index = hart_mask_base
                .checked_add(bit)
                .filter(|&index| index < hart_count)
                .ok_or(InvalidHartMask {
                    hart_mask,
                    hart_mask_base,
                })?;
            mask.insert(HartId(index));
        }
        Ok(mask)
    }

    #[must_use]
    pub fn hart_count(&self) -> usize {
        self.hart_count
    }

    #[track_caller]
    fn check(&self, hart: HartId) -> (usize, usize) {
        assert!(
            hart.0 < self.hart_count,
            "hart {hart} is out of range (hart count: {})",
            self.hart_count
        );
        (hart.0 / WORD_BITS, 1 << (hart.0 % WORD_BITS))
    }

    #[must_use]
    #[track_caller]
    pub fn contains(&self, hart: HartId) -> bool {
        let (word, bit) = self.check(hart);
        self.bits[word] & bit != 0
    }

    #[track_caller]
    pub fn insert(&mut self, hart: HartId) {
        let (word, bit) = self.check(hart);
        self.bits[word] |= bit;
    }

    #[track_caller]
    pub fn remove(&mut self, hart: HartId) {
        let (word, bit) = self.check(hart);
        self.bits[word] &= !bit;
    }

    /// Returns a copy of this mask with `hart` removed.
    #[must_use]
    #[track_caller]
    pub fn without(mut self, hart: HartId) -> Self {
        self.remove(hart);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bits
            .iter()
            .map(|word| usize::cast_from(word.count_ones()))
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&word| word == 0)
    }

    /// Iterates over the harts in the mask in ascending order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            mask: self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for &'a HartMask {
    type Item = HartId;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the members of a [`HartMask`].
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    mask: &'a HartMask,
    next: usize,
}

impl Iterator for Iter<'_> {
    type Item = HartId;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.mask.hart_count {
            let hart = HartId(self.next);
            self.next += 1;
            if self.mask.contains(hart) {
                return Some(hart);
            }
        }
        None
    }
}

/// An SBI hart mask that names harts the platform does not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidHartMask {
    pub hart_mask: usize,
    pub hart_mask_base: usize,
}

impl fmt::Display for InvalidHartMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hart mask {:#x} with base {} selects a hart outside the platform",
            self.hart_mask, self.hart_mask_base
        )
    }
}

impl Error for InvalidHartMask {}
