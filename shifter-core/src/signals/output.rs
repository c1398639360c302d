//! Ignition-limit flag sinks.
//!
//! The controller owns two bits of a flags byte that an external ignition
//! limiter also reads and writes. Sinks only ever OR the bits in or AND-NOT
//! them out so the remaining bits of the word are left to their owner.

use portable_atomic::{AtomicU8, Ordering};

/// Bits the external limiter treats as "cut ignition now".
pub const LIMIT_ENABLE_MASK: u8 = 0b0000_0011;

/// Returns `true` when any of the controller's limit bits are set in `word`.
#[must_use]
pub const fn limit_asserted(word: u8) -> bool {
    word & LIMIT_ENABLE_MASK != 0
}

/// Destination for the ignition-limit enable bits.
pub trait IgnitionLimitFlags {
    /// Sets every bit in `mask`, leaving other bits untouched.
    fn set_bits(&mut self, mask: u8);

    /// Clears every bit in `mask`, leaving other bits untouched.
    fn clear_bits(&mut self, mask: u8);
}

/// Plain flags byte owned by a single context.
impl IgnitionLimitFlags for u8 {
    fn set_bits(&mut self, mask: u8) {
        *self |= mask;
    }

    fn clear_bits(&mut self, mask: u8) {
        *self &= !mask;
    }
}

/// Flags byte shared with another writer (e.g. an interrupt handler).
///
/// Updates use single atomic read-modify-write operations, so a concurrent
/// writer setting unrelated bits is never overwritten.
#[derive(Copy, Clone, Debug)]
pub struct AtomicIgnitionFlags<'a> {
    word: &'a AtomicU8,
}

impl<'a> AtomicIgnitionFlags<'a> {
    #[must_use]
    pub const fn new(word: &'a AtomicU8) -> Self {
        Self { word }
    }

    /// Current value of the whole flags byte.
    #[must_use]
    pub fn load(&self) -> u8 {
        self.word.load(Ordering::Relaxed)
    }
}

impl IgnitionLimitFlags for AtomicIgnitionFlags<'_> {
    fn set_bits(&mut self, mask: u8) {
        self.word.fetch_or(mask, Ordering::Relaxed);
    }

    fn clear_bits(&mut self, mask: u8) {
        self.word.fetch_and(!mask, Ordering::Relaxed);
    }
}
