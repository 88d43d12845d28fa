//! Heap references
//!
//! A [`GcRef`] names a heap block plus a byte offset into its payload. The
//! offset is zero for standalone objects and arrays; element pointers into an
//! inline struct array carry the element's start offset.
//!
//! # Slot Encoding
//!
//! ```text
//! null:      0x0000_0000_0000_0000
//! heap ref:  0bbb_bbbb_oooo_oooo     b = block id (non-zero, < 2^31), o = offset
//! code ptr:  1000_0000_ffff_ffff     f = function index (see value.rs)
//! ```

use std::fmt;
use std::num::NonZeroU32;

const BLOCK_SHIFT: u32 = 32;
const OFFSET_MASK: u64 = 0xFFFF_FFFF;
/// Largest block id the slot encoding can hold
pub(crate) const MAX_BLOCK: u32 = (1 << 31) - 1;
/// Largest payload offset the slot encoding can hold
pub(crate) const MAX_OFFSET: usize = u32::MAX as usize;

/// Reference to a heap block (optionally into its payload)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GcRef {
    block: NonZeroU32,
    offset: u32,
}

impl GcRef {
    pub(crate) fn new(block: NonZeroU32) -> Self {
        debug_assert!(block.get() <= MAX_BLOCK, "block id exhausts the slot encoding");
        Self { block, offset: 0 }
    }

    /// Block id
    #[inline]
    pub fn block(&self) -> u32 {
        self.block.get()
    }

    /// Byte offset into the block payload
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset as usize
    }

    /// Same block, different payload offset
    #[inline]
    pub fn with_offset(&self, offset: usize) -> Self {
        debug_assert!(offset <= MAX_OFFSET, "payload offset overflows the slot encoding");
        Self {
            block: self.block,
            offset: offset as u32,
        }
    }

    /// Encode into an 8-byte pointer slot
    #[inline]
    pub fn to_bits(&self) -> u64 {
        (u64::from(self.block.get()) << BLOCK_SHIFT) | u64::from(self.offset)
    }

    /// Decode a non-null heap pointer slot
    ///
    /// Returns `None` for null and for bit patterns outside the heap range
    /// (code pointers).
    #[inline]
    pub fn from_bits(bits: u64) -> Option<Self> {
        let block = (bits >> BLOCK_SHIFT) as u32;
        if block > MAX_BLOCK {
            return None;
        }
        NonZeroU32::new(block).map(|block| Self {
            block,
            offset: (bits & OFFSET_MASK) as u32,
        })
    }
}

impl fmt::Debug for GcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GcRef({}:{})", self.block, self.offset)
    }
}

impl fmt::Display for GcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.offset)
    }
}
