//! Virtual offsets and chunks of the block-compressed data stream.
//!
//! A virtual offset packs the compressed block address into the high 48 bits and
//! the position inside the uncompressed block into the low 16 bits. Offsets are
//! plain `u64`, so every comparison here is unsigned.

use std::fmt;

/// Bits occupied by the within-block offset.
pub const BLOCK_OFFSET_BITS: u32 = 16;

/// Compressed block address of a virtual offset.
#[inline]
pub fn block_address(virtual_offset: u64) -> u64 {
    virtual_offset >> BLOCK_OFFSET_BITS
}

/// Uncompressed offset inside the block.
#[inline]
pub fn block_offset(virtual_offset: u64) -> u16 {
    (virtual_offset & 0xffff) as u16
}

/// Whether both offsets point into the same compressed block.
#[inline]
pub fn in_same_block(a: u64, b: u64) -> bool {
    block_address(a) == block_address(b)
}

/// Whether `b` lies in the block of `a` or in the block whose address directly follows it.
///
/// Used while accumulating chunks during a build; the stricter [`in_same_block`]
/// is used when merging at finalize and query time.
#[inline]
pub fn in_same_or_adjacent_blocks(a: u64, b: u64) -> bool {
    let block_a = block_address(a);
    let block_b = block_address(b);
    block_a == block_b || block_a.checked_add(1) == Some(block_b)
}

/// A `[begin, end)` span of virtual offsets.
///
/// Ordered by `begin`, then `end`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Chunk {
    pub begin: u64,
    pub end: u64,
}

impl Chunk {
    pub fn new(begin: u64, end: u64) -> Self {
        Chunk { begin, end }
    }

    pub fn is_valid(&self) -> bool {
        self.begin <= self.end
    }

    /// Chunk spanning from this chunk's begin to `other`'s end.
    pub fn extended_to(&self, other: &Chunk) -> Chunk {
        Chunk::new(self.begin, other.end)
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Chunk({}:{}-{}:{})",
            block_address(self.begin),
            block_offset(self.begin),
            block_address(self.end),
            block_offset(self.end)
        )
    }
}
