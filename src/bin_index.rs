use crate::chunk::{in_same_block, in_same_or_adjacent_blocks, Chunk};
use std::collections::BTreeMap;

/// Per-sequence map from bin number to the chunks holding that bin's records.
///
/// Bins are kept in ascending order so that serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinIndex {
    bins: BTreeMap<u32, Vec<Chunk>>,
}

impl BinIndex {
    pub fn new() -> Self {
        BinIndex::default()
    }

    /// Add a chunk to `bin`, coalescing it into the previous chunk when they
    /// sit in the same or adjacent compressed blocks.
    ///
    /// The caller guarantees `chunk.begin <= chunk.end`.
    pub fn insert(&mut self, bin: u32, chunk: Chunk) {
        debug_assert!(chunk.is_valid());
        let chunks = self.bins.entry(bin).or_default();
        match chunks.last_mut() {
            Some(last) if in_same_or_adjacent_blocks(last.end, chunk.begin) => {
                *last = last.extended_to(&chunk);
            }
            _ => chunks.push(chunk),
        }
    }

    /// Replace the chunk list for `bin` wholesale (used when loading from disk).
    pub fn set_chunks(&mut self, bin: u32, chunks: Vec<Chunk>) {
        self.bins.insert(bin, chunks);
    }

    /// Merge consecutive chunks of each bin whose boundary falls in one
    /// compressed block. Running it again is a no-op.
    pub fn finalize(&mut self) {
        for chunks in self.bins.values_mut() {
            merge_same_block(chunks);
        }
    }

    /// Rewrite every chunk end equal to `from` as `to`.
    pub(crate) fn replace_end(&mut self, from: u64, to: u64) {
        for chunk in self.bins.values_mut().flatten() {
            if chunk.end == from {
                chunk.end = to;
            }
        }
    }

    pub fn chunks(&self, bin: u32) -> Option<&[Chunk]> {
        self.bins.get(&bin).map(Vec::as_slice)
    }

    /// Bins and their chunks, ascending by bin number.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[Chunk])> + '_ {
        self.bins.iter().map(|(&bin, chunks)| (bin, chunks.as_slice()))
    }

    /// Number of non-empty bins.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

/// In-place merge of neighbours where `prev.end` and `next.begin` share a block.
pub(crate) fn merge_same_block(chunks: &mut Vec<Chunk>) {
    if chunks.len() < 2 {
        return;
    }
    let mut kept = 0;
    for i in 1..chunks.len() {
        if in_same_block(chunks[kept].end, chunks[i].begin) {
            chunks[kept] = chunks[kept].extended_to(&chunks[i]);
        } else {
            kept += 1;
            chunks[kept] = chunks[i];
        }
    }
    chunks.truncate(kept + 1);
}
