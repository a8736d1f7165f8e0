use crate::binning::MAX_COORDINATE;

/// Linear index window width is `1 << LIDX_SHIFT` bases.
pub const LIDX_SHIFT: u32 = 14;

/// Number of windows needed to cover every addressable coordinate.
pub const MAX_WINDOWS: usize = (MAX_COORDINATE >> LIDX_SHIFT) as usize;

/// Per-sequence lower bounds on the stream offset worth seeking to for a query
/// starting in each 16 kb window.
///
/// A zero slot means "unset" while building; [`LinearIndex::fill_gaps`] resolves
/// those before the index is queried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinearIndex {
    offsets: Vec<u64>,
}

#[inline]
fn window(pos: i64) -> usize {
    ((pos.max(0) >> LIDX_SHIFT) as usize).min(MAX_WINDOWS - 1)
}

impl LinearIndex {
    pub fn new() -> Self {
        LinearIndex::default()
    }

    pub fn from_offsets(offsets: Vec<u64>) -> Self {
        LinearIndex { offsets }
    }

    /// Note that a record spanning `[begin, end)` starts at `stream_offset`.
    pub fn record_offset(&mut self, begin: i64, end: i64, stream_offset: u64) {
        let first = window(begin);
        let last = window(end - 1).max(first);
        if self.offsets.len() <= last {
            self.offsets.resize(last + 1, 0);
        }
        for slot in &mut self.offsets[first..=last] {
            if *slot == 0 || stream_offset < *slot {
                *slot = stream_offset;
            }
        }
    }

    /// Smallest offset that can hold a record overlapping `query_begin` or later.
    pub fn minimum_offset(&self, query_begin: i64) -> u64 {
        match self.offsets.get(window(query_begin)) {
            Some(&offset) => offset,
            None => self.offsets.last().copied().unwrap_or(0),
        }
    }

    /// Forward-fill unset slots from the nearest preceding slot. Slot 0 may stay 0.
    pub fn fill_gaps(&mut self) {
        for i in 1..self.offsets.len() {
            if self.offsets[i] == 0 {
                self.offsets[i] = self.offsets[i - 1];
            }
        }
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
