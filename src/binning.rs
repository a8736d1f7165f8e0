//! UCSC-style hierarchical binning.
//!
//! Six levels cover 2^29 bases: the root bin 0 spans everything, then 8 bins of
//! 2^26, 64 of 2^23, 512 of 2^20, 4096 of 2^17 and 32768 of 2^14 bases.

/// One past the last bin of the scheme (ids 0..=37448). htslib stores per-sequence
/// metadata under this id.
pub const MAX_BIN: u32 = 37450;

/// Coordinates at or beyond this are clamped when computing overlapping bins.
pub const MAX_COORDINATE: i64 = 1 << 29;

/// (first bin id, window shift) for each level below the root, finest first.
const LEVELS: [(u32, u32); 5] = [(4681, 14), (585, 17), (73, 20), (9, 23), (1, 26)];

/// Smallest bin fully containing the half-open interval `[begin, end)`.
///
/// Positions are clamped into `[0, MAX_COORDINATE)` first.
pub fn interval_to_bin(begin: i64, end: i64) -> u32 {
    let begin = begin.clamp(0, MAX_COORDINATE - 1);
    let last = end.saturating_sub(1).clamp(begin, MAX_COORDINATE - 1);
    for (offset, shift) in LEVELS {
        if begin >> shift == last >> shift {
            return offset + (begin >> shift) as u32;
        }
    }
    0
}

/// All bins whose window intersects `[begin, end)`, in ascending order.
///
/// Returns an empty list when `begin >= end`; otherwise the root bin is always
/// first.
pub fn bins_overlapping(begin: i64, end: i64) -> Vec<u32> {
    if begin >= end {
        return Vec::new();
    }
    let begin = begin.clamp(0, MAX_COORDINATE - 1);
    let last = (end.min(MAX_COORDINATE) - 1).max(begin);
    // a single position overlaps 6 bins
    let mut bins = Vec::with_capacity(8);
    bins.push(0);
    for (offset, shift) in LEVELS.iter().rev() {
        let first = offset + (begin >> shift) as u32;
        let final_bin = offset + (last >> shift) as u32;
        bins.extend(first..=final_bin);
    }
    bins
}
