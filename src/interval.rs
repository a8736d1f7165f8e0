use crate::binning::interval_to_bin;
use crate::config::{Preset, TabixConfig};
use crate::error::{Result, TabixError};

/// A 0-based half-open span on one indexed sequence, with its bin cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub sequence_id: u32,
    pub begin: i64,
    pub end: i64,
    bin: u32,
}

impl Interval {
    pub fn new(sequence_id: u32, begin: i64, end: i64) -> Self {
        Interval {
            sequence_id,
            begin,
            end,
            bin: interval_to_bin(begin, end),
        }
    }

    pub fn bin(&self) -> u32 {
        self.bin
    }

    /// Whether the record overlaps `[begin, end)` on `sequence_id`.
    pub fn overlaps(&self, sequence_id: u32, begin: i64, end: i64) -> bool {
        self.sequence_id == sequence_id && self.begin < end && self.end > begin
    }
}

/// Sequence name plus coordinates pulled out of one record's columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan<'a> {
    pub name: &'a str,
    pub begin: i64,
    pub end: i64,
}

fn column<'a>(columns: &[&'a str], col: i32) -> Result<&'a str> {
    usize::try_from(col - 1)
        .ok()
        .and_then(|i| columns.get(i).copied())
        .ok_or_else(|| {
            TabixError::malformed(format!(
                "expected at least {col} columns, found {}",
                columns.len()
            ))
        })
}

fn parse_coordinate(field: &str, what: &str) -> Result<i64> {
    field
        .trim()
        .parse::<i64>()
        .map_err(|e| TabixError::malformed(format!("invalid {what} '{field}': {e}")))
}

/// Reference bases consumed by a CIGAR string (`M`, `D`, `N`, `=` and `X`).
pub fn cigar_reference_length(cigar: &str) -> Result<i64> {
    if cigar == "*" {
        return Ok(0);
    }
    let mut total = 0i64;
    let mut len_start = 0;
    for (i, op) in cigar.char_indices() {
        if op.is_ascii_digit() {
            continue;
        }
        let len = &cigar[len_start..i];
        if len.is_empty() {
            return Err(TabixError::malformed(format!("invalid CIGAR '{cigar}'")));
        }
        if matches!(op, 'M' | 'D' | 'N' | '=' | 'X') {
            total = total
                .checked_add(parse_coordinate(len, "CIGAR length")?)
                .ok_or_else(|| TabixError::malformed(format!("CIGAR '{cigar}' is too long")))?;
        }
        len_start = i + op.len_utf8();
    }
    if len_start != cigar.len() {
        return Err(TabixError::malformed(format!(
            "CIGAR '{cigar}' ends without an operation"
        )));
    }
    Ok(total)
}

fn overflowed(what: &str) -> TabixError {
    TabixError::malformed(format!("{what} is out of range"))
}

/// Value of an `END=` key in a semicolon-delimited INFO field.
fn info_end(info: &str) -> Option<&str> {
    info.split(';').find_map(|kv| kv.strip_prefix("END="))
}

/// Interpret a record's columns per `config`.
///
/// Coordinates come back 0-based half-open. Begin is clamped to 0 and end to at
/// least 1.
pub fn parse_record_span<'a>(columns: &[&'a str], config: &TabixConfig) -> Result<RecordSpan<'a>> {
    let name = column(columns, config.seq_col)?;
    let mut begin = parse_coordinate(column(columns, config.begin_col)?, "begin")?;
    let mut end = begin;
    if config.zero_based {
        end = end.checked_add(1).ok_or_else(|| overflowed("begin"))?;
    } else {
        begin = begin.checked_sub(1).ok_or_else(|| overflowed("begin"))?;
    }
    begin = begin.max(0);
    end = end.max(1);

    match config.preset {
        Preset::Generic => {
            if config.end_col > 0 {
                end = parse_coordinate(column(columns, config.end_col)?, "end")?;
            } else if !config.zero_based {
                end = begin.checked_add(1).ok_or_else(|| overflowed("begin"))?;
            }
        }
        Preset::Sam => {
            let consumed = cigar_reference_length(column(columns, 6)?)?;
            end = begin
                .checked_add(consumed.max(1))
                .ok_or_else(|| overflowed("alignment end"))?;
        }
        Preset::Vcf => {
            let reference = column(columns, 4)?;
            if !reference.is_empty() {
                end = i64::try_from(reference.len())
                    .ok()
                    .and_then(|len| begin.checked_add(len))
                    .ok_or_else(|| overflowed("REF end"))?;
            }
            if let Some(info) = columns.get(7) {
                if let Some(value) = info_end(info) {
                    end = parse_coordinate(value, "INFO END")?;
                }
            }
        }
    }

    if end <= begin {
        return Err(TabixError::malformed(format!(
            "end {end} does not follow begin {}",
            begin + 1
        )));
    }

    Ok(RecordSpan { name, begin, end })
}
