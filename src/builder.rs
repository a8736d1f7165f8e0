//! Single-pass index construction over sorted records.

use crate::bin_index::BinIndex;
use crate::binning::MAX_COORDINATE;
use crate::chunk::Chunk;
use crate::config::TabixConfig;
use crate::error::{Result, TabixError};
use crate::index::TabixIndex;
use crate::interval::{parse_record_span, Interval};
use crate::linear_index::LinearIndex;
use crate::stream::{VirtualLineReader, VirtualWriter};
use log::{debug, info, warn};
use std::io;
use std::mem;

/// What happened to one line handed to the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Indexed,
    /// Header, comment or blank line; passed through but not indexed.
    Header,
    /// Coordinates could not be interpreted; logged and left out of the index.
    Skipped,
}

/// Builds a [`TabixIndex`] from records sorted by (sequence, begin).
///
/// Records of one sequence accumulate into a private bin/linear index pair that
/// is finalized and installed as soon as the next sequence starts.
#[derive(Debug)]
pub struct IndexBuilder {
    index: TabixIndex,
    current: Option<u32>,
    bins: BinIndex,
    linear: LinearIndex,
    last_begin: i64,
    lineno: u64,
    indexed: u64,
    skipped: u64,
}

impl IndexBuilder {
    pub fn new(config: TabixConfig) -> Self {
        IndexBuilder {
            index: TabixIndex::new(config),
            current: None,
            bins: BinIndex::new(),
            linear: LinearIndex::new(),
            last_begin: 0,
            lineno: 0,
            indexed: 0,
            skipped: 0,
        }
    }

    pub fn config(&self) -> &TabixConfig {
        self.index.config()
    }

    /// Whether the next line, with this content, belongs to the header.
    pub fn is_header(&self, line: &str) -> bool {
        let config = self.index.config();
        self.lineno < config.lines_to_skip.max(0) as u64 || config.is_comment(line)
    }

    /// Feed one line together with the virtual offsets of its first byte and of
    /// the byte after its terminator.
    pub fn add_line(&mut self, line: &str, begin_offset: u64, end_offset: u64) -> Result<LineOutcome> {
        if self.is_header(line) || line.is_empty() {
            self.add_header_line();
            return Ok(LineOutcome::Header);
        }
        let columns: Vec<&str> = line.split('\t').collect();
        self.add_record(&columns, begin_offset, end_offset)
    }

    /// Account for a line that is not indexed.
    pub fn add_header_line(&mut self) {
        self.lineno += 1;
    }

    /// Feed one already-split data record.
    pub fn add_record(&mut self, columns: &[&str], begin_offset: u64, end_offset: u64) -> Result<LineOutcome> {
        self.lineno += 1;
        let lineno = self.lineno;
        if begin_offset >= end_offset {
            return Err(TabixError::MalformedOffset {
                line: lineno,
                begin: begin_offset,
                end: end_offset,
            });
        }

        let span = match parse_record_span(columns, self.index.config()) {
            Ok(span) if span.begin >= MAX_COORDINATE => {
                warn!(
                    "Skipping line {}: begin {} is beyond the indexable range",
                    lineno,
                    span.begin.saturating_add(1)
                );
                self.skipped += 1;
                return Ok(LineOutcome::Skipped);
            }
            Ok(span) => span,
            Err(e) if e.is_recoverable() => {
                warn!("Skipping {}", e.at_line(lineno));
                self.skipped += 1;
                return Ok(LineOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        let sequence_id = self.index.get_or_create_sequence_id(span.name);
        let interval = Interval::new(sequence_id, span.begin, span.end);

        match self.current {
            Some(current) if sequence_id < current => {
                return Err(TabixError::OutOfOrder {
                    line: lineno,
                    message: format!(
                        "sequence '{}' reappears after '{}'; is the file sorted?",
                        span.name,
                        self.index.sequence_name(current).unwrap_or("?")
                    ),
                });
            }
            Some(current) if sequence_id == current => {
                if interval.begin < self.last_begin {
                    return Err(TabixError::OutOfOrder {
                        line: lineno,
                        message: format!(
                            "position {} on '{}' comes after {}",
                            interval.begin + 1,
                            span.name,
                            self.last_begin + 1
                        ),
                    });
                }
            }
            _ => {
                self.finish_sequence();
                self.current = Some(sequence_id);
            }
        }

        self.bins
            .insert(interval.bin(), Chunk::new(begin_offset, end_offset));
        self.linear
            .record_offset(interval.begin, interval.end, begin_offset);
        self.last_begin = interval.begin;
        self.indexed += 1;
        Ok(LineOutcome::Indexed)
    }

    /// Finalize the accumulating sequence, if any, and install it in the index.
    fn finish_sequence(&mut self) {
        let Some(id) = self.current.take() else {
            return;
        };
        let mut bins = mem::take(&mut self.bins);
        let mut linear = mem::take(&mut self.linear);
        bins.finalize();
        linear.fill_gaps();
        debug!(
            "Finished '{}': {} bins, {} linear slots",
            self.index.sequence_name(id).unwrap_or("?"),
            bins.len(),
            linear.len()
        );
        self.index.install(id, bins, linear);
        self.last_begin = 0;
    }

    /// Point chunks ending at `from` at `to` instead; both name the same byte.
    fn relocate_end(&mut self, from: u64, to: u64) {
        if from != to {
            self.bins.replace_end(from, to);
        }
    }

    /// Records indexed so far.
    pub fn records_indexed(&self) -> u64 {
        self.indexed
    }

    /// Records skipped as malformed so far.
    pub fn records_skipped(&self) -> u64 {
        self.skipped
    }

    pub fn finish(mut self) -> TabixIndex {
        self.finish_sequence();
        info!(
            "Indexed {} records on {} sequences ({} skipped)",
            self.indexed,
            self.index.num_sequences(),
            self.skipped
        );
        self.index
    }
}

/// Index an existing block-compressed data stream from its current position.
pub fn index_bgzf<R: VirtualLineReader>(reader: &mut R, config: TabixConfig) -> Result<TabixIndex> {
    let mut builder = IndexBuilder::new(config);
    let mut line = String::new();
    loop {
        let begin = reader.virtual_offset();
        if reader.next_line(&mut line)? == 0 {
            break;
        }
        let end = reader.virtual_offset();
        builder.add_line(&line, begin, end)?;
    }
    Ok(builder.finish())
}

/// Compress plain-text `lines` into `writer` while indexing them.
///
/// Header lines are written through but not indexed. The pending block is
/// flushed at the end so the last record's end offset names the following
/// block, the way a reader reports it. The caller finishes the writer afterwards.
pub fn compress_and_index<I, W>(lines: I, writer: &mut W, config: TabixConfig) -> Result<TabixIndex>
where
    I: IntoIterator<Item = io::Result<String>>,
    W: VirtualWriter,
{
    let mut builder = IndexBuilder::new(config);
    for line in lines {
        let line = line?;
        let begin = writer.virtual_offset();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        let end = writer.virtual_offset();
        builder.add_line(&line, begin, end)?;
    }
    let unflushed = writer.virtual_offset();
    writer.flush()?;
    builder.relocate_end(unflushed, writer.virtual_offset());
    Ok(builder.finish())
}
