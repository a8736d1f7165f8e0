//! Region queries: choosing the chunks to scan, then scanning them.

use crate::bin_index::merge_same_block;
use crate::binning::bins_overlapping;
use crate::chunk::Chunk;
use crate::error::Result;
use crate::index::TabixIndex;
use crate::region::Region;
use crate::stream::VirtualLineReader;
use crate::tbi;
use log::{debug, warn};
use noodles::bgzf;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

/// The ordered, non-overlapping chunks that may hold records overlapping
/// `[begin, end)` on `sequence_id`. Empty for an unknown sequence or empty range.
pub fn candidate_chunks(index: &TabixIndex, sequence_id: u32, begin: i64, end: i64) -> Vec<Chunk> {
    let (Some(bins), Some(linear)) = (
        index.bin_index(sequence_id),
        index.linear_index(sequence_id),
    ) else {
        return Vec::new();
    };
    let min_offset = linear.minimum_offset(begin);

    let mut chunks: Vec<Chunk> = bins_overlapping(begin, end)
        .into_iter()
        .filter_map(|bin| bins.chunks(bin))
        .flatten()
        .filter(|chunk| chunk.end > min_offset)
        .copied()
        .collect();
    if chunks.is_empty() {
        return chunks;
    }
    chunks.sort_unstable();

    // drop chunks whose end is covered by an earlier chunk
    let mut kept: Vec<Chunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match kept.last() {
            Some(last) if chunk.end <= last.end => {}
            _ => kept.push(chunk),
        }
    }

    for i in 1..kept.len() {
        if kept[i - 1].end >= kept[i].begin {
            kept[i - 1].end = kept[i].begin;
        }
    }
    kept.retain(|chunk| chunk.begin < chunk.end);

    merge_same_block(&mut kept);
    kept
}

enum Scanned {
    Hit(Vec<String>),
    Miss,
    EndOfChunk,
}

/// Records overlapping one query range, read lazily chunk by chunk.
///
/// Each item is the record's columns. Records whose coordinates cannot be
/// interpreted are logged and skipped.
pub struct Records<'a, R> {
    reader: &'a mut R,
    index: &'a TabixIndex,
    chunks: std::vec::IntoIter<Chunk>,
    current: Option<Chunk>,
    sequence_id: u32,
    begin: i64,
    end: i64,
    line: String,
    failed: bool,
}

impl<'a, R: VirtualLineReader> Records<'a, R> {
    pub fn new(reader: &'a mut R, index: &'a TabixIndex, sequence_id: u32, begin: i64, end: i64) -> Self {
        let chunks = candidate_chunks(index, sequence_id, begin, end);
        debug!(
            "Query {}:{}-{} scans {} chunks",
            index.sequence_name(sequence_id).unwrap_or("?"),
            begin,
            end,
            chunks.len()
        );
        Records {
            reader,
            index,
            chunks: chunks.into_iter(),
            current: None,
            sequence_id,
            begin,
            end,
            line: String::new(),
            failed: false,
        }
    }

    /// A cursor that yields nothing, for sequences absent from the index.
    pub fn empty(reader: &'a mut R, index: &'a TabixIndex) -> Self {
        Records {
            reader,
            index,
            chunks: Vec::new().into_iter(),
            current: None,
            sequence_id: 0,
            begin: 0,
            end: 0,
            line: String::new(),
            failed: false,
        }
    }

    fn scan_line(&self) -> Scanned {
        let line = self.line.as_str();
        if line.is_empty() || self.index.config().is_comment(line) {
            return Scanned::Miss;
        }
        let columns: Vec<&str> = line.split('\t').collect();
        match self.index.lookup_interval(&columns) {
            Ok(Some(interval)) => {
                if interval.sequence_id != self.sequence_id || interval.begin >= self.end {
                    Scanned::EndOfChunk
                } else if interval.end > self.begin {
                    Scanned::Hit(columns.into_iter().map(str::to_owned).collect())
                } else {
                    Scanned::Miss
                }
            }
            Ok(None) => Scanned::EndOfChunk,
            Err(e) => {
                warn!("Skipping record '{}': {}", line, e);
                Scanned::Miss
            }
        }
    }

    fn step(&mut self) -> Result<Option<Vec<String>>> {
        loop {
            let chunk = match self.current {
                Some(chunk) => chunk,
                None => {
                    let Some(chunk) = self.chunks.next() else {
                        return Ok(None);
                    };
                    if self.reader.virtual_offset() != chunk.begin {
                        self.reader.seek_virtual(chunk.begin)?;
                    }
                    self.current = Some(chunk);
                    chunk
                }
            };

            if self.reader.virtual_offset() >= chunk.end {
                self.current = None;
                continue;
            }
            if self.reader.next_line(&mut self.line)? == 0 {
                self.current = None;
                continue;
            }
            match self.scan_line() {
                Scanned::Hit(columns) => return Ok(Some(columns)),
                Scanned::Miss => {}
                Scanned::EndOfChunk => self.current = None,
            }
        }
    }
}

impl<R: VirtualLineReader> Iterator for Records<'_, R> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.step() {
            Ok(Some(columns)) => Some(Ok(columns)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// A block-compressed data file opened together with its index.
pub struct TabixReader<R> {
    inner: bgzf::io::Reader<R>,
    index: TabixIndex,
}

impl TabixReader<File> {
    /// Open `path` and its default index `<path>.tbi`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let index_path = tbi::index_path_for(&path.to_string_lossy());
        Self::with_index(path, index_path)
    }

    pub fn with_index<P: AsRef<Path>, Q: AsRef<Path>>(path: P, index_path: Q) -> Result<Self> {
        let index = tbi::read_from_path(index_path)?;
        let file = File::open(path)?;
        Ok(TabixReader::new(file, index))
    }
}

impl<R: Read + Seek> TabixReader<R> {
    pub fn new(inner: R, index: TabixIndex) -> Self {
        TabixReader {
            inner: bgzf::io::Reader::new(inner),
            index,
        }
    }

    pub fn index(&self) -> &TabixIndex {
        &self.index
    }

    pub fn sequence_names(&self) -> &[String] {
        self.index.sequence_names()
    }

    /// Leading skipped lines and comment lines of the data file.
    pub fn headers(&mut self) -> Result<Vec<String>> {
        self.inner.seek_virtual(0)?;
        let config = self.index.config();
        let skip = config.lines_to_skip.max(0) as usize;
        let mut headers = Vec::new();
        let mut line = String::new();
        while self.inner.next_line(&mut line)? > 0 {
            if headers.len() < skip || config.is_comment(&line) {
                headers.push(line.clone());
            } else {
                break;
            }
        }
        Ok(headers)
    }

    /// Records overlapping a region string such as `chr1:150-550`.
    ///
    /// A sequence the index does not know yields no records.
    pub fn query(&mut self, region: &str) -> Result<Records<'_, bgzf::io::Reader<R>>> {
        let region = Region::parse_for(region, &self.index)?;
        Ok(self.query_region(&region))
    }

    pub fn query_region(&mut self, region: &Region) -> Records<'_, bgzf::io::Reader<R>> {
        match region.resolve(&self.index) {
            Some((id, begin, end)) => Records::new(&mut self.inner, &self.index, id, begin, end),
            None => {
                debug!("Sequence '{}' is not indexed", region.name);
                Records::empty(&mut self.inner, &self.index)
            }
        }
    }

    /// Records overlapping the 0-based half-open `[begin, end)` on `sequence_id`.
    pub fn query_interval(
        &mut self,
        sequence_id: u32,
        begin: i64,
        end: i64,
    ) -> Records<'_, bgzf::io::Reader<R>> {
        Records::new(&mut self.inner, &self.index, sequence_id, begin, end)
    }

    /// Collect a query, failing on the first I/O error.
    pub fn fetch(&mut self, region: &str) -> Result<Vec<Vec<String>>> {
        self.query(region)?.collect()
    }
}

impl<R> std::fmt::Debug for TabixReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabixReader")
            .field("sequences", &self.index.num_sequences())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bin_index::BinIndex;
    use crate::builder::compress_and_index;
    use crate::config::TabixConfig;
    use crate::linear_index::LinearIndex;
    use std::io::Cursor;

    fn vo(block: u64, offset: u64) -> u64 {
        (block << 16) | offset
    }

    fn index_with(chunks: &[(u32, Chunk)], linear: Vec<u64>) -> TabixIndex {
        let mut index = TabixIndex::new(TabixConfig::bed());
        index.get_or_create_sequence_id("chr1");
        let mut bins = BinIndex::new();
        for &(bin, chunk) in chunks {
            let mut list = bins.chunks(bin).map(<[Chunk]>::to_vec).unwrap_or_default();
            list.push(chunk);
            bins.set_chunks(bin, list);
        }
        index.install(0, bins, LinearIndex::from_offsets(linear));
        index
    }

    #[test]
    fn test_candidate_chunks_cleanup() {
        let index = index_with(
            &[
                (0, Chunk::new(vo(1, 0), vo(5, 0))),
                (4681, Chunk::new(vo(2, 0), vo(3, 0))),
                (4681, Chunk::new(vo(7, 0), vo(8, 10))),
                (585, Chunk::new(vo(8, 20), vo(9, 0))),
            ],
            vec![vo(1, 0)],
        );
        // (2,0)-(3,0) is dominated by (1,0)-(5,0); (7,0)-(8,10) and
        // (8,20)-(9,0) meet inside block 8
        assert_eq!(
            candidate_chunks(&index, 0, 0, 100),
            vec![Chunk::new(vo(1, 0), vo(5, 0)), Chunk::new(vo(7, 0), vo(9, 0))]
        );
    }

    #[test]
    fn test_candidate_chunks_overlaps_collapse() {
        let index = index_with(
            &[
                (0, Chunk::new(vo(1, 0), vo(4, 0))),
                (4681, Chunk::new(vo(3, 0), vo(6, 0))),
            ],
            vec![vo(1, 0)],
        );
        // clipped to (1,0)-(3,0), which then shares block 3 with its successor
        assert_eq!(
            candidate_chunks(&index, 0, 0, 100),
            vec![Chunk::new(vo(1, 0), vo(6, 0))]
        );
    }

    #[test]
    fn test_candidate_chunks_uses_linear_floor() {
        let index = index_with(
            &[
                (0, Chunk::new(vo(1, 0), vo(2, 0))),
                (4682, Chunk::new(vo(5, 0), vo(6, 0))),
            ],
            vec![vo(1, 0), vo(5, 0)],
        );
        assert_eq!(
            candidate_chunks(&index, 0, 20_000, 20_100),
            vec![Chunk::new(vo(5, 0), vo(6, 0))]
        );
        assert!(candidate_chunks(&index, 1, 0, 100).is_empty());
        assert!(candidate_chunks(&index, 0, 100, 100).is_empty());
    }

    fn reader_for(lines: &[&str], config: TabixConfig) -> TabixReader<Cursor<Vec<u8>>> {
        let mut writer = bgzf::io::Writer::new(Vec::new());
        let index = compress_and_index(
            lines.iter().map(|l| Ok(l.to_string())),
            &mut writer,
            config,
        )
        .unwrap();
        let data = writer.finish().unwrap();
        TabixReader::new(Cursor::new(data), index)
    }

    #[test]
    fn test_query_overlaps() {
        let mut reader = reader_for(
            &[
                "#chrom\tstart\tend",
                "chr1\t100\t200\ta",
                "chr1\t500\t600\tb",
                "chr2\t50\t150\tc",
            ],
            TabixConfig::bed(),
        );
        let names = |rows: Vec<Vec<String>>| rows.into_iter().map(|r| r[3].clone()).collect::<Vec<_>>();

        assert_eq!(names(reader.fetch("chr1:150-450").unwrap()), vec!["a"]);
        assert_eq!(names(reader.fetch("chr1:150-550").unwrap()), vec!["a", "b"]);
        assert_eq!(names(reader.fetch("chr1:201-500").unwrap()), Vec::<String>::new());
        assert_eq!(names(reader.fetch("chr2:1-1000").unwrap()), vec!["c"]);
        assert!(reader.fetch("chr3:1-10").unwrap().is_empty());
        assert_eq!(names(reader.fetch("chr1").unwrap()), vec!["a", "b"]);
        assert!(reader.fetch("chr1:70368744161282-70368744161290").unwrap().is_empty());
        assert!(reader.query_interval(0, i64::MAX - 1, i64::MAX).next().is_none());
        assert_eq!(reader.headers().unwrap(), vec!["#chrom\tstart\tend"]);
    }

    #[test]
    fn test_query_skips_unparsable_records() {
        let mut writer = bgzf::io::Writer::new(Vec::new());
        let lines = ["chr1\t10\t20", "chr1\t15\t30", "chr1\t40\t50"];
        let index = compress_and_index(
            lines.iter().map(|l| Ok(l.to_string())),
            &mut writer,
            TabixConfig::bed(),
        )
        .unwrap();
        let data = writer.finish().unwrap();
        // corrupt the coordinates of the middle record without moving any bytes
        let data = {
            let mut reader = bgzf::io::Reader::new(Cursor::new(data));
            let mut text = String::new();
            reader.read_to_string(&mut text).unwrap();
            let text = text.replace("chr1\t15\t30", "chr1\tx5\t30");
            let mut writer = bgzf::io::Writer::new(Vec::new());
            std::io::Write::write_all(&mut writer, text.as_bytes()).unwrap();
            writer.finish().unwrap()
        };
        let mut reader = TabixReader::new(Cursor::new(data), index);
        let rows = reader.fetch("chr1:1-100").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1], "40");
    }
}
