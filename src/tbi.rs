//! Binary `.tbi` encoding.
//!
//! Layout (little-endian):
//! - magic `TBI\1`
//! - i32 `n_seq`, then the configuration: preset, seq/begin/end columns,
//!   comment character, lines to skip
//! - i32 `l_nm` followed by the NUL-terminated sequence names
//! - per sequence: i32 `n_bin`, each bin as (i32 bin, i32 `n_chunk`, `n_chunk` ×
//!   (u64 begin, u64 end)), then i32 `n_intv` and `n_intv` u64 linear offsets
//!
//! On disk the stream is BGZF-compressed like the data file it indexes.

use crate::bin_index::BinIndex;
use crate::binning::MAX_BIN;
use crate::chunk::Chunk;
use crate::config::TabixConfig;
use crate::error::{Result, TabixError};
use crate::index::TabixIndex;
use crate::linear_index::{LinearIndex, MAX_WINDOWS};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use noodles::bgzf;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const TBI_MAGIC: &[u8; 4] = b"TBI\x01";

/// Bin id htslib uses for per-sequence metadata; kept as-is but never queried.
pub const METADATA_BIN: u32 = MAX_BIN;

/// Default index file name for a data file.
pub fn index_path_for(data_path: &str) -> String {
    format!("{data_path}.tbi")
}

fn to_i32(value: usize, what: &str) -> io::Result<i32> {
    i32::try_from(value).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{what} ({value}) does not fit the index format"),
        )
    })
}

/// Encode `index` into its uncompressed byte stream.
pub fn write_index<W: Write>(writer: &mut W, index: &TabixIndex) -> Result<()> {
    let config = index.config();
    writer.write_all(TBI_MAGIC)?;
    writer.write_i32::<LittleEndian>(to_i32(index.num_sequences(), "sequence count")?)?;
    writer.write_i32::<LittleEndian>(config.preset_word())?;
    writer.write_i32::<LittleEndian>(config.seq_col)?;
    writer.write_i32::<LittleEndian>(config.begin_col)?;
    writer.write_i32::<LittleEndian>(config.end_col)?;
    writer.write_i32::<LittleEndian>(i32::from(config.comment_char))?;
    writer.write_i32::<LittleEndian>(config.lines_to_skip)?;

    let names = index.sequence_names();
    let l_nm: usize = names.iter().map(|name| name.len() + 1).sum();
    writer.write_i32::<LittleEndian>(to_i32(l_nm, "sequence name block")?)?;
    for name in names {
        writer.write_all(name.as_bytes())?;
        writer.write_u8(0)?;
    }

    for id in 0..names.len() as u32 {
        let empty_bins = BinIndex::new();
        let empty_linear = LinearIndex::new();
        let bins = index.bin_index(id).unwrap_or(&empty_bins);
        let linear = index.linear_index(id).unwrap_or(&empty_linear);

        writer.write_i32::<LittleEndian>(to_i32(bins.len(), "bin count")?)?;
        for (bin, chunks) in bins.iter() {
            writer.write_u32::<LittleEndian>(bin)?;
            writer.write_i32::<LittleEndian>(to_i32(chunks.len(), "chunk count")?)?;
            for chunk in chunks {
                writer.write_u64::<LittleEndian>(chunk.begin)?;
                writer.write_u64::<LittleEndian>(chunk.end)?;
            }
        }

        writer.write_i32::<LittleEndian>(to_i32(linear.len(), "linear index size")?)?;
        for &offset in linear.offsets() {
            writer.write_u64::<LittleEndian>(offset)?;
        }
    }
    Ok(())
}

/// Map short reads to `CorruptIndex`; everything else stays an I/O failure.
fn truncated(what: &str) -> impl FnOnce(io::Error) -> TabixError + '_ {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            TabixError::CorruptIndex(format!("truncated while reading {what}"))
        } else {
            TabixError::Io(e)
        }
    }
}

fn read_count<R: Read>(reader: &mut R, what: &str, limit: usize) -> Result<usize> {
    let n = reader
        .read_i32::<LittleEndian>()
        .map_err(truncated(what))?;
    let n = usize::try_from(n)
        .map_err(|_| TabixError::CorruptIndex(format!("negative {what}: {n}")))?;
    if n > limit {
        return Err(TabixError::CorruptIndex(format!(
            "{what} {n} exceeds the limit of {limit}"
        )));
    }
    Ok(n)
}

fn split_names(block: &[u8], n_seq: usize) -> Result<Vec<String>> {
    if block.last().is_some_and(|&b| b != 0) {
        return Err(TabixError::CorruptIndex(
            "sequence name block is not NUL-terminated".to_string(),
        ));
    }
    let names = block.split(|&b| b == 0).collect::<Vec<_>>();
    // the trailing NUL leaves one empty piece behind
    let names = &names[..names.len().saturating_sub(1)];
    if names.len() != n_seq {
        return Err(TabixError::CorruptIndex(format!(
            "header declares {n_seq} sequences but lists {} names",
            names.len()
        )));
    }
    names
        .iter()
        .map(|raw| {
            String::from_utf8(raw.to_vec()).map_err(|e| {
                TabixError::CorruptIndex(format!("sequence name is not UTF-8: {e}"))
            })
        })
        .collect()
}

/// Decode an index from its uncompressed byte stream.
///
/// Any trailing data after the last sequence (htslib appends an unplaced-read
/// count) is left unread.
pub fn read_index<R: Read>(reader: &mut R) -> Result<TabixIndex> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(truncated("magic"))?;
    if &magic != TBI_MAGIC {
        return Err(TabixError::CorruptIndex(format!(
            "invalid magic: expected {TBI_MAGIC:?}, got {magic:?}"
        )));
    }

    let n_seq = read_count(reader, "sequence count", i32::MAX as usize)?;
    let mut header = [0i32; 6];
    reader
        .read_i32_into::<LittleEndian>(&mut header)
        .map_err(truncated("header"))?;
    let [preset, seq_col, begin_col, end_col, comment, skip] = header;
    let config = TabixConfig::from_header(preset, seq_col, begin_col, end_col, comment, skip)?;

    let l_nm = read_count(reader, "name block length", i32::MAX as usize)?;
    let mut block = Vec::new();
    reader
        .by_ref()
        .take(l_nm as u64)
        .read_to_end(&mut block)?;
    if block.len() != l_nm {
        return Err(TabixError::CorruptIndex(
            "truncated while reading sequence names".to_string(),
        ));
    }
    let names = split_names(&block, n_seq)?;

    let mut index = TabixIndex::with_capacity(config, n_seq);
    for name in names {
        let n_bin = read_count(reader, "bin count", MAX_BIN as usize + 1)?;
        let mut bins = BinIndex::new();
        for _ in 0..n_bin {
            let bin = reader
                .read_u32::<LittleEndian>()
                .map_err(truncated("bin id"))?;
            if bin > METADATA_BIN {
                return Err(TabixError::CorruptIndex(format!(
                    "bin {bin} outside the binning scheme in '{name}'"
                )));
            }
            if bins.chunks(bin).is_some() {
                return Err(TabixError::CorruptIndex(format!(
                    "bin {bin} listed twice in '{name}'"
                )));
            }
            let n_chunk = read_count(reader, "chunk count", i32::MAX as usize)?;
            let mut chunks = Vec::with_capacity(n_chunk.min(1 << 16));
            for _ in 0..n_chunk {
                let begin = reader
                    .read_u64::<LittleEndian>()
                    .map_err(truncated("chunk"))?;
                let end = reader
                    .read_u64::<LittleEndian>()
                    .map_err(truncated("chunk"))?;
                let chunk = Chunk::new(begin, end);
                // the metadata pseudo-bin stores counts, not offsets
                if bin != METADATA_BIN && !chunk.is_valid() {
                    return Err(TabixError::CorruptIndex(format!(
                        "chunk {chunk:?} in bin {bin} of '{name}' ends before it begins"
                    )));
                }
                chunks.push(chunk);
            }
            bins.set_chunks(bin, chunks);
        }

        let n_intv = read_count(reader, "linear index size", MAX_WINDOWS)?;
        let mut offsets = vec![0u64; n_intv];
        reader
            .read_u64_into::<LittleEndian>(&mut offsets)
            .map_err(truncated("linear index"))?;

        debug!(
            "Loaded '{}': {} bins, {} linear slots",
            name,
            bins.len(),
            offsets.len()
        );
        index.push_sequence(name, bins, LinearIndex::from_offsets(offsets))?;
    }

    Ok(index)
}

/// Write `index` to `path`, BGZF-compressed.
pub fn write_to_path<P: AsRef<Path>>(path: P, index: &TabixIndex) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = bgzf::io::Writer::new(BufWriter::new(file));
    write_index(&mut writer, index)?;
    let mut inner = writer.finish()?;
    inner.flush()?;
    Ok(())
}

/// Whether the stream starts with the gzip magic. Rewinds afterwards.
pub fn is_gzipped<R: Read + Seek>(reader: &mut R) -> io::Result<bool> {
    let mut magic = [0u8; 2];
    let result = match reader.read_exact(&mut magic) {
        Ok(()) => Ok(magic == [0x1f, 0x8b]),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    };
    reader.seek(SeekFrom::Start(0))?;
    result
}

/// Load an index file, BGZF-compressed or raw.
pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<TabixIndex> {
    let mut file = File::open(path.as_ref())?;
    if is_gzipped(&mut file)? {
        let mut reader = bgzf::io::Reader::new(file);
        read_index(&mut reader)
    } else {
        let mut reader = BufReader::new(file);
        read_index(&mut reader)
    }
}
