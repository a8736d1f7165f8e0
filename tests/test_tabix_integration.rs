//! End-to-end tests: compress and index files on disk, then query them back.

use noodles::bgzf;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tbx::{builder, tbi, TabixConfig, TabixError, TabixIndex, TabixReader};
use tempfile::TempDir;

/// Compress `lines` to `<dir>/<name>` and write its `.tbi` next to it.
fn write_indexed(dir: &Path, name: &str, lines: &[String], config: TabixConfig) -> std::io::Result<(PathBuf, TabixIndex)> {
    let data_path = dir.join(name);
    let mut writer = bgzf::io::Writer::new(BufWriter::new(File::create(&data_path)?));
    let index = builder::compress_and_index(lines.iter().cloned().map(Ok), &mut writer, config)?;
    writer.finish()?.flush()?;
    tbi::write_to_path(tbi::index_path_for(&data_path.to_string_lossy()), &index)?;
    Ok((data_path, index))
}

fn names(rows: &[Vec<String>], col: usize) -> Vec<String> {
    rows.iter().map(|row| row[col].clone()).collect()
}

#[test]
fn test_bed_example_queries() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let lines: Vec<String> = [
        "chr1\t100\t200\tfirst",
        "chr1\t500\t600\tsecond",
        "chr2\t50\t150\tthird",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let (data_path, _) = write_indexed(temp_dir.path(), "example.bed.gz", &lines, TabixConfig::bed())?;

    let mut reader = TabixReader::open(&data_path)?;
    assert_eq!(reader.sequence_names(), &["chr1", "chr2"]);
    assert_eq!(names(&reader.fetch("chr1:150-450")?, 3), vec!["first"]);
    assert_eq!(names(&reader.fetch("chr1:150-550")?, 3), vec!["first", "second"]);
    assert_eq!(names(&reader.fetch("chr2:1-1000")?, 3), vec!["third"]);
    assert!(reader.fetch("chr3:1-10")?.is_empty());

    // 0-based half-open [0, 100) stops just short of the first record
    let rows: Vec<Vec<String>> = reader.query_interval(0, 0, 100).collect::<Result<_, _>>()?;
    assert!(rows.is_empty());
    Ok(())
}

#[test]
fn test_invalid_region_is_reported() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let lines = vec!["chr1\t1\t10".to_string()];
    let (data_path, _) = write_indexed(temp_dir.path(), "one.bed.gz", &lines, TabixConfig::bed())?;
    let mut reader = TabixReader::open(&data_path)?;
    assert!(matches!(reader.fetch("chr1:50-10"), Err(TabixError::InvalidRegion(_))));
    Ok(())
}

#[test]
fn test_index_file_round_trip() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let lines: Vec<String> = (0..2000)
        .map(|i| format!("chr{}\t{}\t{}\trec{}", 1 + i / 1000, i * 37, i * 37 + 500, i))
        .collect();
    let (data_path, built) = write_indexed(temp_dir.path(), "many.bed.gz", &lines, TabixConfig::bed())?;

    let index_path = tbi::index_path_for(&data_path.to_string_lossy());
    let loaded = tbi::read_from_path(&index_path)?;
    assert_eq!(loaded, built);

    // an uncompressed index is accepted too
    let raw_path = temp_dir.path().join("many.raw.tbi");
    let mut raw = Vec::new();
    tbi::write_index(&mut raw, &built)?;
    std::fs::write(&raw_path, &raw)?;
    assert_eq!(tbi::read_from_path(&raw_path)?, built);

    // rebuilding from the compressed file gives the same index
    let mut reader = bgzf::io::Reader::new(File::open(&data_path)?);
    assert_eq!(builder::index_bgzf(&mut reader, TabixConfig::bed())?, built);
    Ok(())
}

#[test]
fn test_vcf_headers_and_end_key() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let lines: Vec<String> = [
        "##fileformat=VCFv4.2",
        "##contig=<ID=chr1>",
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO",
        "chr1\t100\tsnp\tA\tG\t50\tPASS\tDP=10",
        "chr1\t200\tdel\tACGTACGT\tA\t50\tPASS\tDP=12",
        "chr1\t300\tsv\tN\t<DEL>\t50\tPASS\tSVTYPE=DEL;END=5000",
        "chr1\t6000\tlate\tC\tT\t50\tPASS\t.",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let (data_path, _) = write_indexed(temp_dir.path(), "calls.vcf.gz", &lines, TabixConfig::vcf())?;

    let mut reader = TabixReader::open(&data_path)?;
    assert_eq!(reader.headers()?, lines[..3].to_vec());
    // the deletion spans 200..=207
    assert_eq!(names(&reader.fetch("chr1:205-205")?, 2), vec!["del"]);
    // the structural variant reaches 5000 through END=
    assert_eq!(names(&reader.fetch("chr1:4000-4500")?, 2), vec!["sv"]);
    assert_eq!(names(&reader.fetch("chr1:5001-6000")?, 2), vec!["late"]);
    Ok(())
}

#[test]
fn test_sam_cigar_spans() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let lines: Vec<String> = [
        "@HD\tVN:1.6\tSO:coordinate",
        "@SQ\tSN:ref\tLN:100000",
        "r1\t0\tref\t1000\t60\t50M1000N50M\t*\t0\t0\t*\t*",
        "r2\t0\tref\t1500\t60\t10S40M\t*\t0\t0\t*\t*",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let (data_path, index) = write_indexed(temp_dir.path(), "reads.sam.gz", &lines, TabixConfig::sam())?;
    assert_eq!(index.sequence_names(), &["ref"]);

    let mut reader = TabixReader::open(&data_path)?;
    // r1 covers 1000..=2099 across its intron; r2 covers 1500..=1539
    assert_eq!(names(&reader.fetch("ref:2000-2010")?, 0), vec!["r1"]);
    assert_eq!(names(&reader.fetch("ref:1520-1520")?, 0), vec!["r1", "r2"]);
    assert!(reader.fetch("ref:2100-3000")?.is_empty());
    Ok(())
}

#[test]
fn test_unsorted_input_fails() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let lines = vec!["chr1\t500\t600".to_string(), "chr1\t100\t200".to_string()];
    let err = write_indexed(temp_dir.path(), "unsorted.bed.gz", &lines, TabixConfig::bed()).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    Ok(())
}

struct Record {
    seq: usize,
    begin: i64,
    end: i64,
    id: usize,
}

fn random_records(rng: &mut StdRng) -> Vec<Record> {
    let mut records = Vec::new();
    for seq in 0..3 {
        let mut starts: Vec<i64> = (0..4000).map(|_| rng.random_range(0..3_000_000)).collect();
        starts.sort_unstable();
        for begin in starts {
            // mostly short features with the occasional long one
            let len = if rng.random_range(0..50) == 0 {
                rng.random_range(10_000..400_000)
            } else {
                rng.random_range(1..2_000)
            };
            let id = records.len();
            records.push(Record { seq, begin, end: begin + len, id });
        }
    }
    records
}

#[test]
fn test_queries_match_linear_scan() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let mut rng = StdRng::seed_from_u64(0x7ab1);
    let records = random_records(&mut rng);
    let lines: Vec<String> = records
        .iter()
        .map(|r| format!("seq{}\t{}\t{}\tid{}", r.seq, r.begin, r.end, r.id))
        .collect();
    let (data_path, _) = write_indexed(temp_dir.path(), "random.bed.gz", &lines, TabixConfig::bed())?;
    let mut reader = TabixReader::open(&data_path)?;

    for _ in 0..300 {
        let seq = rng.random_range(0..3);
        let begin = rng.random_range(0..3_200_000);
        let end = begin + rng.random_range(1..300_000);
        let expected: Vec<String> = records
            .iter()
            .filter(|r| r.seq == seq && r.begin < end && r.end > begin)
            .map(|r| format!("id{}", r.id))
            .collect();
        let rows: Vec<Vec<String>> = reader
            .query_interval(seq as u32, begin, end)
            .collect::<Result<_, _>>()?;
        assert_eq!(names(&rows, 3), expected, "seq{seq}:{begin}-{end}");
    }
    Ok(())
}

#[test]
fn test_every_record_found_by_its_own_interval() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let mut rng = StdRng::seed_from_u64(17);
    let records = random_records(&mut rng);
    let lines: Vec<String> = records
        .iter()
        .map(|r| format!("seq{}\t{}\t{}\tid{}", r.seq, r.begin, r.end, r.id))
        .collect();
    let (data_path, _) = write_indexed(temp_dir.path(), "own.bed.gz", &lines, TabixConfig::bed())?;
    let mut reader = TabixReader::open(&data_path)?;

    for record in records.iter().step_by(7) {
        let rows: Vec<Vec<String>> = reader
            .query_interval(record.seq as u32, record.begin, record.end)
            .collect::<Result<_, _>>()?;
        let wanted = format!("id{}", record.id);
        assert!(names(&rows, 3).contains(&wanted), "{wanted} not returned");
    }
    Ok(())
}
