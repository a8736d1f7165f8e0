use clap::Parser;
use log::{info, warn};
use noodles::bgzf;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::num::NonZeroUsize;
use tbx::query::Records;
use tbx::{builder, tbi, Region, TabixConfig, TabixIndex, TabixReader};

/// Common options shared between all commands
#[derive(Parser, Debug)]
struct CommonOpts {
    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[clap(short, long, default_value = "0")]
    verbose: u8,
}

/// How records are read when building an index
#[derive(Parser, Debug)]
struct FormatOpts {
    /// Named preset: gff, bed, psltbl, sam or vcf. Guessed from the file name when omitted.
    #[clap(short = 'p', long, value_parser)]
    preset: Option<String>,

    /// Column of the sequence name (1-based)
    #[clap(short = 's', long, value_parser)]
    seq_col: Option<i32>,

    /// Column of the begin position (1-based)
    #[clap(short = 'b', long, value_parser)]
    begin_col: Option<i32>,

    /// Column of the end position (1-based, 0 for none)
    #[clap(short = 'e', long, value_parser)]
    end_col: Option<i32>,

    /// Positions are 0-based half-open
    #[clap(long, action)]
    zero_based: bool,

    /// Lines starting with this character are headers
    #[clap(short = 'c', long, value_parser)]
    comment: Option<char>,

    /// Number of leading lines to treat as headers
    #[clap(short = 'S', long, value_parser)]
    skip_lines: Option<i32>,
}

/// Build and query tabix indexes of sorted, BGZF-compressed tab-delimited files.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand = true)]
enum Args {
    /// Index a BGZF file; a plain-text file is compressed first
    Index {
        #[clap(flatten)]
        common: CommonOpts,

        #[clap(flatten)]
        format: FormatOpts,

        /// Input file (BGZF-compressed or plain text)
        input: String,

        /// Where to write the compressed data when the input is plain text (default `<input>.gz`)
        #[clap(short = 'o', long, value_parser)]
        output: Option<String>,

        /// Overwrite an existing index
        #[clap(short = 'f', long, action)]
        force: bool,
    },
    /// Print records overlapping regions
    Query {
        #[clap(flatten)]
        common: CommonOpts,

        /// Indexed BGZF file
        input: String,

        /// Regions in the format `seq_name[:start[-end]]`, 1-based inclusive
        regions: Vec<String>,

        /// BED file of regions (0-based half-open)
        #[clap(short = 'R', long, value_parser)]
        regions_bed: Option<String>,

        /// Index file (default `<input>.tbi`)
        #[clap(short = 'i', long, value_parser)]
        index: Option<String>,

        /// Print the header lines before the records
        #[clap(short = 'H', long, action)]
        print_header: bool,

        /// Number of threads for BED regions
        #[clap(short = 't', long, value_parser, default_value_t = NonZeroUsize::new(4).unwrap())]
        num_threads: NonZeroUsize,
    },
    /// List the indexed sequence names
    List {
        #[clap(flatten)]
        common: CommonOpts,

        /// Indexed BGZF file
        input: String,

        /// Index file (default `<input>.tbi`)
        #[clap(short = 'i', long, value_parser)]
        index: Option<String>,
    },
    /// Print the header lines
    Header {
        #[clap(flatten)]
        common: CommonOpts,

        /// Indexed BGZF file
        input: String,

        /// Index file (default `<input>.tbi`)
        #[clap(short = 'i', long, value_parser)]
        index: Option<String>,
    },
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    match args {
        Args::Index {
            common,
            format,
            input,
            output,
            force,
        } => {
            initialize_logger(&common);
            let config = resolve_config(&format, &input)?;
            build_index(&input, output.as_deref(), config, force)?;
        }
        Args::Query {
            common,
            input,
            regions,
            regions_bed,
            index,
            print_header,
            num_threads,
        } => {
            initialize_logger(&common);
            if regions.is_empty() && regions_bed.is_none() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "Either regions or --regions-bed must be provided",
                ));
            }
            let index_file = index.unwrap_or_else(|| tbi::index_path_for(&input));
            let mut reader = TabixReader::with_index(&input, &index_file)?;
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());

            if print_header {
                for line in reader.headers()? {
                    writeln!(out, "{}", line)?;
                }
            }

            for region in &regions {
                for record in reader.query(region)? {
                    writeln!(out, "{}", record?.join("\t"))?;
                }
            }

            if let Some(regions_bed) = regions_bed {
                ThreadPoolBuilder::new()
                    .num_threads(num_threads.into())
                    .build_global()
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
                let bed_regions = parse_bed_file(&regions_bed)?;
                info!("Querying {} regions from {}", bed_regions.len(), regions_bed);
                for lines in query_in_parallel(&input, reader.index(), &bed_regions) {
                    for line in lines? {
                        writeln!(out, "{}", line)?;
                    }
                }
            }
            out.flush()?;
        }
        Args::List {
            common,
            input,
            index,
        } => {
            initialize_logger(&common);
            let index_file = index.unwrap_or_else(|| tbi::index_path_for(&input));
            let index = tbi::read_from_path(&index_file)?;
            for name in index.sequence_names() {
                println!("{}", name);
            }
        }
        Args::Header {
            common,
            input,
            index,
        } => {
            initialize_logger(&common);
            let index_file = index.unwrap_or_else(|| tbi::index_path_for(&input));
            let mut reader = TabixReader::with_index(&input, &index_file)?;
            for line in reader.headers()? {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

fn initialize_logger(common: &CommonOpts) {
    env_logger::Builder::new()
        .filter_level(match common.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();
}

/// Start from the named or guessed preset, then apply column overrides.
fn resolve_config(format: &FormatOpts, input: &str) -> io::Result<TabixConfig> {
    let mut config = match &format.preset {
        Some(name) => TabixConfig::from_preset_name(name).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Unknown preset '{}'; expected gff, bed, psltbl, sam or vcf", name),
            )
        })?,
        None => TabixConfig::from_path(input).unwrap_or_else(|| {
            warn!("Cannot guess the format of {}; using the gff preset", input);
            TabixConfig::gff()
        }),
    };

    if let Some(col) = format.seq_col {
        config.seq_col = col;
    }
    if let Some(col) = format.begin_col {
        config.begin_col = col;
    }
    if let Some(col) = format.end_col {
        config.end_col = col;
    }
    if format.zero_based {
        config.zero_based = true;
    }
    if let Some(c) = format.comment {
        config.comment_char = u8::try_from(c).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Comment character '{}' must be a single byte", c),
            )
        })?;
    }
    if let Some(skip) = format.skip_lines {
        config.lines_to_skip = skip;
    }

    if config.seq_col < 1 || config.begin_col < 1 || config.end_col < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Columns are 1-based; the end column may be 0 for none",
        ));
    }
    Ok(config)
}

fn build_index(input: &str, output: Option<&str>, config: TabixConfig, force: bool) -> io::Result<()> {
    let mut file = File::open(input)?;
    let (data_file, index) = if tbi::is_gzipped(&mut file)? {
        let mut reader = bgzf::io::Reader::new(file);
        let index = builder::index_bgzf(&mut reader, config)?;
        (input.to_string(), index)
    } else {
        let data_file = output
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}.gz", input));
        if !force && std::path::Path::new(&data_file).exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists; use --force to overwrite", data_file),
            ));
        }
        info!("Compressing {} into {}", input, data_file);
        let lines = BufReader::new(file).lines();
        let mut writer = bgzf::io::Writer::new(BufWriter::new(File::create(&data_file)?));
        let index = builder::compress_and_index(lines, &mut writer, config)?;
        writer.finish()?.flush()?;
        (data_file, index)
    };

    let index_file = tbi::index_path_for(&data_file);
    if !force && std::path::Path::new(&index_file).exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists; use --force to overwrite", index_file),
        ));
    }
    tbi::write_to_path(&index_file, &index)?;
    info!(
        "Wrote {} with {} sequences",
        index_file,
        index.num_sequences()
    );
    Ok(())
}

fn parse_bed_file(bed_file: &str) -> io::Result<Vec<Region>> {
    let file = File::open(bed_file)?;
    let reader = BufReader::new(file);
    let mut regions = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') || line.starts_with("track") {
            continue;
        }
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 3 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Invalid BED file format",
            ));
        }

        let begin = parts[1]
            .parse::<i64>()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Invalid start value"))?;
        let end = parts[2]
            .parse::<i64>()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Invalid end value"))?;
        if begin >= end {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Start value must be less than end value",
            ));
        }
        regions.push(Region {
            name: parts[0].to_string(),
            begin,
            end,
        });
    }

    Ok(regions)
}

/// Run each region on its own read handle; results come back in region order.
fn query_in_parallel(
    input: &str,
    index: &TabixIndex,
    regions: &[Region],
) -> Vec<io::Result<Vec<String>>> {
    regions
        .par_iter()
        .map_init(
            || File::open(input).map(bgzf::io::Reader::new),
            |reader, region| -> io::Result<Vec<String>> {
                let reader = reader
                    .as_mut()
                    .map_err(|e| io::Error::new(e.kind(), e.to_string()))?;
                let Some((id, begin, end)) = region.resolve(index) else {
                    warn!("Sequence '{}' is not indexed", region.name);
                    return Ok(Vec::new());
                };
                Records::new(reader, index, id, begin, end)
                    .map(|record| -> io::Result<String> { Ok(record?.join("\t")) })
                    .collect::<io::Result<Vec<String>>>()
            },
        )
        .collect()
}
