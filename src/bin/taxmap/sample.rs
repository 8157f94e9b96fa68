use std::io;
use std::path::PathBuf;

use clap::Parser;
use csv::StringRecord;
use log::{info, warn};

use taxmap::block::{classify_accessions, ClassificationBlock, ClassifyStats};
use taxmap::error::{Error, Result};
use taxmap::index::{AccessionMap, DiskAccessionIndex};
use taxmap::io::{DeserializeFrom, SerializeTo};
use taxmap::normalize::{normalize_blocks, Subsampler, DEFAULT_RUNS, DEFAULT_SEED};
use taxmap::progress::LogProgress;

use crate::index::load_config;

#[derive(Parser, Debug)]
pub struct CountArgs {
    #[clap(short, long)]
    index: PathBuf,

    /// One read per line: `<accession>[<TAB><weight>]`
    #[clap(short, long)]
    reads: PathBuf,

    /// Block written with bincode
    #[clap(short, long)]
    output: PathBuf,

    #[clap(short, long, default_value = "Taxonomy")]
    name: String,

    /// Also export the block as tsv
    #[clap(short, long)]
    tsv: Option<PathBuf>,

    /// Store config as json
    #[clap(short, long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct SubsampleArgs {
    /// Bincode blocks written by `count`
    #[clap(short, long, required = true)]
    blocks: Vec<PathBuf>,

    /// Reads per sample; defaults to the smallest eligible block total
    #[clap(short = 'n', long)]
    sample_size: Option<u32>,

    #[clap(short, long, default_value_t = DEFAULT_RUNS)]
    runs: u32,

    /// Leave reserved classes out of the draw
    #[clap(short = 'u', long)]
    ignore_unassigned: bool,

    #[clap(short, long, default_value_t = DEFAULT_SEED)]
    seed: u64,
}

pub fn run_count(args: &CountArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let index = DiskAccessionIndex::open_with_config(&args.index, &config)?;

    let rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(&args.reads)?;

    let mut block = ClassificationBlock::new(&args.name);
    let stats = count_reads(&index, rdr, &mut block)?;
    info!(
        "{} of {} reads assigned across {} classes",
        stats.assigned,
        stats.reads,
        block.len()
    );

    block.serialize_to(&args.output)?;
    if let Some(tsv) = &args.tsv {
        block.write_tsv(std::fs::File::create(tsv)?)?;
    }
    index.close();
    Ok(())
}

/// Stream reads from `rdr` into `block`. The first bad row stops the pass.
fn count_reads<M, R>(
    index: &M,
    rdr: csv::Reader<R>,
    block: &mut ClassificationBlock,
) -> Result<ClassifyStats>
where
    M: AccessionMap,
    R: io::Read,
{
    let mut bad_row = None;
    let reads = rdr
        .into_records()
        .filter_map(|r| parse_read(r).transpose())
        .map_while(|r| match r {
            Ok(read) => Some(read),
            Err(e) => {
                bad_row = Some(e);
                None
            }
        });
    let stats = classify_accessions(index, reads, block)?;
    match bad_row {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}

// `<accession>[<TAB><weight>]`; rows with an empty accession are skipped.
fn parse_read(record: csv::Result<StringRecord>) -> Result<Option<(String, f32)>> {
    let record = record?;
    let accession = match record.get(0) {
        Some(a) if !a.is_empty() => a.to_string(),
        _ => return Ok(None),
    };
    let weight = match record.get(1) {
        Some(w) => w.parse::<f32>().map_err(|e| {
            Error::Format(format!("bad weight {:?} for {}: {}", w, accession, e))
        })?,
        None => 1.0,
    };
    Ok(Some((accession, weight)))
}

pub fn run_subsample(args: &SubsampleArgs) -> Result<()> {
    let blocks = args
        .blocks
        .iter()
        .map(ClassificationBlock::deserialize_from)
        .collect::<bincode::Result<Vec<_>>>()?;

    let progress = LogProgress::new("subsample");
    let results = match args.sample_size {
        Some(n) => blocks
            .iter()
            .enumerate()
            .map(|(i, b)| {
                Subsampler::new(n)
                    .with_runs(args.runs)
                    .ignore_unassigned(args.ignore_unassigned)
                    .with_seed(args.seed.wrapping_add(i as u64))
                    .subsample_block(b, &progress)
            })
            .collect::<Result<Vec<_>>>()?,
        None => normalize_blocks(
            &blocks,
            args.runs,
            args.ignore_unassigned,
            args.seed,
            &progress,
        )?,
    };

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(io::stdout());
    for (block, result) in blocks.iter().zip(&results) {
        if result.is_empty() {
            warn!("Nothing drawn for {:?}", block.name());
        }
        for (id, count) in result {
            wtr.serialize((block.name(), id, count))?;
        }
    }
    wtr.flush()?;
    Ok(())
}
