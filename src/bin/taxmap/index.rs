use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use log::info;

use taxmap::config::{StoreConfig, StoreKind};
use taxmap::error::Result;
use taxmap::index::{
    load_label_map, AccessionMap, DiskAccessionIndex, DiskIndexWriter, LabelResolver,
};
use taxmap::progress::LogProgress;

#[derive(Parser, Debug)]
pub struct BuildIndexArgs {
    /// Accession map, `<accession><TAB><id or label>` per line, optionally gzipped
    #[clap(short, long)]
    input: PathBuf,

    #[clap(short, long)]
    output: PathBuf,

    /// `<label><TAB><id>` table resolving non-numeric second columns
    #[clap(short, long)]
    labels: Option<PathBuf>,

    /// Store config as json
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Sort in memory instead of spilling chunks next to the output
    #[clap(short = 'm', long)]
    in_memory: bool,
}

#[derive(Parser, Debug)]
pub struct LookupArgs {
    #[clap(short, long)]
    index: PathBuf,

    /// Store config as json
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Read through a shared file handle instead of a memory map
    #[clap(short, long)]
    seek: bool,

    accessions: Vec<String>,
}

pub fn load_config(p: Option<&Path>) -> Result<StoreConfig> {
    match p {
        Some(p) => Ok(StoreConfig::load(p)?),
        None => Ok(StoreConfig::default()),
    }
}

pub fn run_build_index(args: &BuildIndexArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.in_memory {
        config.temp_store_in_memory = true;
    }

    let labels = args.labels.as_ref().map(load_label_map).transpose()?;
    let resolver = labels.as_ref().map(|m| m as &dyn LabelResolver);

    info!("Building index");
    info!("* from {:?}", args.input);
    info!("* to {:?}", args.output);
    let progress = LogProgress::new("build-index");
    DiskIndexWriter::new(&config).write_tsv(&args.input, resolver, &args.output, &progress)?;
    Ok(())
}

pub fn run_lookup(args: &LookupArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.seek {
        config.kind = StoreKind::Seek;
    }

    let load_time = Instant::now();
    let index = DiskAccessionIndex::open_with_config(&args.index, &config)?;
    info!(
        "Opened index in {:.3}s",
        load_time.elapsed().as_secs_f64()
    );

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for acc in &args.accessions {
        match index.lookup(acc)? {
            Some(id) => writeln!(out, "{}\t{}", acc, id)?,
            None => writeln!(out, "{}\t-", acc)?,
        }
    }
    out.flush()?;
    index.close();
    Ok(())
}
