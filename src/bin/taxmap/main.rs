use clap::{Parser, Subcommand};
use log::LevelFilter;

use taxmap::error::Result;
use taxmap::log::{setup_default_logging, setup_file_logging, DEFAULT_LOG_FILE};

mod index;
mod sample;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about=None)]
struct Cli {
    /// Also append the log to `taxmap.log`
    #[clap(long)]
    log: bool,

    /// Also append the log to this file
    #[clap(long)]
    log_file: Option<String>,

    #[clap(short, long)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert an accession map into a binary index
    BuildIndex(index::BuildIndexArgs),
    /// Resolve accessions against an index
    Lookup(index::LookupArgs),
    /// Classify reads into a block of per-class counts
    Count(sample::CountArgs),
    /// Subsample blocks to a common size
    Subsample(sample::SubsampleArgs),
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_file = match &args.log_file {
        Some(fp) => Some(fp.as_str()),
        None if args.log => Some(DEFAULT_LOG_FILE),
        None => None,
    };
    match log_file {
        Some(fp) => setup_file_logging(fp, level)?,
        None => setup_default_logging(level),
    }
    log::debug!("Running {:?}", args.command);

    match &args.command {
        Command::BuildIndex(args) => index::run_build_index(args),
        Command::Lookup(args) => index::run_lookup(args),
        Command::Count(args) => sample::run_count(args),
        Command::Subsample(args) => sample::run_subsample(args),
    }
}
