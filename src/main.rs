use crate::processes::trim::*;
use clap::{Parser, Subcommand};
use zoe::data::err::OrFail;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        long_about = "Trims the ITS region from a single-end or joined per-sample FASTQ artifact. \
         The artifact's data directory must contain a MANIFEST, and its parent directory a metadata.yaml \
         declaring SampleData[SequencesWithQuality] or SampleData[JoinedSequencesWithQuality]."
    )]
    /// Trim ITS regions from single-end or joined sequence artifacts.
    TrimSingle(TrimSingleArgs),
    #[command(
        long_about = "Trims the ITS region from a paired-end per-sample FASTQ artifact. \
         Read pairs are merged with BBMerge before dereplication and the HMM search. \
         The artifact must declare SampleData[PairedEndSequencesWithQuality]."
    )]
    /// Trim ITS regions from paired-end sequence artifacts.
    TrimPair(TrimPairArgs),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();

    match args.command {
        Commands::TrimSingle(cmd_args) => trim_single_process(cmd_args).unwrap_or_die("subcommand 'trim-single'"),
        Commands::TrimPair(cmd_args) => trim_pair_process(cmd_args).unwrap_or_die("subcommand 'trim-pair'"),
    }
}

mod processes;

pub(crate) mod args;
pub(crate) mod artifact;
pub(crate) mod engine;
pub(crate) mod io;
pub(crate) mod utils;
