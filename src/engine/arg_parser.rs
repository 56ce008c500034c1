use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::channel::TransportKind;
use crate::packet::IntegrityAlgo;

/// Three-stage image sharpening pipeline over pluggable transports.
#[derive(Clone, Parser)]
#[command(name = "pixflow")]
#[command(about = "Sharpen a PPM image through a smooth -> detail -> sharpen pipeline.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Run the whole pipeline in this process.
    Run {
        /// Input image (P6 or P3 PPM).
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output image (written as P6).
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Upstream half of a split run: run the first stages and stream to one TCP client.
    Serve {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Port to listen on.
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// Number of stages run on this side.
        #[arg(long)]
        split: Option<usize>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Downstream half of a split run: connect upstream, run the remaining stages, write OUTPUT.
    Connect {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Upstream host.
        #[arg(long)]
        host: Option<String>,

        /// Upstream port.
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// Number of stages run by the upstream side.
        #[arg(long)]
        split: Option<usize>,

        /// Connect attempts before giving up.
        #[arg(long)]
        connect_attempts: Option<u32>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Compare the interior pixels of two images.
    Compare {
        #[arg(value_name = "A")]
        left: PathBuf,

        #[arg(value_name = "B")]
        right: PathBuf,

        /// Verbose output.
        #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
        verbose: Option<bool>,
    },
}

/// Flags shared by the pipeline commands. Unset flags fall back to `.pixflow.toml`, env, defaults.
#[derive(Clone, Debug, Default, Args)]
pub struct CommonArgs {
    /// Rows per batch packet.
    #[arg(long, short = 'b')]
    pub batch_rows: Option<usize>,

    /// Queue capacity in packets.
    #[arg(long, short = 'c')]
    pub capacity: Option<usize>,

    /// Transport for every inter-stage link.
    #[arg(long, short = 't', value_enum)]
    pub transport: Option<TransportKind>,

    /// Per-link transports, comma separated (one per inter-stage link).
    #[arg(long, value_enum, value_delimiter = ',')]
    pub links: Vec<TransportKind>,

    /// Transport from the last stage into the sink.
    #[arg(long, value_enum)]
    pub sink_transport: Option<TransportKind>,

    /// Integrity hash for batch packets.
    #[arg(long, short = 'i', value_enum)]
    pub integrity: Option<IntegrityAlgo>,

    /// Sharpen scale factor.
    #[arg(long, short = 's')]
    pub scale: Option<u8>,

    /// Write a JSON run report to this path.
    #[arg(long, short = 'r')]
    pub report: Option<PathBuf>,

    /// Settings file. Default: `.pixflow.toml` in the working directory.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Show a progress bar over sink batches.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub progress: Option<bool>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
