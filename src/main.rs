//! Pixflow CLI: sharpen an image locally, split the pipeline across two hosts, or compare results.

use anyhow::Result;
use clap::Parser;
use pixflow::engine::arg_parser::Cli;
use pixflow::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
