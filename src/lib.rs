//! Pixflow: three-stage image sharpening pipeline over interchangeable transports

pub mod channel;
pub mod engine;
pub mod error;
pub mod grid;
pub mod packet;
pub mod pipeline;
pub mod stage;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use channel::TransportKind;
pub use grid::Grid;
pub use packet::IntegrityAlgo;

use log::debug;
use std::sync::Arc;

/// Result alias used by public pixflow API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: sharpen `reference` with the smooth → detail → sharpen pipeline and
/// return `(output, report)`.
///
/// All stages run in this process on the transports named by `opts`. A run that stops early
/// (corruption, broken channel) is not an `Err`: the output keeps input values for every row
/// no batch reached, and [`RunReport::success`] / [`RunReport::first_failure`] say what
/// happened. `Err` is reserved for configuration problems and failures to set the run up.
///
/// ```ignore
/// let grid = pixflow::grid::read_ppm(path)?;
/// let (out, report) = pixflow::sharpen_grid(&grid, &PipelineOpts::default())?;
/// assert!(report.success());
/// ```
pub fn sharpen_grid(reference: &Grid, opts: &PipelineOpts) -> Result<(Grid, RunReport)> {
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );
    let ctx = pipeline::PipelineContext::new(Arc::new(reference.clone()), opts.clone())?;
    let run = pipeline::run_local(&ctx, None)?;
    Ok((run.output, run.report))
}
