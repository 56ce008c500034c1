//! Command handlers for run, serve, connect and compare.

use anyhow::{Context, Result, bail};
use log::{info, warn};
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::engine::progress::{
    ProgressBar, create_progress_bar, finish_progress_bar, progress_callback,
};
use crate::grid::{Grid, first_interior_mismatch, read_ppm, write_ppm};
use crate::pipeline::{self, PipelineContext};
use crate::stage::BatchPlan;
use crate::{Opts, RunReport};

/// Ctrl+C asks the source stage to stop; the stream still ends with a terminal.
fn install_interrupt_handler() -> Result<Arc<AtomicBool>> {
    let requested = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&requested);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    })
    .context("set Ctrl+C handler")?;
    Ok(requested)
}

fn load_grid(path: &Path) -> Result<Grid> {
    let grid = read_ppm(path).with_context(|| format!("failed to read {}", path.display()))?;
    info!(
        "loaded {} ({}x{})",
        path.display(),
        grid.width(),
        grid.height()
    );
    Ok(grid)
}

fn build_context(input: &Path, opts: &Opts) -> Result<PipelineContext> {
    let grid = load_grid(input)?;
    let ctx = PipelineContext::new(Arc::new(grid), opts.pipeline.clone())?
        .with_interrupt(install_interrupt_handler()?);
    Ok(ctx)
}

fn setup_progress(opts: &Opts, ctx: &PipelineContext) -> Option<ProgressBar> {
    opts.progress.then(|| {
        let total = BatchPlan::batch_count(&ctx.reference, ctx.opts.batch_rows);
        create_progress_bar(total, "Sharpening")
    })
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("serialize run report")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report {}", path.display()))?;
    info!("run report written to {}", path.display());
    Ok(())
}

/// Write the report if asked, then turn a failed run into an error.
fn finish_run(report: &RunReport, opts: &Opts) -> Result<()> {
    if let Some(ref path) = opts.report {
        write_report(path, report)?;
    }
    if let Some((who, outcome)) = report.first_failure() {
        bail!("{}: {}", who, outcome);
    }
    info!("processing time: {} ms", report.elapsed_ms);
    Ok(())
}

fn write_output(path: &Path, grid: &Grid) -> Result<()> {
    write_ppm(path, grid).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

/// `run`: whole pipeline in this process. The output file is only written on success.
pub fn handle_local(input: &Path, output: &Path, opts: &Opts) -> Result<()> {
    let ctx = build_context(input, opts)?;
    let bar = setup_progress(opts, &ctx);
    let run = pipeline::run_local(&ctx, progress_callback(&bar))?;
    if let Some(ref bar) = bar {
        finish_progress_bar(bar);
    }
    finish_run(&run.report, opts)?;
    write_output(output, &run.output)
}

/// `serve`: first `opts.split` stages, streaming to one downstream peer.
pub fn handle_serve(input: &Path, opts: &Opts) -> Result<()> {
    let ctx = build_context(input, opts)?;
    let listener = TcpListener::bind(("0.0.0.0", opts.port))
        .with_context(|| format!("failed to listen on port {}", opts.port))?;
    let report = pipeline::run_upstream(&ctx, &listener, opts.split)?;
    finish_run(&report, opts)
}

/// `connect`: remaining stages and the sink, reading from the upstream at `opts.host:opts.port`.
pub fn handle_connect(input: &Path, output: &Path, opts: &Opts) -> Result<()> {
    let ctx = build_context(input, opts)?;
    let bar = setup_progress(opts, &ctx);
    let run = pipeline::run_downstream(
        &ctx,
        (opts.host.as_str(), opts.port),
        opts.split,
        opts.connect_attempts,
        progress_callback(&bar),
    )?;
    if let Some(ref bar) = bar {
        finish_progress_bar(bar);
    }
    finish_run(&run.report, opts)?;
    write_output(output, &run.output)
}

/// `compare`: non-zero exit when the interiors differ.
pub fn handle_compare(left: &Path, right: &Path) -> Result<()> {
    let a = load_grid(left)?;
    let b = load_grid(right)?;
    match first_interior_mismatch(&a, &b) {
        None => {
            info!("images match");
            Ok(())
        }
        Some(m) => {
            warn!("first mismatch: {}", m);
            bail!("images differ: {}", m)
        }
    }
}
