use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crate::channel::{ChannelPair, PacketSender, TransportKind};
use crate::grid::Grid;
use crate::pipeline::PipelineContext;
use crate::pipeline::sink::{BatchCallback, collect_into};
use crate::stage::{Stage, StageInput};
use crate::types::{RunReport, SinkReport, StageKind, StageReport};

/// Output grid plus the report of the run that produced it.
pub struct PipelineRun {
    pub output: Grid,
    pub report: RunReport,
}

/// Spawn `stages` as a chain: the first reads `first_input`, stage `i` writes `links[i]` and
/// stage `i + 1` reads it, the last writes `last_output`. Needs exactly `stages - 1` links.
pub fn spawn_chain(
    reference: &Arc<Grid>,
    stages: Vec<Stage>,
    first_input: StageInput,
    links: Vec<ChannelPair>,
    last_output: Box<dyn PacketSender>,
) -> Result<Vec<JoinHandle<StageReport>>> {
    if stages.is_empty() {
        bail!("cannot spawn an empty stage chain");
    }
    if links.len() + 1 != stages.len() {
        bail!(
            "{} stages need {} links, got {}",
            stages.len(),
            stages.len() - 1,
            links.len()
        );
    }

    let (txs, rxs): (Vec<_>, Vec<_>) = links.into_iter().map(|p| (p.tx, p.rx)).unzip();
    let inputs = std::iter::once(first_input).chain(rxs.into_iter().map(StageInput::Channel));
    let outputs = txs.into_iter().chain(std::iter::once(last_output));

    let mut handles = Vec::with_capacity(stages.len());
    for ((stage, input), output) in stages.into_iter().zip(inputs).zip(outputs) {
        let name = stage.name().to_string();
        // Endpoints not yet handed out are dropped on error, so spawned stages see a disconnect.
        let handle = stage
            .spawn(input, output, Arc::clone(reference))
            .with_context(|| format!("failed to spawn stage {}", name))?;
        handles.push(handle);
    }
    Ok(handles)
}

/// Join every stage thread, in order. A panicked stage is an error.
pub fn join_stages(handles: Vec<JoinHandle<StageReport>>) -> Result<Vec<StageReport>> {
    let mut reports = Vec::with_capacity(handles.len());
    let mut panicked = None;
    for (i, h) in handles.into_iter().enumerate() {
        match h.join() {
            Ok(r) => reports.push(r),
            Err(_) => {
                panicked.get_or_insert(i);
            }
        }
    }
    match panicked {
        Some(i) => bail!("stage thread {} panicked", i),
        None => Ok(reports),
    }
}

/// Run the standard smooth → detail → sharpen pipeline in this process.
pub fn run_local(ctx: &PipelineContext, on_batch: Option<BatchCallback>) -> Result<PipelineRun> {
    run_stages(ctx, &StageKind::ALL, on_batch)
}

/// Run `kinds` in this process with transports from the context's options.
pub fn run_stages(
    ctx: &PipelineContext,
    kinds: &[StageKind],
    on_batch: Option<BatchCallback>,
) -> Result<PipelineRun> {
    let transports = ctx.link_transports(kinds.len())?;
    let links = ctx
        .open_links(&transports)
        .context("failed to open inter-stage channels")?;
    let sink_link = ctx
        .open_sink_link()
        .context("failed to open sink channel")?;
    run_wired(ctx, ctx.build_stages(kinds), links, sink_link, on_batch)
}

/// Run pre-built stages over pre-opened channels: stages on their own threads, the sink on
/// the calling thread. The output grid starts as a copy of the reference, so rows no batch
/// reaches keep their input values.
pub fn run_wired(
    ctx: &PipelineContext,
    stages: Vec<Stage>,
    links: Vec<ChannelPair>,
    sink_link: ChannelPair,
    on_batch: Option<BatchCallback>,
) -> Result<PipelineRun> {
    let started = Instant::now();
    let mut transports: Vec<TransportKind> = links.iter().map(|p| p.tx.transport()).collect();
    transports.push(sink_link.tx.transport());
    debug!(
        "pipeline: {} stages, links {:?}, batch_rows {}, integrity {}",
        stages.len(),
        transports,
        ctx.opts.batch_rows,
        ctx.guard.algo()
    );

    let ChannelPair {
        tx: sink_tx,
        rx: mut sink_rx,
    } = sink_link;
    let handles = spawn_chain(&ctx.reference, stages, ctx.plan(), links, sink_tx)?;

    let mut output = (*ctx.reference).clone();
    let sink = collect_into(sink_rx.as_mut(), &mut output, ctx.guard, on_batch.as_ref());
    // Unblock any stage still pushing into the sink after a corrupt or malformed packet.
    drop(sink_rx);
    let stages = join_stages(handles)?;

    let report = build_report(ctx, transports, stages, Some(sink), started);
    log_summary(&report);
    Ok(PipelineRun { output, report })
}

pub(crate) fn build_report(
    ctx: &PipelineContext,
    links: Vec<TransportKind>,
    stages: Vec<StageReport>,
    sink: Option<SinkReport>,
    started: Instant,
) -> RunReport {
    RunReport {
        width: ctx.reference.width(),
        height: ctx.reference.height(),
        batch_rows: ctx.opts.batch_rows,
        links,
        integrity: ctx.guard.algo(),
        stages,
        sink,
        elapsed_ms: started.elapsed().as_millis(),
    }
}

pub(crate) fn log_summary(report: &RunReport) {
    match report.first_failure() {
        None => info!(
            "pipeline finished in {} ms ({} stages)",
            report.elapsed_ms,
            report.stages.len()
        ),
        Some((who, outcome)) => info!(
            "pipeline stopped after {} ms: {} reported {:?}",
            report.elapsed_ms, who, outcome
        ),
    }
}
