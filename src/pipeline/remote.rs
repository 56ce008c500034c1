//! Split deployment: the first `split` stages run in one process and stream their output over
//! TCP to a second process that runs the remaining stages and the sink. Both sides load the
//! same input grid; the handshake makes sure they agree on its shape and the stream settings.

use anyhow::{Context, Result};
use std::net::{TcpListener, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::channel::socket::{self, Handshake};
use crate::channel::{PacketReceiver, TransportKind};
use crate::error::ConfigError;
use crate::pipeline::PipelineContext;
use crate::pipeline::orchestrator::{
    PipelineRun, build_report, join_stages, log_summary, spawn_chain,
};
use crate::pipeline::sink::{BatchCallback, collect_into};
use crate::stage::StageInput;
use crate::types::{RunReport, StageKind};
use crate::utils::config::NetDefaults;

/// Stream settings both processes must share for a run split after `split` stages.
pub fn handshake_for(ctx: &PipelineContext, split: usize) -> Handshake {
    Handshake {
        width: ctx.reference.width() as u32,
        height: ctx.reference.height() as u32,
        batch_rows: ctx.opts.batch_rows as u32,
        integrity: ctx.guard.algo(),
        split: split as u32,
    }
}

fn check_split(split: usize) -> Result<(), ConfigError> {
    let stages = StageKind::ALL.len();
    if split == 0 || split > stages {
        return Err(ConfigError::Split { split, stages });
    }
    Ok(())
}

/// Upstream side: accept one downstream peer on `listener`, then run stages `0..split` with
/// the last of them writing to the socket.
pub fn run_upstream(
    ctx: &PipelineContext,
    listener: &TcpListener,
    split: usize,
) -> Result<RunReport> {
    check_split(split)?;
    let transports = ctx.link_transports(StageKind::ALL.len())?;
    let local = &transports[..split - 1];

    let sender = socket::serve_one(listener, &handshake_for(ctx, split))
        .context("downstream peer did not complete the handshake")?;
    let started = Instant::now();
    let links = ctx.open_links(local).context("failed to open upstream channels")?;

    let handles = spawn_chain(
        &ctx.reference,
        ctx.build_stages(&StageKind::ALL[..split]),
        ctx.plan(),
        links,
        Box::new(sender),
    )?;
    let stages = join_stages(handles)?;

    let mut wire = local.to_vec();
    wire.push(TransportKind::Socket);
    let report = build_report(ctx, wire, stages, None, started);
    log_summary(&report);
    Ok(report)
}

/// Downstream side: connect to the upstream at `addr` (retrying while it is not up yet), run
/// stages `split..` and the sink.
pub fn run_downstream<A: ToSocketAddrs + std::fmt::Debug>(
    ctx: &PipelineContext,
    addr: A,
    split: usize,
    connect_attempts: u32,
    on_batch: Option<BatchCallback>,
) -> Result<PipelineRun> {
    check_split(split)?;
    let transports = ctx.link_transports(StageKind::ALL.len())?;

    let receiver = socket::connect_upstream(
        &addr,
        &handshake_for(ctx, split),
        connect_attempts,
        Duration::from_millis(NetDefaults::CONNECT_RETRY_MS),
    )
    .with_context(|| format!("could not connect to upstream {:?}", addr))?;
    let started = Instant::now();

    let kinds = &StageKind::ALL[split..];
    let mut wire = vec![TransportKind::Socket];
    let mut output = (*ctx.reference).clone();

    let (stages, sink) = if kinds.is_empty() {
        let mut rx: Box<dyn PacketReceiver> = Box::new(receiver);
        let sink = collect_into(rx.as_mut(), &mut output, ctx.guard, on_batch.as_ref());
        (Vec::new(), sink)
    } else {
        let local = &transports[split..];
        let links = ctx.open_links(local).context("failed to open downstream channels")?;
        let sink_link = ctx.open_sink_link().context("failed to open sink channel")?;
        wire.extend_from_slice(local);
        wire.push(sink_link.tx.transport());

        let mut sink_rx = sink_link.rx;
        let handles = spawn_chain(
            &ctx.reference,
            ctx.build_stages(kinds),
            StageInput::Channel(Box::new(receiver)),
            links,
            sink_link.tx,
        )?;
        let sink = collect_into(sink_rx.as_mut(), &mut output, ctx.guard, on_batch.as_ref());
        drop(sink_rx);
        (join_stages(handles)?, sink)
    };

    let report = build_report(ctx, wire, stages, Some(sink), started);
    log_summary(&report);
    Ok(PipelineRun { output, report })
}
