//! Public and internal types for the pixflow API and pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::channel::TransportKind;
use crate::packet::IntegrityAlgo;
use crate::utils::config::{NetDefaults, PipelineDefaults};

/// The three transforms of the sharpening pipeline, in pipeline order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Smooth,
    Detail,
    Sharpen,
}

impl StageKind {
    /// Standard order: smooth → detail → sharpen.
    pub const ALL: [StageKind; 3] = [StageKind::Smooth, StageKind::Detail, StageKind::Sharpen];

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Smooth => "smooth",
            StageKind::Detail => "detail",
            StageKind::Sharpen => "sharpen",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of one stage. Every path out of `Running` goes through `ForwardTerminal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Running,
    ForwardTerminal,
    Done,
}

/// Why a stage (or the sink) stopped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageOutcome {
    /// Saw the terminal packet (or, as a source, ran out of batches).
    Completed,
    /// Source stopped early on an interrupt request.
    Interrupted,
    /// Integrity tag mismatch on the batch starting at `start_row`.
    Corrupted { start_row: i32 },
    /// Packet geometry or ordering does not fit the reference grid.
    Malformed { start_row: i32, reason: String },
    /// Input channel failed (disconnect, short read, decode error).
    InputFailed { reason: String },
    /// Output channel failed; the terminal may not have reached downstream.
    OutputFailed { reason: String },
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Completed)
    }

    /// Failure caused by a neighbour stopping first rather than by this component.
    pub fn is_knock_on(&self) -> bool {
        matches!(
            self,
            StageOutcome::InputFailed { .. } | StageOutcome::OutputFailed { .. }
        )
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Completed => f.write_str("completed"),
            StageOutcome::Interrupted => f.write_str("interrupted"),
            StageOutcome::Corrupted { start_row } => {
                write!(f, "data corrupted in batch (start_row={})", start_row)
            }
            StageOutcome::Malformed { start_row, reason } => {
                write!(f, "malformed batch (start_row={}): {}", start_row, reason)
            }
            StageOutcome::InputFailed { reason } => write!(f, "input failed: {}", reason),
            StageOutcome::OutputFailed { reason } => write!(f, "output failed: {}", reason),
        }
    }
}

/// Counters and final state for one stage.
#[derive(Clone, Debug, Serialize)]
pub struct StageReport {
    pub name: String,
    pub packets_in: usize,
    pub packets_out: usize,
    pub state: StageState,
    pub outcome: StageOutcome,
    pub elapsed_ms: u128,
}

/// What the sink applied to the output grid.
#[derive(Clone, Debug, Serialize)]
pub struct SinkReport {
    pub batches_applied: usize,
    pub rows_applied: usize,
    pub saw_terminal: bool,
    pub outcome: StageOutcome,
}

/// Aggregate result of one pipeline run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub width: usize,
    pub height: usize,
    pub batch_rows: usize,
    pub links: Vec<TransportKind>,
    pub integrity: IntegrityAlgo,
    pub stages: Vec<StageReport>,
    pub sink: Option<SinkReport>,
    pub elapsed_ms: u128,
}

impl RunReport {
    /// True when every stage and the sink completed normally.
    pub fn success(&self) -> bool {
        self.stages.iter().all(|s| s.outcome.is_success())
            && self.sink.as_ref().is_none_or(|s| s.outcome.is_success())
    }

    /// The failure that stopped the run, with the name of the component that reported it.
    /// Knock-on failures (a peer went away) only count when nothing else failed.
    pub fn first_failure(&self) -> Option<(String, StageOutcome)> {
        let failures: Vec<(String, StageOutcome)> = self
            .stages
            .iter()
            .map(|s| (s.name.clone(), s.outcome.clone()))
            .chain(
                self.sink
                    .as_ref()
                    .map(|s| ("sink".to_string(), s.outcome.clone())),
            )
            .filter(|(_, o)| !o.is_success())
            .collect();
        failures
            .iter()
            .find(|(_, o)| !o.is_knock_on())
            .or_else(|| failures.first())
            .cloned()
    }
}

/// Lib options for [`sharpen_grid`](crate::sharpen_grid). Only the fields that apply when
/// the whole pipeline runs in this process.
#[derive(Clone, Debug)]
pub struct PipelineOpts {
    /// Rows per batch packet.
    pub batch_rows: usize,
    /// Queue capacity (packets) for queue links.
    pub capacity: usize,
    /// Transport for every inter-stage link unless `links` is set.
    pub transport: TransportKind,
    /// Per-link override (one entry per inter-stage link). Empty means "use `transport`".
    pub links: Vec<TransportKind>,
    /// Transport from the last stage to the sink.
    pub sink_transport: TransportKind,
    pub integrity: IntegrityAlgo,
    /// Sharpen scale factor.
    pub scale: u8,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            batch_rows: PipelineDefaults::BATCH_ROWS,
            capacity: PipelineDefaults::CAPACITY,
            transport: TransportKind::Queue,
            links: Vec::new(),
            sink_transport: TransportKind::Queue,
            integrity: IntegrityAlgo::Fnv1a,
            scale: PipelineDefaults::SCALE,
        }
    }
}

impl PipelineOpts {
    /// Transports for the `stages - 1` inter-stage links.
    pub fn link_transports(&self, stages: usize) -> Vec<TransportKind> {
        if self.links.is_empty() {
            vec![self.transport; stages.saturating_sub(1)]
        } else {
            self.links.clone()
        }
    }
}

impl From<&Opts> for PipelineOpts {
    fn from(o: &Opts) -> Self {
        o.pipeline.clone()
    }
}

/// Full options (CLI). Use [`PipelineOpts`] for lib.
#[derive(Clone, Debug)]
pub struct Opts {
    pub pipeline: PipelineOpts,
    /// Upstream host for `connect`.
    pub host: String,
    /// Port for `serve` / `connect`.
    pub port: u16,
    /// Number of stages run by the upstream side of a split deployment.
    pub split: usize,
    pub connect_attempts: u32,
    /// Show a progress bar over sink batches.
    pub progress: bool,
    pub verbose: bool,
    /// Write a JSON run report here.
    pub report: Option<PathBuf>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            pipeline: PipelineOpts::default(),
            host: NetDefaults::HOST.to_string(),
            port: NetDefaults::PORT,
            split: NetDefaults::SPLIT,
            connect_attempts: NetDefaults::CONNECT_ATTEMPTS,
            progress: false,
            verbose: false,
            report: None,
        }
    }
}
