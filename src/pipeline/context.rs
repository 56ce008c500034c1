//! Pipeline context: the reference grid plus validated options, shared by every way of
//! wiring the stages (all local, or split across a socket).

use log::warn;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::channel::{ChannelPair, LinkSpec, TransportKind, open_channel};
use crate::error::{ChannelError, ConfigError};
use crate::grid::Grid;
use crate::packet::IntegrityGuard;
use crate::stage::{BatchPlan, Stage, StageInput};
use crate::types::{PipelineOpts, StageKind};

/// Everything a run needs besides its channels.
pub struct PipelineContext {
    pub reference: Arc<Grid>,
    pub opts: PipelineOpts,
    pub guard: IntegrityGuard,
    pub interrupt: Option<Arc<AtomicBool>>,
}

impl PipelineContext {
    /// Validate `opts` and take ownership of the reference grid.
    pub fn new(reference: Arc<Grid>, opts: PipelineOpts) -> Result<Self, ConfigError> {
        if opts.batch_rows == 0 {
            return Err(ConfigError::ZeroBatch);
        }
        if opts.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !reference.has_interior() {
            warn!(
                "grid {}x{} has no interior; output will equal input",
                reference.width(),
                reference.height()
            );
        }
        let guard = IntegrityGuard::new(opts.integrity);
        Ok(Self {
            reference,
            opts,
            guard,
            interrupt: None,
        })
    }

    /// Source stage checks `flag` between batches.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Sizing shared by every link of this run.
    pub fn link_spec(&self) -> LinkSpec {
        LinkSpec {
            capacity: self.opts.capacity,
            max_rows: self.opts.batch_rows,
            cols_per_row: self.reference.interior_cols(),
        }
    }

    /// Source plan over the reference grid.
    pub fn plan(&self) -> StageInput {
        StageInput::Source(BatchPlan::new(&self.reference, self.opts.batch_rows))
    }

    /// Build stages for `kinds`. The first one gets the interrupt flag.
    pub fn build_stages(&self, kinds: &[StageKind]) -> Vec<Stage> {
        kinds
            .iter()
            .enumerate()
            .map(|(i, &kind)| {
                let stage = Stage::new(kind, self.opts.scale, self.guard);
                match (&self.interrupt, i) {
                    (Some(flag), 0) => stage.with_interrupt(Arc::clone(flag)),
                    _ => stage,
                }
            })
            .collect()
    }

    /// Transports for the links between `stages` stages, checked against the stage count.
    pub fn link_transports(&self, stages: usize) -> Result<Vec<TransportKind>, ConfigError> {
        if stages == 0 {
            return Err(ConfigError::NoStages);
        }
        let kinds = self.opts.link_transports(stages);
        if kinds.len() != stages - 1 {
            return Err(ConfigError::LinkCount {
                stages,
                expected: stages - 1,
                actual: kinds.len(),
            });
        }
        Ok(kinds)
    }

    /// Open one channel per transport.
    pub fn open_links(&self, kinds: &[TransportKind]) -> Result<Vec<ChannelPair>, ChannelError> {
        let spec = self.link_spec();
        kinds.iter().map(|&k| open_channel(k, &spec)).collect()
    }

    /// Channel from the last stage into the sink.
    pub fn open_sink_link(&self) -> Result<ChannelPair, ChannelError> {
        open_channel(self.opts.sink_transport, &self.link_spec())
    }
}
