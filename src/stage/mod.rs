//! Pipeline stages: one worker loop shared by every transform and every transport.
//!
//! A stage pops a packet (or, as the source, takes the next row range from its plan),
//! verifies it, applies its transform, seals the result and pushes it. Whatever ends the
//! loop (terminal input, corruption, a broken channel, an interrupt) the stage then pushes
//! exactly one terminal packet and finishes.

pub mod plan;
pub mod transform;

pub use plan::{BatchPlan, Geometry};
pub use transform::{Detail, Sharpen, Smooth, Transform, transform_for};

use log::{debug, error, trace, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::channel::{PacketReceiver, PacketSender};
use crate::grid::Grid;
use crate::packet::{BatchPacket, IntegrityGuard};
use crate::types::{StageKind, StageOutcome, StageReport, StageState};

/// Where a stage gets its batches from.
pub enum StageInput {
    /// First stage: generate row ranges from the reference grid.
    Source(BatchPlan),
    /// Every later stage: pop from the upstream channel.
    Channel(Box<dyn PacketReceiver>),
}

/// One pipeline worker.
pub struct Stage {
    name: String,
    transform: Arc<dyn Transform>,
    guard: IntegrityGuard,
    interrupt: Option<Arc<AtomicBool>>,
}

/// Mutable bookkeeping for one run.
struct Progress {
    state: StageState,
    packets_in: usize,
    packets_out: usize,
}

impl Stage {
    /// Standard stage for `kind`.
    pub fn new(kind: StageKind, scale: u8, guard: IntegrityGuard) -> Self {
        Self::with_transform(kind.name(), transform_for(kind, scale), guard)
    }

    /// Stage around any transform.
    pub fn with_transform(
        name: impl Into<String>,
        transform: Arc<dyn Transform>,
        guard: IntegrityGuard,
    ) -> Self {
        Self {
            name: name.into(),
            transform,
            guard,
            interrupt: None,
        }
    }

    /// Let the source stop early (and still terminate the stream) once `flag` is set.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run on a dedicated thread named after the stage.
    pub fn spawn(
        self,
        input: StageInput,
        mut output: Box<dyn PacketSender>,
        reference: Arc<Grid>,
    ) -> std::io::Result<JoinHandle<StageReport>> {
        thread::Builder::new()
            .name(format!("stage-{}", self.name))
            .spawn(move || self.run(input, output.as_mut(), &reference))
    }

    /// Run the stage loop to completion on the current thread.
    pub fn run(
        &self,
        input: StageInput,
        output: &mut dyn PacketSender,
        reference: &Grid,
    ) -> StageReport {
        let started = Instant::now();
        let mut progress = Progress {
            state: StageState::Running,
            packets_in: 0,
            packets_out: 0,
        };
        debug!(
            "{}: start ({} -> {})",
            self.name,
            match &input {
                StageInput::Source(_) => "source".to_string(),
                StageInput::Channel(rx) => rx.transport().to_string(),
            },
            output.transport()
        );

        let outcome = match input {
            StageInput::Source(plan) => self.produce(plan, output, reference, &mut progress),
            StageInput::Channel(mut rx) => {
                self.relay(rx.as_mut(), output, reference, &mut progress)
            }
        };

        progress.state = StageState::ForwardTerminal;
        let outcome = match output.push(BatchPacket::terminal()) {
            Ok(()) => {
                progress.packets_out += 1;
                outcome
            }
            Err(e) => {
                warn!("{}: could not forward terminal: {}", self.name, e);
                match outcome {
                    StageOutcome::Completed | StageOutcome::Interrupted => {
                        StageOutcome::OutputFailed {
                            reason: e.to_string(),
                        }
                    }
                    other => other,
                }
            }
        };
        progress.state = StageState::Done;

        debug!(
            "{}: done, {} in / {} out, {:?}",
            self.name, progress.packets_in, progress.packets_out, outcome
        );
        StageReport {
            name: self.name.clone(),
            packets_in: progress.packets_in,
            packets_out: progress.packets_out,
            state: progress.state,
            outcome,
            elapsed_ms: started.elapsed().as_millis(),
        }
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
    }

    /// Transform, seal and push one batch. Returns the failure outcome if the push fails.
    fn emit(
        &self,
        input: &BatchPacket,
        output: &mut dyn PacketSender,
        reference: &Grid,
        progress: &mut Progress,
    ) -> Result<(), StageOutcome> {
        let mut out = self.transform.apply(input, reference);
        self.guard.seal(&mut out);
        match output.push(out) {
            Ok(()) => {
                progress.packets_out += 1;
                Ok(())
            }
            Err(e) => {
                error!(
                    "{}: push failed for batch at row {}: {}",
                    self.name, input.start_row, e
                );
                Err(StageOutcome::OutputFailed {
                    reason: e.to_string(),
                })
            }
        }
    }

    fn produce(
        &self,
        plan: BatchPlan,
        output: &mut dyn PacketSender,
        reference: &Grid,
        progress: &mut Progress,
    ) -> StageOutcome {
        if plan.cols_per_row() == 0 || !reference.has_interior() {
            warn!(
                "{}: grid {}x{} has no interior, emitting terminal only",
                self.name,
                reference.width(),
                reference.height()
            );
            return StageOutcome::Completed;
        }
        let cols = plan.cols_per_row();
        for (start_row, row_count) in plan {
            if self.interrupted() {
                warn!("{}: interrupted before row {}", self.name, start_row);
                return StageOutcome::Interrupted;
            }
            let batch = BatchPacket::new(start_row, row_count, cols);
            if let Err(outcome) = self.emit(&batch, output, reference, progress) {
                return outcome;
            }
        }
        StageOutcome::Completed
    }

    fn relay(
        &self,
        input: &mut dyn PacketReceiver,
        output: &mut dyn PacketSender,
        reference: &Grid,
        progress: &mut Progress,
    ) -> StageOutcome {
        let mut geometry = Geometry::new(reference);
        loop {
            let packet = match input.pop() {
                Ok(p) => p,
                Err(e) => {
                    warn!("{}: input failed, treating as end of stream: {}", self.name, e);
                    return StageOutcome::InputFailed {
                        reason: e.to_string(),
                    };
                }
            };
            progress.packets_in += 1;
            trace!("{}: received {}", self.name, packet.describe());
            if packet.is_terminal {
                return StageOutcome::Completed;
            }
            if !self.guard.verify(&packet) {
                error!("{}: data corrupted in {}", self.name, packet.describe());
                return StageOutcome::Corrupted {
                    start_row: packet.start_row,
                };
            }
            if let Err(reason) = geometry.accept(&packet) {
                error!("{}: rejected {}: {}", self.name, packet.describe(), reason);
                return StageOutcome::Malformed {
                    start_row: packet.start_row,
                    reason,
                };
            }
            if let Err(outcome) = self.emit(&packet, output, reference, progress) {
                return outcome;
            }
        }
    }
}
