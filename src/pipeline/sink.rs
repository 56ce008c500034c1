//! The sink: sole writer of the output grid.

use log::{debug, error, warn};

use crate::channel::PacketReceiver;
use crate::grid::Grid;
use crate::packet::IntegrityGuard;
use crate::stage::Geometry;
use crate::types::{SinkReport, StageOutcome};

/// Callback invoked with the number of batches applied since the last call.
pub type BatchCallback = Box<dyn Fn(usize) + Send>;

/// Drain `rx` into `output` until the terminal packet. Each verified data packet overwrites
/// its declared interior rows; the first corrupt or malformed packet stops the sink so no
/// partial garbage is written past it.
pub fn collect_into(
    rx: &mut dyn PacketReceiver,
    output: &mut Grid,
    guard: IntegrityGuard,
    on_batch: Option<&BatchCallback>,
) -> SinkReport {
    let mut geometry = Geometry::new(output);
    let mut batches_applied = 0;
    let mut rows_applied = 0;

    let (saw_terminal, outcome) = loop {
        let packet = match rx.pop() {
            Ok(p) => p,
            Err(e) => {
                warn!("sink: input failed, treating as end of stream: {}", e);
                break (
                    false,
                    StageOutcome::InputFailed {
                        reason: e.to_string(),
                    },
                );
            }
        };
        if packet.is_terminal {
            break (true, StageOutcome::Completed);
        }
        if !guard.verify(&packet) {
            error!("sink: data corrupted in {}", packet.describe());
            break (
                false,
                StageOutcome::Corrupted {
                    start_row: packet.start_row,
                },
            );
        }
        if let Err(reason) = geometry.accept(&packet) {
            error!("sink: rejected {}: {}", packet.describe(), reason);
            break (
                false,
                StageOutcome::Malformed {
                    start_row: packet.start_row,
                    reason,
                },
            );
        }

        let stride = packet.row_stride();
        for (r_off, row) in packet.payload.chunks_exact(stride).enumerate() {
            output
                .interior_row_mut(packet.start_row as usize + r_off)
                .copy_from_slice(row);
        }
        batches_applied += 1;
        rows_applied += packet.row_count as usize;
        if let Some(cb) = on_batch {
            cb(1);
        }
    };

    debug!(
        "sink: {} batches / {} rows applied, terminal seen: {}",
        batches_applied, rows_applied, saw_terminal
    );
    SinkReport {
        batches_applied,
        rows_applied,
        saw_terminal,
        outcome,
    }
}
