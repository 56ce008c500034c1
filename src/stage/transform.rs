//! Pure per-batch transforms. Rows inside a batch are independent, so they run in parallel.

use rayon::prelude::*;
use std::sync::Arc;

use crate::grid::Grid;
use crate::packet::BatchPacket;
use crate::types::StageKind;
use crate::utils::config::CHANNELS;

/// A stage's computation: build the output batch for `input`'s rows, reading the full
/// reference grid by absolute row/column where needed. Must not mutate shared state.
pub trait Transform: Send + Sync {
    fn apply(&self, input: &BatchPacket, reference: &Grid) -> BatchPacket;
}

/// Build an output batch with `input`'s geometry, filling each row with
/// `f(absolute_row, input_row, output_row)`.
fn map_rows<F>(input: &BatchPacket, f: F) -> BatchPacket
where
    F: Fn(usize, &[u8], &mut [u8]) + Sync,
{
    let mut out = BatchPacket::new(input.start_row, input.row_count, input.cols_per_row);
    let stride = input.row_stride();
    if stride == 0 {
        return out;
    }
    let start = input.start_row as usize;
    out.payload
        .par_chunks_mut(stride)
        .zip(input.payload.par_chunks(stride))
        .enumerate()
        .for_each(|(r_off, (out_row, in_row))| f(start + r_off, in_row, out_row));
    out
}

/// 3x3 neighborhood mean per channel (truncating integer division).
pub struct Smooth;

impl Transform for Smooth {
    fn apply(&self, input: &BatchPacket, reference: &Grid) -> BatchPacket {
        map_rows(input, |row, _, out_row| {
            for (c, px) in out_row.chunks_exact_mut(CHANNELS).enumerate() {
                let col = c + 1;
                for (ch, slot) in px.iter_mut().enumerate() {
                    let mut sum = 0u32;
                    for rr in row - 1..=row + 1 {
                        for cc in col - 1..=col + 1 {
                            sum += u32::from(reference.channel(rr, cc, ch));
                        }
                    }
                    *slot = (sum / 9) as u8;
                }
            }
        })
    }
}

/// `max(0, original - smoothed)` per channel.
pub struct Detail;

impl Transform for Detail {
    fn apply(&self, input: &BatchPacket, reference: &Grid) -> BatchPacket {
        map_rows(input, |row, in_row, out_row| {
            for (i, (out, &smoothed)) in out_row.iter_mut().zip(in_row).enumerate() {
                let col = i / CHANNELS + 1;
                let original = reference.channel(row, col, i % CHANNELS);
                *out = original.saturating_sub(smoothed);
            }
        })
    }
}

/// `clamp(original + scale * detail, 0, 255)` per channel.
pub struct Sharpen {
    pub scale: u8,
}

impl Transform for Sharpen {
    fn apply(&self, input: &BatchPacket, reference: &Grid) -> BatchPacket {
        let scale = u32::from(self.scale);
        map_rows(input, |row, in_row, out_row| {
            for (i, (out, &detail)) in out_row.iter_mut().zip(in_row).enumerate() {
                let col = i / CHANNELS + 1;
                let original = u32::from(reference.channel(row, col, i % CHANNELS));
                *out = (original + scale * u32::from(detail)).min(255) as u8;
            }
        })
    }
}

/// Transform for a standard stage.
pub fn transform_for(kind: StageKind, scale: u8) -> Arc<dyn Transform> {
    match kind {
        StageKind::Smooth => Arc::new(Smooth),
        StageKind::Detail => Arc::new(Detail),
        StageKind::Sharpen => Arc::new(Sharpen { scale }),
    }
}
