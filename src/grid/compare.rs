//! Pixel-by-pixel comparison of two grids' interiors.

use serde::Serialize;
use std::fmt;

use super::Grid;
use crate::utils::config::CHANNELS;

/// First differing sample, or a dimension difference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Mismatch {
    Dimensions {
        left: (usize, usize),
        right: (usize, usize),
    },
    Pixel {
        row: usize,
        col: usize,
        channel: usize,
        left: u8,
        right: u8,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Dimensions { left, right } => write!(
                f,
                "dimensions differ: {}x{} vs {}x{}",
                left.0, left.1, right.0, right.1
            ),
            Mismatch::Pixel {
                row,
                col,
                channel,
                left,
                right,
            } => write!(
                f,
                "pixel ({}, {}) channel {}: {} vs {}",
                row, col, channel, left, right
            ),
        }
    }
}

/// Scan interior pixels (border rows/columns excluded) in row-major order and return the first
/// difference, or `None` when the interiors are identical.
pub fn first_interior_mismatch(left: &Grid, right: &Grid) -> Option<Mismatch> {
    if left.width() != right.width() || left.height() != right.height() {
        return Some(Mismatch::Dimensions {
            left: (left.width(), left.height()),
            right: (right.width(), right.height()),
        });
    }
    for row in 1..left.height().saturating_sub(1) {
        for col in 1..left.width().saturating_sub(1) {
            for channel in 0..CHANNELS {
                let (a, b) = (
                    left.channel(row, col, channel),
                    right.channel(row, col, channel),
                );
                if a != b {
                    return Some(Mismatch::Pixel {
                        row,
                        col,
                        channel,
                        left: a,
                        right: b,
                    });
                }
            }
        }
    }
    None
}
