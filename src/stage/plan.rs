//! Batch plan: how the source stage cuts the grid interior into row ranges, and the geometry
//! every downstream stage checks incoming packets against.

use crate::grid::Grid;
use crate::packet::BatchPacket;

/// Row ranges `(start_row, row_count)` covering interior rows `1..height-1` in order.
#[derive(Clone, Debug)]
pub struct BatchPlan {
    next: usize,
    end: usize,
    batch_rows: usize,
    cols_per_row: u32,
}

impl BatchPlan {
    /// Plan for `grid`. Empty when the grid has no interior.
    pub fn new(grid: &Grid, batch_rows: usize) -> Self {
        let (next, end) = if grid.has_interior() {
            (1, grid.height() - 1)
        } else {
            (0, 0)
        };
        Self {
            next,
            end,
            batch_rows: batch_rows.max(1),
            cols_per_row: grid.interior_cols() as u32,
        }
    }

    pub fn cols_per_row(&self) -> u32 {
        self.cols_per_row
    }

    /// Number of batches still to come.
    pub fn remaining(&self) -> usize {
        (self.end - self.next).div_ceil(self.batch_rows)
    }

    /// Number of batches a grid of `grid` produces with `batch_rows` rows per batch.
    pub fn batch_count(grid: &Grid, batch_rows: usize) -> usize {
        Self::new(grid, batch_rows).remaining()
    }
}

impl Iterator for BatchPlan {
    type Item = (i32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let take = self.batch_rows.min(self.end - self.next);
        let item = (self.next as i32, take as u32);
        self.next += take;
        Some(item)
    }
}

/// Shape every data packet on a link must have for `grid`, plus the row expected next.
#[derive(Clone, Debug)]
pub struct Geometry {
    cols_per_row: u32,
    first_row: i32,
    end_row: i32,
    next_row: i32,
}

impl Geometry {
    pub fn new(grid: &Grid) -> Self {
        Self {
            cols_per_row: grid.interior_cols() as u32,
            first_row: 1,
            end_row: grid.height().saturating_sub(1) as i32,
            next_row: 1,
        }
    }

    /// Check `packet` against the grid and the contiguity rule, then advance the expected row.
    pub fn accept(&mut self, packet: &BatchPacket) -> Result<(), String> {
        if packet.cols_per_row != self.cols_per_row {
            return Err(format!(
                "cols_per_row {} does not match grid ({})",
                packet.cols_per_row, self.cols_per_row
            ));
        }
        if self.cols_per_row == 0 || self.first_row >= self.end_row {
            return Err("grid has no interior".to_string());
        }
        if packet.row_count == 0 {
            return Err("empty batch".to_string());
        }
        if packet.start_row < self.first_row || packet.end_row() > self.end_row {
            return Err(format!(
                "rows {}..{} outside interior {}..{}",
                packet.start_row,
                packet.end_row(),
                self.first_row,
                self.end_row
            ));
        }
        if packet.start_row != self.next_row {
            return Err(format!(
                "expected batch at row {}, got {}",
                self.next_row, packet.start_row
            ));
        }
        if packet.payload.len() != packet.expected_payload_len() {
            return Err(format!(
                "payload is {} bytes, header implies {}",
                packet.payload.len(),
                packet.expected_payload_len()
            ));
        }
        self.next_row = packet.end_row();
        Ok(())
    }
}
