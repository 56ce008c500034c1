//! Batch packets: the unit moved through every channel.
//!
//! A packet is a contiguous run of image rows with their interior-column pixels, or the
//! terminal sentinel that ends a stream.

pub mod codec;
pub mod integrity;

pub use codec::{
    HEADER_LEN, PacketHeader, decode, decode_header, decode_text, encode, encode_slot, encode_text,
    packet_from_parts, slot_len,
};
pub use integrity::{IntegrityAlgo, IntegrityGuard};

use crate::utils::config::CHANNELS;

/// `start_row` carried by the terminal packet.
pub const TERMINAL_ROW: i32 = -1;

/// One batch of rows (or the end-of-stream sentinel).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchPacket {
    /// First absolute image row in this batch; [`TERMINAL_ROW`] for the sentinel.
    pub start_row: i32,
    pub row_count: u32,
    /// Interior columns per row (image width - 2).
    pub cols_per_row: u32,
    /// Row-major, then column, then channel.
    pub payload: Vec<u8>,
    /// Position-salted content hash; 0 when integrity is off.
    pub integrity_tag: u64,
    pub is_terminal: bool,
}

impl BatchPacket {
    /// Zero-filled data packet sized for `row_count * cols_per_row` pixels.
    pub fn new(start_row: i32, row_count: u32, cols_per_row: u32) -> Self {
        let len = payload_len(row_count, cols_per_row);
        Self {
            start_row,
            row_count,
            cols_per_row,
            payload: vec![0; len],
            integrity_tag: 0,
            is_terminal: false,
        }
    }

    /// The canonical end-of-stream sentinel.
    pub fn terminal() -> Self {
        Self {
            start_row: TERMINAL_ROW,
            row_count: 0,
            cols_per_row: 0,
            payload: Vec::new(),
            integrity_tag: 0,
            is_terminal: true,
        }
    }

    /// Payload length implied by the header fields.
    pub fn expected_payload_len(&self) -> usize {
        payload_len(self.row_count, self.cols_per_row)
    }

    /// One past the last row covered by this batch.
    pub fn end_row(&self) -> i32 {
        self.start_row.saturating_add(self.row_count as i32)
    }

    /// Bytes of one row in the payload.
    pub fn row_stride(&self) -> usize {
        self.cols_per_row as usize * CHANNELS
    }

    /// Short label for logs.
    pub fn describe(&self) -> String {
        if self.is_terminal {
            "terminal".to_string()
        } else {
            format!(
                "rows {}..{} ({} cols)",
                self.start_row,
                self.end_row(),
                self.cols_per_row
            )
        }
    }
}

/// Payload bytes for a batch of `rows` x `cols` pixels.
pub fn payload_len(rows: u32, cols: u32) -> usize {
    rows as usize * cols as usize * CHANNELS
}
