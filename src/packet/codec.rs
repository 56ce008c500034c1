//! Wire framing for batch packets.
//!
//! Layout (little-endian, fixed header so a reader needs exactly two reads per frame):
//!
//! ```text
//! [ start_row     i32 ]
//! [ row_count     i32 ]
//! [ cols_per_row  i32 ]
//! [ integrity_tag u64 ]
//! [ is_terminal   u8  ]
//! [ payload (row_count * cols_per_row * 3) ]
//! ```
//!
//! Shared-memory slots pad the payload with zeros up to a fixed maximum so every exchange
//! copies the same number of bytes.

use byteorder::{ByteOrder, LittleEndian};

use super::{BatchPacket, payload_len};
use crate::error::{ChannelError, DecodeError};
use crate::utils::config::MAX_PAYLOAD_BYTES;

/// Fixed header size in bytes.
pub const HEADER_LEN: usize = 4 // start_row
    + 4  // row_count
    + 4  // cols_per_row
    + 8  // integrity_tag
    + 1; // is_terminal

/// Parsed frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    pub start_row: i32,
    pub row_count: u32,
    pub cols_per_row: u32,
    pub integrity_tag: u64,
    pub is_terminal: bool,
}

impl PacketHeader {
    /// Payload bytes that follow this header (0 for a terminal).
    pub fn payload_len(&self) -> usize {
        if self.is_terminal {
            0
        } else {
            payload_len(self.row_count, self.cols_per_row)
        }
    }
}

/// Size of a fixed shared-memory slot for batches of up to `max_rows` rows.
pub fn slot_len(max_rows: usize, cols_per_row: usize) -> usize {
    HEADER_LEN + payload_len(max_rows as u32, cols_per_row as u32)
}

fn write_header(packet: &BatchPacket, out: &mut [u8]) {
    LittleEndian::write_i32(&mut out[0..4], packet.start_row);
    LittleEndian::write_i32(&mut out[4..8], packet.row_count as i32);
    LittleEndian::write_i32(&mut out[8..12], packet.cols_per_row as i32);
    LittleEndian::write_u64(&mut out[12..20], packet.integrity_tag);
    out[20] = u8::from(packet.is_terminal);
}

/// Encode a packet into a variable-length frame (header + payload).
pub fn encode(packet: &BatchPacket) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_LEN + packet.payload.len()];
    write_header(packet, &mut out[..HEADER_LEN]);
    out[HEADER_LEN..].copy_from_slice(&packet.payload);
    out
}

/// Encode a packet into a fixed-size slot, zero-padding the unused payload tail.
pub fn encode_slot(packet: &BatchPacket, slot: &mut [u8]) -> Result<(), ChannelError> {
    let used = HEADER_LEN + packet.payload.len();
    if used > slot.len() {
        return Err(ChannelError::Oversized {
            len: used,
            slot: slot.len(),
        });
    }
    write_header(packet, &mut slot[..HEADER_LEN]);
    slot[HEADER_LEN..used].copy_from_slice(&packet.payload);
    slot[used..].fill(0);
    Ok(())
}

/// Parse the fixed header at the start of `wire`.
pub fn decode_header(wire: &[u8]) -> Result<PacketHeader, DecodeError> {
    if wire.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            expected: HEADER_LEN,
            actual: wire.len(),
        });
    }

    let start_row = LittleEndian::read_i32(&wire[0..4]);
    let row_count = LittleEndian::read_i32(&wire[4..8]);
    let cols_per_row = LittleEndian::read_i32(&wire[8..12]);
    let integrity_tag = LittleEndian::read_u64(&wire[12..20]);
    let is_terminal = match wire[20] {
        0 => false,
        1 => true,
        other => return Err(DecodeError::InvalidTerminalFlag(other)),
    };

    if is_terminal {
        return Ok(PacketHeader {
            start_row,
            row_count: 0,
            cols_per_row: 0,
            integrity_tag,
            is_terminal,
        });
    }

    for (field, value) in [
        ("start_row", start_row),
        ("row_count", row_count),
        ("cols_per_row", cols_per_row),
    ] {
        if value < 0 {
            return Err(DecodeError::NegativeField { field, value });
        }
    }

    let header = PacketHeader {
        start_row,
        row_count: row_count as u32,
        cols_per_row: cols_per_row as u32,
        integrity_tag,
        is_terminal,
    };
    let len = header.payload_len();
    if len > MAX_PAYLOAD_BYTES {
        return Err(DecodeError::PayloadTooLarge {
            len,
            limit: MAX_PAYLOAD_BYTES,
        });
    }
    Ok(header)
}

/// Build a packet from an already parsed header and its payload bytes.
pub fn packet_from_parts(header: PacketHeader, payload: Vec<u8>) -> BatchPacket {
    if header.is_terminal {
        return BatchPacket::terminal();
    }
    BatchPacket {
        start_row: header.start_row,
        row_count: header.row_count,
        cols_per_row: header.cols_per_row,
        payload,
        integrity_tag: header.integrity_tag,
        is_terminal: false,
    }
}

/// Decode one frame. Trailing bytes past the declared payload (slot padding) are ignored.
pub fn decode(wire: &[u8]) -> Result<BatchPacket, DecodeError> {
    let header = decode_header(wire)?;
    let expected = HEADER_LEN + header.payload_len();
    if wire.len() < expected {
        return Err(DecodeError::Truncated {
            expected,
            actual: wire.len(),
        });
    }
    Ok(packet_from_parts(
        header,
        wire[HEADER_LEN..expected].to_vec(),
    ))
}

/// Human-readable form: `start rows cols tag last px px ... #`. For debugging transports.
pub fn encode_text(packet: &BatchPacket) -> String {
    let mut out = format!(
        "{} {} {} {} {} ",
        packet.start_row,
        packet.row_count,
        packet.cols_per_row,
        packet.integrity_tag,
        u8::from(packet.is_terminal)
    );
    for px in &packet.payload {
        out.push_str(&px.to_string());
        out.push(' ');
    }
    out.push('#');
    out
}

fn next_field<T: std::str::FromStr>(
    tokens: &mut std::str::SplitWhitespace<'_>,
    name: &str,
) -> Result<T, DecodeError> {
    tokens
        .next()
        .ok_or_else(|| DecodeError::Text(format!("missing {name}")))?
        .parse()
        .map_err(|_| DecodeError::Text(format!("bad {name}")))
}

/// Inverse of [`encode_text`].
pub fn decode_text(text: &str) -> Result<BatchPacket, DecodeError> {
    let mut tokens = text.split_whitespace();
    let start_row: i32 = next_field(&mut tokens, "start_row")?;
    let row_count: u32 = next_field(&mut tokens, "row_count")?;
    let cols_per_row: u32 = next_field(&mut tokens, "cols_per_row")?;
    let integrity_tag: u64 = next_field(&mut tokens, "integrity_tag")?;
    let last: u8 = next_field(&mut tokens, "is_terminal")?;
    let is_terminal = match last {
        0 => false,
        1 => true,
        other => return Err(DecodeError::InvalidTerminalFlag(other)),
    };

    let mut payload = Vec::new();
    let mut closed = false;
    for token in tokens.by_ref() {
        if token == "#" {
            closed = true;
            break;
        }
        let px: u8 = token
            .parse()
            .map_err(|_| DecodeError::Text(format!("bad pixel value {token:?}")))?;
        payload.push(px);
    }
    if !closed {
        return Err(DecodeError::Text("missing '#' delimiter".to_string()));
    }
    if is_terminal {
        return Ok(BatchPacket::terminal());
    }

    let expected = payload_len(row_count, cols_per_row);
    if payload.len() != expected {
        return Err(DecodeError::Truncated {
            expected,
            actual: payload.len(),
        });
    }
    Ok(BatchPacket {
        start_row,
        row_count,
        cols_per_row,
        payload,
        integrity_tag,
        is_terminal,
    })
}
