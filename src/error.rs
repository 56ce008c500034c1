//! Error taxonomy for codec, transport, grid I/O and pipeline construction.
//!
//! Everything below the CLI returns one of these typed errors; the CLI wraps them in
//! `anyhow` with context.

use std::io;
use thiserror::Error;

/// Malformed or truncated frame. A reading stage treats this like a terminal packet.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("negative {field} in frame header: {value}")]
    NegativeField { field: &'static str, value: i32 },

    #[error("invalid terminal flag: {0}")]
    InvalidTerminalFlag(u8),

    #[error("declared payload of {len} bytes exceeds limit of {limit}")]
    PayloadTooLarge { len: usize, limit: usize },

    #[error("malformed text packet: {0}")]
    Text(String),
}

/// Failure of a channel operation. Surfaced to the caller of `push`/`pop`.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The other endpoint is gone (dropped queue end, closed pipe, socket EOF at a frame boundary).
    #[error("channel peer disconnected")]
    Disconnected,

    #[error("frame decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("packet needs {len} bytes but the slot holds {slot}")]
    Oversized { len: usize, slot: usize },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("handshake rejected: {0}")]
    Rejected(#[from] ConfigError),

    #[error("transport I/O: {0}")]
    Io(#[from] io::Error),
}

impl ChannelError {
    /// Map an I/O error to `Disconnected` when it only means the peer went away.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof => ChannelError::Disconnected,
            _ => ChannelError::Io(err),
        }
    }
}

/// Reading or writing a PPM grid.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("unsupported image format {0:?} (expected P3 or P6)")]
    UnsupportedFormat(String),

    #[error("bad image header: {0}")]
    Header(String),

    #[error("max value {0} is not supported (must be 1..=255)")]
    MaxValue(u32),

    #[error("pixel data truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("image I/O: {0}")]
    Io(#[from] io::Error),
}

/// Configuration problem detected at pipeline construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("batch size must be at least 1 row")]
    ZeroBatch,

    #[error("channel capacity must be at least 1")]
    ZeroCapacity,

    #[error("pipeline needs at least one stage")]
    NoStages,

    #[error("expected {expected} link transports for {stages} stages, got {actual}")]
    LinkCount {
        stages: usize,
        expected: usize,
        actual: usize,
    },

    #[error("split point {split} out of range 1..={stages}")]
    Split { split: usize, stages: usize },

    #[error("unknown {what} {value:?}")]
    Unknown { what: &'static str, value: String },

    #[error("peer configuration mismatch: {0}")]
    PeerMismatch(String),
}
