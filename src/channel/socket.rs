//! TCP socket backend plus the configuration handshake used by split deployments.
//!
//! Framing is identical to the pipe backend. Before any packet flows, the upstream side
//! offers its grid dimensions, batch size, integrity algorithm and split point; the
//! downstream side compares them with its own configuration and answers with one ack byte.

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info, warn};
use std::io::Write;
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use super::TransportKind;
use super::stream::{FramedReader, FramedWriter, read_full};
use crate::error::{ChannelError, ConfigError};
use crate::packet::IntegrityAlgo;

pub type SocketSender = FramedWriter<TcpStream>;
pub type SocketReceiver = FramedReader<TcpStream>;

const HANDSHAKE_MAGIC: [u8; 4] = *b"PXF1";
const ACK_ACCEPT: u8 = 1;
const ACK_REJECT: u8 = 0;

/// Stream configuration both sides must agree on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Handshake {
    pub width: u32,
    pub height: u32,
    pub batch_rows: u32,
    pub integrity: IntegrityAlgo,
    /// Number of stages the upstream side runs.
    pub split: u32,
}

impl Handshake {
    pub const LEN: usize = 4 // magic
        + 4  // width
        + 4  // height
        + 4  // batch_rows
        + 1  // integrity
        + 4; // split

    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0..4].copy_from_slice(&HANDSHAKE_MAGIC);
        LittleEndian::write_u32(&mut out[4..8], self.width);
        LittleEndian::write_u32(&mut out[8..12], self.height);
        LittleEndian::write_u32(&mut out[12..16], self.batch_rows);
        out[16] = self.integrity.wire_id();
        LittleEndian::write_u32(&mut out[17..21], self.split);
        out
    }

    pub fn decode(wire: &[u8]) -> Result<Self, ChannelError> {
        if wire.len() < Self::LEN {
            return Err(ChannelError::Handshake(format!(
                "short handshake ({} of {} bytes)",
                wire.len(),
                Self::LEN
            )));
        }
        if wire[0..4] != HANDSHAKE_MAGIC {
            return Err(ChannelError::Handshake(format!(
                "bad magic {:?}",
                &wire[0..4]
            )));
        }
        let integrity = IntegrityAlgo::from_wire_id(wire[16]).ok_or_else(|| {
            ChannelError::Handshake(format!("unknown integrity id {}", wire[16]))
        })?;
        Ok(Self {
            width: LittleEndian::read_u32(&wire[4..8]),
            height: LittleEndian::read_u32(&wire[8..12]),
            batch_rows: LittleEndian::read_u32(&wire[12..16]),
            integrity,
            split: LittleEndian::read_u32(&wire[17..21]),
        })
    }

    /// Describe the first field where `peer` disagrees with `self`.
    pub fn mismatch(&self, peer: &Handshake) -> Option<ConfigError> {
        let msg = if (self.width, self.height) != (peer.width, peer.height) {
            format!(
                "grid {}x{} vs peer {}x{}",
                self.width, self.height, peer.width, peer.height
            )
        } else if self.batch_rows != peer.batch_rows {
            format!("batch rows {} vs peer {}", self.batch_rows, peer.batch_rows)
        } else if self.integrity != peer.integrity {
            format!("integrity {} vs peer {}", self.integrity, peer.integrity)
        } else if self.split != peer.split {
            format!("split {} vs peer {}", self.split, peer.split)
        } else {
            return None;
        };
        Some(ConfigError::PeerMismatch(msg))
    }
}

/// Upstream side: send our configuration and wait for the peer's verdict.
pub fn offer_handshake(stream: &mut TcpStream, local: &Handshake) -> Result<(), ChannelError> {
    stream
        .write_all(&local.encode())
        .map_err(ChannelError::from_io)?;
    let mut ack = [0u8; 1];
    if read_full(stream, &mut ack).map_err(ChannelError::from_io)? == 0 {
        return Err(ChannelError::Disconnected);
    }
    match ack[0] {
        ACK_ACCEPT => Ok(()),
        _ => {
            let reason = "downstream rejected configuration".to_string();
            Err(ConfigError::PeerMismatch(reason).into())
        }
    }
}

/// Downstream side: read the peer's configuration, compare it with ours, answer.
pub fn answer_handshake(stream: &mut TcpStream, local: &Handshake) -> Result<(), ChannelError> {
    let mut wire = [0u8; Handshake::LEN];
    let got = read_full(stream, &mut wire).map_err(ChannelError::from_io)?;
    let peer = Handshake::decode(&wire[..got])?;
    match local.mismatch(&peer) {
        None => {
            stream
                .write_all(&[ACK_ACCEPT])
                .map_err(ChannelError::from_io)?;
            Ok(())
        }
        Some(err) => {
            // Best effort: the peer learns about the rejection, we report the real reason.
            let _ = stream.write_all(&[ACK_REJECT]);
            Err(err.into())
        }
    }
}

fn prepare(stream: &TcpStream) -> Result<(), ChannelError> {
    stream.set_nodelay(true)?;
    Ok(())
}

/// Connected sender/receiver over 127.0.0.1, for socket links inside one process.
pub fn loopback_pair() -> Result<(SocketSender, SocketReceiver), ChannelError> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    let addr = listener.local_addr()?;
    let client = TcpStream::connect(addr)?;
    let (server, _) = listener.accept()?;
    prepare(&client)?;
    prepare(&server)?;
    Ok((
        FramedWriter::new(server, TransportKind::Socket),
        FramedReader::new(client, TransportKind::Socket),
    ))
}

/// Bind, accept exactly one downstream peer and complete the handshake as the sender.
pub fn serve_one(listener: &TcpListener, local: &Handshake) -> Result<SocketSender, ChannelError> {
    info!("waiting for downstream peer on {}", listener.local_addr()?);
    let (mut stream, peer) = listener.accept()?;
    info!("downstream peer connected from {}", peer);
    prepare(&stream)?;
    offer_handshake(&mut stream, local)?;
    Ok(FramedWriter::new(stream, TransportKind::Socket))
}

/// Connect to an upstream peer, retrying while it is not listening yet, then complete the
/// handshake as the receiver.
pub fn connect_upstream<A: ToSocketAddrs + std::fmt::Debug>(
    addr: A,
    local: &Handshake,
    attempts: u32,
    retry_delay: Duration,
) -> Result<SocketReceiver, ChannelError> {
    let attempts = attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        match TcpStream::connect(&addr) {
            Ok(mut stream) => {
                info!("connected to upstream {:?}", addr);
                prepare(&stream)?;
                answer_handshake(&mut stream, local)?;
                return Ok(FramedReader::new(stream, TransportKind::Socket));
            }
            Err(e) => {
                debug!("connect attempt {}/{} failed: {}", attempt, attempts, e);
                last_err = Some(e);
                if attempt < attempts {
                    thread::sleep(retry_delay);
                }
            }
        }
    }
    warn!("giving up on upstream {:?} after {} attempts", addr, attempts);
    Err(last_err
        .map(ChannelError::Io)
        .unwrap_or(ChannelError::Disconnected))
}

