//! Bounded FIFO channels of batch packets.
//!
//! Every backend exposes the same contract: `push` blocks while the channel is full, `pop`
//! blocks until a packet is available, packets come out in the order they went in, and the
//! stream ends with a terminal packet. There is no close call; dropping an endpoint makes the
//! peer's blocked call fail with [`ChannelError::Disconnected`] instead of hanging.

pub mod pipe;
pub mod queue;
pub mod semaphore;
pub mod shm;
pub mod socket;
pub mod stream;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ChannelError, ConfigError};
use crate::packet::BatchPacket;

/// Transport backing one link between two pipeline endpoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process bounded queue.
    #[default]
    Queue,
    /// Unidirectional OS pipe with header-framed packets.
    Pipe,
    /// Single shared-memory slot guarded by empty/full semaphores.
    Shm,
    /// TCP byte stream (loopback when both ends live in this process).
    Socket,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportKind::Queue => "queue",
            TransportKind::Pipe => "pipe",
            TransportKind::Shm => "shm",
            TransportKind::Socket => "socket",
        };
        f.write_str(s)
    }
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" | "thread" | "threads" => Ok(TransportKind::Queue),
            "pipe" => Ok(TransportKind::Pipe),
            "shm" | "shared" | "shared-memory" => Ok(TransportKind::Shm),
            "socket" | "tcp" => Ok(TransportKind::Socket),
            _ => Err(ConfigError::Unknown {
                what: "transport",
                value: s.to_string(),
            }),
        }
    }
}

/// Producer end of a channel.
pub trait PacketSender: Send {
    /// Append `packet`, blocking until there is room.
    fn push(&mut self, packet: BatchPacket) -> Result<(), ChannelError>;

    fn transport(&self) -> TransportKind;
}

/// Consumer end of a channel.
pub trait PacketReceiver: Send {
    /// Remove and return the oldest packet, blocking until one is available.
    fn pop(&mut self) -> Result<BatchPacket, ChannelError>;

    fn transport(&self) -> TransportKind;
}

/// Sizing for one link. `capacity` applies to the queue backend; the slot size of the
/// shared-memory backend comes from `max_rows` and `cols_per_row`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkSpec {
    pub capacity: usize,
    pub max_rows: usize,
    pub cols_per_row: usize,
}

/// Both endpoints of one channel, ready to be moved into the stages they connect.
pub struct ChannelPair {
    pub tx: Box<dyn PacketSender>,
    pub rx: Box<dyn PacketReceiver>,
}

impl ChannelPair {
    pub fn new(tx: impl PacketSender + 'static, rx: impl PacketReceiver + 'static) -> Self {
        Self {
            tx: Box::new(tx),
            rx: Box::new(rx),
        }
    }
}

/// Open a channel of the given kind inside this process.
pub fn open_channel(kind: TransportKind, link: &LinkSpec) -> Result<ChannelPair, ChannelError> {
    let pair = match kind {
        TransportKind::Queue => {
            let (tx, rx) = queue::bounded(link.capacity);
            ChannelPair::new(tx, rx)
        }
        TransportKind::Pipe => {
            let (tx, rx) = pipe::pipe()?;
            ChannelPair::new(tx, rx)
        }
        TransportKind::Shm => {
            let (tx, rx) = shm::shared_slot(link.max_rows, link.cols_per_row)?;
            ChannelPair::new(tx, rx)
        }
        TransportKind::Socket => {
            let (tx, rx) = socket::loopback_pair()?;
            ChannelPair::new(tx, rx)
        }
    };
    log::debug!("opened {} channel ({:?})", kind, link);
    Ok(pair)
}
