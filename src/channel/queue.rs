//! In-process bounded queue backend.

use crossbeam_channel::{Receiver, Sender};

use super::{PacketReceiver, PacketSender, TransportKind};
use crate::error::ChannelError;
use crate::packet::BatchPacket;

pub struct QueueSender {
    tx: Sender<BatchPacket>,
}

pub struct QueueReceiver {
    rx: Receiver<BatchPacket>,
}

/// Queue holding at most `capacity` packets (minimum 1).
pub fn bounded(capacity: usize) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (QueueSender { tx }, QueueReceiver { rx })
}

impl PacketSender for QueueSender {
    fn push(&mut self, packet: BatchPacket) -> Result<(), ChannelError> {
        self.tx.send(packet).map_err(|_| ChannelError::Disconnected)
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Queue
    }
}

impl PacketReceiver for QueueReceiver {
    fn pop(&mut self) -> Result<BatchPacket, ChannelError> {
        self.rx.recv().map_err(|_| ChannelError::Disconnected)
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Queue
    }
}
