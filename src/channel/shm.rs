//! Shared-memory slot backend: one mapped region holding exactly one encoded packet.
//!
//! `empty` starts at 1 and `full` at 0. A push waits on `empty`, copies the whole fixed-size
//! slot into the region and signals `full`; a pop waits on `full`, copies the whole region out
//! and signals `empty`. Capacity is therefore 1, and every exchange moves the same number of
//! bytes so a short packet can never leave stale bytes behind.

use memmap2::MmapMut;
use std::sync::{Arc, Mutex};

use super::semaphore::Semaphore;
use super::{PacketReceiver, PacketSender, TransportKind};
use crate::error::ChannelError;
use crate::packet::{BatchPacket, codec};

struct SharedRegion {
    region: Mutex<MmapMut>,
    empty: Semaphore,
    full: Semaphore,
}

pub struct ShmSender {
    shared: Arc<SharedRegion>,
    staging: Vec<u8>,
}

pub struct ShmReceiver {
    shared: Arc<SharedRegion>,
    staging: Vec<u8>,
}

/// Map an anonymous region sized for batches of up to `max_rows` x `cols_per_row` pixels.
pub fn shared_slot(
    max_rows: usize,
    cols_per_row: usize,
) -> Result<(ShmSender, ShmReceiver), ChannelError> {
    let slot_len = codec::slot_len(max_rows, cols_per_row);
    let region = MmapMut::map_anon(slot_len)?;
    let shared = Arc::new(SharedRegion {
        region: Mutex::new(region),
        empty: Semaphore::new(1),
        full: Semaphore::new(0),
    });
    Ok((
        ShmSender {
            shared: Arc::clone(&shared),
            staging: vec![0; slot_len],
        },
        ShmReceiver {
            shared,
            staging: vec![0; slot_len],
        },
    ))
}


impl PacketSender for ShmSender {
    fn push(&mut self, packet: BatchPacket) -> Result<(), ChannelError> {
        codec::encode_slot(&packet, &mut self.staging)?;
        self.shared.empty.acquire()?;
        {
            let mut region = self
                .shared
                .region
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            region.copy_from_slice(&self.staging);
        }
        self.shared.full.release();
        Ok(())
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Shm
    }
}

impl PacketReceiver for ShmReceiver {
    fn pop(&mut self) -> Result<BatchPacket, ChannelError> {
        self.shared.full.acquire()?;
        {
            let region = self
                .shared
                .region
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            self.staging.copy_from_slice(&region);
        }
        self.shared.empty.release();
        Ok(codec::decode(&self.staging)?)
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Shm
    }
}

impl Drop for ShmSender {
    fn drop(&mut self) {
        self.shared.full.close();
    }
}

impl Drop for ShmReceiver {
    fn drop(&mut self) {
        self.shared.empty.close();
    }
}
