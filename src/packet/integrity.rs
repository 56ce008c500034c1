//! Position-salted packet checksums used to detect transport corruption.
//!
//! Not a cryptographic guarantee: producer and verifier share the implementation, so any
//! order-sensitive hash that folds in the batch position is enough.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::BatchPacket;
use crate::error::ConfigError;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
/// Golden-ratio salt added to the position fields before folding.
const POSITION_SALT: u32 = 0x9e37_79b9;

/// Hash used for integrity tags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityAlgo {
    /// FNV-1a over the payload, folded with start_row and row_count.
    #[default]
    Fnv1a,
    /// blake3 over position + payload, truncated to 64 bits.
    Blake3,
    /// No checking; tags are 0.
    Off,
}

impl IntegrityAlgo {
    /// Wire id used in the socket handshake.
    pub fn wire_id(self) -> u8 {
        match self {
            IntegrityAlgo::Fnv1a => 1,
            IntegrityAlgo::Blake3 => 2,
            IntegrityAlgo::Off => 0,
        }
    }

    pub fn from_wire_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(IntegrityAlgo::Off),
            1 => Some(IntegrityAlgo::Fnv1a),
            2 => Some(IntegrityAlgo::Blake3),
            _ => None,
        }
    }
}

impl fmt::Display for IntegrityAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntegrityAlgo::Fnv1a => "fnv1a",
            IntegrityAlgo::Blake3 => "blake3",
            IntegrityAlgo::Off => "off",
        };
        f.write_str(s)
    }
}

impl FromStr for IntegrityAlgo {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fnv1a" | "fnv" => Ok(IntegrityAlgo::Fnv1a),
            "blake3" => Ok(IntegrityAlgo::Blake3),
            "off" | "none" => Ok(IntegrityAlgo::Off),
            _ => Err(ConfigError::Unknown {
                what: "integrity algorithm",
                value: s.to_string(),
            }),
        }
    }
}

/// Computes, stores and checks packet integrity tags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntegrityGuard {
    algo: IntegrityAlgo,
}

impl IntegrityGuard {
    pub fn new(algo: IntegrityAlgo) -> Self {
        Self { algo }
    }

    pub fn algo(&self) -> IntegrityAlgo {
        self.algo
    }

    pub fn enabled(&self) -> bool {
        self.algo != IntegrityAlgo::Off
    }

    /// Tag for `packet`'s payload at its position.
    pub fn compute(&self, packet: &BatchPacket) -> u64 {
        match self.algo {
            IntegrityAlgo::Fnv1a => fnv1a_tag(packet),
            IntegrityAlgo::Blake3 => blake3_tag(packet),
            IntegrityAlgo::Off => 0,
        }
    }

    /// Store the computed tag on the packet. Terminal packets are left untouched.
    pub fn seal(&self, packet: &mut BatchPacket) {
        if !packet.is_terminal {
            packet.integrity_tag = self.compute(packet);
        }
    }

    /// True when the stored tag matches the content. Always true when disabled.
    pub fn verify(&self, packet: &BatchPacket) -> bool {
        debug_assert!(!packet.is_terminal, "terminal packets are never verified");
        !self.enabled() || self.compute(packet) == packet.integrity_tag
    }
}

fn fnv1a_tag(packet: &BatchPacket) -> u64 {
    let mut h = FNV_OFFSET_BASIS;
    for &b in &packet.payload {
        h ^= u64::from(b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h ^= u64::from((packet.start_row as u32).wrapping_add(POSITION_SALT));
    h = h.wrapping_mul(FNV_PRIME);
    h ^= u64::from(packet.row_count.wrapping_add(POSITION_SALT));
    h.wrapping_mul(FNV_PRIME)
}

fn blake3_tag(packet: &BatchPacket) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&packet.start_row.to_le_bytes());
    hasher.update(&packet.row_count.to_le_bytes());
    hasher.update(&packet.payload);
    LittleEndian::read_u64(&hasher.finalize().as_bytes()[..8])
}
