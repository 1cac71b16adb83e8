//! Broadcast packet identifiers and duplicate suppression
//!
//! Every broadcast frame carries an 8-byte random broadcast packet
//! identifier (BPI). Nodes remember recently seen BPIs in a fixed
//! hash-indexed table and drop frames they have already forwarded, which
//! turns naive flooding into smart flooding. The table trades perfect
//! suppression for a fixed 8 KiB footprint: colliding identifiers evict
//! each other, and the occasional duplicate that slips through or novel
//! frame that gets dropped is acceptable.

use std::fmt::{self, Display};

use rand::RngCore;
use tracing::trace;

use vajra_core::{BufferError, FrameBuffer, FrameReader};

/// Length of a broadcast packet identifier in bytes.
pub const BROADCAST_ID_LEN: usize = 8;

const CACHE_SLOTS: usize = 1024;
const SLOT_MASK: u16 = 0x3FF;

/// An 8-byte random tag attached to broadcast frames for loop suppression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastId([u8; BROADCAST_ID_LEN]);

impl BroadcastId {
    /// Create a BPI from raw bytes
    pub fn new(bytes: [u8; BROADCAST_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random BPI
    ///
    /// Collisions only matter within a broadcast's mesh lifetime, so any
    /// uniform source is good enough.
    pub fn random() -> Self {
        let mut bytes = [0u8; BROADCAST_ID_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8; BROADCAST_ID_LEN] {
        &self.0
    }

    /// Append the BPI to an outbound frame
    pub fn write_to(&self, buf: &mut FrameBuffer) -> Result<(), BufferError> {
        buf.append_bytes(&self.0)
    }

    /// Read a BPI from an inbound frame
    pub fn read_from(rdr: &mut FrameReader<'_>) -> Result<Self, BufferError> {
        let bytes = rdr.read_bytes(BROADCAST_ID_LEN)?;
        let mut id = [0u8; BROADCAST_ID_LEN];
        id.copy_from_slice(bytes);
        Ok(Self(id))
    }
}

impl Display for BroadcastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Fixed-size table of recently seen broadcast packet identifiers
pub struct BroadcastCache {
    slots: Box<[BroadcastId; CACHE_SLOTS]>,
}

impl Default for BroadcastCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            slots: Box::new([BroadcastId::default(); CACHE_SLOTS]),
        }
    }

    /// Whether a broadcast frame with this BPI should be dropped
    ///
    /// Returns `true` for a repeat of the BPI currently remembered in its
    /// slot. A novel BPI overwrites the slot and returns `false`.
    pub fn drop_check(&mut self, bpi: &BroadcastId) -> bool {
        let index = slot_index(bpi);
        if self.slots[index] == *bpi {
            trace!(bpi = %bpi, "duplicate broadcast id, dropping");
            true
        } else {
            trace!(bpi = %bpi, "new broadcast id");
            self.slots[index] = *bpi;
            false
        }
    }
}

// Rolling 3-bit-shift mix over the 8 BPI bytes, folded to 10 bits. Weak,
// but the table is purely local state with a tolerated false-positive
// budget, so there is nothing to gain from a stronger mixer.
fn slot_index(bpi: &BroadcastId) -> usize {
    let mut h: u16 = 0;
    for &b in bpi.as_bytes() {
        h = ((h << 3) & 0xFFF8) | ((h >> 13) & 0x7);
        h ^= b as u16;
    }
    (h & SLOT_MASK) as usize
}
