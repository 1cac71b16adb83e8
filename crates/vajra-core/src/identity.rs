//! Node identifiers
//!
//! A node is identified by a 32-byte value derived from its public key.
//! Identifiers travel in frame headers in abbreviated form, so the
//! addressing layer views them as a sequence of 64 nibbles; the nibble
//! ordering here determines abbreviation semantics on the wire and must be
//! preserved bit-for-bit.
//!
//! Two byte ranges are reserved:
//!
//! - A wire-valid identifier never starts with 0x00-0x0F; those values are
//!   wire-format codes.
//! - Identifiers whose first 24 bytes are all ones are link-local broadcast
//!   framing; the trailing 8 bytes carry the broadcast packet identifier.

use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Length of a node identifier in bytes.
pub const NODE_ID_LEN: usize = 32;

/// Leading all-ones bytes that mark an identifier as broadcast framing.
pub const BROADCAST_PREFIX_LEN: usize = 24;

/// A 32-byte node identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId([u8; NODE_ID_LEN]);

impl NodeId {
    /// Create a node ID from raw bytes
    pub fn new(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Create a node ID from a slice (must be exactly 32 bytes)
    pub fn from_slice(slice: &[u8]) -> Result<Self, IdentityError> {
        if slice.len() != NODE_ID_LEN {
            return Err(IdentityError::InvalidLength {
                expected: NODE_ID_LEN,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; NODE_ID_LEN];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    /// Nibble at position `pos` (0..64): the high nibble of byte `pos / 2`
    /// when `pos` is even, the low nibble otherwise.
    pub fn nibble(&self, pos: usize) -> u8 {
        nibble_at(&self.0, pos)
    }

    /// Whether this identifier may appear unabbreviated on the wire.
    ///
    /// First bytes 0x00-0x0F are wire-format codes and never start a real
    /// identifier.
    pub fn is_wire_valid(&self) -> bool {
        self.0[0] >= 0x10
    }

    /// Whether this identifier is link-local broadcast framing (first 24
    /// bytes all ones).
    pub fn is_broadcast(&self) -> bool {
        self.0[..BROADCAST_PREFIX_LEN].iter().all(|&b| b == 0xFF)
    }

    /// Short display form (first 8 hex chars, for logging)
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.short())
    }
}

impl FromStr for NodeId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| IdentityError::InvalidHex(s.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl TryFrom<String> for NodeId {
    type Error = IdentityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> String {
        id.to_string()
    }
}

/// Nibble at position `pos` of a byte slice, in wire order: high nibble of
/// byte `pos / 2` when `pos` is even, low nibble otherwise.
pub fn nibble_at(bytes: &[u8], pos: usize) -> u8 {
    let byte = bytes[pos >> 1];
    if pos & 1 == 0 {
        byte >> 4
    } else {
        byte & 0xF
    }
}
