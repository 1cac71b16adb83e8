//! Per-node subscriber state
//!
//! One [`Subscriber`] record exists per known node, owned by the directory
//! slot that holds it. Records are created on first sight and never
//! removed; the directory is monotonic within one process lifetime.

use std::fmt::{self, Display};
use std::net::SocketAddrV4;

use vajra_core::{InterfaceId, NodeId};

/// Opaque handle to a subscriber in the [`Directory`](crate::Directory)
///
/// Handles are arena indices; they stay valid for the process lifetime and
/// break what would otherwise be an ownership cycle through `next_hop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub(crate) u32);

/// How a subscriber can currently be reached
///
/// A small bitset rather than an enum: UNICAST and BROADCAST both contain
/// the DIRECT bit, and ASSUMED can ride along with either to mark a
/// probed-but-unconfirmed link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reachability(u8);

impl Reachability {
    /// Not reachable at all
    pub const NONE: Self = Self(0);
    /// Probed but not yet confirmed; rides along with UNICAST or BROADCAST
    pub const ASSUMED: Self = Self(1 << 0);
    /// The local node itself
    pub const SELF: Self = Self(1 << 1);
    /// Reachable through another subscriber (`next_hop`)
    pub const INDIRECT: Self = Self(1 << 2);
    /// Reachable over a bound interface
    pub const DIRECT: Self = Self(1 << 3);
    /// Reachable by unicast on a bound interface
    pub const UNICAST: Self = Self(1 << 4 | 1 << 3);
    /// Reachable by link-local broadcast on a bound interface
    pub const BROADCAST: Self = Self(1 << 5 | 1 << 3);

    /// Every mode bit; excludes ASSUMED, which qualifies a mode rather
    /// than being one
    pub const ANY: Self = Self(0b0011_1110);

    /// Whether every bit of `other` is set in `self`
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any bit of `other` is set in `self`
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether no bits are set
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Reachability {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return write!(f, "none");
        }
        let mut sep = "";
        if self.intersects(Self::ASSUMED) {
            write!(f, "assumed")?;
            sep = " ";
        }
        if self.intersects(Self::SELF) {
            write!(f, "{sep}self")?;
            sep = "+";
        }
        if self.intersects(Self::INDIRECT) {
            write!(f, "{sep}indirect")?;
            sep = "+";
        }
        if self.contains(Self::UNICAST) {
            write!(f, "{sep}unicast")?;
        } else if self.contains(Self::BROADCAST) {
            write!(f, "{sep}broadcast")?;
        } else if self.intersects(Self::DIRECT) {
            write!(f, "{sep}direct")?;
        }
        Ok(())
    }
}

/// State kept per known node
#[derive(Debug, Clone)]
pub struct Subscriber {
    /// The full 32-byte node ID
    pub sid: NodeId,
    /// Minimum prefix length, in nibbles, that uniquely identifies this
    /// subscriber within the current directory
    pub abbreviate_len: u8,
    /// Stored reachability; validate through
    /// [`Directory::resolve`](crate::Directory::resolve) before use
    pub reachable: Reachability,
    /// Where to forward to when INDIRECT
    pub next_hop: Option<SubscriberId>,
    /// Interface binding when DIRECT
    pub interface: Option<InterfaceId>,
    /// Unicast address when UNICAST
    pub address: Option<SocketAddrV4>,
    /// One-shot: the next outbound encoding must carry all 32 bytes
    pub send_full: bool,
    /// Whether the signing-key lookup for this node has completed
    pub signing_key_known: bool,
    /// Whether the routing layer already tracks this subscriber
    pub has_route: bool,
}

impl Subscriber {
    pub(crate) fn new(sid: NodeId, abbreviate_len: u8) -> Self {
        Self {
            sid,
            abbreviate_len,
            reachable: Reachability::NONE,
            next_hop: None,
            interface: None,
            address: None,
            send_full: false,
            signing_key_known: false,
            has_route: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicast_and_broadcast_imply_direct() {
        assert!(Reachability::UNICAST.contains(Reachability::DIRECT));
        assert!(Reachability::BROADCAST.contains(Reachability::DIRECT));
        assert!(!Reachability::INDIRECT.contains(Reachability::DIRECT));
    }

    #[test]
    fn test_assumed_rides_along() {
        let probed = Reachability::UNICAST | Reachability::ASSUMED;
        assert!(probed.intersects(Reachability::ASSUMED));
        assert!(probed.contains(Reachability::UNICAST));
        assert_ne!(probed, Reachability::UNICAST);
    }

    #[test]
    fn test_any_mask() {
        assert!(Reachability::SELF.intersects(Reachability::ANY));
        assert!(Reachability::INDIRECT.intersects(Reachability::ANY));
        assert!(Reachability::UNICAST.intersects(Reachability::ANY));
        assert!(!Reachability::NONE.intersects(Reachability::ANY));
        assert!(!Reachability::ASSUMED.intersects(Reachability::ANY));
    }

    #[test]
    fn test_display() {
        assert_eq!(Reachability::NONE.to_string(), "none");
        assert_eq!(Reachability::UNICAST.to_string(), "unicast");
        assert_eq!(
            (Reachability::BROADCAST | Reachability::ASSUMED).to_string(),
            "assumed broadcast"
        );
    }
}
