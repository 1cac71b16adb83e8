//! Collaborator seams for the addressing core
//!
//! The addressing core fires side effects into the rest of the stack
//! through these traits: key exchange requests when a node first becomes
//! reachable, directory-service registration, and unicast probes toward
//! configured hosts. All calls are fire-and-forget; upper layers retry if
//! they care.

use std::net::SocketAddrV4;

use crate::identity::NodeId;
use crate::interface::InterfaceId;

/// Key directory of the local node
pub trait Keyring {
    /// Request a signing-key exchange with the given node
    fn request_signing_key(&mut self, sid: &NodeId);
}

/// Directory-service registration hook
///
/// Invoked when the configured directory-service node becomes reachable,
/// so the local node can announce itself.
pub trait Registrar {
    fn register_self(&mut self);
}

/// Probe transmission toward a unicast address
pub trait ProbeTransport {
    /// Send a probe to `addr`, optionally pinned to an interface.
    /// Returns whether the probe was handed to the link layer.
    fn send_probe(&mut self, sid: &NodeId, addr: SocketAddrV4, interface: Option<InterfaceId>)
        -> bool;
}
