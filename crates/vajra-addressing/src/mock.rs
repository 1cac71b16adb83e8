//! Mock collaborators for tests
//!
//! Every seam the addressing core fires side effects through has a
//! recording mock here, so tests can assert on exactly what the core
//! asked the rest of the stack to do.

use std::net::SocketAddrV4;

use vajra_core::{InterfaceId, Keyring, NodeId, ProbeTransport, Registrar};

use crate::frame::{Frame, PacketQueue};

/// Records signing-key exchange requests
#[derive(Debug, Default)]
pub struct MockKeyring {
    pub requests: Vec<NodeId>,
}

impl Keyring for MockKeyring {
    fn request_signing_key(&mut self, sid: &NodeId) {
        self.requests.push(*sid);
    }
}

/// Counts directory-service registrations
#[derive(Debug, Default)]
pub struct MockRegistrar {
    pub registrations: usize,
}

impl Registrar for MockRegistrar {
    fn register_self(&mut self) {
        self.registrations += 1;
    }
}

/// Collects enqueued frames; can be told to refuse them
#[derive(Debug)]
pub struct MockQueue {
    pub frames: Vec<Frame>,
    pub accept: bool,
}

impl Default for MockQueue {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            accept: true,
        }
    }
}

impl PacketQueue for MockQueue {
    fn enqueue(&mut self, frame: Frame) -> bool {
        if self.accept {
            self.frames.push(frame);
        }
        self.accept
    }
}

/// Records probe transmissions
#[derive(Debug, Default)]
pub struct MockProbeTransport {
    pub probes: Vec<(NodeId, SocketAddrV4, Option<InterfaceId>)>,
}

impl ProbeTransport for MockProbeTransport {
    fn send_probe(
        &mut self,
        sid: &NodeId,
        addr: SocketAddrV4,
        interface: Option<InterfaceId>,
    ) -> bool {
        self.probes.push((*sid, addr, interface));
        true
    }
}
