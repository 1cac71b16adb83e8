//! The frame surface handed to the packet queue
//!
//! The addressing core originates exactly one kind of frame itself: the
//! please-explain request asking a peer to spell out abbreviations we
//! could not resolve. Frames are handed to the outbound packet queue,
//! which takes ownership.

use std::net::SocketAddrV4;

use vajra_core::{FrameBuffer, InterfaceId};

use crate::broadcast::BroadcastId;
use crate::subscriber::SubscriberId;

/// Size cap for a please-explain payload
pub const EXPLAIN_PAYLOAD_LIMIT: usize = 1024;

/// Frame types originated by the addressing core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Request for the full node IDs behind unresolvable abbreviations
    PleaseExplain,
}

/// Outbound queue classes, in descending priority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueClass {
    IsochronousVoice,
    MeshManagement,
    Ordinary,
    Opportunistic,
}

/// An outbound overlay frame
#[derive(Debug)]
pub struct Frame {
    pub kind: FrameKind,
    /// Filled in when the frame is finalised for sending
    pub source: Option<SubscriberId>,
    pub destination: Option<SubscriberId>,
    pub ttl: u8,
    pub queue: QueueClass,
    /// Present on broadcast frames
    pub broadcast_id: Option<BroadcastId>,
    /// Pre-resolved delivery hints when the destination is not yet
    /// routable but we know which link the conversation arrived on
    pub next_hop: Option<SubscriberId>,
    pub recv_addr: Option<SocketAddrV4>,
    pub interface: Option<InterfaceId>,
    pub payload: FrameBuffer,
}

impl Frame {
    /// A fresh, empty please-explain frame
    pub fn please_explain() -> Self {
        Self {
            kind: FrameKind::PleaseExplain,
            source: None,
            destination: None,
            ttl: 0,
            queue: QueueClass::MeshManagement,
            broadcast_id: None,
            next_hop: None,
            recv_addr: None,
            interface: None,
            payload: FrameBuffer::with_limit(EXPLAIN_PAYLOAD_LIMIT),
        }
    }
}

/// The outbound packet queue
pub trait PacketQueue {
    /// Hand a frame to the queue. Returns whether the queue accepted it;
    /// a refused frame is simply dropped.
    fn enqueue(&mut self, frame: Frame) -> bool;
}
