//! # Vajra Addressing
//!
//! Addressing and abbreviation core of the Vajra delay-tolerant mesh
//! overlay.
//!
//! Mesh links are typically low-bandwidth wireless; carrying full 32-byte
//! node identifiers in every frame header is prohibitive. This crate
//! compresses identifiers using link-local abbreviation, resolves
//! abbreviated identifiers received from peers, asks peers to explain
//! abbreviations it cannot resolve, and suppresses broadcast storms.
//!
//! ## Features
//!
//! - **Nibble-trie directory**: every known node lives in a 16-way radix
//!   trie keyed by the nibbles of its identifier, which yields the minimum
//!   unambiguous prefix for free and detects ambiguous abbreviations.
//!
//! - **Shortest-safe wire encoding**: outbound addresses use sender/previous
//!   sentinels or the shortest prefix that still resolves uniquely at the
//!   receiver, with a one-shot escape hatch back to the full identifier.
//!
//! - **Please-explain repair**: unresolvable abbreviations generate a
//!   repair request enumerating every matching candidate, so the peer
//!   learns not to use an abbreviation that is too short.
//!
//! - **Recursive reachability**: a node can be reachable directly, via
//!   unicast or broadcast on an interface, or indirectly through a next
//!   hop; validity is checked against live interface state at every read.
//!
//! - **Broadcast suppression**: an 8 KiB hash-indexed cache of recently
//!   seen broadcast packet identifiers stops rebroadcast loops.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vajra_addressing::{Directory, FrameContext};
//! use vajra_core::{FrameBuffer, FrameReader, NodeId};
//!
//! let mut directory = Directory::new();
//! let me = directory.set_self(my_node_id);
//!
//! // Encode an address into an outbound frame
//! let mut ctx = FrameContext::new();
//! let mut buf = FrameBuffer::new();
//! directory.append_address(Some(&mut ctx), &mut buf, peer)?;
//!
//! // Decode an address from an inbound frame
//! let mut ctx = FrameContext::new();
//! let decoded = directory.parse_address(&mut ctx, &mut reader)?;
//! ```
//!
//! ## Architecture
//!
//! - [`directory`]: the nibble trie over known subscribers
//! - [`subscriber`]: per-node state and the reachability bitset
//! - [`codec`]: address wire codec and please-explain repair
//! - [`reachability`]: reachability validation and transitions
//! - [`broadcast`]: broadcast packet identifiers and duplicate suppression
//! - [`abbrev`]: the compact opcode scheme and recently-seen address cache
//! - [`frame`]: the frame surface handed to the packet queue
//! - [`hosts`]: statically configured unicast hosts
//! - [`config`]: tunables with validation
//! - [`error`]: error types
//! - [`mock`]: mock collaborators for tests

pub mod abbrev;
pub mod broadcast;
pub mod codec;
pub mod config;
pub mod directory;
pub mod error;
pub mod frame;
pub mod hosts;
pub mod mock;
pub mod reachability;
pub mod subscriber;

// Re-export main types
pub use abbrev::{compact_address, expand_compact, AddressCache, CompactOutcome};
pub use broadcast::{BroadcastCache, BroadcastId, BROADCAST_ID_LEN};
pub use codec::{append_broadcast, DecodedAddress, FrameContext};
pub use config::{AddressingConfig, ConfigWarning};
pub use directory::Directory;
pub use error::{AddressingError, CodecError, ConfigError, HostsError, ReachabilityError};
pub use frame::{Frame, FrameKind, PacketQueue, QueueClass, EXPLAIN_PAYLOAD_LIMIT};
pub use hosts::{load_subscriber_address, HostRecord, HostsConfig};
pub use subscriber::{Reachability, Subscriber, SubscriberId};
