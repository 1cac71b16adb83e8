//! # Vajra Core
//!
//! Core types and collaborator seams for the Vajra mesh overlay.
//!
//! The overlay routes packets among nodes identified by 256-bit
//! public-key-derived identifiers. This crate provides the foundational
//! pieces that the addressing core and the rest of the stack share:
//!
//! ## Key Types
//!
//! - [`NodeId`]: 32-byte node identifier, viewed as a sequence of 64 nibbles
//! - [`FrameBuffer`] / [`FrameReader`]: size-limited frame assembly and
//!   zero-copy frame parsing
//! - [`InterfaceTable`]: link-layer interfaces with up/down state
//!
//! ## Key Traits
//!
//! - [`Keyring`]: signing-key exchange requests
//! - [`Registrar`]: directory-service registration hook
//! - [`ProbeTransport`]: unicast probe transmission

pub mod buffer;
pub mod error;
pub mod identity;
pub mod interface;
pub mod traits;

// Re-export main types
pub use buffer::{FrameBuffer, FrameReader};
pub use error::{BufferError, IdentityError};
pub use identity::{nibble_at, NodeId, BROADCAST_PREFIX_LEN, NODE_ID_LEN};
pub use interface::{Interface, InterfaceId, InterfaceState, InterfaceTable};
pub use traits::{Keyring, ProbeTransport, Registrar};
