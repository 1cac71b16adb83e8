//! Error types for the addressing core

use thiserror::Error;

use vajra_core::{BufferError, NodeId};

/// Top-level error type for addressing operations
#[derive(Debug, Error)]
pub enum AddressingError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Reachability error: {0}")]
    Reachability(#[from] ReachabilityError),

    #[error("Hosts error: {0}")]
    Hosts(#[from] HostsError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while encoding or decoding addresses
///
/// These are fatal for the current frame: the caller discards the frame
/// and stops decoding. Unresolvable abbreviations are deliberately NOT
/// errors; they flag the frame context and decoding continues.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unknown address code {0:#04x}")]
    UnknownCode(u8),

    #[error("Invalid explain record length {0}")]
    InvalidExplainRecord(u8),

    #[error("Address starts with reserved byte {0:#04x}")]
    ReservedAddress(u8),

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Errors raised by reachability transitions
#[derive(Debug, Error)]
pub enum ReachabilityError {
    #[error("Subscriber {0} is already reachable")]
    AlreadyReachable(NodeId),

    #[error("Subscriber {0} is already tracked for overlay routing")]
    AlreadyRouted(NodeId),
}

/// Errors raised while applying host configuration
#[derive(Debug, Error)]
pub enum HostsError {
    #[error("Host entry for {sid} names unknown interface {name:?}")]
    UnknownInterface { sid: NodeId, name: String },
}

/// Errors raised while applying addressing configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Address cache size must be a power of two, got {0}")]
    CacheSizeNotPowerOfTwo(usize),

    #[error("Address cache size must be between 1 and 2^24, got {0}")]
    CacheSizeOutOfRange(usize),
}
