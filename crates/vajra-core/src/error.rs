//! Error types shared across the stack

use thiserror::Error;

/// Errors related to node identifiers
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid identifier length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid hex identifier: {0}")]
    InvalidHex(String),
}

/// Errors raised by the frame buffer primitives
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("Buffer limit exceeded (limit: {limit}, needed: {needed})")]
    Overflow { limit: usize, needed: usize },

    #[error("Buffer underrun (wanted {wanted}, remaining {remaining})")]
    Underrun { wanted: usize, remaining: usize },
}
