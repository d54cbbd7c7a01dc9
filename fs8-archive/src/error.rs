//! Error types for FS8 pack operations

use std::io;
use thiserror::Error;

/// Result type for FS8 pack operations
pub type Result<T> = std::result::Result<T, Fs8Error>;

/// FS8 pack error types
#[derive(Error, Debug)]
pub enum Fs8Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed header, table, or compressed payload
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// Requested archive name is absent (not logged)
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Destination capacity smaller than the decompressed size (not logged)
    #[error("buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall { need: u64, have: u64 },

    /// Empty path, closed reader, name over the limit
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Negative reference count, closed handle where an open one was expected
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}
