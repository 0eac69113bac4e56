//! LETHE - Custom Error Types
//! Defines the error hierarchy for the store, its persistence layer and the command protocol.

use std::path::PathBuf;

use thiserror::Error;

/// Custom Result type for the Lethe store.
pub type Result<T> = std::result::Result<T, LetheError>;

/// Error types for the Lethe store.
///
/// Display strings are shown to clients verbatim after an `Error:` prefix.
#[derive(Error, Debug)]
pub enum LetheError {
    /// I/O errors not tied to a specific snapshot file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot file could not be created or written.
    #[error("failed to create file {}: {source}", path.display())]
    CreateFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Snapshot file could not be opened for reading.
    #[error("failed to open file {}: {source}", path.display())]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Serialization errors while encoding a snapshot.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Snapshot contents are not a valid dataset.
    #[error("failed to decode file {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// Key rejected at the store boundary (empty or too long).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// TTL outside the accepted range.
    #[error("invalid TTL value: {0}")]
    InvalidTtl(String),

    /// Malformed command line.
    #[error("{0}")]
    Parse(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
