//! Error types for hybridchunk
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using ChunkError
pub type Result<T> = std::result::Result<T, ChunkError>;

/// Unified error type for chunk store operations
#[derive(Debug, Error)]
pub enum ChunkError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Construction / Initialization Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capacity probe failed: {0}")]
    Probe(String),

    #[error("Store initialization failed: {0}")]
    Init(String),

    // -------------------------------------------------------------------------
    // Chunk Errors
    // -------------------------------------------------------------------------
    #[error("Chunk {0} not found")]
    NotFound(u64),

    #[error("Chunk index {index} out of range (last chunk is {last})")]
    OutOfRange { index: u64, last: u64 },

    #[error("Chunk {index} length must be {expected}, got {actual}")]
    InvalidLength {
        index: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Chunk corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Storage is closed")]
    Closed,

    #[error("{} backends failed: {}", .0.len(), join(.0))]
    Multiple(Vec<ChunkError>),
}

impl ChunkError {
    /// True for a read of a chunk that was never written
    pub fn is_not_found(&self) -> bool {
        matches!(self, ChunkError::NotFound(_))
    }
}

fn join(errors: &[ChunkError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
