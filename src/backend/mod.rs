//! Backend Module
//!
//! The uniform chunk-store capability and its concrete implementations.
//!
//! ## Responsibilities
//! - Define the async get/put/close/destroy contract every backend satisfies
//! - Validate chunk sizes against the store geometry
//! - Provide the persistent, overflow and caching implementations
//!
//! ## Implementations
//! ```text
//! ┌──────────────────┬───────────────────────────────────────────┐
//! │ MemoryChunkStore │ unbounded, in-memory (overflow tier)      │
//! │ DirChunkStore    │ one file per chunk in a directory         │
//! │ FileChunkStore   │ single file of fixed, checksummed slots   │
//! │ CachedChunkStore │ LRU decorator in front of any of the above│
//! └──────────────────┴───────────────────────────────────────────┘
//! ```

mod cache;
mod directory;
mod file;
mod memory;

pub use cache::CachedChunkStore;
pub use directory::DirChunkStore;
pub use file::FileChunkStore;
pub use memory::MemoryChunkStore;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{ChunkError, Result};

/// Async chunk-addressed storage
///
/// Every call completes exactly once; errors travel through the `Err` arm.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Byte size of a full chunk
    fn chunk_length(&self) -> usize;

    /// Read a chunk, optionally a sub-range of it
    async fn get(&self, index: u64, opts: Option<GetOptions>) -> Result<Bytes>;

    /// Write a whole chunk
    async fn put(&self, index: u64, buf: Bytes) -> Result<()>;

    /// Release resources, keeping persisted data
    async fn close(&self) -> Result<()>;

    /// Release resources and delete persisted data
    async fn destroy(&self) -> Result<()>;
}

#[async_trait]
impl<T: ChunkStore + ?Sized> ChunkStore for Arc<T> {
    fn chunk_length(&self) -> usize {
        (**self).chunk_length()
    }

    async fn get(&self, index: u64, opts: Option<GetOptions>) -> Result<Bytes> {
        (**self).get(index, opts).await
    }

    async fn put(&self, index: u64, buf: Bytes) -> Result<()> {
        (**self).put(index, buf).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }

    async fn destroy(&self) -> Result<()> {
        (**self).destroy().await
    }
}

/// Sub-range selection for `get`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Start offset inside the chunk
    pub offset: usize,

    /// Bytes to return (`None` = until end of chunk)
    pub length: Option<usize>,
}

impl GetOptions {
    pub fn range(offset: usize, length: usize) -> Self {
        Self {
            offset,
            length: Some(length),
        }
    }

    /// Apply the selection to a whole chunk, clamping to its bounds
    pub fn slice(&self, chunk: &Bytes) -> Bytes {
        let start = self.offset.min(chunk.len());
        let end = match self.length {
            Some(len) => start.saturating_add(len).min(chunk.len()),
            None => chunk.len(),
        };
        chunk.slice(start..end)
    }
}

/// Slice `chunk` per `opts`, returning it untouched when no options are given
pub(crate) fn select(chunk: Bytes, opts: Option<GetOptions>) -> Bytes {
    match opts {
        Some(opts) => opts.slice(&chunk),
        None => chunk,
    }
}

/// Chunk size and total length of one backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGeometry {
    pub chunk_length: usize,

    /// Total bytes this backend holds (`None` = unbounded)
    pub length: Option<u64>,
}

impl ChunkGeometry {
    pub fn new(chunk_length: usize, length: Option<u64>) -> Self {
        Self {
            chunk_length,
            length,
        }
    }

    /// Index of the final chunk, `None` when unbounded or empty
    pub fn last_chunk_index(&self) -> Option<u64> {
        let length = self.length?;
        if length == 0 {
            return None;
        }
        Some((length - 1) / self.chunk_length as u64)
    }

    /// Byte size of the final chunk (may be shorter than `chunk_length`)
    pub fn last_chunk_length(&self) -> Option<usize> {
        let length = self.length?;
        if length == 0 {
            return None;
        }
        let rem = (length % self.chunk_length as u64) as usize;
        Some(if rem == 0 { self.chunk_length } else { rem })
    }

    /// Expected byte size of chunk `index`
    pub fn expected_length(&self, index: u64) -> Result<usize> {
        match self.length {
            None => Ok(self.chunk_length),
            Some(0) => Err(ChunkError::OutOfRange { index, last: 0 }),
            Some(_) => {
                let last = self.last_chunk_index().unwrap_or(0);
                if index > last {
                    Err(ChunkError::OutOfRange { index, last })
                } else if index == last {
                    Ok(self.last_chunk_length().unwrap_or(self.chunk_length))
                } else {
                    Ok(self.chunk_length)
                }
            }
        }
    }

    /// Check a buffer about to be stored at `index`
    pub fn validate_put(&self, index: u64, buf: &[u8]) -> Result<()> {
        let expected = self.expected_length(index)?;
        if buf.len() != expected {
            return Err(ChunkError::InvalidLength {
                index,
                expected,
                actual: buf.len(),
            });
        }
        Ok(())
    }
}
