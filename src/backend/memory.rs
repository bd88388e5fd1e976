//! In-memory chunk store
//!
//! HashMap-based store with RwLock for concurrency. Serves as the
//! unbounded overflow tier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{ChunkError, Result};

use super::{select, ChunkGeometry, ChunkStore, GetOptions};

/// Chunk store that keeps everything in memory
///
/// ## Concurrency:
/// - `chunks`: RwLock (many concurrent readers, exclusive writer)
/// - `closed`: atomic flag, checked before every operation; a second
///   close/destroy reports `Closed`
pub struct MemoryChunkStore {
    geometry: ChunkGeometry,
    chunks: RwLock<HashMap<u64, Bytes>>,
    closed: AtomicBool,
}

impl MemoryChunkStore {
    /// Create an empty store; `length = None` means unbounded
    pub fn new(chunk_length: usize, length: Option<u64>) -> Self {
        Self {
            geometry: ChunkGeometry::new(chunk_length, length),
            chunks: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of chunks currently held
    pub fn chunk_count(&self) -> usize {
        self.chunks.read().len()
    }

    /// Total length this store was created with
    pub fn length(&self) -> Option<u64> {
        self.geometry.length
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChunkError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    fn chunk_length(&self) -> usize {
        self.geometry.chunk_length
    }

    async fn get(&self, index: u64, opts: Option<GetOptions>) -> Result<Bytes> {
        self.ensure_open()?;
        let chunk = self
            .chunks
            .read()
            .get(&index)
            .cloned()
            .ok_or(ChunkError::NotFound(index))?;
        Ok(select(chunk, opts))
    }

    async fn put(&self, index: u64, buf: Bytes) -> Result<()> {
        self.ensure_open()?;
        self.geometry.validate_put(index, &buf)?;
        self.chunks.write().insert(index, buf);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(ChunkError::Closed);
        }
        // memory has nothing to persist
        self.chunks.write().clear();
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.close().await
    }
}
