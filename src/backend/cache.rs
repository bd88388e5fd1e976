//! Cache decorator
//!
//! Keeps the most recently used whole chunks in memory in front of a
//! slower store. Writes always reach the wrapped store.
//!
//! ## Write Epoch
//! Every write bumps a counter when it starts and again when it finishes.
//! A read miss, and a finishing write, only insert into the cache if the
//! counter still holds the value they saw before touching the wrapped
//! store. Otherwise a concurrent write may have replaced the data, and the
//! entry is dropped so the next read goes to the wrapped store.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;

use crate::error::Result;

use super::{select, ChunkStore, GetOptions};

/// LRU entries plus the write epoch, guarded together
struct CacheState {
    chunks: LruCache<u64, Bytes>,
    epoch: u64,
}

impl CacheState {
    /// Insert `chunk` if no write started or finished since `seen`
    fn insert_if_current(&mut self, seen: u64, index: u64, chunk: Bytes) {
        if self.epoch == seen {
            self.chunks.put(index, chunk);
        } else {
            self.chunks.pop(&index);
        }
    }
}

/// Bounded LRU cache in front of any `ChunkStore`
pub struct CachedChunkStore<S> {
    inner: S,
    state: Mutex<CacheState>,
}

impl<S: ChunkStore> CachedChunkStore<S> {
    /// Wrap `inner`, holding at most `max` chunks (0 is treated as 1)
    pub fn new(inner: S, max: usize) -> Self {
        let capacity = NonZeroUsize::new(max).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            state: Mutex::new(CacheState {
                chunks: LruCache::new(capacity),
                epoch: 0,
            }),
        }
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of chunks currently cached
    pub fn cached_count(&self) -> usize {
        self.state.lock().chunks.len()
    }

    /// Whether `index` is currently cached (does not touch recency)
    pub fn is_cached(&self, index: u64) -> bool {
        self.state.lock().chunks.contains(&index)
    }
}

#[async_trait]
impl<S: ChunkStore> ChunkStore for CachedChunkStore<S> {
    fn chunk_length(&self) -> usize {
        self.inner.chunk_length()
    }

    async fn get(&self, index: u64, opts: Option<GetOptions>) -> Result<Bytes> {
        let seen = {
            let mut state = self.state.lock();
            if let Some(chunk) = state.chunks.get(&index).cloned() {
                return Ok(select(chunk, opts));
            }
            state.epoch
        };

        // Miss: fetch the whole chunk so later sub-range reads hit
        let chunk = self.inner.get(index, None).await?;
        self.state.lock().insert_if_current(seen, index, chunk.clone());
        Ok(select(chunk, opts))
    }

    async fn put(&self, index: u64, buf: Bytes) -> Result<()> {
        let seen = {
            let mut state = self.state.lock();
            state.chunks.pop(&index);
            state.epoch += 1;
            state.epoch
        };

        let result = self.inner.put(index, buf.clone()).await;

        let mut state = self.state.lock();
        match result {
            Ok(()) => state.insert_if_current(seen, index, buf),
            // A failed write must not leave a stale copy cached
            Err(_) => {
                state.chunks.pop(&index);
            }
        }
        state.epoch += 1;
        result
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().chunks.clear();
        self.inner.close().await
    }

    async fn destroy(&self) -> Result<()> {
        self.state.lock().chunks.clear();
        self.inner.destroy().await
    }
}
