//! Store Module
//!
//! The logical chunk store that coordinates all components.
//!
//! ## Responsibilities
//! - Validate the chunk length up front
//! - Run probe → selection → partition once, in the background
//! - Gate every request on that initialization
//! - Route get/put to the right tier with index translation
//! - Fan close/destroy out to every backend

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::backend::{CachedChunkStore, ChunkGeometry, ChunkStore, GetOptions};
use crate::config::{Capabilities, Config};
use crate::error::{ChunkError, Result};
use crate::factory::{BackendFactory, DefaultBackendFactory};
use crate::lifecycle::{self, LifecycleOp};
use crate::policy::{self, Partition, Selection};
use crate::probe::{CapacityProbe, FsProbe};
use crate::router::{Routing, Tier};

/// Published once by the initialization task
type InitOutcome = std::result::Result<Arc<Routing>, String>;

/// A chunk store split across a persistent tier and a memory overflow tier
///
/// ## Initialization
/// Construction spawns a single task that probes capacity, selects a
/// backend and partitions the index space. Its outcome is published on a
/// watch channel exactly once; every operation waits for it.
///
/// ## Concurrency Model
/// - Routing state is immutable once published, so requests never lock
///   at this layer
/// - Concurrent requests are not serialized; each backend keeps its own
///   ordering guarantees
pub struct HybridChunkStore {
    /// Byte size of one chunk (never zero)
    chunk_length: usize,

    /// Total logical length (`None` = unbounded)
    length: Option<u64>,

    /// Initialization outcome; `None` until the task finishes
    ready: watch::Receiver<Option<InitOutcome>>,
}

impl HybridChunkStore {
    /// Create a store probing the filesystem under `config.data_dir`
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(chunk_length: usize, config: Config, capabilities: Capabilities) -> Result<Self> {
        let probe = Arc::new(FsProbe::new(config.data_dir.clone()));
        let factory = Arc::new(DefaultBackendFactory::new(&config));
        Self::with_parts(chunk_length, config, capabilities, probe, factory)
    }

    /// Create a store with an explicit probe and backend factory
    pub fn with_parts(
        chunk_length: usize,
        config: Config,
        capabilities: Capabilities,
        probe: Arc<dyn CapacityProbe>,
        factory: Arc<dyn BackendFactory>,
    ) -> Result<Self> {
        // Step 1: Validate before any async work starts
        if chunk_length == 0 {
            return Err(ChunkError::Config(
                "chunk length must be greater than zero".to_string(),
            ));
        }
        let runtime = Handle::try_current().map_err(|e| {
            ChunkError::Config(format!("a tokio runtime is required: {}", e))
        })?;

        // Step 2: Spawn the one-shot initialization
        let (tx, rx) = watch::channel(None);
        let length = config.length;
        runtime.spawn(async move {
            let outcome = initialize(chunk_length, &config, capabilities, &*probe, &*factory)
                .await
                .map(Arc::new)
                .map_err(|e| {
                    tracing::warn!(error = %e, "chunk store initialization failed");
                    e.to_string()
                });
            tx.send_replace(Some(outcome));
        });

        Ok(Self {
            chunk_length,
            length,
            ready: rx,
        })
    }

    /// Byte size of one chunk
    pub fn chunk_length(&self) -> usize {
        self.chunk_length
    }

    /// Total logical length (`None` = unbounded)
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// Wait for initialization, surfacing its failure if any
    pub async fn ready(&self) -> Result<()> {
        self.routing().await.map(|_| ())
    }

    /// First index served by the overflow tier (0 when nothing is split)
    pub async fn split_index(&self) -> Result<u64> {
        Ok(self.routing().await?.split_index())
    }

    /// Which tier serves `index`
    pub async fn tier(&self, index: u64) -> Result<Tier> {
        Ok(self.routing().await?.resolve(index).tier)
    }

    /// Number of backends that close/destroy fan out to
    pub async fn backend_count(&self) -> Result<usize> {
        Ok(self.routing().await?.backends().len())
    }

    /// Read chunk `index`
    pub async fn get(&self, index: u64, opts: Option<GetOptions>) -> Result<Bytes> {
        let routing = self.routing().await?;
        let route = routing.resolve(index);
        tracing::debug!(index, tier = ?route.tier, backend_index = route.index, "get");
        route.backend.get(route.index, opts).await
    }

    /// Write chunk `index`
    pub async fn put(&self, index: u64, buf: Bytes) -> Result<()> {
        let routing = self.routing().await?;
        let route = routing.resolve(index);
        tracing::debug!(index, tier = ?route.tier, backend_index = route.index, len = buf.len(), "put");
        route.backend.put(route.index, buf).await
    }

    /// Close every backend, keeping persisted data
    ///
    /// Waits for initialization so the full backend set is closed.
    pub async fn close(&self) -> Result<()> {
        self.shutdown(LifecycleOp::Close).await
    }

    /// Close every backend and delete persisted data
    pub async fn destroy(&self) -> Result<()> {
        self.shutdown(LifecycleOp::Destroy).await
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    async fn shutdown(&self, op: LifecycleOp) -> Result<()> {
        match self.routing().await {
            Ok(routing) => lifecycle::fan_out(routing.backends(), op).await,
            // Nothing was created, so there is nothing to release
            Err(ChunkError::Init(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Wait for the initialization outcome
    async fn routing(&self) -> Result<Arc<Routing>> {
        let mut ready = self.ready.clone();
        let outcome = ready
            .wait_for(Option::is_some)
            .await
            .map(|outcome| (*outcome).clone())
            .map_err(|_| {
                ChunkError::Init("initialization task ended without a result".to_string())
            })?;
        match outcome {
            Some(Ok(routing)) => Ok(routing),
            Some(Err(message)) => Err(ChunkError::Init(message)),
            None => Err(ChunkError::Init("initialization not finished".to_string())),
        }
    }
}

#[async_trait]
impl ChunkStore for HybridChunkStore {
    fn chunk_length(&self) -> usize {
        self.chunk_length
    }

    async fn get(&self, index: u64, opts: Option<GetOptions>) -> Result<Bytes> {
        HybridChunkStore::get(self, index, opts).await
    }

    async fn put(&self, index: u64, buf: Bytes) -> Result<()> {
        HybridChunkStore::put(self, index, buf).await
    }

    async fn close(&self) -> Result<()> {
        HybridChunkStore::close(self).await
    }

    async fn destroy(&self) -> Result<()> {
        HybridChunkStore::destroy(self).await
    }
}

/// Probe, select and partition; build the backends
async fn initialize(
    chunk_length: usize,
    config: &Config,
    capabilities: Capabilities,
    probe: &dyn CapacityProbe,
    factory: &dyn BackendFactory,
) -> Result<Routing> {
    // Step 1: Probe, unless memory-only was requested
    let estimate = if config.only_mem {
        None
    } else {
        Some(probe.estimate().await?)
    };

    // Step 2: Select the persistent backend
    let selection = policy::select(config, capabilities, estimate);
    tracing::info!(?selection, ?estimate, "selected chunk store backend");

    let (kind, target_length) = match selection {
        Selection::MemoryOnly => {
            let overflow = factory.overflow(ChunkGeometry::new(chunk_length, config.length));
            return Ok(Routing::single(overflow));
        }
        Selection::Persistent {
            kind,
            target_length,
        } => (kind, target_length),
    };

    // Step 3: Partition the index space
    let partition = policy::partition(target_length, config.length, chunk_length);
    tracing::info!(?partition, ?kind, chunk_length, length = ?config.length, "partitioned chunk store");

    match partition {
        Partition::Whole => {
            let geometry = ChunkGeometry::new(chunk_length, config.length);
            let persistent = factory.persistent(kind, geometry).await?;
            let cached: Arc<dyn ChunkStore> =
                Arc::new(CachedChunkStore::new(persistent, config.max_cached));
            Ok(Routing::single(cached))
        }
        Partition::Split {
            split_index,
            persistent_length,
            overflow_length,
        } => {
            let overflow = factory.overflow(ChunkGeometry::new(chunk_length, overflow_length));
            let geometry = ChunkGeometry::new(chunk_length, Some(persistent_length));
            let persistent = factory.persistent(kind, geometry).await?;
            let cached: Arc<dyn ChunkStore> =
                Arc::new(CachedChunkStore::new(persistent, config.max_cached));
            Ok(Routing::split(split_index, cached, overflow))
        }
        Partition::NoCapacity => {
            tracing::warn!(
                ?target_length,
                chunk_length,
                "persistent capacity is below one chunk, using memory only"
            );
            let overflow = factory.overflow(ChunkGeometry::new(chunk_length, config.length));
            Ok(Routing::single(overflow))
        }
    }
}
