//! Tests for HybridChunkStore
//!
//! These tests verify:
//! - Construction-time validation
//! - Backend selection and split index for each capacity scenario
//! - Routing and index translation across the split
//! - The ready gate (requests issued before initialization finishes)
//! - Probe failure handling
//! - Round trips against real disk backends

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use hybridchunk::backend::{ChunkGeometry, ChunkStore, MemoryChunkStore};
use hybridchunk::config::MIN_RESERVED;
use hybridchunk::factory::{BackendFactory, DefaultBackendFactory};
use hybridchunk::policy::PersistentKind;
use hybridchunk::probe::{CapacityProbe, StaticProbe, StorageEstimate, MISREPORTED_QUOTA};
use hybridchunk::router::Tier;
use hybridchunk::{Capabilities, ChunkError, Config, GetOptions, HybridChunkStore};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::Notify;

// =============================================================================
// Helper Functions
// =============================================================================

const CHUNK: usize = 1024;

/// Records every backend it builds; all of them are in-memory
#[derive(Default)]
struct RecordingFactory {
    persistent: Mutex<Vec<(PersistentKind, ChunkGeometry, Arc<MemoryChunkStore>)>>,
    overflow: Mutex<Vec<(ChunkGeometry, Arc<MemoryChunkStore>)>>,
}

impl RecordingFactory {
    fn persistent_store(&self) -> Arc<MemoryChunkStore> {
        let built = self.persistent.lock();
        assert_eq!(built.len(), 1, "expected exactly one persistent backend");
        Arc::clone(&built[0].2)
    }

    fn overflow_store(&self) -> Arc<MemoryChunkStore> {
        let built = self.overflow.lock();
        assert_eq!(built.len(), 1, "expected exactly one overflow backend");
        Arc::clone(&built[0].1)
    }

    fn persistent_count(&self) -> usize {
        self.persistent.lock().len()
    }

    fn overflow_count(&self) -> usize {
        self.overflow.lock().len()
    }
}

#[async_trait]
impl BackendFactory for RecordingFactory {
    async fn persistent(
        &self,
        kind: PersistentKind,
        geometry: ChunkGeometry,
    ) -> hybridchunk::Result<Arc<dyn ChunkStore>> {
        let store = Arc::new(MemoryChunkStore::new(geometry.chunk_length, geometry.length));
        self.persistent
            .lock()
            .push((kind, geometry, Arc::clone(&store)));
        Ok(store)
    }

    fn overflow(&self, geometry: ChunkGeometry) -> Arc<dyn ChunkStore> {
        let store = Arc::new(MemoryChunkStore::new(geometry.chunk_length, geometry.length));
        self.overflow.lock().push((geometry, Arc::clone(&store)));
        store
    }
}

/// Probe that blocks until released
struct GatedProbe {
    gate: Arc<Notify>,
    estimate: StorageEstimate,
}

#[async_trait]
impl CapacityProbe for GatedProbe {
    async fn estimate(&self) -> hybridchunk::Result<StorageEstimate> {
        self.gate.notified().await;
        Ok(self.estimate)
    }
}

/// Probe reporting exactly `available` usable bytes after the default reserve
fn probe_with_available(available: u64) -> Arc<StaticProbe> {
    Arc::new(StaticProbe::new(MIN_RESERVED + available, 0))
}

fn chunk(index: u64, len: usize) -> Bytes {
    Bytes::from(vec![index as u8; len])
}

fn build(
    config: Config,
    capabilities: Capabilities,
    probe: Arc<dyn CapacityProbe>,
) -> (Arc<RecordingFactory>, HybridChunkStore) {
    let factory = Arc::new(RecordingFactory::default());
    let store =
        HybridChunkStore::with_parts(CHUNK, config, capabilities, probe, factory.clone()).unwrap();
    (factory, store)
}

// =============================================================================
// Construction Tests
// =============================================================================

#[tokio::test]
async fn test_zero_chunk_length_fails() {
    let factory = Arc::new(RecordingFactory::default());
    let result = HybridChunkStore::with_parts(
        0,
        Config::default(),
        Capabilities::default(),
        Arc::new(StaticProbe::failing("must not be called")),
        factory.clone(),
    );

    assert!(matches!(result, Err(ChunkError::Config(_))));
    tokio::task::yield_now().await;
    assert_eq!(factory.overflow_count(), 0);
    assert_eq!(factory.persistent_count(), 0);
}

#[test]
fn test_construction_outside_runtime_fails() {
    let result = HybridChunkStore::with_parts(
        CHUNK,
        Config::default(),
        Capabilities::default(),
        Arc::new(StaticProbe::new(0, 0)),
        Arc::new(RecordingFactory::default()),
    );
    assert!(matches!(result, Err(ChunkError::Config(_))));
}

#[tokio::test]
async fn test_accessors() {
    let config = Config::builder().length(10 * CHUNK as u64).only_mem(true).build();
    let (_factory, store) = build(config, Capabilities::default(), probe_with_available(0));

    assert_eq!(store.chunk_length(), CHUNK);
    assert_eq!(store.length(), Some(10 * CHUNK as u64));
}

// =============================================================================
// Memory-Only Tests
// =============================================================================

#[tokio::test]
async fn test_only_mem_skips_probe_and_persistent_backend() {
    let config = Config::builder().length(10 * CHUNK as u64).only_mem(true).build();
    // A failing probe proves probing was skipped
    let probe = Arc::new(StaticProbe::failing("probe must not run"));
    let (factory, store) = build(config, Capabilities::default(), probe);

    store.ready().await.unwrap();
    assert_eq!(store.split_index().await.unwrap(), 0);
    assert_eq!(store.backend_count().await.unwrap(), 1);
    assert_eq!(factory.persistent_count(), 0);

    let overflow = factory.overflow_store();
    assert_eq!(overflow.length(), Some(10 * CHUNK as u64));

    for index in 0..10 {
        assert_eq!(store.tier(index).await.unwrap(), Tier::Overflow);
        store.put(index, chunk(index, CHUNK)).await.unwrap();
        // untranslated
        assert_eq!(overflow.get(index, None).await.unwrap(), chunk(index, CHUNK));
    }
}

#[tokio::test]
async fn test_no_available_space_behaves_like_only_mem() {
    let config = Config::builder().length(10 * CHUNK as u64).build();
    let probe = Arc::new(StaticProbe::new(MIN_RESERVED, 0));
    let (factory, store) = build(config, Capabilities::default(), probe);

    assert_eq!(store.split_index().await.unwrap(), 0);
    assert_eq!(store.backend_count().await.unwrap(), 1);
    assert_eq!(factory.persistent_count(), 0);

    store.put(3, chunk(3, CHUNK)).await.unwrap();
    assert_eq!(
        factory.overflow_store().get(3, None).await.unwrap(),
        chunk(3, CHUNK)
    );
}

#[tokio::test]
async fn test_usage_above_quota_behaves_like_only_mem() {
    let config = Config::builder().length(10 * CHUNK as u64).build();
    let probe = Arc::new(StaticProbe::new(1 << 30, 2 << 30));
    let (factory, store) = build(config, Capabilities::default(), probe);

    assert_eq!(store.split_index().await.unwrap(), 0);
    assert_eq!(factory.persistent_count(), 0);
    assert_eq!(factory.overflow_count(), 1);
}

#[tokio::test]
async fn test_capacity_below_one_chunk_uses_memory_only() {
    let config = Config::builder().length(10 * CHUNK as u64).build();
    let (factory, store) = build(
        config,
        Capabilities::default(),
        probe_with_available(CHUNK as u64 - 1),
    );

    assert_eq!(store.split_index().await.unwrap(), 0);
    assert_eq!(store.backend_count().await.unwrap(), 1);
    assert_eq!(factory.persistent_count(), 0);
    assert_eq!(store.tier(0).await.unwrap(), Tier::Overflow);
}

// =============================================================================
// Split Tests
// =============================================================================

#[tokio::test]
async fn test_split_example_ten_chunks_five_persistent() {
    let config = Config::builder().length(10_240).build();
    let (factory, store) = build(config, Capabilities::default(), probe_with_available(5120));

    assert_eq!(store.split_index().await.unwrap(), 5);
    assert_eq!(store.backend_count().await.unwrap(), 2);

    for index in 0..10 {
        store.put(index, chunk(index, CHUNK)).await.unwrap();
    }

    let persistent = factory.persistent_store();
    let overflow = factory.overflow_store();
    assert_eq!(persistent.length(), Some(5120));
    assert_eq!(overflow.length(), Some(5120));

    for index in 0..5 {
        assert_eq!(store.tier(index).await.unwrap(), Tier::Persistent);
        assert_eq!(persistent.get(index, None).await.unwrap(), chunk(index, CHUNK));
    }
    for index in 5..10 {
        assert_eq!(store.tier(index).await.unwrap(), Tier::Overflow);
        assert_eq!(overflow.get(index - 5, None).await.unwrap(), chunk(index, CHUNK));
    }
    assert_eq!(persistent.chunk_count(), 5);
    assert_eq!(overflow.chunk_count(), 5);
}

#[tokio::test]
async fn test_split_floors_to_whole_chunks() {
    let config = Config::builder().length(10_000).build();
    let (factory, store) = build(config, Capabilities::default(), probe_with_available(5000));

    assert_eq!(store.split_index().await.unwrap(), 4);
    assert_eq!(factory.persistent_store().length(), Some(4096));
    assert_eq!(factory.overflow_store().length(), Some(10_000 - 4096));

    // Short last chunk lands in the overflow tier: 10_000 - 9 * 1024 = 784
    store.put(9, chunk(9, 784)).await.unwrap();
    assert_eq!(factory.overflow_store().get(5, None).await.unwrap(), chunk(9, 784));
}

#[tokio::test]
async fn test_unbounded_store_splits_with_unbounded_overflow() {
    let (factory, store) = build(
        Config::default(),
        Capabilities::default(),
        probe_with_available(3 * CHUNK as u64),
    );

    assert_eq!(store.split_index().await.unwrap(), 3);
    assert_eq!(factory.overflow_store().length(), None);

    store.put(1_000, chunk(7, CHUNK)).await.unwrap();
    assert_eq!(
        factory.overflow_store().get(997, None).await.unwrap(),
        chunk(7, CHUNK)
    );
}

#[tokio::test]
async fn test_enough_capacity_means_no_split() {
    let config = Config::builder().length(10_240).build();
    let (factory, store) = build(config, Capabilities::default(), probe_with_available(10_240));

    assert_eq!(store.split_index().await.unwrap(), 0);
    assert_eq!(store.backend_count().await.unwrap(), 1);
    assert_eq!(factory.overflow_count(), 0);

    let persistent = factory.persistent_store();
    assert_eq!(persistent.length(), Some(10_240));
    for index in 0..10 {
        store.put(index, chunk(index, CHUNK)).await.unwrap();
    }
    assert_eq!(persistent.chunk_count(), 10);
    assert_eq!(persistent.get(9, None).await.unwrap(), chunk(9, CHUNK));
}

// =============================================================================
// Selector Wiring Tests
// =============================================================================

#[tokio::test]
async fn test_directory_storage_selects_directory_backend() {
    let config = Config::builder().length(10_240).build();
    let (factory, store) = build(config, Capabilities::default(), probe_with_available(1 << 30));
    store.ready().await.unwrap();

    assert_eq!(factory.persistent.lock()[0].0, PersistentKind::Directory);
}

#[tokio::test]
async fn test_root_dir_disables_split() {
    let config = Config::builder().length(10_240).root_dir("/unused").build();
    let (factory, store) = build(config, Capabilities::default(), probe_with_available(2048));

    assert_eq!(store.split_index().await.unwrap(), 0);
    assert_eq!(factory.overflow_count(), 0);
    assert_eq!(factory.persistent_store().length(), Some(10_240));
}

#[tokio::test]
async fn test_without_directory_storage_selects_file_backend() {
    let caps = Capabilities {
        directory_storage: false,
        misreporting_engine: false,
    };
    let config = Config::builder().length(10_240).build();
    let (factory, store) = build(config, caps, probe_with_available(5120));

    assert_eq!(store.split_index().await.unwrap(), 5);
    assert_eq!(factory.persistent.lock()[0].0, PersistentKind::File);
}

#[tokio::test]
async fn test_misreported_quota_disables_split() {
    let caps = Capabilities {
        directory_storage: false,
        misreporting_engine: true,
    };
    let config = Config::builder().length(1 << 40).build();
    let probe = Arc::new(StaticProbe::new(MISREPORTED_QUOTA, 0));
    let (factory, store) = build(config, caps, probe);

    assert_eq!(store.split_index().await.unwrap(), 0);
    assert_eq!(factory.overflow_count(), 0);
    assert_eq!(factory.persistent_store().length(), Some(1 << 40));
}

// =============================================================================
// Ready Gate Tests
// =============================================================================

#[tokio::test]
async fn test_requests_before_ready_route_like_requests_after() {
    let gate = Arc::new(Notify::new());
    let probe = Arc::new(GatedProbe {
        gate: Arc::clone(&gate),
        estimate: StorageEstimate::new(MIN_RESERVED + 5120, 0),
    });
    let config = Config::builder().length(10_240).build();
    let (factory, store) = build(config, Capabilities::default(), probe);
    let store = Arc::new(store);

    // Issue writes while initialization is still blocked
    let mut pending = Vec::new();
    for index in [2u64, 7] {
        let store = Arc::clone(&store);
        pending.push(tokio::spawn(async move {
            store.put(index, chunk(index, CHUNK)).await
        }));
    }
    tokio::task::yield_now().await;
    assert_eq!(factory.overflow_count(), 0);

    gate.notify_one();
    for handle in pending {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.tier(2).await.unwrap(), Tier::Persistent);
    assert_eq!(store.tier(7).await.unwrap(), Tier::Overflow);
    assert_eq!(
        factory.persistent_store().get(2, None).await.unwrap(),
        chunk(2, CHUNK)
    );
    assert_eq!(
        factory.overflow_store().get(2, None).await.unwrap(),
        chunk(7, CHUNK)
    );

    // Initialization ran once
    assert_eq!(factory.persistent_count(), 1);
    assert_eq!(factory.overflow_count(), 1);
}

// =============================================================================
// Probe Failure Tests
// =============================================================================

#[tokio::test]
async fn test_probe_failure_fails_requests() {
    let (factory, store) = build(
        Config::builder().length(10_240).build(),
        Capabilities::default(),
        Arc::new(StaticProbe::failing("quota unavailable")),
    );

    let err = store.get(0, None).await.unwrap_err();
    assert!(matches!(&err, ChunkError::Init(msg) if msg.contains("quota unavailable")));

    let err = store.put(0, chunk(0, CHUNK)).await.unwrap_err();
    assert!(matches!(err, ChunkError::Init(_)));
    assert!(store.ready().await.is_err());

    assert_eq!(factory.overflow_count(), 0);
    assert_eq!(factory.persistent_count(), 0);

    // Nothing was created, so shutdown has nothing to fail on
    store.close().await.unwrap();
    store.destroy().await.unwrap();
}

// =============================================================================
// Error Passthrough Tests
// =============================================================================

#[tokio::test]
async fn test_backend_errors_pass_through() {
    let config = Config::builder().length(10_240).build();
    let (_factory, store) = build(config, Capabilities::default(), probe_with_available(5120));

    // Never written: persistent side, through the cache
    assert!(matches!(store.get(1, None).await, Err(ChunkError::NotFound(1))));
    // Never written: overflow side, reported with the translated index
    assert!(matches!(store.get(6, None).await, Err(ChunkError::NotFound(1))));

    let err = store.put(0, chunk(0, 10)).await.unwrap_err();
    assert!(matches!(
        err,
        ChunkError::InvalidLength { index: 0, expected: CHUNK, actual: 10 }
    ));
}

// =============================================================================
// Round Trip Tests (real backends)
// =============================================================================

#[tokio::test]
async fn test_round_trip_on_disk_split() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .length(10_240)
        .data_dir(temp.path())
        .name("video")
        .build();
    let factory = Arc::new(DefaultBackendFactory::new(&config));
    let store = HybridChunkStore::with_parts(
        CHUNK,
        config,
        Capabilities::default(),
        probe_with_available(5120),
        factory,
    )
    .unwrap();

    for index in 0..10 {
        store.put(index, chunk(index, CHUNK)).await.unwrap();
    }
    for index in 0..10 {
        assert_eq!(store.get(index, None).await.unwrap(), chunk(index, CHUNK));
    }

    // Only the persistent prefix touches disk
    let dir = temp.path().join("video");
    for index in 0..5 {
        assert!(dir.join(format!("chunk_{}", index)).exists());
    }
    assert!(!dir.join("chunk_5").exists());

    store.destroy().await.unwrap();
    assert!(!dir.exists());
}

#[tokio::test]
async fn test_round_trip_file_backend_with_options() {
    let temp = TempDir::new().unwrap();
    let caps = Capabilities {
        directory_storage: false,
        misreporting_engine: false,
    };
    let config = Config::builder()
        .length(4 * CHUNK as u64)
        .data_dir(temp.path())
        .name("slots")
        .build();
    let factory = Arc::new(DefaultBackendFactory::new(&config));
    let store = HybridChunkStore::with_parts(
        CHUNK,
        config,
        caps,
        probe_with_available(1 << 30),
        factory,
    )
    .unwrap();

    let data: Bytes = (0..CHUNK).map(|i| i as u8).collect::<Vec<u8>>().into();
    store.put(2, data.clone()).await.unwrap();

    assert_eq!(store.get(2, None).await.unwrap(), data);
    assert_eq!(
        store.get(2, Some(GetOptions::range(10, 5))).await.unwrap(),
        data.slice(10..15)
    );
    assert!(temp.path().join("slots.chunks").exists());

    store.close().await.unwrap();
    assert!(temp.path().join("slots.chunks").exists());
}

#[tokio::test]
async fn test_unbounded_file_backend_rejects_unaddressable_index() {
    let temp = TempDir::new().unwrap();
    let caps = Capabilities {
        directory_storage: false,
        misreporting_engine: true,
    };
    // Unknown capacity and no length: the file backend serves every index
    let config = Config::builder().data_dir(temp.path()).name("slots").build();
    let factory = Arc::new(DefaultBackendFactory::new(&config));
    let probe = Arc::new(StaticProbe::new(MISREPORTED_QUOTA, 0));
    let store = HybridChunkStore::with_parts(CHUNK, config, caps, probe, factory).unwrap();

    store.put(1, chunk(1, CHUNK)).await.unwrap();
    assert_eq!(store.tier((1 << 60) + 1).await.unwrap(), Tier::Persistent);
    assert!(matches!(
        store.get((1 << 60) + 1, None).await,
        Err(ChunkError::OutOfRange { .. })
    ));
    assert_eq!(store.get(1, None).await.unwrap(), chunk(1, CHUNK));

    store.destroy().await.unwrap();
}

#[tokio::test]
async fn test_store_is_usable_as_chunk_store() {
    let config = Config::builder().only_mem(true).build();
    let (_factory, store) = build(config, Capabilities::default(), probe_with_available(0));
    let store: Arc<dyn ChunkStore> = Arc::new(store);

    assert_eq!(store.chunk_length(), CHUNK);
    store.put(4, chunk(4, CHUNK)).await.unwrap();
    assert_eq!(store.get(4, None).await.unwrap(), chunk(4, CHUNK));
}
