//! Backend Factory
//!
//! Builds the concrete backends chosen by the policy layer.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{ChunkGeometry, ChunkStore, DirChunkStore, FileChunkStore, MemoryChunkStore};
use crate::config::Config;
use crate::error::Result;
use crate::policy::PersistentKind;

/// Creates backends for a store during initialization
#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// Build the persistent backend of `kind`
    async fn persistent(
        &self,
        kind: PersistentKind,
        geometry: ChunkGeometry,
    ) -> Result<Arc<dyn ChunkStore>>;

    /// Build the unbounded overflow backend
    fn overflow(&self, geometry: ChunkGeometry) -> Arc<dyn ChunkStore>;
}

/// Factory for the bundled backends
///
/// - `Directory` → `DirChunkStore` at `root_dir`, or `{data_dir}/{name}`
/// - `File`      → `FileChunkStore` at `{data_dir}/{name}.chunks`
/// - overflow    → `MemoryChunkStore`
#[derive(Debug, Clone)]
pub struct DefaultBackendFactory {
    root_dir: Option<PathBuf>,
    data_dir: PathBuf,
    name: String,
}

impl DefaultBackendFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            root_dir: config.root_dir.clone(),
            data_dir: config.data_dir.clone(),
            name: config.name.clone().unwrap_or_else(generated_name),
        }
    }

    /// Directory used by the directory backend
    pub fn directory_path(&self) -> PathBuf {
        match &self.root_dir {
            Some(root) => root.clone(),
            None => self.data_dir.join(&self.name),
        }
    }

    /// File used by the single-file backend
    pub fn file_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.chunks", self.name))
    }
}

#[async_trait]
impl BackendFactory for DefaultBackendFactory {
    async fn persistent(
        &self,
        kind: PersistentKind,
        geometry: ChunkGeometry,
    ) -> Result<Arc<dyn ChunkStore>> {
        match kind {
            PersistentKind::Directory => {
                let store = DirChunkStore::open(self.directory_path(), geometry).await?;
                Ok(Arc::new(store))
            }
            PersistentKind::File => {
                let store = FileChunkStore::open(self.file_path(), geometry).await?;
                Ok(Arc::new(store))
            }
        }
    }

    fn overflow(&self, geometry: ChunkGeometry) -> Arc<dyn ChunkStore> {
        Arc::new(MemoryChunkStore::new(geometry.chunk_length, geometry.length))
    }
}

/// "store-<pid>-<n>", unique within the process
fn generated_name() -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    format!(
        "store-{}-{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    )
}
