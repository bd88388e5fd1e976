//! Capacity Probe
//!
//! One-shot query of the persistent storage quota and how much of it is
//! already used.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{ChunkError, Result};

/// Quota value reported by the misreporting engine family (2^31)
pub const MISREPORTED_QUOTA: u64 = 1 << 31;

/// Quota and usage of the persistent storage area, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageEstimate {
    pub quota: u64,
    pub used: u64,
}

impl StorageEstimate {
    pub fn new(quota: u64, used: u64) -> Self {
        Self { quota, used }
    }

    /// Bytes usable after withholding `reserved`; zero or negative means none
    pub fn available(&self, reserved: u64) -> i128 {
        self.quota as i128 - self.used as i128 - reserved as i128
    }

    /// Quota equals the fixed sentinel some engines report
    pub fn is_sentinel_quota(&self) -> bool {
        self.quota == MISREPORTED_QUOTA
    }
}

/// Asynchronous capacity discovery
#[async_trait]
pub trait CapacityProbe: Send + Sync {
    async fn estimate(&self) -> Result<StorageEstimate>;
}

/// Probe that answers with a fixed estimate or a fixed failure
#[derive(Debug, Clone)]
pub struct StaticProbe {
    outcome: std::result::Result<StorageEstimate, String>,
}

impl StaticProbe {
    pub fn new(quota: u64, used: u64) -> Self {
        Self {
            outcome: Ok(StorageEstimate::new(quota, used)),
        }
    }

    /// A probe whose every call fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
        }
    }
}

#[async_trait]
impl CapacityProbe for StaticProbe {
    async fn estimate(&self) -> Result<StorageEstimate> {
        self.outcome.clone().map_err(ChunkError::Probe)
    }
}

/// Probe that measures the filesystem holding a directory
///
/// `quota` is the filesystem size and `used` everything not available to
/// unprivileged writers, so `quota - used` is the free space.
#[derive(Debug, Clone)]
pub struct FsProbe {
    path: PathBuf,
}

impl FsProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CapacityProbe for FsProbe {
    async fn estimate(&self) -> Result<StorageEstimate> {
        tokio::fs::create_dir_all(&self.path).await?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || statvfs(&path))
            .await
            .map_err(|e| ChunkError::Probe(format!("probe task failed: {}", e)))?
    }
}

#[cfg(unix)]
fn statvfs(path: &std::path::Path) -> Result<StorageEstimate> {
    let stat = nix::sys::statvfs::statvfs(path)
        .map_err(|errno| ChunkError::Io(std::io::Error::from(errno)))?;

    let frsize = stat.fragment_size() as u64;
    let blocks = stat.blocks() as u64;
    let avail = stat.blocks_available() as u64;
    Ok(StorageEstimate::new(
        blocks.saturating_mul(frsize),
        blocks.saturating_sub(avail).saturating_mul(frsize),
    ))
}

#[cfg(not(unix))]
fn statvfs(path: &std::path::Path) -> Result<StorageEstimate> {
    Err(ChunkError::Probe(format!(
        "capacity probing is not supported on this platform ({})",
        path.display()
    )))
}
