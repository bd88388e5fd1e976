//! Directory chunk store
//!
//! One file per chunk inside a dedicated directory.
//!
//! ## Layout
//! ```text
//! {dir}/
//!   ├── chunk_0
//!   ├── chunk_1
//!   └── ...
//! ```
//! Writes land in `chunk_<i>.<seq>.tmp` first and are renamed into place,
//! so a reader never observes a half-written chunk. `seq` is unique per
//! write, which lets concurrent writes to one index proceed independently;
//! the last rename wins.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{ChunkError, Result};

use super::{select, ChunkGeometry, ChunkStore, GetOptions};

/// Persistent chunk store backed by a directory of chunk files
pub struct DirChunkStore {
    dir: PathBuf,
    geometry: ChunkGeometry,
    closed: AtomicBool,
    /// Next temp file sequence number
    next_temp: AtomicU64,
}

impl DirChunkStore {
    /// Open or create the store directory
    pub async fn open(dir: impl Into<PathBuf>, geometry: ChunkGeometry) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        tracing::debug!(dir = %dir.display(), ?geometry, "opened directory chunk store");

        Ok(Self {
            dir,
            geometry,
            closed: AtomicBool::new(false),
            next_temp: AtomicU64::new(0),
        })
    }

    /// Directory holding the chunk files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChunkError::Closed);
        }
        Ok(())
    }

    /// "chunk_42" for index 42
    fn chunk_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("chunk_{}", index))
    }

    fn temp_path(&self, index: u64) -> PathBuf {
        let seq = self.next_temp.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!("chunk_{}.{}.tmp", index, seq))
    }
}

#[async_trait]
impl ChunkStore for DirChunkStore {
    fn chunk_length(&self) -> usize {
        self.geometry.chunk_length
    }

    async fn get(&self, index: u64, opts: Option<GetOptions>) -> Result<Bytes> {
        self.ensure_open()?;
        let expected = self.geometry.expected_length(index)?;
        let data = match fs::read(self.chunk_path(index)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(ChunkError::NotFound(index)),
            Err(e) => return Err(e.into()),
        };
        if data.len() != expected {
            return Err(ChunkError::Corruption(format!(
                "chunk file {} holds {} bytes, expected {}",
                index,
                data.len(),
                expected
            )));
        }
        Ok(select(Bytes::from(data), opts))
    }

    async fn put(&self, index: u64, buf: Bytes) -> Result<()> {
        self.ensure_open()?;
        self.geometry.validate_put(index, &buf)?;

        let temp = self.temp_path(index);
        if let Err(e) = write_and_rename(&temp, &self.chunk_path(index), &buf).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(ChunkError::Closed);
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.close().await?;
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::debug!(dir = %self.dir.display(), "destroyed directory chunk store");
        Ok(())
    }
}

async fn write_and_rename(temp: &Path, target: &Path, buf: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(temp).await?;
    file.write_all(buf).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(temp, target).await
}
