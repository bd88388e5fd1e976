//! Single-file chunk store
//!
//! Fallback persistent tier for hosts without directory storage: every
//! chunk owns a fixed-size slot in one file.
//!
//! ## Slot Format
//! ```text
//! ┌──────────┬──────────┬──────────────────────────┐
//! │ Len (4)  │ CRC (4)  │ Data (chunk_length)      │
//! └──────────┴──────────┴──────────────────────────┘
//! slot i starts at i * (SLOT_HEADER_SIZE + chunk_length)
//! ```
//! A zero length (or a slot past end of file) means the chunk was never
//! written. Holes are left sparse by the filesystem. Slots must end below
//! `i64::MAX`, which caps the addressable index of an unbounded store.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::{ChunkError, Result};

use super::{select, ChunkGeometry, ChunkStore, GetOptions};

/// Slot header: length (4) + crc32 (4)
pub const SLOT_HEADER_SIZE: u64 = 8;

/// Largest offset a seek can reach on every supported platform
const MAX_FILE_OFFSET: u64 = i64::MAX as u64;

/// Persistent chunk store backed by a single slot file
///
/// ## Concurrency:
/// - `file`: async Mutex, since every access is a seek followed by I/O
pub struct FileChunkStore {
    path: PathBuf,
    geometry: ChunkGeometry,
    file: Mutex<File>,
    closed: AtomicBool,
}

impl FileChunkStore {
    /// Open or create the slot file
    pub async fn open(path: impl Into<PathBuf>, geometry: ChunkGeometry) -> Result<Self> {
        let path = path.into();
        // The slot header stores the length as u32
        if geometry.chunk_length as u64 > u32::MAX as u64 {
            return Err(ChunkError::Config(format!(
                "chunk length {} does not fit a slot header",
                geometry.chunk_length
            )));
        }
        if geometry.chunk_length == 0 {
            return Err(ChunkError::Config(
                "chunk length must be greater than zero".to_string(),
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .await?;
        tracing::debug!(path = %path.display(), ?geometry, "opened file chunk store");

        Ok(Self {
            path,
            geometry,
            file: Mutex::new(file),
            closed: AtomicBool::new(false),
        })
    }

    /// Path of the slot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChunkError::Closed);
        }
        Ok(())
    }

    fn slot_size(&self) -> u64 {
        SLOT_HEADER_SIZE + self.geometry.chunk_length as u64
    }

    /// Highest index whose slot still fits in the file
    pub fn last_addressable_index(&self) -> u64 {
        MAX_FILE_OFFSET / self.slot_size() - 1
    }

    /// Byte offset of slot `index`, rejecting indices outside the store
    fn slot_offset(&self, index: u64) -> Result<u64> {
        self.geometry.expected_length(index)?;
        let last = self.last_addressable_index();
        if index > last {
            return Err(ChunkError::OutOfRange { index, last });
        }
        Ok(index * self.slot_size())
    }
}

#[async_trait]
impl ChunkStore for FileChunkStore {
    fn chunk_length(&self) -> usize {
        self.geometry.chunk_length
    }

    async fn get(&self, index: u64, opts: Option<GetOptions>) -> Result<Bytes> {
        self.ensure_open()?;
        let offset = self.slot_offset(index)?;
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut header = [0u8; SLOT_HEADER_SIZE as usize];
        match file.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(ChunkError::NotFound(index))
            }
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let stored_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if len == 0 {
            return Err(ChunkError::NotFound(index));
        }
        if len > self.geometry.chunk_length {
            return Err(ChunkError::Corruption(format!(
                "slot {} claims {} bytes, chunk length is {}",
                index, len, self.geometry.chunk_length
            )));
        }

        let mut data = vec![0u8; len];
        file.read_exact(&mut data).await?;
        drop(file);

        let crc = crc32fast::hash(&data);
        if crc != stored_crc {
            return Err(ChunkError::Corruption(format!(
                "slot {} checksum mismatch: expected {:08x}, got {:08x}",
                index, stored_crc, crc
            )));
        }

        Ok(select(Bytes::from(data), opts))
    }

    async fn put(&self, index: u64, buf: Bytes) -> Result<()> {
        self.ensure_open()?;
        self.geometry.validate_put(index, &buf)?;
        let offset = self.slot_offset(index)?;

        // Prepare slot bytes: [len(4)][crc(4)][data]
        // len <= chunk_length <= u32::MAX, checked in open()
        let mut slot = BytesMut::with_capacity(SLOT_HEADER_SIZE as usize + buf.len());
        slot.put_u32_le(buf.len() as u32);
        slot.put_u32_le(crc32fast::hash(&buf));
        slot.put_slice(&buf);

        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(&slot).await?;
        file.flush().await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(ChunkError::Closed);
        }
        let file = self.file.lock().await;
        file.sync_all().await?;
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.close().await?;
        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::debug!(path = %self.path.display(), "destroyed file chunk store");
        Ok(())
    }
}
