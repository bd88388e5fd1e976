//! Backend Selector
//!
//! Chooses which persistent backend to build, and how much of the probed
//! capacity it may use.

use crate::config::{Capabilities, Config};
use crate::probe::StorageEstimate;

/// Persistent backend implementations the selector can pick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistentKind {
    /// One file per chunk in a directory
    Directory,

    /// Single slot file (fallback when directories are unavailable)
    File,
}

/// Outcome of backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// No persistent backend; the overflow tier serves every index
    MemoryOnly,

    /// Build a persistent backend of `kind`.
    /// `target_length = None` means the capacity is unknown, which the
    /// partition policy treats as "do not split", never as zero.
    Persistent {
        kind: PersistentKind,
        target_length: Option<u64>,
    },
}

/// Decide the persistent backend for this store
///
/// `estimate` is `None` when probing was skipped (memory-only override).
pub fn select(
    config: &Config,
    capabilities: Capabilities,
    estimate: Option<StorageEstimate>,
) -> Selection {
    let estimate = match estimate {
        Some(estimate) if !config.only_mem => estimate,
        _ => return Selection::MemoryOnly,
    };

    let available = estimate.available(config.effective_reserved());
    if available <= 0 {
        return Selection::MemoryOnly;
    }
    let available = u64::try_from(available).unwrap_or(u64::MAX);

    if capabilities.directory_storage {
        // Quota of a caller-chosen directory cannot be probed
        let target_length = match config.root_dir {
            Some(_) => None,
            None => Some(available),
        };
        Selection::Persistent {
            kind: PersistentKind::Directory,
            target_length,
        }
    } else {
        let misreported = capabilities.misreporting_engine && estimate.is_sentinel_quota();
        Selection::Persistent {
            kind: PersistentKind::File,
            target_length: if misreported { None } else { Some(available) },
        }
    }
}
