//! Chunk Router
//!
//! Maps a logical chunk index to the backend that holds it.
//!
//! A single persistent backend serves the contiguous prefix
//! `[0, split_index)`; everything else goes to the overflow backend,
//! re-addressed from zero. Lookup is a bounds check, not a table.
//!
//! ```text
//!  logical:   0   1   2   3   4 │ 5   6   7   8   9
//!             └── persistent ───┘ └──── overflow ───┘
//!  backend:   0   1   2   3   4 │ 0   1   2   3   4
//!                        split_index = 5
//! ```

use std::sync::Arc;

use crate::backend::ChunkStore;

/// Which tier serves a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// The persistent prefix `[0, split_index)`
    Persistent,

    /// The catch-all backend. When nothing is split this is the persistent
    /// backend itself (or memory, for memory-only stores).
    Overflow,
}

/// Result of resolving one index
pub struct Route<'a> {
    pub tier: Tier,
    pub backend: &'a Arc<dyn ChunkStore>,
    /// Index to use on `backend`
    pub index: u64,
}

/// Frozen routing state, built once during initialization
pub struct Routing {
    split_index: u64,
    persistent: Option<Arc<dyn ChunkStore>>,
    overflow: Arc<dyn ChunkStore>,
    /// Every backend created, in creation order, for close/destroy
    backends: Vec<Arc<dyn ChunkStore>>,
}

impl Routing {
    /// The overflow backend alone serves every index
    pub fn single(overflow: Arc<dyn ChunkStore>) -> Self {
        Self {
            split_index: 0,
            persistent: None,
            backends: vec![Arc::clone(&overflow)],
            overflow,
        }
    }

    /// `persistent` serves `[0, split_index)`, `overflow` the rest
    pub fn split(
        split_index: u64,
        persistent: Arc<dyn ChunkStore>,
        overflow: Arc<dyn ChunkStore>,
    ) -> Self {
        Self {
            split_index,
            backends: vec![Arc::clone(&overflow), Arc::clone(&persistent)],
            persistent: Some(persistent),
            overflow,
        }
    }

    /// First index served by the overflow backend (0 when nothing is split)
    pub fn split_index(&self) -> u64 {
        self.split_index
    }

    /// Resolve `index` to its backend and backend-local index
    pub fn resolve(&self, index: u64) -> Route<'_> {
        match &self.persistent {
            Some(persistent) if index < self.split_index => Route {
                tier: Tier::Persistent,
                backend: persistent,
                index,
            },
            _ => Route {
                tier: Tier::Overflow,
                backend: &self.overflow,
                index: index - self.split_index,
            },
        }
    }

    /// All backends that need close/destroy
    pub fn backends(&self) -> &[Arc<dyn ChunkStore>] {
        &self.backends
    }
}
