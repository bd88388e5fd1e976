//! # hybridchunk
//!
//! A tiered chunk store with:
//! - Fixed-size chunks addressed purely by integer index
//! - One-time async capacity discovery and backend selection
//! - A capacity-limited persistent tier behind an LRU cache
//! - An unbounded in-memory overflow tier for whatever does not fit
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    HybridChunkStore                          │
//! │           (ready gate: every request waits once)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Chunk Router                             │
//! │        index < split_index ?  persistent : overflow          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  LRU Cache  │          │   Memory    │
//!   │ (decorator) │          │ (overflow)  │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │ Directory / │
//!   │ Single file │
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod backend;
pub mod probe;
pub mod policy;
pub mod factory;
pub mod router;
pub mod lifecycle;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ChunkError, Result};
pub use config::{Capabilities, Config};
pub use backend::{ChunkStore, GetOptions};
pub use store::HybridChunkStore;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of hybridchunk
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
