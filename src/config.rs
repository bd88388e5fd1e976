//! Configuration for hybridchunk
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Minimum bytes always withheld from the probed persistent capacity (16 MiB)
pub const MIN_RESERVED: u64 = 16 * 1024 * 1024;

/// Default number of chunks held by the cache decorator
pub const DEFAULT_MAX_CACHED: usize = 20;

/// Main configuration for a hybrid chunk store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Logical Store
    // -------------------------------------------------------------------------
    /// Total logical byte length across all chunks (`None` = unbounded)
    pub length: Option<u64>,

    // -------------------------------------------------------------------------
    // Capacity Policy
    // -------------------------------------------------------------------------
    /// Bytes to withhold from persistent capacity.
    /// Values below `MIN_RESERVED` are raised to it.
    pub reserved: u64,

    /// Skip capacity probing and serve everything from memory
    pub only_mem: bool,

    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Max chunk entries kept by the cache decorator
    pub max_cached: usize,

    // -------------------------------------------------------------------------
    // Persistent Storage Location
    // -------------------------------------------------------------------------
    /// Explicit directory for the directory backend.
    /// Its quota cannot be probed, so capacity is treated as unknown.
    pub root_dir: Option<PathBuf>,

    /// Root for persistent backends when no `root_dir` is given
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── {name}/           (directory backend, one file per chunk)
    ///     └── {name}.chunks     (single-file backend)
    pub data_dir: PathBuf,

    /// Name of the sub-directory / file stem (`None` = generated per store)
    pub name: Option<String>,
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reserve actually applied to the probed capacity
    pub fn effective_reserved(&self) -> u64 {
        self.reserved.max(MIN_RESERVED)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            length: None,
            reserved: MIN_RESERVED,
            only_mem: false,
            max_cached: DEFAULT_MAX_CACHED,
            root_dir: None,
            data_dir: PathBuf::from("./hybridchunk_data"),
            name: None,
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the total logical length (in bytes)
    pub fn length(mut self, length: u64) -> Self {
        self.config.length = Some(length);
        self
    }

    /// Set the reserved safety margin (in bytes)
    pub fn reserved(mut self, bytes: u64) -> Self {
        self.config.reserved = bytes;
        self
    }

    /// Force memory-only operation
    pub fn only_mem(mut self, only_mem: bool) -> Self {
        self.config.only_mem = only_mem;
        self
    }

    /// Set the cache decorator capacity (in chunks)
    pub fn max_cached(mut self, max: usize) -> Self {
        self.config.max_cached = max;
        self
    }

    /// Set an explicit directory for the directory backend
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.root_dir = Some(path.into());
        self
    }

    /// Set the data directory (root for persistent backends)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the backend name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Runtime capabilities fed to the backend selector
///
/// Injected by the caller instead of being sniffed from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Directory-based persistent storage is available
    pub directory_storage: bool,

    /// The host belongs to the engine family that reports a fixed
    /// 2^31 quota regardless of real capacity
    pub misreporting_engine: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            directory_storage: true,
            misreporting_engine: false,
        }
    }
}
