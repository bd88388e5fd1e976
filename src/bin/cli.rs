//! hybridchunk CLI
//!
//! Inspect backend selection and exercise a store end to end.

use std::sync::Arc;

use bytes::Bytes;
use clap::{Args as ClapArgs, Parser, Subcommand};
use hybridchunk::factory::DefaultBackendFactory;
use hybridchunk::policy::{self, Selection};
use hybridchunk::probe::{CapacityProbe, FsProbe, StaticProbe, StorageEstimate};
use hybridchunk::router::Tier;
use hybridchunk::{Capabilities, Config, HybridChunkStore};
use tracing_subscriber::{fmt, EnvFilter};

/// hybridchunk CLI
#[derive(Parser, Debug)]
#[command(name = "hybridchunk-cli")]
#[command(about = "Tiered chunk store: plan and exercise backend selection")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the backend selection and partition without creating anything
    Plan {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Write chunks through a real store, read them back and verify
    Exercise {
        #[command(flatten)]
        store: StoreArgs,

        /// Number of chunks to write
        #[arg(short = 'n', long, default_value = "16")]
        chunks: u64,

        /// Keep persisted data instead of destroying the store
        #[arg(long)]
        keep: bool,
    },
}

#[derive(ClapArgs, Debug)]
struct StoreArgs {
    /// Chunk size in bytes
    #[arg(short, long, default_value = "16384")]
    chunk_length: usize,

    /// Total logical length in bytes (unbounded when omitted)
    #[arg(short, long)]
    length: Option<u64>,

    /// Probed quota in bytes (probes the data directory when omitted)
    #[arg(long, requires = "used")]
    quota: Option<u64>,

    /// Probed usage in bytes
    #[arg(long, requires = "quota")]
    used: Option<u64>,

    /// Bytes withheld from persistent capacity
    #[arg(long)]
    reserved: Option<u64>,

    /// Serve everything from memory
    #[arg(long)]
    only_mem: bool,

    /// Pretend directory storage is unavailable
    #[arg(long)]
    no_directory: bool,

    /// Pretend to be an engine that misreports quota as 2^31
    #[arg(long)]
    misreporting_engine: bool,

    /// Explicit directory for the directory backend
    #[arg(long)]
    root_dir: Option<String>,

    /// Data directory for persistent backends
    #[arg(short, long, default_value = "./hybridchunk_data")]
    data_dir: String,

    /// Cached chunk count
    #[arg(short, long, default_value = "20")]
    max_cached: usize,
}

impl StoreArgs {
    fn config(&self) -> Config {
        let mut builder = Config::builder()
            .data_dir(&self.data_dir)
            .only_mem(self.only_mem)
            .max_cached(self.max_cached);
        if let Some(length) = self.length {
            builder = builder.length(length);
        }
        if let Some(reserved) = self.reserved {
            builder = builder.reserved(reserved);
        }
        if let Some(root_dir) = &self.root_dir {
            builder = builder.root_dir(root_dir);
        }
        builder.build()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            directory_storage: !self.no_directory,
            misreporting_engine: self.misreporting_engine,
        }
    }

    fn probe(&self) -> Arc<dyn CapacityProbe> {
        match (self.quota, self.used) {
            (Some(quota), Some(used)) => Arc::new(StaticProbe::new(quota, used)),
            _ => Arc::new(FsProbe::new(&self.data_dir)),
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hybridchunk=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    tracing::info!("hybridchunk CLI v{}", hybridchunk::VERSION);

    let result = match args.command {
        Commands::Plan { store } => plan(&store).await,
        Commands::Exercise { store, chunks, keep } => exercise(&store, chunks, keep).await,
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn plan(args: &StoreArgs) -> hybridchunk::Result<()> {
    if args.chunk_length == 0 {
        return Err(hybridchunk::ChunkError::Config(
            "chunk length must be greater than zero".to_string(),
        ));
    }
    let config = args.config();

    let estimate: Option<StorageEstimate> = if config.only_mem {
        None
    } else {
        Some(args.probe().estimate().await?)
    };
    if let Some(estimate) = estimate {
        println!(
            "estimate:  quota={} used={} available={}",
            estimate.quota,
            estimate.used,
            estimate.available(config.effective_reserved())
        );
    }

    let selection = policy::select(&config, args.capabilities(), estimate);
    println!("selection: {:?}", selection);

    if let Selection::Persistent {
        target_length,
        kind,
    } = selection
    {
        let partition = policy::partition(target_length, config.length, args.chunk_length);
        println!("partition: {:?}", partition);

        let factory = DefaultBackendFactory::new(&config);
        let location = match kind {
            policy::PersistentKind::Directory => factory.directory_path(),
            policy::PersistentKind::File => factory.file_path(),
        };
        println!("location:  {}", location.display());
    }
    Ok(())
}

async fn exercise(args: &StoreArgs, chunks: u64, keep: bool) -> hybridchunk::Result<()> {
    let config = args.config();
    let factory = Arc::new(DefaultBackendFactory::new(&config));
    let store = HybridChunkStore::with_parts(
        args.chunk_length,
        config,
        args.capabilities(),
        args.probe(),
        factory,
    )?;

    store.ready().await?;
    let split_index = store.split_index().await?;
    tracing::info!(split_index, backends = store.backend_count().await?, "store ready");

    let chunk_count = match store.length() {
        Some(length) => chunks.min(length.div_ceil(args.chunk_length as u64)),
        None => chunks,
    };

    let mut persistent = 0u64;
    let mut overflow = 0u64;
    for index in 0..chunk_count {
        let buf = pattern(index, expected_len(&store, index));
        store.put(index, buf).await?;
        match store.tier(index).await? {
            Tier::Persistent => persistent += 1,
            Tier::Overflow => overflow += 1,
        }
    }

    for index in 0..chunk_count {
        let expected = pattern(index, expected_len(&store, index));
        let actual = store.get(index, None).await?;
        if actual != expected {
            return Err(hybridchunk::ChunkError::Corruption(format!(
                "chunk {} read back different bytes",
                index
            )));
        }
    }

    println!(
        "verified {} chunks: split_index={} persistent={} overflow={}",
        chunk_count, split_index, persistent, overflow
    );

    if keep {
        store.close().await
    } else {
        store.destroy().await
    }
}

/// Byte size of chunk `index` (the last chunk may be short)
fn expected_len(store: &HybridChunkStore, index: u64) -> usize {
    let chunk_length = store.chunk_length() as u64;
    match store.length() {
        Some(length) => (length - index * chunk_length).min(chunk_length) as usize,
        None => chunk_length as usize,
    }
}

/// Deterministic chunk contents
fn pattern(index: u64, len: usize) -> Bytes {
    (0..len)
        .map(|i| (index as usize).wrapping_mul(31).wrapping_add(i) as u8)
        .collect::<Vec<u8>>()
        .into()
}
