//! Application configuration management

use std::env;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Root for everything curator writes (temp, cache, sidecars)
    pub data_dir: PathBuf,

    /// Shared staging area for artwork downloads
    pub temp_dir: PathBuf,

    /// Cached artwork renditions
    pub cache_dir: PathBuf,

    /// Library datasource directories to scan
    pub datasources: Vec<PathBuf>,

    /// Concurrent background tasks (image downloads etc.)
    pub background_pool_size: usize,

    /// Concurrent media-info probes (default: hardware parallelism)
    pub probe_pool_size: usize,

    /// Pause after syncing a downloaded artwork file, in milliseconds.
    /// Tolerates filesystems with delayed write visibility; 0 disables.
    pub artwork_settle_ms: u64,

    /// Poll interval of the headless drain loop, in milliseconds
    pub drain_poll_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let data_dir = env::var("DATA_PATH").map(PathBuf::from).unwrap_or_else(|_| {
            dirs::data_local_dir()
                .map(|dir| dir.join("curator"))
                .unwrap_or_else(|| PathBuf::from("./data"))
        });

        let temp_dir = env::var("TEMP_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("tmp"));

        let cache_dir = env::var("CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("cache"));

        let datasources = env::var("DATASOURCE_PATHS")
            .map(|paths| env::split_paths(&paths).collect())
            .unwrap_or_default();

        Ok(Self {
            data_dir,
            temp_dir,
            cache_dir,
            datasources,

            background_pool_size: env::var("BACKGROUND_POOL_SIZE")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid BACKGROUND_POOL_SIZE")?,

            probe_pool_size: env::var("PROBE_POOL_SIZE")
                .ok()
                .map(|value| value.parse().context("Invalid PROBE_POOL_SIZE"))
                .transpose()?
                .unwrap_or_else(|| {
                    std::thread::available_parallelism()
                        .map(NonZeroUsize::get)
                        .unwrap_or(2)
                }),

            artwork_settle_ms: env::var("ARTWORK_SETTLE_MS")
                .unwrap_or_else(|_| "150".to_string())
                .parse()
                .context("Invalid ARTWORK_SETTLE_MS")?,

            drain_poll_ms: env::var("DRAIN_POLL_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .context("Invalid DRAIN_POLL_MS")?,
        })
    }
}
