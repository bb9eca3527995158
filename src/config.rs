use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::hot::dispatch::DispatchSettings;
use crate::hot::score::HotScoreWeights;
use crate::media::fetch::{DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_BYTES};
use crate::media::store::{BlobStore, HttpObjectStore, LocalBlobStore};

/// Tunables for the HOT-post job.
#[derive(Debug, Clone)]
pub struct HotPostSettings {
    /// Sliding window for candidates and decay (default 7 days)
    pub window_days: u32,
    /// Candidate cap before scoring (default 100)
    pub max_candidates: u32,
    /// Ranked list length (default 20)
    pub top_n: usize,
    /// Highest rank that gets a notification (default 10)
    pub notify_max_rank: u32,
    /// Per-post notification cooldown (default 24 h)
    pub cooldown_hours: u32,
    /// Concurrent notification inserts (default 10)
    pub notify_batch_size: usize,
    /// Pause between notification batches (default none)
    pub notify_batch_pause: Duration,
    pub weights: HotScoreWeights,
}

impl Default for HotPostSettings {
    fn default() -> Self {
        Self {
            window_days: 7,
            max_candidates: 100,
            top_n: 20,
            notify_max_rank: 10,
            cooldown_hours: 24,
            notify_batch_size: 10,
            notify_batch_pause: Duration::ZERO,
            weights: HotScoreWeights::default(),
        }
    }
}

impl HotPostSettings {
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            notify_max_rank: self.notify_max_rank,
            batch_size: self.notify_batch_size,
            batch_pause: self.notify_batch_pause,
        }
    }
}

/// Tunables for media mirroring and conversion.
#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub origin_base_url: String,
    pub fetch_timeout: Duration,
    pub max_fetch_bytes: u64,
    /// WebP quality, 0-100 (default 80)
    pub quality: u8,
    /// Entities processed concurrently by bulk jobs (default 5)
    pub batch_size: usize,
    /// Pause between bulk batches (default 1 s)
    pub batch_pause: Duration,
    /// How long an error row serves the origin URL before a retry (default 60 min)
    pub error_retry_minutes: u32,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            origin_base_url: crate::media::source::DEFAULT_ORIGIN_BASE_URL.to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_fetch_bytes: DEFAULT_MAX_BYTES,
            quality: crate::media::encode::DEFAULT_QUALITY,
            batch_size: 5,
            batch_pause: Duration::from_millis(1000),
            error_retry_minutes: 60,
        }
    }
}

/// Where mirrored media is written.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    /// Directory tree on local disk (default ./media)
    Local {
        root: PathBuf,
        public_base_url: String,
    },
    /// Hosted storage REST API
    Hosted { url: String, service_key: String },
}

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
pub struct Config {
    pub db_path: String,
    /// PostgreSQL connection URL (when set and starts with postgres://, uses Postgres backend)
    pub database_url: Option<String>,
    pub hot: HotPostSettings,
    pub media: MediaSettings,
    pub storage: StorageBackend,
    /// Bearer token for POST /api/jobs/hot-posts (PITCHSIDE_JOB_SECRET)
    pub job_secret: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the job secret, which is only
    /// checked when the server starts.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. `load` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let hot_defaults = HotPostSettings::default();
        let hot = HotPostSettings {
            window_days: parse_or(&get, "PITCHSIDE_HOT_WINDOW_DAYS", hot_defaults.window_days)?,
            max_candidates: parse_or(
                &get,
                "PITCHSIDE_HOT_MAX_CANDIDATES",
                hot_defaults.max_candidates,
            )?,
            top_n: parse_or(&get, "PITCHSIDE_HOT_TOP_N", hot_defaults.top_n)?,
            notify_max_rank: parse_or(
                &get,
                "PITCHSIDE_HOT_NOTIFY_MAX_RANK",
                hot_defaults.notify_max_rank,
            )?,
            cooldown_hours: parse_or(
                &get,
                "PITCHSIDE_HOT_COOLDOWN_HOURS",
                hot_defaults.cooldown_hours,
            )?,
            notify_batch_size: parse_or(
                &get,
                "PITCHSIDE_HOT_NOTIFY_BATCH_SIZE",
                hot_defaults.notify_batch_size,
            )?,
            notify_batch_pause: Duration::from_millis(parse_or(
                &get,
                "PITCHSIDE_HOT_NOTIFY_BATCH_PAUSE_MS",
                0u64,
            )?),
            weights: hot_defaults.weights,
        };

        let media_defaults = MediaSettings::default();
        let media = MediaSettings {
            origin_base_url: get("PITCHSIDE_MEDIA_ORIGIN_URL")
                .unwrap_or(media_defaults.origin_base_url),
            fetch_timeout: Duration::from_secs(parse_or(
                &get,
                "PITCHSIDE_MEDIA_FETCH_TIMEOUT_SECS",
                media_defaults.fetch_timeout.as_secs(),
            )?),
            max_fetch_bytes: parse_or(
                &get,
                "PITCHSIDE_MEDIA_MAX_BYTES",
                media_defaults.max_fetch_bytes,
            )?,
            quality: parse_or(&get, "PITCHSIDE_MEDIA_QUALITY", media_defaults.quality)?,
            batch_size: parse_or(&get, "PITCHSIDE_MEDIA_BATCH_SIZE", media_defaults.batch_size)?,
            batch_pause: Duration::from_millis(parse_or(
                &get,
                "PITCHSIDE_MEDIA_BATCH_PAUSE_MS",
                1000u64,
            )?),
            error_retry_minutes: parse_or(
                &get,
                "PITCHSIDE_MEDIA_ERROR_RETRY_MINUTES",
                media_defaults.error_retry_minutes,
            )?,
        };
        if media.quality > 100 {
            anyhow::bail!("PITCHSIDE_MEDIA_QUALITY must be between 0 and 100");
        }

        // Hosted storage wins when both its URL and key are present
        let storage = match (get("PITCHSIDE_STORAGE_URL"), get("PITCHSIDE_STORAGE_SERVICE_KEY")) {
            (Some(url), Some(service_key)) => StorageBackend::Hosted { url, service_key },
            (Some(_), None) => anyhow::bail!(
                "PITCHSIDE_STORAGE_URL is set but PITCHSIDE_STORAGE_SERVICE_KEY is not.\n\
                 Add the service key to your .env file, or unset the URL to use local storage."
            ),
            _ => StorageBackend::Local {
                root: PathBuf::from(
                    get("PITCHSIDE_MEDIA_DIR").unwrap_or_else(|| "./media".to_string()),
                ),
                public_base_url: get("PITCHSIDE_MEDIA_PUBLIC_URL")
                    .unwrap_or_else(|| "/media".to_string()),
            },
        };

        Ok(Self {
            db_path: get("PITCHSIDE_DB_PATH").unwrap_or_else(|| "./pitchside.db".to_string()),
            database_url: get("DATABASE_URL"),
            hot,
            media,
            storage,
            job_secret: get("PITCHSIDE_JOB_SECRET").unwrap_or_default(),
        })
    }

    /// Check that the job trigger secret is configured.
    /// Call this before exposing the HTTP job endpoint.
    pub fn require_job_secret(&self) -> Result<()> {
        if self.job_secret.is_empty() {
            anyhow::bail!(
                "PITCHSIDE_JOB_SECRET not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Construct the configured blob store.
    pub fn blob_store(&self) -> Result<Arc<dyn BlobStore>> {
        match &self.storage {
            StorageBackend::Local {
                root,
                public_base_url,
            } => Ok(Arc::new(LocalBlobStore::new(root.clone(), public_base_url))),
            StorageBackend::Hosted { url, service_key } => {
                Ok(Arc::new(HttpObjectStore::new(url, service_key)?))
            }
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw}")),
        None => Ok(default),
    }
}
