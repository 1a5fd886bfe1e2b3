//! Configuration for kiln-harvest
//!
//! Loaded from `kiln-harvest.toml` (see [`kiln_common::config::config_file_path`]).
//! Every field has a built-in default, so a missing file or a partial file is
//! fine. [`HarvestConfig::validate`] rejects values that would make every
//! object fail identically; those abort the run before any request is made.
//!
//! ```toml
//! root_folder = "./iran_pottery_dataset"
//!
//! [logging]
//! level = "info"
//!
//! [run]
//! max_entries = 200
//! workers = 16
//!
//! [download]
//! timeout_secs = 25
//! max_retries = 4
//!
//! [[taxonomy]]
//! name = "Achaemenid"
//! era = "pre_islamic"
//! keywords = ["achaemenid"]
//! ```

use crate::error::{HarvestError, HarvestResult};
use crate::models::Era;
use crate::services::collection_client::MET_BASE_URL;
use crate::services::downloader::DEFAULT_MIN_IMAGE_BYTES;
use crate::services::query_planner::DEFAULT_RELEVANCE_TERM;
use crate::services::retry::MAX_ATTEMPTS;
use crate::services::{DownloaderSettings, RetryPolicy, SubPeriod, Taxonomy, TaxonomyError};
use kiln_common::config::{load_toml_config, resolve_root_folder, LoggingConfig, ROOT_FOLDER_ENV_VAR};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for `api.fetch_backoff_ms` and `download.backoff_base_ms`
pub const MAX_BACKOFF_BASE_MS: u64 = 60_000;

/// Complete harvest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Dataset root; overridden by `KILN_ROOT_FOLDER`
    pub root_folder: Option<PathBuf>,
    /// Base name of the exported `.json` / `.csv` files
    pub dataset_name: String,
    pub logging: LoggingConfig,
    pub run: RunConfig,
    pub api: ApiConfig,
    pub download: DownloadConfig,
    pub classifier: ClassifierConfig,
    /// Replacement taxonomy; empty means the built-in Iranian ceramics table
    pub taxonomy: Vec<SubPeriodConfig>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            dataset_name: "iran_pottery_metadata".to_string(),
            logging: LoggingConfig::default(),
            run: RunConfig::default(),
            api: ApiConfig::default(),
            download: DownloadConfig::default(),
            classifier: ClassifierConfig::default(),
            taxonomy: Vec::new(),
        }
    }
}

/// Run limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum entries committed to the dataset
    pub max_entries: usize,
    /// Worker pool size (bounds concurrent upstream requests)
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_entries: 200,
            workers: 16,
        }
    }
}

/// Collection API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Per-request timeout for search and object calls
    pub timeout_secs: u64,
    /// Metadata request rate shared by all workers
    pub requests_per_second: u32,
    /// Pause between consecutive search queries
    pub search_delay_ms: u64,
    /// Total attempts for a metadata fetch (transport failures only)
    pub fetch_attempts: u32,
    pub fetch_backoff_ms: u64,
    /// Appended to each sub-period's primary keyword
    pub relevance_term: String,
    /// Broad queries issued after the per-sub-period ones
    pub extra_queries: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: MET_BASE_URL.to_string(),
            timeout_secs: 25,
            requests_per_second: 10,
            search_delay_ms: 1000,
            fetch_attempts: 2,
            fetch_backoff_ms: 500,
            relevance_term: DEFAULT_RELEVANCE_TERM.to_string(),
            extra_queries: vec!["Persian pottery".to_string(), "Iranian ceramics".to_string()],
        }
    }
}

/// Image download settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub timeout_secs: u64,
    /// Total attempts per image, including the first
    pub max_retries: u32,
    /// Backoff after the first failed attempt; doubles afterwards
    pub backoff_base_ms: u64,
    /// Quality floor in bytes
    pub min_image_bytes: u64,
    /// Reuse valid images left by an earlier run
    pub skip_existing: bool,
    /// Client identities rotated per attempt
    pub user_agents: Vec<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 25,
            max_retries: 4,
            backoff_base_ms: 2000,
            min_image_bytes: DEFAULT_MIN_IMAGE_BYTES,
            skip_existing: true,
            user_agents: default_user_agents(),
        }
    }
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/92.0.4515.107 Safari/537.36",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Classifier options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Fall back to BC / Hijri date markers when no keyword matches
    pub date_fallback: bool,
}

/// One `[[taxonomy]]` table entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubPeriodConfig {
    pub name: String,
    pub era: Era,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl HarvestConfig {
    /// Load from a TOML file, or defaults if the file does not exist
    pub fn load(path: Option<&Path>) -> HarvestResult<Self> {
        Ok(load_toml_config(path)?)
    }

    /// Resolved dataset root (`KILN_ROOT_FOLDER` → TOML → OS default)
    pub fn root_folder(&self) -> PathBuf {
        resolve_root_folder(ROOT_FOLDER_ENV_VAR, self.root_folder.as_deref())
    }

    /// Configured taxonomy, or the built-in one when none is declared
    pub fn taxonomy(&self) -> Result<Taxonomy, TaxonomyError> {
        if self.taxonomy.is_empty() {
            return Ok(Taxonomy::iran_pottery());
        }

        Taxonomy::new(
            self.taxonomy
                .iter()
                .map(|s| SubPeriod::new(s.name.clone(), s.era, &s.keywords))
                .collect(),
        )
    }

    /// Reject settings that would fail every object the same way
    pub fn validate(&self) -> HarvestResult<()> {
        let fatal = |msg: &str| Err(HarvestError::Fatal(msg.to_string()));

        if self.run.workers == 0 {
            return fatal("run.workers must be at least 1");
        }
        if self.run.max_entries == 0 {
            return fatal("run.max_entries must be at least 1");
        }
        if self.api.timeout_secs == 0 || self.download.timeout_secs == 0 {
            return fatal("request timeouts must be at least 1 second");
        }
        if self.api.requests_per_second == 0 {
            return fatal("api.requests_per_second must be at least 1");
        }
        if self.api.fetch_attempts == 0 {
            return fatal("api.fetch_attempts must be at least 1");
        }
        if self.download.max_retries == 0 {
            return fatal("download.max_retries must be at least 1");
        }
        if self.api.fetch_attempts > MAX_ATTEMPTS || self.download.max_retries > MAX_ATTEMPTS {
            return Err(HarvestError::Fatal(format!(
                "attempt budgets must be at most {}",
                MAX_ATTEMPTS
            )));
        }
        if !(1..=MAX_BACKOFF_BASE_MS).contains(&self.api.fetch_backoff_ms)
            || !(1..=MAX_BACKOFF_BASE_MS).contains(&self.download.backoff_base_ms)
        {
            return Err(HarvestError::Fatal(format!(
                "backoff bases must be between 1 and {} ms",
                MAX_BACKOFF_BASE_MS
            )));
        }
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://")) {
            return fatal("api.base_url must be an http(s) URL");
        }
        if self.download.user_agents.iter().all(|ua| ua.trim().is_empty()) {
            return fatal("download.user_agents must contain at least one entry");
        }
        if self.dataset_name.trim().is_empty() || self.dataset_name.contains(['/', '\\']) {
            return fatal("dataset_name must be a plain file name");
        }

        self.taxonomy()?;
        Ok(())
    }

    pub fn user_agents(&self) -> Arc<[String]> {
        self.download
            .user_agents
            .iter()
            .map(|ua| ua.trim())
            .filter(|ua| !ua.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn requests_per_second(&self) -> NonZeroU32 {
        NonZeroU32::new(self.api.requests_per_second).unwrap_or(NonZeroU32::MIN)
    }

    pub fn fetch_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.api.fetch_attempts, Duration::from_millis(self.api.fetch_backoff_ms))
    }

    pub fn download_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.download.max_retries,
            Duration::from_millis(self.download.backoff_base_ms),
        )
    }

    pub fn downloader_settings(&self) -> DownloaderSettings {
        DownloaderSettings {
            timeout: Duration::from_secs(self.download.timeout_secs),
            min_bytes: self.download.min_image_bytes,
            user_agents: self.user_agents(),
            skip_existing: self.download.skip_existing,
        }
    }
}
