//! Image downloader with retry, quality floor, and atomic persistence
//!
//! **Algorithm** for one `download()` call:
//! 1. Reuse a valid file already at the destination (if enabled)
//! 2. Attempt n sends `User-Agent = user_agents[n % len]`
//! 3. Transport failure (timeout, connection, non-2xx) or a payload below the
//!    quality floor consumes an attempt
//! 4. While attempts remain, back off (strictly increasing) and retry
//! 5. A qualifying payload is written atomically and reported as `Success`
//!
//! Every exit is a typed [`DownloadOutcome`]; nothing is thrown to the caller.

use crate::models::{DownloadErrorKind, DownloadOutcome, SkipReason};
use crate::services::retry::RetryPolicy;
use crate::utils::write_atomic;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default quality floor: payloads under 10 KiB are thumbnails or error pages
pub const DEFAULT_MIN_IMAGE_BYTES: u64 = 10 * 1024;

/// Downloader construction parameters
#[derive(Debug, Clone)]
pub struct DownloaderSettings {
    /// Per-request timeout
    pub timeout: Duration,
    /// Quality floor in bytes
    pub min_bytes: u64,
    /// Client identities rotated per attempt
    pub user_agents: Arc<[String]>,
    /// Reuse files of at least `min_bytes` already present at the destination
    pub skip_existing: bool,
}

/// Downloader construction errors
#[derive(Debug, thiserror::Error)]
pub enum DownloaderError {
    #[error("At least one user agent is required")]
    NoUserAgents,

    #[error("HTTP client construction failed: {0}")]
    Client(#[from] reqwest::Error),
}

/// Image downloader shared by all workers
pub struct Downloader {
    http_client: reqwest::Client,
    user_agents: Arc<[String]>,
    min_bytes: u64,
    skip_existing: bool,
}

impl Downloader {
    pub fn new(settings: DownloaderSettings) -> Result<Self, DownloaderError> {
        if settings.user_agents.is_empty() {
            return Err(DownloaderError::NoUserAgents);
        }

        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            http_client,
            user_agents: settings.user_agents,
            min_bytes: settings.min_bytes,
            skip_existing: settings.skip_existing,
        })
    }

    pub fn min_bytes(&self) -> u64 {
        self.min_bytes
    }

    /// User agent for attempt `attempt` (0-based)
    pub fn user_agent_for(&self, attempt: u32) -> &str {
        &self.user_agents[attempt as usize % self.user_agents.len()]
    }

    /// Download `url` to `destination` under `policy`
    pub async fn download(&self, url: &str, destination: &Path, policy: &RetryPolicy) -> DownloadOutcome {
        if self.skip_existing && self.has_valid_file(destination).await {
            debug!(path = %destination.display(), "Image already present, skipping download");
            return DownloadOutcome::Skipped {
                reason: SkipReason::AlreadyPresent,
                path: destination.to_path_buf(),
            };
        }

        let mut attempt: u32 = 0;
        loop {
            match self.fetch_once(url, attempt).await {
                Ok(bytes) => {
                    let size = bytes.len() as u64;
                    if let Err(e) = write_atomic(destination, &bytes).await {
                        warn!(
                            url,
                            path = %destination.display(),
                            error = %e,
                            "Failed to persist image"
                        );
                        return DownloadOutcome::Failed {
                            kind: DownloadErrorKind::Io,
                            attempts: attempt + 1,
                        };
                    }

                    debug!(url, bytes = size, attempts = attempt + 1, "Image downloaded");
                    return DownloadOutcome::Success {
                        path: destination.to_path_buf(),
                        bytes: size,
                    };
                }
                Err(kind) => {
                    if !kind.is_retryable() || !policy.allows_retry_after(attempt) {
                        warn!(url, attempts = attempt + 1, error = %kind, "Image download failed, retries exhausted");
                        return DownloadOutcome::Failed {
                            kind,
                            attempts: attempt + 1,
                        };
                    }

                    let delay = policy.delay_after(attempt);
                    debug!(url, attempt, error = %kind, delay_ms = delay.as_millis() as u64, "Image download attempt failed, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One request; payload returned only if it clears the quality floor
    async fn fetch_once(&self, url: &str, attempt: u32) -> Result<Vec<u8>, DownloadErrorKind> {
        let response = self
            .http_client
            .get(url)
            .header(reqwest::header::USER_AGENT, self.user_agent_for(attempt))
            .send()
            .await
            .map_err(|e| transport_kind(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadErrorKind::Status {
                code: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| transport_kind(&e))?;
        let size = bytes.len() as u64;
        if size < self.min_bytes {
            return Err(DownloadErrorKind::Undersized { bytes: size });
        }

        Ok(bytes.to_vec())
    }

    async fn has_valid_file(&self, destination: &Path) -> bool {
        match tokio::fs::metadata(destination).await {
            Ok(meta) => meta.is_file() && meta.len() >= self.min_bytes,
            Err(_) => false,
        }
    }
}

fn transport_kind(err: &reqwest::Error) -> DownloadErrorKind {
    if err.is_timeout() {
        DownloadErrorKind::Timeout
    } else {
        DownloadErrorKind::Connection
    }
}
