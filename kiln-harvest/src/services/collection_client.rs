//! Museum collection API client
//!
//! Search and object lookup against the Metropolitan Museum of Art Collection API
//! (or any service speaking the same JSON shapes). Each call is a single request:
//! retry decisions belong to the caller.

use crate::models::{normalize_text, ArtifactRecord, ObjectId};
use crate::services::query_planner::Query;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Public MET collection API root
pub const MET_BASE_URL: &str = "https://collectionapi.metmuseum.org/public/collection/v1";

/// Metadata fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Upstream unavailable: {0}")]
    Unavailable(String),
}

/// Fieldless view of [`FetchError`] for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum FetchErrorKind {
    Timeout,
    NotFound,
    Malformed,
    Unavailable,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchErrorKind::Timeout => "Timeout",
            FetchErrorKind::NotFound => "NotFound",
            FetchErrorKind::Malformed => "Malformed",
            FetchErrorKind::Unavailable => "Unavailable",
        };
        f.write_str(name)
    }
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Timeout => FetchErrorKind::Timeout,
            FetchError::NotFound(_) => FetchErrorKind::NotFound,
            FetchError::Malformed(_) => FetchErrorKind::Malformed,
            FetchError::Unavailable(_) => FetchErrorKind::Unavailable,
        }
    }

    /// Transport problems may clear up on retry; a bad or missing document will not
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout | FetchError::Unavailable(_))
    }

    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Unavailable(err.to_string())
        }
    }
}

/// Upstream search + object endpoints
#[async_trait]
pub trait CollectionApi: Send + Sync {
    /// Candidate object identifiers for one query
    async fn search(&self, query: &Query) -> Result<Vec<ObjectId>, FetchError>;

    /// Metadata record for one object
    async fn fetch_object(&self, object_id: ObjectId) -> Result<ArtifactRecord, FetchError>;
}

/// Search endpoint response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    #[allow(dead_code)]
    total: u64,
    #[serde(rename = "objectIDs")]
    object_ids: Option<Vec<ObjectId>>,
}

/// MET tag entry
#[derive(Debug, Deserialize)]
struct MetTag {
    term: Option<String>,
}

/// MET object document (only the fields the dataset keeps)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetObjectDocument {
    #[serde(rename = "objectID")]
    object_id: Option<ObjectId>,
    title: Option<String>,
    culture: Option<String>,
    period: Option<String>,
    object_date: Option<String>,
    object_name: Option<String>,
    classification: Option<String>,
    medium: Option<String>,
    dimensions: Option<String>,
    credit_line: Option<String>,
    country: Option<String>,
    region: Option<String>,
    tags: Option<Vec<MetTag>>,
    is_public_domain: Option<bool>,
    primary_image: Option<String>,
    primary_image_small: Option<String>,
}

impl MetObjectDocument {
    /// Map to a record; a document without an identifier is not an artifact
    fn into_record(self) -> Option<ArtifactRecord> {
        let object_id = self.object_id?;
        let text = |value: &Option<String>| normalize_text(value.as_deref());

        let primary_image = [&self.primary_image, &self.primary_image_small]
            .into_iter()
            .flatten()
            .map(|url| url.trim())
            .find(|url| !url.is_empty())
            .map(str::to_string);

        let tags = self
            .tags
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tag| normalize_text(tag.term.as_deref()))
            .collect();

        Some(ArtifactRecord {
            object_id,
            title: text(&self.title),
            culture: text(&self.culture),
            period: text(&self.period),
            object_date: text(&self.object_date),
            classification: text(&self.classification),
            object_name: text(&self.object_name),
            medium: text(&self.medium),
            dimensions: text(&self.dimensions),
            credit_line: text(&self.credit_line),
            country: text(&self.country),
            region: text(&self.region),
            tags,
            is_public_domain: self.is_public_domain.unwrap_or(false),
            primary_image,
        })
    }
}

/// HTTP client for the MET collection API
pub struct MetCollectionClient {
    http_client: reqwest::Client,
    base_url: String,
    user_agents: Arc<[String]>,
    next_agent: AtomicUsize,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl MetCollectionClient {
    /// Create a client
    ///
    /// `user_agents` are rotated per request; `requests_per_second` caps the
    /// request rate across all workers sharing this client.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        requests_per_second: NonZeroU32,
        user_agents: Arc<[String]>,
    ) -> Result<Self, FetchError> {
        if user_agents.is_empty() {
            return Err(FetchError::Unavailable("no user agents configured".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Unavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agents,
            next_agent: AtomicUsize::new(0),
            rate_limiter: RateLimiter::direct(Quota::per_second(requests_per_second)),
        })
    }

    fn user_agent(&self) -> &str {
        let index = self.next_agent.fetch_add(1, Ordering::Relaxed);
        &self.user_agents[index % self.user_agents.len()]
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, FetchError> {
        self.rate_limiter.until_ready().await;

        self.http_client
            .get(url)
            .query(query)
            .header(reqwest::header::USER_AGENT, self.user_agent())
            .send()
            .await
            .map_err(FetchError::from_transport)
    }
}

#[async_trait]
impl CollectionApi for MetCollectionClient {
    async fn search(&self, query: &Query) -> Result<Vec<ObjectId>, FetchError> {
        let url = format!("{}/search", self.base_url);
        let has_images = if query.has_images { "true" } else { "false" };

        tracing::debug!(query = %query.text, "Searching collection");

        let response = self
            .get(&url, &[("q", query.text.as_str()), ("hasImages", has_images)])
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Unavailable(format!("search returned {}", status)));
        }

        let body = response.text().await.map_err(FetchError::from_transport)?;
        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;

        let ids = parsed.object_ids.unwrap_or_default();
        tracing::debug!(query = %query.text, hits = ids.len(), "Search completed");
        Ok(ids)
    }

    async fn fetch_object(&self, object_id: ObjectId) -> Result<ArtifactRecord, FetchError> {
        let url = format!("{}/objects/{}", self.base_url, object_id);

        let response = self.get(&url, &[]).await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(object_id.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Unavailable(format!("object {} returned {}", object_id, status)));
        }

        let body = response.text().await.map_err(FetchError::from_transport)?;
        let document: MetObjectDocument =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;

        let record = document
            .into_record()
            .ok_or_else(|| FetchError::NotFound(object_id.to_string()))?;

        tracing::debug!(
            object_id,
            title = record.title.as_deref().unwrap_or("Untitled"),
            "Retrieved object metadata"
        );

        Ok(record)
    }
}
