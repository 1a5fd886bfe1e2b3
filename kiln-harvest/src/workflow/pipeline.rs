//! Harvest pipeline
//!
//! Orchestrates one run:
//! - **Preflight**: fail fast if the image root is not writable
//! - **Gather**: run every planned query, de-duplicating identifiers in first-seen order
//! - **Process**: a fixed pool of workers drains the shared candidate queue,
//!   taking each identifier through fetch → classify → download → commit
//!
//! # Stopping
//! Once the store is full the stop token is cancelled and no worker takes a
//! new identifier. Work already dispatched runs to Committed or Rejected; an
//! in-flight download is never aborted, so no partial file is left behind.
//!
//! # Error Handling
//! Per-object failures are isolated: they become a [`Rejection`] in the report
//! and the run continues. Only preflight problems end a run early.

use super::statistics::{HarvestReport, RunStatistics};
use super::{CandidateStage, RejectReason, Rejection};
use crate::error::{HarvestError, HarvestResult};
use crate::models::{ArtifactRecord, ClassificationResult, DatasetEntry, DownloadOutcome, ObjectId};
use crate::services::{
    Classifier, CollectionApi, CommitRefusal, Downloader, FetchError, MetadataStore, QueryPlanner,
    RetryPolicy,
};
use crate::utils::write_atomic;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Worker pool size
    pub workers: usize,
    /// Directory under which `<era>/<Sub_Period>/<id>.<ext>` images are stored
    pub image_root: PathBuf,
    /// Pause between consecutive search queries
    pub search_delay: Duration,
    /// Metadata fetch budget (transport failures only)
    pub fetch_policy: RetryPolicy,
    /// Image download budget
    pub download_policy: RetryPolicy,
}

/// Shared queue of identifiers waiting for a worker
struct CandidateQueue {
    pending: Mutex<VecDeque<ObjectId>>,
}

impl CandidateQueue {
    fn new(candidates: Vec<ObjectId>) -> Self {
        Self {
            pending: Mutex::new(candidates.into()),
        }
    }

    /// Next identifier, unless `halt` says dispatch has stopped
    ///
    /// `halt` is evaluated while the queue is locked so no identifier leaves
    /// the queue after a halting condition has been observed.
    fn next_unless(&self, halt: impl Fn() -> bool) -> Option<ObjectId> {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if halt() {
            return None;
        }
        pending.pop_front()
    }
}

/// Acquisition and classification pipeline
///
/// Cheap to clone: every worker holds its own clone sharing the same store,
/// clients, and stop token. Build a fresh pipeline for each run.
#[derive(Clone)]
pub struct Pipeline {
    api: Arc<dyn CollectionApi>,
    planner: QueryPlanner,
    classifier: Classifier,
    downloader: Arc<Downloader>,
    store: Arc<MetadataStore>,
    config: PipelineConfig,
    stop: CancellationToken,
}

impl Pipeline {
    pub fn new(
        api: Arc<dyn CollectionApi>,
        planner: QueryPlanner,
        classifier: Classifier,
        downloader: Arc<Downloader>,
        store: Arc<MetadataStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            api,
            planner,
            classifier,
            downloader,
            store,
            config,
            stop: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    /// Token that stops dispatch of new identifiers when cancelled
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Execute a complete run: preflight, gather, process
    pub async fn run(&self) -> HarvestResult<HarvestReport> {
        self.preflight().await?;

        let candidates = self.gather_candidates().await;
        info!(candidates = candidates.len(), "Candidate gathering complete");

        Ok(self.process_candidates(candidates).await)
    }

    /// Detect run-level problems before any work is dispatched
    pub async fn preflight(&self) -> HarvestResult<()> {
        if self.config.workers == 0 {
            return Err(HarvestError::Fatal("worker pool size must be at least 1".to_string()));
        }
        if self.store.capacity() == 0 {
            return Err(HarvestError::Fatal("maximum entry count must be at least 1".to_string()));
        }

        let root = &self.config.image_root;
        let probe = root.join(".kiln-write-probe");
        write_atomic(&probe, b"probe").await.map_err(|e| {
            HarvestError::Fatal(format!("Destination {} is not writable: {}", root.display(), e))
        })?;
        let _ = tokio::fs::remove_file(&probe).await;

        info!(
            image_root = %root.display(),
            workers = self.config.workers,
            max_entries = self.store.capacity(),
            "Preflight passed"
        );
        Ok(())
    }

    /// Run every planned query; failed searches are logged and skipped
    pub async fn gather_candidates(&self) -> Vec<ObjectId> {
        let queries = self.planner.plan();
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for (index, query) in queries.iter().enumerate() {
            if self.stop.is_cancelled() {
                info!("Stop requested, ending candidate search early");
                break;
            }

            match self.api.search(query).await {
                Ok(ids) => {
                    let before = candidates.len();
                    candidates.extend(ids.into_iter().filter(|id| seen.insert(*id)));
                    debug!(
                        query = %query.text,
                        new_candidates = candidates.len() - before,
                        "Search query completed"
                    );
                }
                Err(e) => {
                    warn!(query = %query.text, error = %e, "Search query failed, skipping");
                }
            }

            if index + 1 < queries.len() && !self.config.search_delay.is_zero() {
                tokio::time::sleep(self.config.search_delay).await;
            }
        }

        candidates
    }

    /// Drain `candidates` through the worker pool
    pub async fn process_candidates(&self, candidates: Vec<ObjectId>) -> HarvestReport {
        let started = Instant::now();
        let total = candidates.len();
        let queue = Arc::new(CandidateQueue::new(candidates));
        let stats = Arc::new(RunStatistics::default());

        let worker_count = self.config.workers.max(1).min(total.max(1));
        info!(candidates = total, workers = worker_count, "Starting harvest workers");

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let pipeline = self.clone();
            let queue = Arc::clone(&queue);
            let stats = Arc::clone(&stats);
            workers.spawn(async move { pipeline.worker_loop(worker_id, &queue, &stats).await });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Harvest worker terminated abnormally");
            }
        }

        let report = stats.report(total, self.store.is_full(), started.elapsed());
        info!(
            committed = report.committed,
            rejected = report.rejected.len(),
            dispatched = report.dispatched,
            elapsed_ms = report.elapsed_ms,
            "Harvest complete"
        );
        report
    }

    async fn worker_loop(&self, worker_id: usize, queue: &CandidateQueue, stats: &RunStatistics) {
        loop {
            let next = queue.next_unless(|| self.stop.is_cancelled() || self.store.is_full());
            let Some(object_id) = next else {
                break;
            };

            let dispatched = stats.record_dispatch();
            debug!(worker_id, object_id, dispatched, stage = ?CandidateStage::Queued, "Candidate dispatched");

            match self.process_candidate(object_id).await {
                Ok(()) => {
                    let committed = stats.record_commit();
                    info!(object_id, committed, capacity = self.store.capacity(), "Entry committed");
                }
                Err(rejection) => {
                    warn!(
                        object_id,
                        stage = ?rejection.stage,
                        reason = %rejection.reason,
                        "Candidate rejected"
                    );
                    stats.record_rejection(rejection);
                }
            }

            if self.store.is_full() && !self.stop.is_cancelled() {
                info!("Entry cap reached, stopping dispatch");
                self.stop.cancel();
            }
        }

        debug!(worker_id, "Worker finished");
    }

    /// Take one identifier from Fetching to Committed, or reject it
    async fn process_candidate(&self, object_id: ObjectId) -> Result<(), Rejection> {
        let reject = |stage: CandidateStage, reason: RejectReason| Rejection {
            object_id,
            stage,
            reason,
        };

        debug!(object_id, stage = ?CandidateStage::Fetching, "Fetching metadata");
        let record = self.fetch_with_retry(object_id).await.map_err(|e| {
            reject(CandidateStage::Fetching, RejectReason::Fetch { kind: e.kind() })
        })?;

        debug!(object_id, stage = ?CandidateStage::Classifying, "Classifying");
        let classification = self.classifier.classify(&record);
        if classification.ambiguous {
            debug!(
                object_id,
                sub_period = %classification.sub_period,
                "Keywords of several sub-periods matched, first declared wins"
            );
        }

        let Some(url) = record.image_url().map(str::to_string) else {
            return Err(reject(CandidateStage::Classifying, RejectReason::NoImage));
        };

        debug!(object_id, stage = ?CandidateStage::Downloading, url = %url, "Downloading image");
        let destination = self.destination_for(&record, &classification, &url);
        let outcome = self
            .downloader
            .download(&url, &destination, &self.config.download_policy)
            .await;
        let wrote_new_file = matches!(outcome, DownloadOutcome::Success { .. });

        let entry = DatasetEntry::new(record, classification, outcome).map_err(|kind| {
            reject(CandidateStage::Downloading, RejectReason::Download { kind })
        })?;

        match self.store.commit(entry) {
            Ok(()) => {
                debug!(object_id, stage = ?CandidateStage::Committed, "Committed");
                Ok(())
            }
            Err(CommitRefusal::Full) => {
                if wrote_new_file {
                    // entry will not be exported; do not leave its image behind
                    let _ = tokio::fs::remove_file(&destination).await;
                }
                Err(reject(CandidateStage::Downloading, RejectReason::Capacity))
            }
            Err(CommitRefusal::Duplicate) => {
                Err(reject(CandidateStage::Downloading, RejectReason::Duplicate))
            }
        }
    }

    /// Metadata fetch, retrying transport failures under the fetch policy
    async fn fetch_with_retry(&self, object_id: ObjectId) -> Result<ArtifactRecord, FetchError> {
        let policy = &self.config.fetch_policy;
        let mut attempt: u32 = 0;

        loop {
            match self.api.fetch_object(object_id).await {
                Ok(record) => return Ok(record),
                Err(e) if e.is_transient() && policy.allows_retry_after(attempt) => {
                    let delay = policy.delay_after(attempt);
                    debug!(object_id, attempt, error = %e, "Metadata fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// `<image_root>/<era>/<Sub_Period>/<object_id>.<ext>`
    fn destination_for(
        &self,
        record: &ArtifactRecord,
        classification: &ClassificationResult,
        url: &str,
    ) -> PathBuf {
        self.config
            .image_root
            .join(classification.directory())
            .join(format!("{}.{}", record.object_id, image_extension(url)))
    }
}

/// File extension for an image URL, `jpg` when unknown
fn image_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let extension = Path::new(path.rsplit('/').next().unwrap_or(path))
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("png") => "png",
        Some("gif") => "gif",
        Some("webp") => "webp",
        Some("tif") | Some("tiff") => "tif",
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Era;
    use crate::services::{DownloaderSettings, Query, SubPeriod, Taxonomy};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// In-memory collection: fixed search hits, fixed records, scripted failures
    #[derive(Default)]
    struct FakeCollection {
        hits: HashMap<String, Vec<ObjectId>>,
        records: HashMap<ObjectId, ArtifactRecord>,
        transient_failures: Mutex<HashMap<ObjectId, u32>>,
        fetch_calls: AtomicUsize,
    }

    #[async_trait]
    impl CollectionApi for FakeCollection {
        async fn search(&self, query: &Query) -> Result<Vec<ObjectId>, FetchError> {
            self.hits
                .get(&query.text)
                .cloned()
                .ok_or_else(|| FetchError::Unavailable("no such query".to_string()))
        }

        async fn fetch_object(&self, object_id: ObjectId) -> Result<ArtifactRecord, FetchError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            {
                let mut failures = self.transient_failures.lock().unwrap();
                if let Some(remaining) = failures.get_mut(&object_id) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(FetchError::Timeout);
                    }
                }
            }
            self.records
                .get(&object_id)
                .cloned()
                .ok_or_else(|| FetchError::NotFound(object_id.to_string()))
        }
    }

    fn taxonomy() -> Arc<Taxonomy> {
        Arc::new(
            Taxonomy::new(vec![
                SubPeriod::new("Achaemenid", Era::PreIslamic, ["achaemenid"]),
                SubPeriod::new("Qajar", Era::Islamic, ["qajar"]),
            ])
            .unwrap(),
        )
    }

    fn pipeline(api: FakeCollection, image_root: PathBuf, capacity: usize) -> Pipeline {
        let downloader = Downloader::new(DownloaderSettings {
            timeout: Duration::from_secs(1),
            min_bytes: 1,
            user_agents: Arc::from(vec!["test-agent".to_string()]),
            skip_existing: false,
        })
        .unwrap();

        Pipeline::new(
            Arc::new(api),
            QueryPlanner::new(taxonomy()),
            Classifier::new(taxonomy()),
            Arc::new(downloader),
            Arc::new(MetadataStore::new(capacity)),
            PipelineConfig {
                workers: 2,
                image_root,
                search_delay: Duration::ZERO,
                fetch_policy: RetryPolicy::new(3, Duration::from_millis(1)),
                download_policy: RetryPolicy::no_retry(),
            },
        )
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("https://img.example.org/a/DP123.JPG"), "jpg");
        assert_eq!(image_extension("https://img.example.org/a/b.png?size=large"), "png");
        assert_eq!(image_extension("https://img.example.org/a/b.tiff#x"), "tif");
        assert_eq!(image_extension("https://img.example.org/download"), "jpg");
    }

    #[tokio::test]
    async fn test_gather_deduplicates_in_first_seen_order() {
        let mut api = FakeCollection::default();
        api.hits.insert("achaemenid pottery".to_string(), vec![5, 3, 5]);
        api.hits.insert("qajar pottery".to_string(), vec![3, 8]);

        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(api, temp_dir.path().to_path_buf(), 10);

        assert_eq!(pipeline.gather_candidates().await, vec![5, 3, 8]);
    }

    #[tokio::test]
    async fn test_failed_search_is_skipped() {
        let mut api = FakeCollection::default();
        api.hits.insert("qajar pottery".to_string(), vec![1]);

        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(api, temp_dir.path().to_path_buf(), 10);

        assert_eq!(pipeline.gather_candidates().await, vec![1]);
    }

    #[tokio::test]
    async fn test_missing_image_and_missing_object_are_rejected() {
        let mut api = FakeCollection::default();
        api.records.insert(
            1,
            ArtifactRecord {
                title: Some("Qajar tile".to_string()),
                ..ArtifactRecord::new(1)
            },
        );

        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(api, temp_dir.path().to_path_buf(), 10);
        let report = pipeline.process_candidates(vec![1, 2]).await;

        assert_eq!(report.committed, 0);
        assert_eq!(report.dispatched, 2);
        assert_eq!(report.rejected[0].reason, RejectReason::NoImage);
        assert_eq!(report.rejected[0].stage, CandidateStage::Classifying);
        assert_eq!(report.rejected[1].reason.to_string(), "NotFound");
        assert!(pipeline.store().is_empty());
    }

    #[tokio::test]
    async fn test_transient_fetch_failures_are_retried() {
        let mut api = FakeCollection::default();
        api.records.insert(4, ArtifactRecord::new(4));
        api.transient_failures.lock().unwrap().insert(4, 2);
        let api = Arc::new(api);

        let temp_dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(FakeCollection::default(), temp_dir.path().to_path_buf(), 10);
        pipeline.api = api.clone();

        let record = pipeline.fetch_with_retry(4).await.unwrap();
        assert_eq!(record.object_id, 4);
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let api = Arc::new(FakeCollection::default());

        let temp_dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(FakeCollection::default(), temp_dir.path().to_path_buf(), 10);
        pipeline.api = api.clone();

        assert!(matches!(pipeline.fetch_with_retry(9).await, Err(FetchError::NotFound(_))));
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_handle_prevents_dispatch() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(FakeCollection::default(), temp_dir.path().to_path_buf(), 10);

        pipeline.stop_handle().cancel();
        let report = pipeline.process_candidates(vec![1, 2, 3]).await;

        assert_eq!(report.dispatched, 0);
        assert!(!report.cap_reached);
    }

    #[tokio::test]
    async fn test_preflight_rejects_unwritable_root() {
        let temp_dir = TempDir::new().unwrap();
        // A regular file where the image directory should be
        let blocker = temp_dir.path().join("images");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let pipeline = pipeline(FakeCollection::default(), blocker, 10);
        assert!(matches!(pipeline.preflight().await, Err(HarvestError::Fatal(_))));
        assert!(matches!(pipeline.run().await, Err(HarvestError::Fatal(_))));
    }

    #[test]
    fn test_destination_layout() {
        let pipeline = pipeline(FakeCollection::default(), PathBuf::from("/data/images"), 10);

        let classification = ClassificationResult::new(Era::PreIslamic, "Tappeh Sialk");
        let destination = pipeline.destination_for(
            &ArtifactRecord::new(77),
            &classification,
            "https://img.example.org/x.jpeg",
        );
        assert_eq!(
            destination,
            PathBuf::from("/data/images/pre_islamic/Tappeh_Sialk/77.jpg")
        );
    }
}
