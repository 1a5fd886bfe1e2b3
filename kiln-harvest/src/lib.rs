//! kiln-harvest library interface
//!
//! Builds a classified image dataset of Iranian ceramics from a museum
//! collection API. Exposes public APIs for the binary and for integration testing.

pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod services;
pub mod utils;
pub mod workflow;

pub use crate::config::HarvestConfig;
pub use crate::error::{HarvestError, HarvestResult};
pub use crate::workflow::{HarvestReport, Pipeline, PipelineConfig};

use crate::services::{Classifier, Downloader, MetCollectionClient, MetadataStore, QueryPlanner};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Subdirectory of the dataset root that holds downloaded images
pub const IMAGES_DIR: &str = "images";

/// Wire a pipeline from configuration
///
/// Images are stored under `<root>/images`. Call [`HarvestConfig::validate`] first.
pub fn build_pipeline(config: &HarvestConfig, root: &Path) -> HarvestResult<Pipeline> {
    let taxonomy = Arc::new(config.taxonomy()?);

    let client = MetCollectionClient::new(
        config.api.base_url.clone(),
        config.api_timeout(),
        config.requests_per_second(),
        config.user_agents(),
    )?;
    let downloader = Downloader::new(config.downloader_settings())?;

    let planner = QueryPlanner::new(Arc::clone(&taxonomy))
        .with_relevance_term(config.api.relevance_term.clone())
        .with_extra_queries(config.api.extra_queries.iter().cloned());
    let classifier =
        Classifier::new(Arc::clone(&taxonomy)).with_date_fallback(config.classifier.date_fallback);

    Ok(Pipeline::new(
        Arc::new(client),
        planner,
        classifier,
        Arc::new(downloader),
        Arc::new(MetadataStore::new(config.run.max_entries)),
        PipelineConfig {
            workers: config.run.workers,
            image_root: root.join(IMAGES_DIR),
            search_delay: Duration::from_millis(config.api.search_delay_ms),
            fetch_policy: config.fetch_policy(),
            download_policy: config.download_policy(),
        },
    ))
}
