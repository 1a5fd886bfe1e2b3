//! Error types for kiln-harvest
//!
//! Per-object failures never surface here: they end as a `Rejection` in the
//! run report. `HarvestError` covers problems that stop a run before (or
//! instead of) dispatching work, plus export failures after it.

use crate::services::{DownloaderError, FetchError, TaxonomyError};
use thiserror::Error;

/// Run-level error
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Configuration-level problem detected before any work is dispatched
    #[error("Fatal: {0}")]
    Fatal(String),

    /// Invalid taxonomy table
    #[error("Taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),

    /// Image downloader could not be constructed
    #[error("Downloader error: {0}")]
    Downloader(#[from] DownloaderError),

    /// Collection client could not be constructed
    #[error("Collection client error: {0}")]
    Client(#[from] FetchError),

    /// Dataset export failed
    #[error("Export error: {0}")]
    Export(String),

    /// Config file could not be read or parsed
    #[error("Config file error: {0}")]
    Common(#[from] kiln_common::Error),
}

/// Result type for run-level operations
pub type HarvestResult<T> = Result<T, HarvestError>;
