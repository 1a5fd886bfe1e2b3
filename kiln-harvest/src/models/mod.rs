//! Data models for the harvest pipeline

pub mod artifact;
pub mod dataset;

pub use artifact::{normalize_text, ArtifactRecord, ObjectId};
pub use dataset::{
    ClassificationResult, DatasetEntry, DownloadErrorKind, DownloadOutcome, Era, SkipReason,
};
