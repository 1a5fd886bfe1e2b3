//! Classification, download outcome, and dataset entry types

use super::artifact::{ArtifactRecord, ObjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Sub-period label used when no keyword matches
pub const UNKNOWN_SUB_PERIOD: &str = "unknown";

/// Source tag recorded on every dataset entry
pub const DATASET_SOURCE: &str = "MET";

/// Top-level historical grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Era {
    PreIslamic,
    Islamic,
    Unclassified,
}

impl Era {
    pub fn as_str(&self) -> &'static str {
        match self {
            Era::PreIslamic => "pre_islamic",
            Era::Islamic => "islamic",
            Era::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output for one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub era: Era,
    pub sub_period: String,
    /// Keywords of more than one sub-period matched; the first declared one won
    #[serde(default)]
    pub ambiguous: bool,
}

impl ClassificationResult {
    pub fn new(era: Era, sub_period: impl Into<String>) -> Self {
        Self {
            era,
            sub_period: sub_period.into(),
            ambiguous: false,
        }
    }

    pub fn unclassified() -> Self {
        Self::new(Era::Unclassified, UNKNOWN_SUB_PERIOD)
    }

    pub fn is_classified(&self) -> bool {
        self.era != Era::Unclassified
    }

    /// Relative image directory for this classification: `<era>/<Sub_Period>`
    ///
    /// Derived only from era and sub-period so every image of a class lands together.
    pub fn directory(&self) -> PathBuf {
        Path::new(self.era.as_str()).join(directory_component(&self.sub_period))
    }
}

/// Make a sub-period label safe to use as one path component
fn directory_component(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => UNKNOWN_SUB_PERIOD.to_string(),
        _ => cleaned,
    }
}

/// Why a download attempt sequence failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownloadErrorKind {
    /// Request exceeded its timeout
    Timeout,
    /// Connection could not be established or was reset
    Connection,
    /// Upstream answered with a non-success status
    Status { code: u16 },
    /// Payload arrived but was below the quality floor
    Undersized { bytes: u64 },
    /// Local write failed
    Io,
}

impl DownloadErrorKind {
    /// Transport and quality failures consume an attempt and may be retried;
    /// local I/O failures end the sequence immediately.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DownloadErrorKind::Io)
    }
}

impl fmt::Display for DownloadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadErrorKind::Timeout => write!(f, "Timeout"),
            DownloadErrorKind::Connection => write!(f, "Connection"),
            DownloadErrorKind::Status { code } => write!(f, "HTTP {}", code),
            DownloadErrorKind::Undersized { bytes } => write!(f, "Undersized ({} bytes)", bytes),
            DownloadErrorKind::Io => write!(f, "Io"),
        }
    }
}

/// Why a download was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// A valid file from an earlier run is already at the destination
    AlreadyPresent,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyPresent => write!(f, "already-present"),
        }
    }
}

/// Terminal result of one download sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Success { path: PathBuf, bytes: u64 },
    Skipped { reason: SkipReason, path: PathBuf },
    Failed { kind: DownloadErrorKind, attempts: u32 },
}

impl DownloadOutcome {
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            DownloadOutcome::Success { path, .. } | DownloadOutcome::Skipped { path, .. } => {
                Some(path)
            }
            DownloadOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DownloadOutcome::Failed { .. })
    }
}

/// Unit stored in the metadata store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetEntry {
    pub record: ArtifactRecord,
    pub classification: ClassificationResult,
    pub download: DownloadOutcome,
    pub harvested_at: DateTime<Utc>,
    pub source: String,
}

impl DatasetEntry {
    /// Build an entry from a finished download decision
    ///
    /// A failed download never becomes an entry; its error kind is returned instead.
    pub fn new(
        record: ArtifactRecord,
        classification: ClassificationResult,
        download: DownloadOutcome,
    ) -> Result<Self, DownloadErrorKind> {
        if let DownloadOutcome::Failed { kind, .. } = download {
            return Err(kind);
        }

        Ok(Self {
            record,
            classification,
            download,
            harvested_at: Utc::now(),
            source: DATASET_SOURCE.to_string(),
        })
    }

    pub fn object_id(&self) -> ObjectId {
        self.record.object_id
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.download.local_path()
    }
}
