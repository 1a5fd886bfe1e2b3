//! Harvest workflow
//!
//! Per-candidate state machine:
//!
//! ```text
//! Queued -> Fetching -> Classifying -> Downloading -> Committed
//!              |             |              |
//!              +-------------+--------------+--> Rejected
//! ```
//!
//! A rejected candidate is recorded with the stage it failed in and a typed
//! reason, then dropped for the rest of the run.

pub mod pipeline;
pub mod statistics;

use crate::models::{DownloadErrorKind, ObjectId};
use crate::services::FetchErrorKind;
use serde::Serialize;
use std::fmt;

pub use pipeline::{Pipeline, PipelineConfig};
pub use statistics::HarvestReport;

/// Lifecycle stage of one candidate identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStage {
    Queued,
    Fetching,
    Classifying,
    Downloading,
    Committed,
    Rejected,
}

/// Why a candidate did not make it into the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RejectReason {
    /// Metadata fetch failed
    Fetch { kind: FetchErrorKind },
    /// Record has no usable image reference
    NoImage,
    /// Image download exhausted its budget or could not be persisted
    Download { kind: DownloadErrorKind },
    /// Store reached its maximum before this entry could be committed
    Capacity,
    /// Identifier was already committed
    Duplicate,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Fetch { kind } => write!(f, "{}", kind),
            RejectReason::NoImage => write!(f, "no-image"),
            RejectReason::Download { kind } => write!(f, "{}", kind),
            RejectReason::Capacity => write!(f, "capacity"),
            RejectReason::Duplicate => write!(f, "duplicate"),
        }
    }
}

/// Diagnostic record for a rejected candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub object_id: ObjectId,
    /// Stage the candidate was in when it was rejected
    pub stage: CandidateStage,
    pub reason: RejectReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_display() {
        let timeout = RejectReason::Download {
            kind: DownloadErrorKind::Timeout,
        };
        assert_eq!(timeout.to_string(), "Timeout");
        assert_eq!(RejectReason::NoImage.to_string(), "no-image");
        assert_eq!(
            RejectReason::Fetch {
                kind: FetchErrorKind::NotFound
            }
            .to_string(),
            "NotFound"
        );
    }
}
