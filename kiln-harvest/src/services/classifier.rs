//! Keyword-based era classifier
//!
//! First declared sub-period with a matching keyword wins. The function is pure,
//! so the same record classifies identically on every worker and in every run.

use super::taxonomy::Taxonomy;
use crate::models::{ArtifactRecord, ClassificationResult, Era};
use std::sync::Arc;

/// Sub-period assigned by the date fallback for BC dates
const DATE_FALLBACK_PRE_ISLAMIC: &str = "Ancient Iran";
/// Sub-period assigned by the date fallback for Hijri / Islamic dates
const DATE_FALLBACK_ISLAMIC: &str = "Islamic Period";

/// Classifies artifact records against a shared taxonomy
#[derive(Debug, Clone)]
pub struct Classifier {
    taxonomy: Arc<Taxonomy>,
    date_fallback: bool,
}

impl Classifier {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            taxonomy,
            date_fallback: false,
        }
    }

    /// Enable the object-date fallback for records no keyword matches
    pub fn with_date_fallback(mut self, enabled: bool) -> Self {
        self.date_fallback = enabled;
        self
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Classify one record
    pub fn classify(&self, record: &ArtifactRecord) -> ClassificationResult {
        let text = record.classification_text().to_lowercase();
        let mut matching = self
            .taxonomy
            .sub_periods()
            .iter()
            .filter(|sub_period| sub_period.matches(&text));

        if let Some(winner) = matching.next() {
            let mut result = ClassificationResult::new(winner.era, winner.name.clone());
            result.ambiguous = matching.next().is_some();
            return result;
        }

        if self.date_fallback {
            if let Some(result) = record.object_date.as_deref().and_then(classify_by_date) {
                return result;
            }
        }

        ClassificationResult::unclassified()
    }
}

/// Coarse era from date notation alone
fn classify_by_date(object_date: &str) -> Option<ClassificationResult> {
    let folded = object_date.to_lowercase();
    let words: Vec<&str> = folded
        .split(|c: char| !c.is_alphanumeric() && c != '.')
        .map(|w| w.trim_end_matches(|c| c == '.' || c == ','))
        .filter(|w| !w.is_empty())
        .collect();

    if has_word(&words, &["bc", "b.c", "bce", "b.c.e"]) || folded.contains("before christ") {
        return Some(ClassificationResult::new(Era::PreIslamic, DATE_FALLBACK_PRE_ISLAMIC));
    }
    if has_word(&words, &["hijri", "a.h", "islamic"]) {
        return Some(ClassificationResult::new(Era::Islamic, DATE_FALLBACK_ISLAMIC));
    }
    None
}

fn has_word(words: &[&str], candidates: &[&str]) -> bool {
    words.iter().any(|w| candidates.contains(w))
}
