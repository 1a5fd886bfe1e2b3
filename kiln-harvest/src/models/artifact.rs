//! Artifact record as fetched from the collection API

use serde::{Deserialize, Serialize};

/// Upstream-assigned artifact identifier
pub type ObjectId = u64;

/// Maximum retained length (in characters) of any normalized text field
const MAX_FIELD_CHARS: usize = 500;

/// One artifact's metadata record
///
/// Immutable once fetched. All text fields are normalized (see [`normalize_text`]);
/// an empty upstream value is stored as `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    pub object_id: ObjectId,
    pub title: Option<String>,
    pub culture: Option<String>,
    pub period: Option<String>,
    pub object_date: Option<String>,
    /// Material / object type
    pub classification: Option<String>,
    pub object_name: Option<String>,
    pub medium: Option<String>,
    pub dimensions: Option<String>,
    pub credit_line: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public_domain: bool,
    /// URL of the primary image, if the upstream offers one
    pub primary_image: Option<String>,
}

impl ArtifactRecord {
    /// Create a record with only an identifier set
    pub fn new(object_id: ObjectId) -> Self {
        Self {
            object_id,
            ..Default::default()
        }
    }

    /// Text consulted by the classifier, in fixed order:
    /// title, culture, period, object date
    pub fn classification_text(&self) -> String {
        [&self.title, &self.culture, &self.period, &self.object_date]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Primary image URL, if present and non-blank
    pub fn image_url(&self) -> Option<&str> {
        self.primary_image
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Collapse whitespace runs, trim, and cap at 500 characters
///
/// Returns `None` for absent or blank input.
pub fn normalize_text(text: Option<&str>) -> Option<String> {
    let collapsed = text?.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(MAX_FIELD_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(
            normalize_text(Some("  Bowl \n with\t\tbirds  ")),
            Some("Bowl with birds".to_string())
        );
    }

    #[test]
    fn test_normalize_blank_is_none() {
        assert_eq!(normalize_text(Some("   \n ")), None);
        assert_eq!(normalize_text(None), None);
    }

    #[test]
    fn test_normalize_truncates_on_char_boundary() {
        let long = "é".repeat(600);
        let normalized = normalize_text(Some(&long)).unwrap();
        assert_eq!(normalized.chars().count(), 500);
    }

    #[test]
    fn test_classification_text_order() {
        let record = ArtifactRecord {
            title: Some("Bowl".to_string()),
            culture: Some("Iran".to_string()),
            period: None,
            object_date: Some("12th century".to_string()),
            classification: Some("Ceramics".to_string()),
            ..ArtifactRecord::new(1)
        };
        // classification (material) is not part of the classifier text
        assert_eq!(record.classification_text(), "Bowl Iran 12th century");
    }

    #[test]
    fn test_blank_image_url_is_none() {
        let record = ArtifactRecord {
            primary_image: Some("  ".to_string()),
            ..ArtifactRecord::new(7)
        };
        assert_eq!(record.image_url(), None);
    }
}
