//! Historical-era taxonomy
//!
//! Ordered list of sub-periods, each tagged with its [`Era`] and carrying a
//! keyword set. Declaration order is significant: it is the classifier's
//! tie-break order and the query planner's query order.

use crate::models::Era;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Taxonomy construction errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("Taxonomy declares no sub-periods")]
    Empty,

    #[error("Sub-period '{0}' must belong to pre_islamic or islamic")]
    UnclassifiedEra(String),

    #[error("Sub-period '{0}' is declared more than once")]
    DuplicateName(String),

    #[error("Sub-period name must not be blank")]
    BlankName,
}

/// One named period within an era
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubPeriod {
    pub name: String,
    pub era: Era,
    /// Case-folded keywords; the first one is the primary keyword
    pub keywords: Vec<String>,
}

impl SubPeriod {
    /// Create a sub-period, case-folding its keywords
    ///
    /// Blank keywords are dropped. With no keywords left, the case-folded name
    /// is used as the only keyword.
    pub fn new<I, S>(name: impl Into<String>, era: Era, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into().trim().to_string();
        let mut folded: Vec<String> = Vec::new();
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !folded.contains(&keyword) {
                folded.push(keyword);
            }
        }
        if folded.is_empty() {
            folded.push(name.to_lowercase());
        }

        Self {
            name,
            era,
            keywords: folded,
        }
    }

    /// Keyword used to build this sub-period's search query
    pub fn primary_keyword(&self) -> &str {
        &self.keywords[0]
    }

    /// True if any keyword occurs in already case-folded text
    pub fn matches(&self, folded_text: &str) -> bool {
        self.keywords.iter().any(|k| folded_text.contains(k.as_str()))
    }
}

/// Ordered sub-period table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    sub_periods: Vec<SubPeriod>,
}

impl Taxonomy {
    pub fn new(sub_periods: Vec<SubPeriod>) -> Result<Self, TaxonomyError> {
        if sub_periods.is_empty() {
            return Err(TaxonomyError::Empty);
        }

        let mut seen = HashSet::new();
        for sub_period in &sub_periods {
            if sub_period.name.is_empty() {
                return Err(TaxonomyError::BlankName);
            }
            if sub_period.era == Era::Unclassified {
                return Err(TaxonomyError::UnclassifiedEra(sub_period.name.clone()));
            }
            if !seen.insert(sub_period.name.to_lowercase()) {
                return Err(TaxonomyError::DuplicateName(sub_period.name.clone()));
            }
        }

        Ok(Self { sub_periods })
    }

    /// Iranian ceramics taxonomy: pre-Islamic periods first, then Islamic dynasties
    pub fn iran_pottery() -> Self {
        let pre_islamic: [(&str, &[&str]); 14] = [
            ("Silk", &["silk"]),
            ("Elam", &["elam"]),
            ("Achaemenid", &["achaemenid"]),
            ("Parthian", &["parthian"]),
            ("Sassanian", &["sassanian", "sasanian"]),
            ("Chogha Zanbil", &["chogha zanbil"]),
            ("Tappeh Sialk", &["tappeh sialk", "sialk"]),
            ("Haft Tepe", &["haft tepe"]),
            ("Kuh-e Khwaja", &["kuh-e khwaja"]),
            ("Arg-e Bam", &["arg-e bam"]),
            ("Persepolis", &["persepolis"]),
            ("Ancient Iran", &["ancient iran"]),
            ("Zagros", &["zagros"]),
            ("Luristan", &["luristan"]),
        ];
        let islamic: [&str; 10] = [
            "Islamic", "Ilkhanid", "Timurid", "Safavid", "Qajar", "Ottoman", "Seljuk", "Mongol",
            "Abbasid", "Umayyad",
        ];

        let sub_periods = pre_islamic
            .into_iter()
            .map(|(name, keywords)| SubPeriod::new(name, Era::PreIslamic, keywords.iter()))
            .chain(
                islamic
                    .into_iter()
                    .map(|name| SubPeriod::new(name, Era::Islamic, [name])),
            )
            .collect();

        Self { sub_periods }
    }

    /// Sub-periods in declared order
    pub fn sub_periods(&self) -> &[SubPeriod] {
        &self.sub_periods
    }

    pub fn get(&self, name: &str) -> Option<&SubPeriod> {
        self.sub_periods
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.sub_periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_periods.is_empty()
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::iran_pottery()
    }
}
