//! Search query planning
//!
//! Builds the search requests for a run: one per declared sub-period, then any
//! configured broad queries. No network access happens here.

use super::taxonomy::Taxonomy;
use serde::Serialize;
use std::sync::Arc;

/// Relevance term appended to each sub-period keyword by default
pub const DEFAULT_RELEVANCE_TERM: &str = "pottery";

/// One search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    /// Sub-period this query targets, `None` for broad queries
    pub sub_period: Option<String>,
    /// Free-text search term sent upstream
    pub text: String,
    /// Restrict results to objects that have images
    pub has_images: bool,
}

impl Query {
    pub fn broad(text: impl Into<String>) -> Self {
        Self {
            sub_period: None,
            text: text.into(),
            has_images: true,
        }
    }
}

/// Produces the ordered query list for a taxonomy
#[derive(Debug, Clone)]
pub struct QueryPlanner {
    taxonomy: Arc<Taxonomy>,
    relevance_term: String,
    extra_queries: Vec<String>,
}

impl QueryPlanner {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            taxonomy,
            relevance_term: DEFAULT_RELEVANCE_TERM.to_string(),
            extra_queries: Vec::new(),
        }
    }

    pub fn with_relevance_term(mut self, term: impl Into<String>) -> Self {
        self.relevance_term = term.into().trim().to_string();
        self
    }

    pub fn with_extra_queries<I, S>(mut self, queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_queries = queries
            .into_iter()
            .map(Into::into)
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        self
    }

    /// Queries in taxonomy-declared order, followed by the broad queries
    ///
    /// Each call yields the same sequence.
    pub fn plan(&self) -> Vec<Query> {
        let per_sub_period = self.taxonomy.sub_periods().iter().map(|sub_period| {
            let text = if self.relevance_term.is_empty() {
                sub_period.primary_keyword().to_string()
            } else {
                format!("{} {}", sub_period.primary_keyword(), self.relevance_term)
            };
            Query {
                sub_period: Some(sub_period.name.clone()),
                text,
                has_images: true,
            }
        });

        per_sub_period
            .chain(self.extra_queries.iter().map(Query::broad))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Era;
    use crate::services::taxonomy::SubPeriod;

    fn taxonomy() -> Arc<Taxonomy> {
        Arc::new(
            Taxonomy::new(vec![
                SubPeriod::new("Achaemenid", Era::PreIslamic, ["achaemenid"]),
                SubPeriod::new("Sassanian", Era::PreIslamic, ["sassanian", "sasanian"]),
                SubPeriod::new("Qajar", Era::Islamic, ["qajar"]),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_one_query_per_sub_period_in_order() {
        let queries = QueryPlanner::new(taxonomy()).plan();

        let texts: Vec<&str> = queries.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["achaemenid pottery", "sassanian pottery", "qajar pottery"]);
        assert!(queries.iter().all(|q| q.has_images));
        assert_eq!(queries[2].sub_period.as_deref(), Some("Qajar"));
    }

    #[test]
    fn test_plan_is_restartable() {
        let planner = QueryPlanner::new(taxonomy()).with_relevance_term("Iran");
        assert_eq!(planner.plan(), planner.plan());
        assert_eq!(planner.plan()[0].text, "achaemenid Iran");
    }

    #[test]
    fn test_extra_queries_follow_sub_periods() {
        let planner = QueryPlanner::new(taxonomy())
            .with_extra_queries(["Persian pottery", "  ", "Iranian ceramics"]);
        let queries = planner.plan();

        assert_eq!(queries.len(), 5);
        assert_eq!(queries[3], Query::broad("Persian pottery"));
        assert_eq!(queries[4].text, "Iranian ceramics");
        assert!(queries[4].sub_period.is_none());
    }

    #[test]
    fn test_blank_relevance_term_uses_keyword_alone() {
        let queries = QueryPlanner::new(taxonomy()).with_relevance_term(" ").plan();
        assert_eq!(queries[1].text, "sassanian");
    }
}
