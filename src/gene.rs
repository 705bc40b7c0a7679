//! Gene records as produced by expression-table ingestion
//!
//! Ingestion itself lives outside this crate. Its output is an ordered
//! list of [`GeneRecord`]s, one per input row, which the helpers in this
//! module reshape into the inputs the resolver and the enrichment
//! engines expect.

use std::collections::{HashMap, HashSet};

/// A single row of a differential-expression result table
///
/// Records are immutable value objects: created once during ingestion
/// and only read afterwards. The `score` is the continuous ranking
/// value (typically the log2 fold-change), `significance` the adjusted
/// p-value of the differential-expression call.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneRecord {
    id: String,
    name: Option<String>,
    description: Option<String>,
    score: f64,
    significance: f64,
}

impl GeneRecord {
    /// Creates a record from the mandatory fields
    pub fn new(id: impl Into<String>, score: f64, significance: f64) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            score,
            significance,
        }
    }

    /// Attaches an alternate name (gene symbol)
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches a free-text functional description (gene product)
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The canonical identifier, unique within a run
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The alternate name (gene symbol), if known
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The free-text functional description, if known
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The continuous rank score, e.g. log2 fold-change
    pub fn score(&self) -> f64 {
        self.score
    }

    /// The significance of the differential-expression call
    pub fn significance(&self) -> f64 {
        self.significance
    }
}

/// The set of all record identifiers
pub fn ids(records: &[GeneRecord]) -> HashSet<String> {
    records.iter().map(|r| r.id.clone()).collect()
}

/// Alternate names keyed by record identifier, for records that have one
pub fn alternate_names(records: &[GeneRecord]) -> HashMap<String, String> {
    records
        .iter()
        .filter_map(|r| r.name.as_ref().map(|n| (r.id.clone(), n.clone())))
        .collect()
}

/// Descriptions keyed by record identifier, for records that have one
pub fn descriptions(records: &[GeneRecord]) -> HashMap<String, String> {
    records
        .iter()
        .filter_map(|r| {
            r.description
                .as_ref()
                .map(|d| (r.id.clone(), d.clone()))
        })
        .collect()
}

/// Builds the full ranking consumed by [`crate::prerank`]
///
/// Records are ordered by descending score; ties are broken by
/// identifier so that repeated calls produce the identical ranking.
pub fn ranking(records: &[GeneRecord]) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = records
        .iter()
        .map(|r| (r.id.clone(), r.score))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}
