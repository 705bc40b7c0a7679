//! Functional enrichment analysis for differential-expression results.
//!
//! `gset` answers two questions about a table of already-computed
//! fold-changes and significance values:
//!
//! 1. Is a chosen subset of genes (the *foreground*, e.g. all
//!    differentially expressed genes) statistically over-represented in
//!    named functional categories, compared to the full gene *background*?
//!    See [`overrepresentation`].
//! 2. Does the continuous ranking of *all* genes by effect size show
//!    coordinated enrichment toward a category, without picking a
//!    significance cutoff first? See [`prerank`].
//!
//! Both engines consume a category index built by
//! [`category::build_index`] from gene → category-code links. Because
//! reference data and expression tables rarely share an identifier space,
//! [`resolver::resolve`] translates heterogeneous input identifiers into
//! the reference identifier space through a deterministic cascade of
//! match strategies.
//!
//! Remote reference data is accessed through the injectable
//! [`reference::ReferenceCache`], which owns rate limiting, bounded
//! retries and a time-to-live cache. The engines themselves are pure
//! functions over immutable inputs and hold no state between calls.
//!
//! # Example
//!
//! ```
//! use std::collections::{HashMap, HashSet};
//! use gset::{overrepresentation, OraOptions};
//!
//! let foreground: HashSet<String> = ["g1", "g2"].iter().map(|s| s.to_string()).collect();
//! let background: HashSet<String> =
//!     (1..=100).map(|i| format!("g{i}")).collect();
//! let mut index = HashMap::new();
//! index.insert(
//!     "path1".to_string(),
//!     ["g1", "g2", "g3"].iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
//! );
//!
//! let records = overrepresentation(
//!     &foreground,
//!     &background,
//!     &index,
//!     &OraOptions::default(),
//! ).unwrap();
//!
//! assert_eq!(records[0].category(), "path1");
//! assert_eq!(records[0].foreground_count(), 2);
//! ```

use thiserror::Error;

pub mod category;
pub mod gene;
pub mod reference;
pub mod resolver;
pub mod stats;

pub use gene::GeneRecord;
pub use resolver::{resolve, IdentifierMapping};
pub use stats::ora::{overrepresentation, EnrichmentRecord, OraOptions};
pub use stats::prerank::{prerank, PrerankOptions, RankEnrichmentRecord};

/// Rankings with fewer usable genes than this produce an empty
/// prerank result
pub const MIN_RANKED_GENES: usize = 10;

/// Reported in place of a mathematically infinite odds ratio so that
/// sorting and serialization stay well-defined
pub const ODDS_RATIO_SENTINEL: f64 = 999.0;

/// Default number of permutations for prerank significance estimation
pub const DEFAULT_PERMUTATIONS: usize = 1000;

#[derive(Error, Debug)]
pub enum GsetError {
    /// The cell counts of a 2x2 contingency table contradict each other,
    /// e.g. more foreground hits than category members
    #[error("contingency table cell counts are inconsistent")]
    InvalidContingencyTable,
    /// A p-value outside `[0, 1]` was passed to multiple-testing correction
    #[error("p-value out of range [0, 1]")]
    InvalidPValue,
    /// The remote reference source rejected the request due to rate limiting
    #[error("reference source throttled the request")]
    Throttled,
    /// The remote reference source could not be reached
    #[error("reference data unavailable: {0}")]
    ReferenceUnavailable(String),
}

/// Crate-wide `Result` with [`GsetError`] as the error variant
pub type GsetResult<T> = Result<T, GsetError>;
