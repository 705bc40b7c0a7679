//! Over-representation analysis of a foreground gene set
//!
//! For each category the engine builds the 2x2 contingency table of
//! foreground/background membership, computes the one-sided exact test
//! from [`crate::stats::fisher`] and corrects the batch of p-values
//! with Benjamini-Hochberg. The engine is generic over the category
//! index: pathway annotations and broad functional classes run through
//! the same code, differing only in [`OraOptions`].

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::stats::correction::benjamini_hochberg;
use crate::stats::fisher::ContingencyTable;
use crate::GsetResult;

/// Tuning knobs of the over-representation test
#[derive(Debug, Clone)]
pub struct OraOptions {
    /// Categories with fewer background members are skipped
    pub min_size: usize,
    /// Categories with more background members are skipped;
    /// `None` means unbounded
    pub max_size: Option<usize>,
    /// Keep categories with zero foreground overlap in the result
    ///
    /// Pathway-style tests drop them (no observed enrichment signal);
    /// functional-class reports keep them so every class shows up.
    pub keep_unobserved: bool,
}

impl Default for OraOptions {
    fn default() -> Self {
        Self::pathway()
    }
}

impl OraOptions {
    /// Defaults for pathway-style tests: size 3..=500, zero-overlap
    /// categories skipped
    pub fn pathway() -> Self {
        Self {
            min_size: 3,
            max_size: Some(500),
            keep_unobserved: false,
        }
    }

    /// Defaults for broad functional-class tests: any non-empty class,
    /// zero-overlap classes kept
    pub fn functional_class() -> Self {
        Self {
            min_size: 1,
            max_size: None,
            keep_unobserved: true,
        }
    }
}

/// The test result for a single category
///
/// Produced per call, immutable afterwards; the engine keeps no state
/// between calls.
#[derive(Debug, Clone)]
pub struct EnrichmentRecord {
    category: String,
    foreground_count: usize,
    background_count: usize,
    foreground_size: usize,
    background_size: usize,
    fold_enrichment: f64,
    odds_ratio: f64,
    p_value: f64,
    q_value: f64,
    genes: Vec<String>,
}

impl EnrichmentRecord {
    /// The category code
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Foreground genes in the category (`k`)
    pub fn foreground_count(&self) -> usize {
        self.foreground_count
    }

    /// Background genes in the category (`K`)
    pub fn background_count(&self) -> usize {
        self.background_count
    }

    /// Foreground set size (`n`)
    pub fn foreground_size(&self) -> usize {
        self.foreground_size
    }

    /// Background set size (`N`)
    pub fn background_size(&self) -> usize {
        self.background_size
    }

    /// `(k/n) / (K/N)`, zero on degenerate denominators
    pub fn fold_enrichment(&self) -> f64 {
        self.fold_enrichment
    }

    /// Odds ratio, capped at [`crate::ODDS_RATIO_SENTINEL`]
    pub fn odds_ratio(&self) -> f64 {
        self.odds_ratio
    }

    /// Raw one-sided exact-test p-value
    pub fn p_value(&self) -> f64 {
        self.p_value
    }

    /// Benjamini-Hochberg corrected q-value
    pub fn q_value(&self) -> f64 {
        self.q_value
    }

    /// The matched foreground genes, sorted
    pub fn genes(&self) -> &[String] {
        &self.genes
    }
}

/// Tests every category of `index` for over-representation of
/// `foreground` against `background`
///
/// Category membership is restricted to the background before counting,
/// so `K` and `k` always describe the same universe. Degenerate inputs
/// (empty foreground, empty index) produce an empty result, not an
/// error. Records are sorted by ascending raw p-value, ties broken by
/// category code.
///
/// # Errors
///
/// Only structurally impossible inputs are fatal: a foreground larger
/// than the background ([`crate::GsetError::InvalidContingencyTable`]).
pub fn overrepresentation(
    foreground: &HashSet<String>,
    background: &HashSet<String>,
    index: &HashMap<String, HashSet<String>>,
    options: &OraOptions,
) -> GsetResult<Vec<EnrichmentRecord>> {
    let foreground_size = foreground.len();
    let background_size = background.len();
    if foreground_size == 0 || index.is_empty() {
        return Ok(Vec::new());
    }

    // fixed category order so parallel callers aggregating batches see
    // stable output
    let mut categories: Vec<(&String, &HashSet<String>)> = index.iter().collect();
    categories.sort_by(|a, b| a.0.cmp(b.0));

    let mut records = Vec::new();
    for (code, members) in categories {
        let background_count = members
            .iter()
            .filter(|gene| background.contains(*gene))
            .count();
        if background_count < options.min_size {
            debug!(category = %code, size = background_count, "below minimum size");
            continue;
        }
        if options
            .max_size
            .is_some_and(|max| background_count > max)
        {
            debug!(category = %code, size = background_count, "above maximum size");
            continue;
        }

        let mut genes: Vec<String> = members
            .iter()
            .filter(|gene| background.contains(*gene) && foreground.contains(*gene))
            .cloned()
            .collect();
        genes.sort();
        let foreground_count = genes.len();
        if foreground_count == 0 && !options.keep_unobserved {
            continue;
        }

        let table = ContingencyTable::new(
            foreground_count,
            foreground_size,
            background_count,
            background_size,
        )?;
        records.push(EnrichmentRecord {
            category: code.clone(),
            foreground_count,
            background_count,
            foreground_size,
            background_size,
            fold_enrichment: table.fold_enrichment(),
            odds_ratio: table.odds_ratio(),
            p_value: table.p_value()?,
            q_value: 1.0,
            genes,
        });
    }

    if records.is_empty() {
        return Ok(records);
    }

    let raw: Vec<f64> = records.iter().map(|r| r.p_value).collect();
    for (record, q) in records.iter_mut().zip(benjamini_hochberg(&raw)?) {
        record.q_value = q;
    }

    records.sort_by(|a, b| {
        a.p_value
            .total_cmp(&b.p_value)
            .then_with(|| a.category.cmp(&b.category))
    });
    Ok(records)
}

#[cfg(test)]
mod test {
    use super::*;

    fn genes(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn numbered(prefix: &str, range: std::ops::Range<usize>) -> HashSet<String> {
        range.map(|i| format!("{prefix}{i}")).collect()
    }

    /// background of 1000 genes, foreground of 50, one category of 100
    /// background members with 20 in the foreground
    fn scenario() -> (HashSet<String>, HashSet<String>, HashMap<String, HashSet<String>>) {
        let background = numbered("g", 0..1000);
        // foreground: g0..g49
        let foreground = numbered("g", 0..50);
        // category: g30..g49 (20 in foreground) plus g100..g179
        let mut members = numbered("g", 30..50);
        members.extend(numbered("g", 100..180));
        let mut index = HashMap::new();
        index.insert("path1".to_string(), members);
        (foreground, background, index)
    }

    #[test]
    fn fold_enrichment_of_four() {
        let (foreground, background, index) = scenario();
        let records =
            overrepresentation(&foreground, &background, &index, &OraOptions::default())
                .unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.foreground_count(), 20);
        assert_eq!(record.background_count(), 100);
        assert!((record.fold_enrichment() - 4.0).abs() < 1e-12);
        assert!(record.p_value() < 1e-6);
        assert_eq!(record.genes().len(), 20);
        assert_eq!(record.genes()[0], "g30");
    }

    #[test]
    fn q_value_never_below_p_value() {
        let background = numbered("g", 0..200);
        let foreground = numbered("g", 0..20);
        let mut index = HashMap::new();
        index.insert("a".to_string(), numbered("g", 0..10));
        index.insert("b".to_string(), numbered("g", 50..70));
        index.insert("c".to_string(), numbered("g", 5..40));
        let records = overrepresentation(
            &foreground,
            &background,
            &index,
            &OraOptions {
                keep_unobserved: true,
                ..OraOptions::pathway()
            },
        )
        .unwrap();
        assert!(!records.is_empty());
        for record in &records {
            assert!(
                record.q_value() >= record.p_value(),
                "{}: q = {} < p = {}",
                record.category(),
                record.q_value(),
                record.p_value()
            );
        }
    }

    #[test]
    fn sorted_by_p_value() {
        let background = numbered("g", 0..500);
        let foreground = numbered("g", 0..25);
        let mut index = HashMap::new();
        index.insert("strong".to_string(), numbered("g", 0..20));
        index.insert("weak".to_string(), numbered("g", 20..120));
        index.insert("none".to_string(), numbered("g", 24..44));
        let records =
            overrepresentation(&foreground, &background, &index, &OraOptions::default())
                .unwrap();
        for window in records.windows(2) {
            assert!(window[0].p_value() <= window[1].p_value());
        }
        assert_eq!(records[0].category(), "strong");
    }

    #[test]
    fn small_categories_are_skipped() {
        let background = numbered("g", 0..100);
        let foreground = numbered("g", 0..10);
        let mut index = HashMap::new();
        index.insert("tiny".to_string(), genes(&["g0", "g1"]));
        let records =
            overrepresentation(&foreground, &background, &index, &OraOptions::default())
                .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn large_categories_are_skipped() {
        let background = numbered("g", 0..1000);
        let foreground = numbered("g", 0..10);
        let mut index = HashMap::new();
        index.insert("huge".to_string(), numbered("g", 0..600));
        let records =
            overrepresentation(&foreground, &background, &index, &OraOptions::default())
                .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn unobserved_skipped_for_pathways_kept_for_classes() {
        let background = numbered("g", 0..100);
        let foreground = genes(&["g0", "g1", "g2"]);
        let mut index = HashMap::new();
        index.insert("disjoint".to_string(), numbered("g", 50..60));

        let pathway =
            overrepresentation(&foreground, &background, &index, &OraOptions::pathway())
                .unwrap();
        assert!(pathway.is_empty());

        let class = overrepresentation(
            &foreground,
            &background,
            &index,
            &OraOptions::functional_class(),
        )
        .unwrap();
        assert_eq!(class.len(), 1);
        assert_eq!(class[0].foreground_count(), 0);
        assert!((class[0].p_value() - 1.0).abs() < 1e-12);
        assert_eq!(class[0].fold_enrichment(), 0.0);
        assert_eq!(class[0].odds_ratio(), 0.0);
    }

    #[test]
    fn empty_foreground_gives_empty_result() {
        let background = numbered("g", 0..100);
        let mut index = HashMap::new();
        index.insert("a".to_string(), numbered("g", 0..10));
        let records =
            overrepresentation(&HashSet::new(), &background, &index, &OraOptions::default())
                .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn empty_index_gives_empty_result() {
        let background = numbered("g", 0..100);
        let foreground = numbered("g", 0..10);
        let records = overrepresentation(
            &foreground,
            &background,
            &HashMap::new(),
            &OraOptions::default(),
        )
        .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn foreground_larger_than_background_is_fatal() {
        let background = numbered("g", 0..10);
        let foreground = numbered("g", 0..20);
        let mut index = HashMap::new();
        index.insert("a".to_string(), numbered("g", 0..10));
        assert!(overrepresentation(
            &foreground,
            &background,
            &index,
            &OraOptions::default()
        )
        .is_err());
    }

    #[test]
    fn membership_outside_background_is_ignored() {
        let background = numbered("g", 0..100);
        let foreground = numbered("g", 0..10);
        let mut index = HashMap::new();
        let mut members = numbered("g", 0..5);
        members.extend(numbered("x", 0..50)); // not in background
        index.insert("a".to_string(), members);
        let records =
            overrepresentation(&foreground, &background, &index, &OraOptions::default())
                .unwrap();
        assert_eq!(records[0].background_count(), 5);
        assert_eq!(records[0].foreground_count(), 5);
    }
}
