//! One-sided exact test on a 2x2 contingency table
//!
//! The enrichment direction of the test is "greater": the p-value is
//! the probability of drawing at least the observed number of category
//! members into the foreground, under the hypergeometric distribution.

use statrs::distribution::{DiscreteCDF, Hypergeometric};

use crate::stats::f64_from_usize;
use crate::{GsetError, GsetResult, ODDS_RATIO_SENTINEL};

/// The 2x2 contingency table of a single category test
///
/// ```text
///                  | in category | not in category
/// foreground       | k           | n - k
/// rest of universe | K - k       | N - K - n + k
/// ```
///
/// where `N` is the background size, `n` the foreground size, `K` the
/// category size within the background and `k` the observed overlap.
/// The bottom-right cell is clamped to zero when the foreground is not
/// fully contained in the background.
#[derive(Debug, Clone, Copy)]
pub struct ContingencyTable {
    observed: u64,   // k
    foreground: u64, // n
    category: u64,   // K
    background: u64, // N
}

impl ContingencyTable {
    /// Validates and builds a table from the four set sizes
    ///
    /// # Errors
    ///
    /// Returns [`GsetError::InvalidContingencyTable`] when the counts
    /// contradict each other (`k > n`, `k > K`, `n > N` or `K > N`).
    /// A malformed table is a programming error, never skipped.
    pub fn new(
        observed: usize,
        foreground: usize,
        category: usize,
        background: usize,
    ) -> GsetResult<Self> {
        if observed > foreground
            || observed > category
            || foreground > background
            || category > background
        {
            return Err(GsetError::InvalidContingencyTable);
        }
        Ok(Self {
            observed: observed as u64,
            foreground: foreground as u64,
            category: category as u64,
            background: background as u64,
        })
    }

    /// One-sided (enrichment direction) exact p-value
    ///
    /// Uses the hypergeometric survival function; `sf` computes
    /// "more than k", so the observed count is included by subtracting
    /// one first.
    pub fn p_value(&self) -> GsetResult<f64> {
        if self.observed == 0 {
            return Ok(1.0);
        }
        let hyper =
            Hypergeometric::new(self.background, self.category, self.foreground)
                .map_err(|_| GsetError::InvalidContingencyTable)?;
        Ok(hyper.sf(self.observed - 1))
    }

    /// Odds ratio of the table
    ///
    /// A mathematically infinite ratio (a zero cell in the denominator
    /// with a non-zero numerator) is reported as
    /// [`ODDS_RATIO_SENTINEL`] to keep sorting and serialization
    /// well-defined.
    pub fn odds_ratio(&self) -> f64 {
        let a = self.observed;
        let b = self.foreground - self.observed;
        let c = self.category - self.observed;
        let d = (self.background + self.observed)
            .saturating_sub(self.category + self.foreground);

        let numerator = a as f64 * d as f64;
        let denominator = b as f64 * c as f64;
        if denominator == 0.0 {
            if numerator == 0.0 {
                0.0
            } else {
                ODDS_RATIO_SENTINEL
            }
        } else {
            numerator / denominator
        }
    }

    /// Fold-enrichment of the foreground ratio over the background ratio
    ///
    /// `(k/n) / (K/N)`, reported as `0.0` (not undefined) whenever any
    /// of the denominators is zero.
    pub fn fold_enrichment(&self) -> f64 {
        if self.foreground == 0 || self.category == 0 || self.background == 0 {
            return 0.0;
        }
        let foreground_ratio = f64_from_usize(self.observed as usize)
            / f64_from_usize(self.foreground as usize);
        let background_ratio = f64_from_usize(self.category as usize)
            / f64_from_usize(self.background as usize);
        foreground_ratio / background_ratio
    }
}
