//! Rank-based (prerank) enrichment of a continuous gene ranking
//!
//! Instead of splitting genes into foreground and background at a
//! significance cutoff, the prerank engine walks the full ranking from
//! highest to lowest score and accumulates a weighted running-sum
//! statistic per category: category members push the sum up in
//! proportion to the magnitude of their score, non-members pull it down
//! by a fixed step. The enrichment score (ES) is the maximum absolute
//! deviation of that sum, keeping its sign.
//!
//! Significance is estimated empirically by recomputing the statistic
//! against shuffled category assignments (ranking fixed). The
//! permutation loop dominates the runtime of the whole engine and runs
//! on a rayon thread pool; every permutation derives its RNG from the
//! base seed and its own index, so results do not depend on thread
//! scheduling.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use tracing::debug;

use crate::{DEFAULT_PERMUTATIONS, MIN_RANKED_GENES};

/// Tuning knobs of the prerank engine
#[derive(Debug, Clone)]
pub struct PrerankOptions {
    /// Categories with fewer members in the ranking are skipped
    pub min_size: usize,
    /// Categories with more members in the ranking are skipped
    pub max_size: usize,
    /// Number of membership permutations per category
    ///
    /// The smallest achievable nominal p-value is `1/permutations`;
    /// callers trade precision for runtime here.
    pub permutations: usize,
    /// Base seed of the permutation RNG
    pub seed: u64,
}

impl Default for PrerankOptions {
    fn default() -> Self {
        Self {
            min_size: 5,
            max_size: 500,
            permutations: DEFAULT_PERMUTATIONS,
            seed: 42,
        }
    }
}

/// The prerank result for a single category
///
/// NES, p-value and FDR are NaN when the category's permutation null
/// was degenerate (no permutation ES of the observed sign); such a
/// failure never aborts the batch.
#[derive(Debug, Clone)]
pub struct RankEnrichmentRecord {
    category: String,
    size: usize,
    enrichment_score: f64,
    normalized_enrichment_score: f64,
    p_value: f64,
    fdr: f64,
    leading_edge: Vec<String>,
}

impl RankEnrichmentRecord {
    /// The category label
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Category size after restriction to the ranking
    pub fn size(&self) -> usize {
        self.size
    }

    /// The signed running-sum extremum (ES)
    pub fn enrichment_score(&self) -> f64 {
        self.enrichment_score
    }

    /// ES rescaled by the mean of its same-sign permutation null (NES),
    /// comparable across categories of different sizes
    pub fn normalized_enrichment_score(&self) -> f64 {
        self.normalized_enrichment_score
    }

    /// Nominal permutation p-value
    pub fn p_value(&self) -> f64 {
        self.p_value
    }

    /// FDR q-value from the pooled permutation null, computed
    /// separately for positively and negatively enriched categories
    pub fn fdr(&self) -> f64 {
        self.fdr
    }

    /// Genes driving the enrichment signal: the ranking prefix (positive
    /// ES) or suffix (negative ES) up to the running-sum extremum,
    /// restricted to category members
    pub fn leading_edge(&self) -> &[String] {
        &self.leading_edge
    }
}

/// A category restricted to the ranking, as a membership mask
struct Candidate<'a> {
    label: &'a str,
    mask: Vec<bool>,
    size: usize,
}

/// Runs prerank enrichment of `ranking` against `category_sets`
///
/// `ranking` must be sorted by descending score; duplicate gene
/// identifiers are dropped, first occurrence wins. Returns an empty
/// result when fewer than [`MIN_RANKED_GENES`] usable genes remain, no
/// category survives size filtering, or `permutations` is zero.
/// Records are sorted by ascending nominal p-value (NaN last), ties
/// broken by category label.
pub fn prerank(
    ranking: &[(String, f64)],
    category_sets: &HashMap<String, HashSet<String>>,
    options: &PrerankOptions,
) -> Vec<RankEnrichmentRecord> {
    let mut seen = HashSet::new();
    let ranked: Vec<(&str, f64)> = ranking
        .iter()
        .filter(|(id, _)| seen.insert(id.as_str()))
        .map(|(id, score)| (id.as_str(), *score))
        .collect();
    let n = ranked.len();
    if n < MIN_RANKED_GENES || options.permutations == 0 {
        debug!(genes = n, "too few usable ranked genes");
        return Vec::new();
    }

    let weights: Vec<f64> = ranked.iter().map(|(_, score)| score.abs()).collect();

    // fixed category order keeps the output stable under parallelism
    let mut sorted_sets: Vec<(&String, &HashSet<String>)> = category_sets.iter().collect();
    sorted_sets.sort_by(|a, b| a.0.cmp(b.0));

    let candidates: Vec<Candidate> = sorted_sets
        .into_iter()
        .filter_map(|(label, members)| {
            let mask: Vec<bool> = ranked.iter().map(|(id, _)| members.contains(*id)).collect();
            let size = mask.iter().filter(|&&hit| hit).count();
            if size == 0 || size < options.min_size || size > options.max_size {
                debug!(category = %label, size, "outside size bounds");
                return None;
            }
            Some(Candidate {
                label: label.as_str(),
                mask,
                size,
            })
        })
        .collect();
    if candidates.is_empty() {
        return Vec::new();
    }

    let mut records = Vec::with_capacity(candidates.len());
    // pooled same-sign null NES across all categories, for the FDR pass
    let mut positive_null = Vec::new();
    let mut negative_null = Vec::new();

    for candidate in &candidates {
        let (es, peak) = running_sum(&weights, &candidate.mask);

        let null: Vec<f64> = (0..options.permutations)
            .into_par_iter()
            .map(|index| {
                let mut rng = SplitMix64::for_permutation(options.seed, index);
                let mask = random_mask(&mut rng, n, candidate.size);
                running_sum(&weights, &mask).0
            })
            .collect();

        let positive_mean = sign_mean(&null, true);
        let negative_mean = sign_mean(&null, false);

        // normalize the null itself so the FDR pass compares NES to NES
        for &value in &null {
            if value >= 0.0 {
                if let Some(mean) = positive_mean {
                    positive_null.push(value / mean);
                }
            } else if let Some(mean) = negative_mean {
                negative_null.push(-(value.abs() / mean));
            }
        }

        let leading_edge: Vec<String> = if es >= 0.0 {
            (0..=peak)
                .filter(|&i| candidate.mask[i])
                .map(|i| ranked[i].0.to_string())
                .collect()
        } else {
            (peak..n)
                .filter(|&i| candidate.mask[i])
                .map(|i| ranked[i].0.to_string())
                .collect()
        };

        let same_sign_mean = if es >= 0.0 { positive_mean } else { negative_mean };
        let (nes, p_value) = match same_sign_mean {
            Some(mean) => {
                let same_sign: Vec<f64> = null
                    .iter()
                    .copied()
                    .filter(|&value| (value >= 0.0) == (es >= 0.0))
                    .collect();
                let extreme = same_sign
                    .iter()
                    .filter(|value| value.abs() >= es.abs())
                    .count();
                let p_value = (extreme as f64 / same_sign.len() as f64)
                    .max(1.0 / options.permutations as f64);
                let nes = if es >= 0.0 {
                    es / mean
                } else {
                    -(es.abs() / mean)
                };
                (nes, p_value)
            }
            None => {
                debug!(category = %candidate.label, "degenerate permutation null");
                (f64::NAN, f64::NAN)
            }
        };

        records.push(RankEnrichmentRecord {
            category: candidate.label.to_string(),
            size: candidate.size,
            enrichment_score: es,
            normalized_enrichment_score: nes,
            p_value,
            fdr: f64::NAN,
            leading_edge,
        });
    }

    apply_fdr(&mut records, &positive_null, &negative_null);

    records.sort_by(|a, b| {
        a.p_value
            .total_cmp(&b.p_value)
            .then_with(|| a.category.cmp(&b.category))
    });
    records
}

/// Walks the ranking once and returns the signed running-sum extremum
/// and the position where it is attained
///
/// Category members add `|score| / N_R` (where `N_R` is the summed
/// member weight), non-members subtract `1 / (N - size)`. When every
/// member score is zero the hit increment degrades to `1 / size`.
fn running_sum(weights: &[f64], mask: &[bool]) -> (f64, usize) {
    let size = mask.iter().filter(|&&hit| hit).count();
    let member_total: f64 = weights
        .iter()
        .zip(mask)
        .filter_map(|(weight, &hit)| hit.then_some(*weight))
        .sum();
    let misses = weights.len() - size;
    let miss_step = if misses > 0 { 1.0 / misses as f64 } else { 0.0 };
    let flat_hit = 1.0 / size as f64;

    let mut sum = 0.0_f64;
    let mut extremum = 0.0_f64;
    let mut extremum_abs = 0.0_f64;
    let mut peak = 0usize;
    for (i, (weight, &hit)) in weights.iter().zip(mask).enumerate() {
        if hit {
            sum += if member_total > 0.0 {
                weight / member_total
            } else {
                flat_hit
            };
        } else {
            sum -= miss_step;
        }
        if sum.abs() > extremum_abs {
            extremum_abs = sum.abs();
            extremum = sum;
            peak = i;
        }
    }
    (extremum, peak)
}

/// Mean magnitude of the null values with the requested sign, or `None`
/// when the sign is unrepresented or its mean vanishes
fn sign_mean(null: &[f64], positive: bool) -> Option<f64> {
    let mut total = 0.0_f64;
    let mut count = 0usize;
    for &value in null {
        if (value >= 0.0) == positive {
            total += value.abs();
            count += 1;
        }
    }
    (count > 0 && total > 0.0).then(|| total / count as f64)
}

/// FDR q-values from the pooled null NES, per enrichment direction
///
/// For a positively enriched category the q-value is the fraction of
/// pooled positive null NES at least as large as the observed NES,
/// divided by the fraction of observed positive NES at least as large,
/// clamped to `[0, 1]`. Negative categories mirror this.
fn apply_fdr(
    records: &mut [RankEnrichmentRecord],
    positive_null: &[f64],
    negative_null: &[f64],
) {
    let positive_observed: Vec<f64> = records
        .iter()
        .map(|r| r.normalized_enrichment_score)
        .filter(|nes| nes.is_finite() && *nes >= 0.0)
        .collect();
    let negative_observed: Vec<f64> = records
        .iter()
        .map(|r| r.normalized_enrichment_score)
        .filter(|nes| nes.is_finite() && *nes < 0.0)
        .collect();

    for record in records.iter_mut() {
        let nes = record.normalized_enrichment_score;
        if !nes.is_finite() {
            continue;
        }
        let (null, observed): (&[f64], &[f64]) = if nes >= 0.0 {
            (positive_null, &positive_observed)
        } else {
            (negative_null, &negative_observed)
        };
        if null.is_empty() {
            continue;
        }
        let more_extreme = |values: &[f64]| {
            values
                .iter()
                .filter(|&&value| {
                    if nes >= 0.0 {
                        value >= nes
                    } else {
                        value <= nes
                    }
                })
                .count() as f64
                / values.len() as f64
        };
        let null_fraction = more_extreme(null);
        // the observed NES itself is included, so this is never zero
        let observed_fraction = more_extreme(observed);
        record.fdr = (null_fraction / observed_fraction).clamp(0.0, 1.0);
    }
}

/// Draws a random membership mask of `size` hits over `n` positions
/// (category membership shuffled, ranking fixed)
fn random_mask(rng: &mut SplitMix64, n: usize, size: usize) -> Vec<bool> {
    let mut positions: Vec<usize> = (0..n).collect();
    for i in 0..size {
        let j = i + rng.below(n - i);
        positions.swap(i, j);
    }
    let mut mask = vec![false; n];
    for &position in &positions[..size] {
        mask[position] = true;
    }
    mask
}

/// Minimal splitmix64 PRNG
///
/// Good enough for membership shuffling and cheap to reseed, which is
/// what makes the per-permutation seeding (and therefore deterministic
/// parallel execution) affordable.
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// An independent stream for one permutation of one call
    fn for_permutation(seed: u64, index: usize) -> Self {
        Self::new(seed.wrapping_add((index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)))
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// A random index in `[0, n)`
    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }
}
