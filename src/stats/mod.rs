//! Statistical engines for category enrichment
//!
//! Two engines share this module. [`ora`] tests whether a foreground
//! gene set is over-represented in categories relative to a background,
//! using the one-sided exact test from [`fisher`]. [`prerank`] tests
//! whether a continuous ranking of all genes is coordinated toward
//! categories, using a weighted running-sum statistic with
//! permutation-derived significance.
//!
//! [`ora`] corrects for multiple testing with the Benjamini-Hochberg
//! procedure from [`correction`]; [`prerank`] derives its FDR from the
//! pooled permutation null instead. Both return their results sorted by
//! ascending raw p-value.

pub mod correction;
pub mod fisher;
pub mod ora;
pub mod prerank;

/// We frequently divide counts and need `f64` values. To ensure some
/// kind of safety we panic on counts too large for a lossless
/// conversion instead of silently losing precision.
pub(crate) fn f64_from_usize(n: usize) -> f64 {
    let intermediate: u32 = n
        .try_into()
        .expect("cannot safely create f64 from large usize");
    intermediate.into()
}
