//! Benjamini-Hochberg false-discovery-rate correction
//!
//! Converts a family of raw p-values into q-values that control the
//! expected false-discovery proportion. The correction is always
//! applied across the full batch of tested categories at once, never
//! per-direction subsets against each other.

use crate::{GsetError, GsetResult};

/// Benjamini-Hochberg adjusted p-values, in input order
///
/// Each p-value is scaled by `m / rank` of its ascending position,
/// monotonicity is enforced from the largest p-value down, and results
/// are clamped to `[0, 1]`. The adjusted value is never smaller than
/// the raw one.
///
/// # Errors
///
/// Returns [`GsetError::InvalidPValue`] if any input is outside
/// `[0, 1]` or not a number.
pub fn benjamini_hochberg(p_values: &[f64]) -> GsetResult<Vec<f64>> {
    if p_values.iter().any(|p| !(0.0..=1.0).contains(p)) {
        return Err(GsetError::InvalidPValue);
    }
    let m = p_values.len();
    if m == 0 {
        return Ok(Vec::new());
    }

    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    let mut adjusted = vec![0.0; m];
    let mut running_min = 1.0_f64;
    for (rank, &idx) in order.iter().enumerate().rev() {
        let scaled = p_values[idx] * m as f64 / (rank + 1) as f64;
        running_min = running_min.min(scaled).min(1.0);
        adjusted[idx] = running_min;
    }
    Ok(adjusted)
}
