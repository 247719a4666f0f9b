//! Logistic link between raw additive scores and probabilities.

use crate::error::EnsembleError;

/// Sigmoid `1 / (1 + e^-x)`.
///
/// Negative inputs use `e^x / (1 + e^x)` so that `exp` never overflows.
/// `sigmoid(0.0)` is exactly `0.5`.
#[inline]
#[must_use]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Log-odds `ln(p / (1 - p))` of a positive-class fraction.
///
/// # Errors
///
/// Returns [`EnsembleError::DegenerateLogOdds`] unless `0 < p < 1`.
pub fn log_odds(positive_fraction: f64) -> Result<f64, EnsembleError> {
    if !(positive_fraction > 0.0 && positive_fraction < 1.0) {
        return Err(EnsembleError::DegenerateLogOdds { positive_fraction });
    }
    Ok((positive_fraction / (1.0 - positive_fraction)).ln())
}

/// `label - sigmoid(raw)` for every sample.
pub(crate) fn pseudo_residuals(labels: &[usize], raw_scores: &[f64]) -> Vec<f64> {
    labels
        .iter()
        .zip(raw_scores)
        .map(|(&y, &raw)| y as f64 - sigmoid(raw))
        .collect()
}
