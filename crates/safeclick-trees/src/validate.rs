//! Input validation shared by every estimator.

use crate::error::EnsembleError;
use crate::node::N_CLASSES;

/// Validate a row-major training set and return its feature width.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`EnsembleError::LengthMismatch`] | `features.len() != labels.len()` |
/// | [`EnsembleError::EmptyDataset`] | zero rows |
/// | [`EnsembleError::ZeroFeatures`] | rows have zero columns |
/// | [`EnsembleError::RaggedRow`] | rows have inconsistent widths |
/// | [`EnsembleError::NonFiniteValue`] | any value is NaN or infinite |
/// | [`EnsembleError::LabelOutOfRange`] | any label is not 0 or 1 |
pub(crate) fn training_set(features: &[Vec<f64>], labels: &[usize]) -> Result<usize, EnsembleError> {
    if features.len() != labels.len() {
        return Err(EnsembleError::LengthMismatch {
            n_rows: features.len(),
            n_labels: labels.len(),
        });
    }
    if features.is_empty() {
        return Err(EnsembleError::EmptyDataset);
    }

    let n_features = features[0].len();
    if n_features == 0 {
        return Err(EnsembleError::ZeroFeatures);
    }

    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(EnsembleError::RaggedRow {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(EnsembleError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }

    if let Some((sample_index, &label)) = labels.iter().enumerate().find(|(_, l)| **l >= N_CLASSES) {
        return Err(EnsembleError::LabelOutOfRange {
            label,
            sample_index,
        });
    }

    Ok(n_features)
}

/// Validate a single prediction input against the training-time width.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`EnsembleError::PredictionFeatureMismatch`] | `sample.len() != n_features` |
/// | [`EnsembleError::NonFinitePrediction`] | any value is NaN or infinite |
pub(crate) fn sample(sample: &[f64], n_features: usize) -> Result<(), EnsembleError> {
    if sample.len() != n_features {
        return Err(EnsembleError::PredictionFeatureMismatch {
            expected: n_features,
            got: sample.len(),
        });
    }
    if let Some(feature_index) = sample.iter().position(|v| !v.is_finite()) {
        return Err(EnsembleError::NonFinitePrediction { feature_index });
    }
    Ok(())
}

/// Validate that `names` matches the feature width, or synthesize
/// `f0..fN` names when none are given.
pub(crate) fn feature_names(names: &[String], n_features: usize) -> Result<Vec<String>, EnsembleError> {
    if names.is_empty() {
        return Ok((0..n_features).map(|i| format!("f{i}")).collect());
    }
    if names.len() != n_features {
        return Err(EnsembleError::FeatureNameCountMismatch {
            expected: n_features,
            got: names.len(),
        });
    }
    Ok(names.to_vec())
}

/// Transpose the selected rows and columns of a row-major matrix into
/// column-major layout: `out[j][k] = features[rows[k]][columns[j]]`.
pub(crate) fn gather_columns(features: &[Vec<f64>], rows: &[usize], columns: &[usize]) -> Vec<Vec<f64>> {
    columns
        .iter()
        .map(|&col| rows.iter().map(|&row| features[row][col]).collect())
        .collect()
}
