use std::path::PathBuf;

/// Coarse category of an [`EnsembleError`].
///
/// Callers that only need to decide how to react (reject the request,
/// flag degraded input upstream, reload the model) can match on this
/// instead of on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Shape mismatches, empty datasets, or out-of-range configuration.
    InvalidInput,
    /// Undefined numerical quantities (degenerate log-odds, empty partitions).
    Numerical,
    /// An inference-time vector disagrees with the training-time schema.
    FeatureMismatch,
    /// Reading, writing, or decoding a persisted model failed.
    Persistence,
}

/// Errors from tree induction, ensemble training, prediction and persistence.
#[derive(Debug, thiserror::Error)]
pub enum EnsembleError {
    /// Returned when the training dataset has zero samples.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when the training dataset has zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when the feature matrix and label vector differ in length.
    #[error("feature matrix has {n_rows} rows but label vector has {n_labels} entries")]
    LengthMismatch {
        /// Number of feature rows.
        n_rows: usize,
        /// Number of labels.
        n_labels: usize,
    },

    /// Returned when a training row has a different width than the first row.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    RaggedRow {
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        got: usize,
        /// Zero-based index of the offending row.
        sample_index: usize,
    },

    /// Returned when a training value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// Zero-based index of the offending row.
        sample_index: usize,
        /// Zero-based index of the offending column.
        feature_index: usize,
    },

    /// Returned when a label is not in `{0, 1}`.
    #[error("label {label} at sample {sample_index} is not a binary label (expected 0 or 1)")]
    LabelOutOfRange {
        /// The offending label value.
        label: usize,
        /// Zero-based index of the offending row.
        sample_index: usize,
    },

    /// Returned when a forest is configured with zero trees.
    #[error("n_estimators must be at least 1, got {n_estimators}")]
    InvalidEstimatorCount {
        /// The invalid n_estimators value provided.
        n_estimators: usize,
    },

    /// Returned when max_features resolves to 0 or exceeds n_features.
    #[error("max_features resolved to {max_features}, but must be in [1, {n_features}]")]
    InvalidMaxFeatures {
        /// The resolved max_features value.
        max_features: usize,
        /// The number of features in the dataset.
        n_features: usize,
    },

    /// Returned when the boosting learning rate is not a positive finite number.
    #[error("learning_rate must be a positive finite number, got {learning_rate}")]
    InvalidLearningRate {
        /// The invalid learning rate.
        learning_rate: f64,
    },

    /// Returned when the number of feature names differs from the number of columns.
    #[error("got {got} feature names for {expected} feature columns")]
    FeatureNameCountMismatch {
        /// Number of feature columns.
        expected: usize,
        /// Number of names supplied.
        got: usize,
    },

    /// Returned when n_folds is less than 2.
    #[error("n_folds must be at least 2, got {n_folds}")]
    InvalidFoldCount {
        /// The invalid n_folds value provided.
        n_folds: usize,
    },

    /// Returned when a class has fewer samples than the number of folds.
    #[error("class {class} has only {count} samples, need at least {n_folds} for stratified CV")]
    TooFewSamplesForFolds {
        /// The class label with insufficient samples.
        class: usize,
        /// The number of samples belonging to that class.
        count: usize,
        /// The requested number of folds.
        n_folds: usize,
    },

    /// Returned when the positive-class fraction is exactly 0 or 1,
    /// so the initial log-odds are undefined.
    #[error("positive-class fraction is {positive_fraction}; log-odds are undefined")]
    DegenerateLogOdds {
        /// Fraction of samples with label 1.
        positive_fraction: f64,
    },

    /// Returned when an impurity is requested for a partition with no samples.
    #[error("impurity of an empty partition is undefined")]
    EmptyPartition,

    /// Returned when a sample has a different number of features at prediction time.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the prediction input.
        got: usize,
    },

    /// Returned when a prediction input contains NaN or infinity.
    #[error("prediction input has a non-finite value at feature {feature_index}")]
    NonFinitePrediction {
        /// Zero-based index of the offending column.
        feature_index: usize,
    },

    /// Returned when a persisted model refers to a feature column outside its schema.
    #[error("model references feature {feature_index}, but only {n_features} features exist")]
    FeatureIndexOutOfRange {
        /// The out-of-range feature index.
        feature_index: usize,
        /// The model's feature width.
        n_features: usize,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model")]
    DeserializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the payload.
        found: u32,
    },

    /// Returned when a decoded model violates a structural invariant.
    #[error("corrupt model: {reason}")]
    CorruptModel {
        /// Human-readable description of the violated invariant.
        reason: String,
    },
}

impl EnsembleError {
    /// Classify this error into one of the four [`ErrorKind`] categories.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            EnsembleError::EmptyDataset
            | EnsembleError::ZeroFeatures
            | EnsembleError::LengthMismatch { .. }
            | EnsembleError::RaggedRow { .. }
            | EnsembleError::NonFiniteValue { .. }
            | EnsembleError::LabelOutOfRange { .. }
            | EnsembleError::InvalidEstimatorCount { .. }
            | EnsembleError::InvalidMaxFeatures { .. }
            | EnsembleError::InvalidLearningRate { .. }
            | EnsembleError::FeatureNameCountMismatch { .. }
            | EnsembleError::InvalidFoldCount { .. }
            | EnsembleError::TooFewSamplesForFolds { .. } => ErrorKind::InvalidInput,

            EnsembleError::DegenerateLogOdds { .. } | EnsembleError::EmptyPartition => {
                ErrorKind::Numerical
            }

            EnsembleError::PredictionFeatureMismatch { .. }
            | EnsembleError::NonFinitePrediction { .. }
            | EnsembleError::FeatureIndexOutOfRange { .. } => ErrorKind::FeatureMismatch,

            EnsembleError::SerializeModel { .. }
            | EnsembleError::DeserializeModel { .. }
            | EnsembleError::WriteModel { .. }
            | EnsembleError::ReadModel { .. }
            | EnsembleError::IncompatibleModelVersion { .. }
            | EnsembleError::CorruptModel { .. } => ErrorKind::Persistence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EnsembleError, ErrorKind};

    #[test]
    fn shape_errors_are_invalid_input() {
        let err = EnsembleError::LengthMismatch {
            n_rows: 3,
            n_labels: 2,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(EnsembleError::EmptyDataset.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn degenerate_log_odds_is_numerical() {
        let err = EnsembleError::DegenerateLogOdds {
            positive_fraction: 1.0,
        };
        assert_eq!(err.kind(), ErrorKind::Numerical);
        assert_eq!(EnsembleError::EmptyPartition.kind(), ErrorKind::Numerical);
    }

    #[test]
    fn width_mismatch_is_feature_mismatch() {
        let err = EnsembleError::PredictionFeatureMismatch {
            expected: 37,
            got: 36,
        };
        assert_eq!(err.kind(), ErrorKind::FeatureMismatch);
    }

    #[test]
    fn display_includes_fields() {
        let err = EnsembleError::LabelOutOfRange {
            label: 2,
            sample_index: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains('2') && msg.contains('7'), "msg = {msg}");
    }
}
