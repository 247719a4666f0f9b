//! Configuration builders for forest and boosted training.

use std::fmt;

use crate::boosted::GradientBoosting;
use crate::error::EnsembleError;
use crate::forest::RandomForest;
use crate::tree::DEFAULT_MAX_DEPTH;

/// Default ensemble size, for both forests and boosting rounds.
pub const DEFAULT_N_ESTIMATORS: usize = 300;

/// Default boosting shrinkage.
pub const DEFAULT_LEARNING_RATE: f64 = 0.01;

/// Default seed for every stochastic step.
pub const DEFAULT_SEED: u64 = 42;

/// Strategy for the number of features each forest tree sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`.
    #[default]
    Sqrt,
    /// `floor(log2(n_features))`.
    Log2,
    /// All features (no subsampling).
    All,
}

impl MaxFeatures {
    /// Resolve the policy to a concrete feature count for `n_features` columns.
    ///
    /// The result may be 0 (for example `Log2` with a single feature);
    /// [`RandomForestConfig::fit`] rejects that.
    #[must_use]
    pub fn resolve(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 if n_features == 0 => 0,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::All => n_features,
        }
    }
}

impl fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxFeatures::Sqrt => f.write_str("sqrt"),
            MaxFeatures::Log2 => f.write_str("log2"),
            MaxFeatures::All => f.write_str("all"),
        }
    }
}

/// Configuration for Random Forest training.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter      | Default |
/// |----------------|---------|
/// | `max_features` | `Sqrt`  |
/// | `max_depth`    | 10      |
/// | `seed`         | 42      |
///
/// [`Default`] additionally sets `n_estimators` to 300.
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    pub(crate) n_estimators: usize,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: usize,
    pub(crate) seed: u64,
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::InvalidEstimatorCount`] if `n_estimators` is zero.
    pub fn new(n_estimators: usize) -> Result<Self, EnsembleError> {
        if n_estimators == 0 {
            return Err(EnsembleError::InvalidEstimatorCount { n_estimators });
        }
        Ok(Self {
            n_estimators,
            max_features: MaxFeatures::Sqrt,
            max_depth: DEFAULT_MAX_DEPTH,
            seed: DEFAULT_SEED,
        })
    }

    // --- Setters ---

    /// Set the max features strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the maximum depth of every tree.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    /// Return the max features strategy.
    #[must_use]
    pub fn max_features(&self) -> MaxFeatures {
        self.max_features
    }

    /// Return the maximum depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a Random Forest on the provided dataset.
    ///
    /// `features[sample_idx][feature_idx]` is row-major.
    /// `labels[sample_idx]` is 0 or 1.
    /// `feature_names` names each column; pass an empty slice to get
    /// `f0..fN`.
    ///
    /// # Errors
    ///
    /// | Variant                                     | When                                             |
    /// |---------------------------------------------|--------------------------------------------------|
    /// | [`EnsembleError::LengthMismatch`]           | `features.len() != labels.len()`                 |
    /// | [`EnsembleError::EmptyDataset`]             | `features` is empty                              |
    /// | [`EnsembleError::ZeroFeatures`]             | rows have zero feature columns                   |
    /// | [`EnsembleError::RaggedRow`]                | rows have inconsistent lengths                   |
    /// | [`EnsembleError::NonFiniteValue`]           | any value is NaN or infinite                     |
    /// | [`EnsembleError::LabelOutOfRange`]          | any label is not 0 or 1                          |
    /// | [`EnsembleError::FeatureNameCountMismatch`] | names given but not one per column               |
    /// | [`EnsembleError::InvalidMaxFeatures`]       | resolved max_features is outside [1, n_features] |
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<RandomForest, EnsembleError> {
        crate::forest::train(self, features, labels, feature_names)
    }
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: DEFAULT_N_ESTIMATORS,
            max_features: MaxFeatures::Sqrt,
            max_depth: DEFAULT_MAX_DEPTH,
            seed: DEFAULT_SEED,
        }
    }
}

/// Configuration for stage-wise logistic boosting.
///
/// # Defaults
///
/// | Parameter       | Default |
/// |-----------------|---------|
/// | `learning_rate` | 0.01    |
/// | `max_depth`     | 10      |
///
/// `n_estimators = 0` is valid and yields a model that always predicts the
/// training prevalence. [`Default`] sets 300 rounds.
#[derive(Debug, Clone)]
pub struct GradientBoostingConfig {
    pub(crate) n_estimators: usize,
    pub(crate) learning_rate: f64,
    pub(crate) max_depth: usize,
}

impl GradientBoostingConfig {
    /// Create a new config with the given number of boosting rounds.
    #[must_use]
    pub fn new(n_estimators: usize) -> Self {
        Self {
            n_estimators,
            learning_rate: DEFAULT_LEARNING_RATE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Set the shrinkage applied to every tree's output.
    /// Validated at [`GradientBoostingConfig::fit`].
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the maximum depth of every round's tree.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Return the number of boosting rounds.
    #[must_use]
    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    /// Return the learning rate.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Return the maximum depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Train a boosted ensemble on the provided dataset.
    ///
    /// # Errors
    ///
    /// | Variant                                  | When                                         |
    /// |------------------------------------------|----------------------------------------------|
    /// | [`EnsembleError::InvalidLearningRate`]   | `learning_rate` is not positive and finite   |
    /// | [`EnsembleError::DegenerateLogOdds`]     | every label is 0, or every label is 1        |
    ///
    /// plus every dataset-shape error listed on [`RandomForestConfig::fit`].
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<GradientBoosting, EnsembleError> {
        crate::boosted::train(self, features, labels, feature_names)
    }
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_N_ESTIMATORS)
    }
}
