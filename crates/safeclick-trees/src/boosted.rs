//! Stage-wise logistic boosting over classification trees.
//!
//! Each round fits a tree to the sign of the current pseudo-residual
//! `y - sigmoid(raw)` and adds `learning_rate * tree(x)` to every sample's
//! raw score. Rounds are strictly sequential: round `i` reads the raw scores
//! produced by rounds `0..i`.

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::GradientBoostingConfig;
use crate::error::EnsembleError;
use crate::logistic::{log_odds, pseudo_residuals, sigmoid};
use crate::predict::{ClassProbabilities, Classifier};
use crate::tree::{DecisionTree, grow};
use crate::validate;

/// A fitted boosted ensemble.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GradientBoosting {
    pub(crate) initial_bias: f64,
    pub(crate) learning_rate: f64,
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) feature_names: Vec<String>,
}

/// Train the boosted ensemble.
#[instrument(skip_all, fields(n_estimators = config.n_estimators, n_samples = features.len()))]
pub(crate) fn train(
    config: &GradientBoostingConfig,
    features: &[Vec<f64>],
    labels: &[usize],
    feature_names: &[String],
) -> Result<GradientBoosting, EnsembleError> {
    let learning_rate = config.learning_rate;
    if !(learning_rate > 0.0 && learning_rate.is_finite()) {
        return Err(EnsembleError::InvalidLearningRate { learning_rate });
    }
    let n_features = validate::training_set(features, labels)?;
    let feature_names = validate::feature_names(feature_names, n_features)?;

    let n_samples = features.len();
    let n_positive = labels.iter().filter(|&&y| y == 1).count();
    let initial_bias = log_odds(n_positive as f64 / n_samples as f64)?;

    info!(
        n_estimators = config.n_estimators,
        n_samples,
        n_features,
        learning_rate,
        initial_bias,
        "training boosted ensemble"
    );

    let rows: Vec<usize> = (0..n_samples).collect();
    let all_columns: Vec<usize> = (0..n_features).collect();
    let columns = validate::gather_columns(features, &rows, &all_columns);

    let mut raw_scores = vec![initial_bias; n_samples];
    let mut trees = Vec::with_capacity(config.n_estimators);

    for round in 0..config.n_estimators {
        let residuals = pseudo_residuals(labels, &raw_scores);
        let targets: Vec<usize> = residuals.iter().map(|&r| usize::from(r > 0.0)).collect();
        let tree = grow(&columns, &targets, config.max_depth)?;

        let mut n_correct = 0usize;
        for ((row, raw), &target) in features.iter().zip(raw_scores.iter_mut()).zip(&targets) {
            let vote = tree.predict_unchecked(row);
            n_correct += usize::from(vote == target);
            *raw += learning_rate * vote as f64;
        }

        debug!(
            round,
            n_positive_residuals = targets.iter().sum::<usize>(),
            round_accuracy = n_correct as f64 / n_samples as f64,
            n_nodes = tree.n_nodes(),
            "boosting round complete"
        );
        trees.push(tree);
    }

    info!(n_trees = trees.len(), "boosted ensemble trained");

    Ok(GradientBoosting {
        initial_bias,
        learning_rate,
        trees,
        n_features,
        feature_names,
    })
}

impl GradientBoosting {
    /// Raw additive score `initial_bias + Σ learning_rate * tree(x)`,
    /// accumulated in round order.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`EnsembleError::PredictionFeatureMismatch`] | `sample.len() != n_features` |
    /// | [`EnsembleError::NonFinitePrediction`] | any value is NaN or infinite |
    pub fn raw_score(&self, sample: &[f64]) -> Result<f64, EnsembleError> {
        validate::sample(sample, self.n_features)?;
        Ok(self.accumulate(sample))
    }

    /// Return `[1 - p, p]` where `p = sigmoid(raw_score(sample))`.
    ///
    /// # Errors
    ///
    /// Same as [`GradientBoosting::raw_score`].
    pub fn predict_proba(&self, sample: &[f64]) -> Result<ClassProbabilities, EnsembleError> {
        let raw = self.raw_score(sample)?;
        Ok(ClassProbabilities::from_positive(sigmoid(raw)))
    }

    /// Return the argmax of [`GradientBoosting::predict_proba`]; `p = 0.5` gives 0.
    ///
    /// # Errors
    ///
    /// Same as [`GradientBoosting::raw_score`].
    pub fn predict(&self, sample: &[f64]) -> Result<usize, EnsembleError> {
        Ok(self.predict_proba(sample)?.predicted_label())
    }

    /// Predict labels for a batch of samples in parallel.
    ///
    /// # Errors
    ///
    /// Returns the first error of [`GradientBoosting::predict`] encountered.
    pub fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, EnsembleError> {
        features
            .into_par_iter()
            .map(|sample| self.predict(sample))
            .collect()
    }

    /// Return probability pairs for a batch of samples in parallel.
    ///
    /// # Errors
    ///
    /// Returns the first error of [`GradientBoosting::predict`] encountered.
    pub fn predict_proba_batch(
        &self,
        features: &[Vec<f64>],
    ) -> Result<Vec<ClassProbabilities>, EnsembleError> {
        features
            .into_par_iter()
            .map(|sample| self.predict_proba(sample))
            .collect()
    }

    fn accumulate(&self, sample: &[f64]) -> f64 {
        let mut raw = self.initial_bias;
        for tree in &self.trees {
            raw += self.learning_rate * tree.predict_unchecked(sample) as f64;
        }
        raw
    }

    /// Return the log-odds of the training prevalence.
    #[must_use]
    pub fn initial_bias(&self) -> f64 {
        self.initial_bias
    }

    /// Return the shrinkage applied to every tree.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Return the trees in round order.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Return the number of boosting rounds.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the number of features this model was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the feature names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Check the invariants of a decoded boosted model.
    pub(crate) fn check_structure(&self) -> Result<(), EnsembleError> {
        if !self.initial_bias.is_finite() {
            return Err(EnsembleError::CorruptModel {
                reason: format!("initial bias {} is not finite", self.initial_bias),
            });
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(EnsembleError::CorruptModel {
                reason: format!("learning rate {} is not positive and finite", self.learning_rate),
            });
        }
        if self.feature_names.len() != self.n_features {
            return Err(EnsembleError::CorruptModel {
                reason: format!(
                    "{} feature names for {} features",
                    self.feature_names.len(),
                    self.n_features
                ),
            });
        }
        for (round, tree) in self.trees.iter().enumerate() {
            if tree.n_features != self.n_features {
                return Err(EnsembleError::CorruptModel {
                    reason: format!("tree {round} has width {}", tree.n_features),
                });
            }
            tree.check_structure()?;
        }
        Ok(())
    }
}

impl Classifier for GradientBoosting {
    fn predict(&self, sample: &[f64]) -> Result<usize, EnsembleError> {
        GradientBoosting::predict(self, sample)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}
