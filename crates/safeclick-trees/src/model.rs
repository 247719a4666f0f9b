//! Caller-owned handle over any fitted model.

use std::fmt;

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::boosted::GradientBoosting;
use crate::error::EnsembleError;
use crate::forest::RandomForest;
use crate::predict::{ClassProbabilities, Classifier};
use crate::tree::DecisionTree;

/// Which estimator a [`Model`] wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ModelKind {
    /// A single decision tree.
    Tree,
    /// A bagged random forest.
    Forest,
    /// A logistic boosted ensemble.
    Boosted,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Tree => f.write_str("tree"),
            ModelKind::Forest => f.write_str("forest"),
            ModelKind::Boosted => f.write_str("boosted"),
        }
    }
}

/// A fitted model of any kind.
///
/// Owns its trees exclusively and is never mutated by prediction, so a
/// single handle can be shared across threads for serving.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Model {
    /// A single decision tree.
    Tree(DecisionTree),
    /// A bagged random forest.
    Forest(RandomForest),
    /// A logistic boosted ensemble.
    Boosted(GradientBoosting),
}

impl Model {
    /// Return the kind of the wrapped model.
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        match self {
            Model::Tree(_) => ModelKind::Tree,
            Model::Forest(_) => ModelKind::Forest,
            Model::Boosted(_) => ModelKind::Boosted,
        }
    }

    /// Return the number of trees (1 for a single tree).
    #[must_use]
    pub fn n_estimators(&self) -> usize {
        match self {
            Model::Tree(_) => 1,
            Model::Forest(f) => f.n_trees(),
            Model::Boosted(b) => b.n_trees(),
        }
    }

    /// Return the width of accepted vectors.
    #[must_use]
    pub fn n_features(&self) -> usize {
        match self {
            Model::Tree(t) => t.n_features(),
            Model::Forest(f) => f.n_features(),
            Model::Boosted(b) => b.n_features(),
        }
    }

    /// Return the training-time column names.
    ///
    /// Single trees are positional and return an empty slice.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        match self {
            Model::Tree(_) => &[],
            Model::Forest(f) => f.feature_names(),
            Model::Boosted(b) => b.feature_names(),
        }
    }

    /// Predict the label of one sample.
    ///
    /// # Errors
    ///
    /// Fails closed on a vector of the wrong width or with non-finite values.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, EnsembleError> {
        match self {
            Model::Tree(t) => t.predict(sample),
            Model::Forest(f) => f.predict(sample),
            Model::Boosted(b) => b.predict(sample),
        }
    }

    /// Return `[P(0), P(1)]` for one sample.
    ///
    /// Forests report vote shares; a single tree reports a one-hot pair.
    ///
    /// # Errors
    ///
    /// Same as [`Model::predict`].
    pub fn predict_proba(&self, sample: &[f64]) -> Result<ClassProbabilities, EnsembleError> {
        match self {
            Model::Tree(t) => Ok(ClassProbabilities::from_positive(t.predict(sample)? as f64)),
            Model::Forest(f) => f.predict_proba(sample),
            Model::Boosted(b) => b.predict_proba(sample),
        }
    }

    /// Predict labels for a batch of samples in parallel.
    ///
    /// # Errors
    ///
    /// Returns the first prediction error encountered.
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
    /// Returns the first prediction error encountered.
    pub fn predict_proba_batch(
        &self,
        features: &[Vec<f64>],
    ) -> Result<Vec<ClassProbabilities>, EnsembleError> {
        features
            .into_par_iter()
            .map(|sample| self.predict_proba(sample))
            .collect()
    }

    pub(crate) fn check_structure(&self) -> Result<(), EnsembleError> {
        match self {
            Model::Tree(t) => t.check_structure(),
            Model::Forest(f) => f.check_structure(),
            Model::Boosted(b) => b.check_structure(),
        }
    }
}

impl Classifier for Model {
    fn predict(&self, sample: &[f64]) -> Result<usize, EnsembleError> {
        Model::predict(self, sample)
    }

    fn n_features(&self) -> usize {
        Model::n_features(self)
    }
}

impl From<DecisionTree> for Model {
    fn from(tree: DecisionTree) -> Self {
        Model::Tree(tree)
    }
}

impl From<RandomForest> for Model {
    fn from(forest: RandomForest) -> Self {
        Model::Forest(forest)
    }
}

impl From<GradientBoosting> for Model {
    fn from(boosted: GradientBoosting) -> Self {
        Model::Boosted(boosted)
    }
}
