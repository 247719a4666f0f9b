//! Prediction surface shared by every model, plus forest voting.

use std::fmt;
use std::slice;

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::confusion::ConfusionMatrix;
use crate::error::EnsembleError;
use crate::forest::RandomForest;
use crate::node::{ClassCounts, N_CLASSES};
use crate::validate;

/// Probability pair `[P(label 0), P(label 1)]`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassProbabilities([f64; N_CLASSES]);

impl ClassProbabilities {
    /// Build the pair from the probability of label 1.
    pub(crate) fn from_positive(p: f64) -> Self {
        Self([1.0 - p, p])
    }

    /// Build the pair from vote counts.
    pub(crate) fn from_counts(counts: &ClassCounts) -> Self {
        let n = counts.total() as f64;
        Self([counts.get(0) as f64 / n, counts.get(1) as f64 / n])
    }

    /// Return the index of the larger probability; an exact tie gives 0.
    #[must_use]
    pub fn predicted_label(&self) -> usize {
        usize::from(self.0[1] > self.0[0])
    }

    /// Return the probability of `label`.
    #[must_use]
    pub fn get(&self, label: usize) -> f64 {
        self.0[label]
    }

    /// Return the probability of label 1 ("safe").
    #[must_use]
    pub fn positive(&self) -> f64 {
        self.0[1]
    }

    /// Return the pair as a slice indexed by label.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl fmt::Display for ClassProbabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.4}, {:.4}]", self.0[0], self.0[1])
    }
}

/// A fitted binary classifier over fixed-width numeric vectors.
pub trait Classifier {
    /// Predict the label (0 or 1) of one sample.
    ///
    /// # Errors
    ///
    /// Fails closed with [`EnsembleError::PredictionFeatureMismatch`] or
    /// [`EnsembleError::NonFinitePrediction`] on a malformed vector.
    fn predict(&self, sample: &[f64]) -> Result<usize, EnsembleError>;

    /// Width of the vectors this model accepts.
    fn n_features(&self) -> usize;

    /// Lazily predict a sequence of samples.
    ///
    /// Nothing is evaluated until the iterator is advanced. The iterator is
    /// `Clone`, so the same sequence can be replayed from the start.
    fn predict_iter<'a>(&'a self, samples: &'a [Vec<f64>]) -> Predictions<'a, Self>
    where
        Self: Sized,
    {
        Predictions {
            model: self,
            samples: samples.iter(),
        }
    }

    /// Fraction of `features` rows whose prediction equals `labels`.
    ///
    /// # Errors
    ///
    /// Returns the shape errors of [`ConfusionMatrix::evaluate`] and any
    /// prediction error.
    fn score(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<f64, EnsembleError> {
        Ok(ConfusionMatrix::evaluate(self, features, labels)?.accuracy())
    }
}

/// Lazy, restartable prediction sequence returned by [`Classifier::predict_iter`].
pub struct Predictions<'a, M: ?Sized> {
    model: &'a M,
    samples: slice::Iter<'a, Vec<f64>>,
}

impl<M: ?Sized> Clone for Predictions<'_, M> {
    fn clone(&self) -> Self {
        Self {
            model: self.model,
            samples: self.samples.clone(),
        }
    }
}

impl<M: Classifier + ?Sized> Iterator for Predictions<'_, M> {
    type Item = Result<usize, EnsembleError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.samples.next().map(|sample| self.model.predict(sample))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.samples.size_hint()
    }
}

impl<M: Classifier + ?Sized> ExactSizeIterator for Predictions<'_, M> {}

impl RandomForest {
    /// Predict the label for a single sample by majority vote.
    ///
    /// Each tree sees the sample projected onto its own feature subset.
    /// A split vote returns 0.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`EnsembleError::PredictionFeatureMismatch`] | `sample.len() != n_features` |
    /// | [`EnsembleError::NonFinitePrediction`] | any value is NaN or infinite |
    pub fn predict(&self, sample: &[f64]) -> Result<usize, EnsembleError> {
        validate::sample(sample, self.n_features)?;
        Ok(self.tally(sample).majority())
    }

    /// Return the vote shares for a single sample.
    ///
    /// # Errors
    ///
    /// Same as [`RandomForest::predict`].
    pub fn predict_proba(&self, sample: &[f64]) -> Result<ClassProbabilities, EnsembleError> {
        validate::sample(sample, self.n_features)?;
        Ok(ClassProbabilities::from_counts(&self.tally(sample)))
    }

    /// Predict labels for a batch of samples in parallel.
    ///
    /// # Errors
    ///
    /// Returns the first error of [`RandomForest::predict`] encountered.
    pub fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, EnsembleError> {
        features
            .into_par_iter()
            .map(|sample| self.predict(sample))
            .collect()
    }

    /// Return vote shares for a batch of samples in parallel.
    ///
    /// # Errors
    ///
    /// Returns the first error of [`RandomForest::predict`] encountered.
    pub fn predict_proba_batch(
        &self,
        features: &[Vec<f64>],
    ) -> Result<Vec<ClassProbabilities>, EnsembleError> {
        features
            .into_par_iter()
            .map(|sample| self.predict_proba(sample))
            .collect()
    }

    fn tally(&self, sample: &[f64]) -> ClassCounts {
        let mut votes = ClassCounts::default();
        for member in &self.members {
            votes.add(member.vote(sample));
        }
        votes
    }

    /// Return the number of features this forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.members.len()
    }

    /// Return the feature names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

impl Classifier for RandomForest {
    fn predict(&self, sample: &[f64]) -> Result<usize, EnsembleError> {
        RandomForest::predict(self, sample)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MaxFeatures, RandomForestConfig};
    use crate::forest::ForestMember;
    use crate::node::{Impurity, Node};
    use crate::tree::{DecisionTree, DecisionTreeConfig};

    fn separable() -> (Vec<Vec<f64>>, Vec<usize>) {
        let features = (0..40)
            .map(|i| vec![i as f64, (i % 7) as f64, (i % 3) as f64])
            .collect();
        let labels = (0..40).map(|i| usize::from(i >= 20)).collect();
        (features, labels)
    }

    fn constant_tree(label: usize) -> DecisionTree {
        let mut counts = ClassCounts::default();
        counts.add(label);
        DecisionTree {
            nodes: vec![Node::Leaf {
                label,
                counts,
                impurity: Impurity::zero(),
                n_samples: 1,
            }],
            n_features: 1,
        }
    }

    fn forest_of(labels: &[usize]) -> RandomForest {
        RandomForest {
            members: labels
                .iter()
                .map(|&l| ForestMember {
                    tree: constant_tree(l),
                    feature_indices: vec![0],
                })
                .collect(),
            n_features: 1,
            max_features: 1,
            feature_names: vec!["f0".to_string()],
        }
    }

    #[test]
    fn predicted_label_tie_is_zero() {
        assert_eq!(ClassProbabilities::from_positive(0.5).predicted_label(), 0);
        assert_eq!(ClassProbabilities::from_positive(0.51).predicted_label(), 1);
    }

    #[test]
    fn split_vote_resolves_to_zero() {
        let forest = forest_of(&[1, 0, 1, 0]);
        assert_eq!(forest.predict(&[3.0]).unwrap(), 0);
        let proba = forest.predict_proba(&[3.0]).unwrap();
        assert!((proba.get(0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn majority_vote_wins() {
        let forest = forest_of(&[1, 0, 1]);
        assert_eq!(forest.predict(&[0.0]).unwrap(), 1);
        let proba = forest.predict_proba(&[0.0]).unwrap();
        assert!((proba.positive() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn single_tree_all_features_matches_member() {
        let (features, labels) = separable();
        let forest = RandomForestConfig::new(1)
            .unwrap()
            .with_max_features(MaxFeatures::All)
            .fit(&features, &labels, &[])
            .unwrap();
        let member = &forest.members()[0];

        let probes: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![i as f64 - 10.0, (i % 5) as f64, (i % 4) as f64 * 0.7])
            .collect();
        for probe in &probes {
            let projected: Vec<f64> = member.feature_indices().iter().map(|&j| probe[j]).collect();
            assert_eq!(
                forest.predict(probe).unwrap(),
                member.tree().predict(&projected).unwrap()
            );
        }
    }

    #[test]
    fn forest_predict_width_mismatch() {
        let forest = forest_of(&[1]);
        let err = forest.predict(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            EnsembleError::PredictionFeatureMismatch { expected: 1, got: 2 }
        ));
    }

    #[test]
    fn batch_matches_single() {
        let (features, labels) = separable();
        let forest = RandomForestConfig::new(5)
            .unwrap()
            .fit(&features, &labels, &[])
            .unwrap();
        let batch = forest.predict_batch(&features).unwrap();
        for (sample, &label) in features.iter().zip(&batch) {
            assert_eq!(forest.predict(sample).unwrap(), label);
        }
    }

    #[test]
    fn predict_iter_matches_labels_on_separable_data() {
        let (features, labels) = separable();
        let tree = DecisionTreeConfig::new().fit(&features, &labels).unwrap();
        let preds: Vec<usize> = tree
            .predict_iter(&features)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(preds, labels);
        assert_eq!(tree.predict_iter(&features).len(), features.len());

        let model: &dyn Classifier = &tree;
        assert!((model.score(&features, &labels).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn score_is_accuracy() {
        let forest = forest_of(&[1]);
        let features = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let score = forest.score(&features, &[1, 1, 0, 1]).unwrap();
        assert!((score - 0.75).abs() < 1e-12);
    }
}
