//! Stratified k-fold cross-validation for the ensembles.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument};

use crate::config::{DEFAULT_SEED, GradientBoostingConfig, RandomForestConfig};
use crate::confusion::ConfusionMatrix;
use crate::error::EnsembleError;
use crate::model::{Model, ModelKind};
use crate::node::N_CLASSES;
use crate::validate;

/// Which ensemble to train in each fold.
#[derive(Debug, Clone)]
pub enum EnsembleSpec {
    /// Train a random forest.
    Forest(RandomForestConfig),
    /// Train a boosted ensemble.
    Boosted(GradientBoostingConfig),
}

impl EnsembleSpec {
    /// Return the kind of model this spec trains.
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        match self {
            EnsembleSpec::Forest(_) => ModelKind::Forest,
            EnsembleSpec::Boosted(_) => ModelKind::Boosted,
        }
    }

    /// Train the configured ensemble and wrap it in a [`Model`].
    ///
    /// # Errors
    ///
    /// Returns the errors of [`RandomForestConfig::fit`] or
    /// [`GradientBoostingConfig::fit`].
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<Model, EnsembleError> {
        match self {
            EnsembleSpec::Forest(config) => config.fit(features, labels, feature_names).map(Model::from),
            EnsembleSpec::Boosted(config) => config.fit(features, labels, feature_names).map(Model::from),
        }
    }

    /// Per-fold variant: forests get a distinct seed per fold.
    fn for_fold(&self, fold: usize) -> Self {
        match self {
            EnsembleSpec::Forest(config) => {
                EnsembleSpec::Forest(config.clone().with_seed(config.seed.wrapping_add(fold as u64)))
            }
            EnsembleSpec::Boosted(config) => EnsembleSpec::Boosted(config.clone()),
        }
    }
}

/// Cross-validation configuration.
///
/// Construct via [`CrossValidation::new`], then chain `with_seed` if desired.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    n_folds: usize,
    seed: u64,
}

/// Results of stratified k-fold cross-validation.
#[derive(Debug)]
pub struct CrossValidationResult {
    /// Kind of model evaluated.
    pub kind: ModelKind,
    /// Accuracy for each fold.
    pub fold_accuracies: Vec<f64>,
    /// Aggregated confusion matrix (summed across all folds).
    pub confusion_matrix: ConfusionMatrix,
    /// Mean accuracy across folds.
    pub mean_accuracy: f64,
    /// Population standard deviation of fold accuracies.
    pub std_accuracy: f64,
    /// Number of folds.
    pub n_folds: usize,
    /// Total number of samples.
    pub n_samples: usize,
    /// Number of features.
    pub n_features: usize,
}

impl CrossValidation {
    /// Create a new cross-validation config with the given number of folds.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn new(n_folds: usize) -> Result<Self, EnsembleError> {
        if n_folds < 2 {
            return Err(EnsembleError::InvalidFoldCount { n_folds });
        }
        Ok(Self {
            n_folds,
            seed: DEFAULT_SEED,
        })
    }

    /// Set the random seed for fold shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of folds.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Run stratified k-fold cross-validation.
    ///
    /// Each fold trains `spec` on the remaining folds and evaluates on the
    /// held-out fold.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | Dataset-shape errors | As for [`RandomForestConfig::fit`] |
    /// | [`EnsembleError::TooFewSamplesForFolds`] | A class has fewer samples than folds |
    /// | Other training errors | From the underlying ensemble |
    #[instrument(skip_all, fields(n_folds = self.n_folds, n_samples = features.len(), kind = %spec.kind()))]
    pub fn evaluate(
        &self,
        spec: &EnsembleSpec,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<CrossValidationResult, EnsembleError> {
        let n_features = validate::training_set(features, labels)?;
        let n_samples = features.len();

        let fold_assignments = self.stratified_split(labels)?;

        let mut fold_accuracies = Vec::with_capacity(self.n_folds);
        let mut confusion_matrix = ConfusionMatrix::default();

        for fold in 0..self.n_folds {
            let mut train_features = Vec::new();
            let mut train_labels = Vec::new();
            let mut test_features = Vec::new();
            let mut test_labels = Vec::new();

            for (i, &assigned_fold) in fold_assignments.iter().enumerate() {
                if assigned_fold == fold {
                    test_features.push(features[i].clone());
                    test_labels.push(labels[i]);
                } else {
                    train_features.push(features[i].clone());
                    train_labels.push(labels[i]);
                }
            }

            let model = spec.for_fold(fold).fit(&train_features, &train_labels, feature_names)?;
            let predictions = model.predict_batch(&test_features)?;
            let fold_matrix = ConfusionMatrix::from_labels(&test_labels, &predictions)?;

            let fold_accuracy = fold_matrix.accuracy();
            fold_accuracies.push(fold_accuracy);
            confusion_matrix += fold_matrix;

            info!(fold, accuracy = fold_accuracy, "fold completed");
        }

        let mean_accuracy = fold_accuracies.iter().sum::<f64>() / self.n_folds as f64;
        let std_accuracy = {
            let variance = fold_accuracies
                .iter()
                .map(|&a| (a - mean_accuracy).powi(2))
                .sum::<f64>()
                / self.n_folds as f64;
            variance.sqrt()
        };

        info!(mean_accuracy, std_accuracy, "cross-validation complete");

        Ok(CrossValidationResult {
            kind: spec.kind(),
            fold_accuracies,
            confusion_matrix,
            mean_accuracy,
            std_accuracy,
            n_folds: self.n_folds,
            n_samples,
            n_features,
        })
    }

    /// Create stratified fold assignments.
    ///
    /// Groups samples by label, shuffles within each label, then
    /// round-robins across folds so each fold gets approximately
    /// equal representation of each label.
    fn stratified_split(&self, labels: &[usize]) -> Result<Vec<usize>, EnsembleError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let mut class_indices: Vec<Vec<usize>> = vec![vec![]; N_CLASSES];
        for (i, &label) in labels.iter().enumerate() {
            class_indices[label].push(i);
        }

        for (class, indices) in class_indices.iter().enumerate() {
            if indices.len() < self.n_folds {
                return Err(EnsembleError::TooFewSamplesForFolds {
                    class,
                    count: indices.len(),
                    n_folds: self.n_folds,
                });
            }
        }

        let mut fold_assignments = vec![0usize; labels.len()];
        for indices in &mut class_indices {
            indices.shuffle(&mut rng);
            for (j, &idx) in indices.iter().enumerate() {
                fold_assignments[idx] = j % self.n_folds;
            }
        }

        Ok(fold_assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MaxFeatures;

    fn make_separable_data() -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            features.push(vec![i as f64 * 0.1, 0.5]);
            labels.push(0);
        }
        for i in 0..30 {
            features.push(vec![10.0 + i as f64 * 0.1, 0.5]);
            labels.push(1);
        }
        let names = vec!["x".to_string(), "y".to_string()];
        (features, labels, names)
    }

    #[test]
    fn five_fold_forest_separable_accuracy() {
        let (features, labels, names) = make_separable_data();
        let spec = EnsembleSpec::Forest(
            RandomForestConfig::new(15)
                .unwrap()
                .with_max_features(MaxFeatures::All),
        );
        let cv = CrossValidation::new(5).unwrap().with_seed(42);
        let result = cv.evaluate(&spec, &features, &labels, &names).unwrap();

        assert!(result.mean_accuracy > 0.9, "mean_accuracy = {}", result.mean_accuracy);
        assert_eq!(result.fold_accuracies.len(), 5);
        assert_eq!(result.n_samples, 60);
        assert_eq!(result.confusion_matrix.total(), 60);
    }

    #[test]
    fn boosted_cross_validation() {
        let (features, labels, names) = make_separable_data();
        let spec = EnsembleSpec::Boosted(GradientBoostingConfig::new(5).with_learning_rate(0.5));
        let cv = CrossValidation::new(3).unwrap();
        let result = cv.evaluate(&spec, &features, &labels, &names).unwrap();
        assert_eq!(result.kind, ModelKind::Boosted);
        assert!(result.mean_accuracy > 0.9, "mean_accuracy = {}", result.mean_accuracy);
        assert_eq!(result.fold_accuracies.len(), 3);
        assert!(result.std_accuracy >= 0.0);
    }

    #[test]
    fn folds_are_stratified() {
        let (_, labels, _) = make_separable_data();
        let cv = CrossValidation::new(3).unwrap();
        let folds = cv.stratified_split(&labels).unwrap();
        for fold in 0..3 {
            let positives = folds
                .iter()
                .zip(&labels)
                .filter(|&(&f, &l)| f == fold && l == 1)
                .count();
            assert_eq!(positives, 10);
        }
    }

    #[test]
    fn invalid_fold_count() {
        assert!(CrossValidation::new(0).is_err());
        assert!(CrossValidation::new(1).is_err());
    }

    #[test]
    fn too_few_samples_for_folds() {
        let features = vec![vec![1.0], vec![2.0], vec![10.0], vec![11.0], vec![12.0]];
        let labels = vec![0, 0, 1, 1, 1];
        let spec = EnsembleSpec::Forest(RandomForestConfig::new(5).unwrap());
        let cv = CrossValidation::new(3).unwrap();
        let err = cv.evaluate(&spec, &features, &labels, &[]).unwrap_err();
        assert!(matches!(
            err,
            EnsembleError::TooFewSamplesForFolds {
                class: 0,
                count: 2,
                n_folds: 3
            }
        ));
    }
}
