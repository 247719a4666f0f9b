//! Accuracy regression tests for safeclick-trees.
//!
//! These tests verify that algorithmic changes do not degrade forest or
//! boosted accuracy on a deterministic synthetic phishing-like dataset.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use safeclick_trees::{
    Classifier, CrossValidation, EnsembleSpec, GradientBoostingConfig, MaxFeatures, Model,
    RandomForestConfig,
};

// ---------------------------------------------------------------------------
// Helper: deterministic synthetic binary dataset
// ---------------------------------------------------------------------------

/// Generate a 400-sample, 12-feature binary dataset.
///
/// Features 0-2 are informative (label * 2.0 + noise in [0, 1.5]).
/// Features 3-11 are integer-valued noise in [0, 5], like the count-style
/// URL features. Labels alternate so both classes are balanced.
fn make_classification() -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let n_samples = 400;
    let n_features = 12;

    let mut features = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let label = i % 2;
        labels.push(label);
        let row: Vec<f64> = (0..n_features)
            .map(|f| {
                if f < 3 {
                    label as f64 * 2.0 + rng.r#gen::<f64>() * 1.5
                } else {
                    rng.gen_range(0..=5) as f64
                }
            })
            .collect();
        features.push(row);
    }
    let names: Vec<String> = (0..n_features).map(|f| format!("f{f}")).collect();
    (features, labels, names)
}

// ---------------------------------------------------------------------------
// a) forest_cv_accuracy_above_threshold
// ---------------------------------------------------------------------------

/// 5-fold cross-validation mean accuracy of a forest must exceed 0.9.
#[test]
fn forest_cv_accuracy_above_threshold() {
    let (features, labels, names) = make_classification();
    let spec = EnsembleSpec::Forest(RandomForestConfig::new(60).unwrap().with_seed(42));
    let cv = CrossValidation::new(5).unwrap().with_seed(42);
    let result = cv.evaluate(&spec, &features, &labels, &names).unwrap();

    assert!(
        result.mean_accuracy > 0.9,
        "cv mean_accuracy {} <= 0.9",
        result.mean_accuracy
    );
}

// ---------------------------------------------------------------------------
// b) boosted_cv_accuracy_above_threshold
// ---------------------------------------------------------------------------

/// 5-fold cross-validation mean accuracy of boosting must exceed 0.85.
#[test]
fn boosted_cv_accuracy_above_threshold() {
    let (features, labels, names) = make_classification();
    let spec = EnsembleSpec::Boosted(
        GradientBoostingConfig::new(20)
            .with_learning_rate(0.1)
            .with_max_depth(4),
    );
    let cv = CrossValidation::new(5).unwrap().with_seed(42);
    let result = cv.evaluate(&spec, &features, &labels, &names).unwrap();

    assert!(
        result.mean_accuracy > 0.85,
        "cv mean_accuracy {} <= 0.85",
        result.mean_accuracy
    );
}

// ---------------------------------------------------------------------------
// c) deterministic_predictions
// ---------------------------------------------------------------------------

/// Same config and seed must produce identical predictions across two
/// independent runs, regardless of rayon scheduling.
#[test]
fn deterministic_predictions() {
    let (features, labels, names) = make_classification();
    let config = RandomForestConfig::new(50)
        .unwrap()
        .with_max_features(MaxFeatures::Log2)
        .with_seed(7);

    let a = config.fit(&features, &labels, &names).unwrap();
    let b = config.fit(&features, &labels, &names).unwrap();

    assert_eq!(
        a.predict_batch(&features).unwrap(),
        b.predict_batch(&features).unwrap(),
        "predictions differ across runs with the same seed"
    );
}

// ---------------------------------------------------------------------------
// d) training_accuracy
// ---------------------------------------------------------------------------

/// Both ensembles must fit the training data well.
#[test]
fn training_accuracy() {
    let (features, labels, names) = make_classification();
    let forest: Model = RandomForestConfig::new(60)
        .unwrap()
        .fit(&features, &labels, &names)
        .unwrap()
        .into();
    let boosted: Model = GradientBoostingConfig::new(30)
        .with_learning_rate(0.1)
        .fit(&features, &labels, &names)
        .unwrap()
        .into();

    for model in [&forest, &boosted] {
        let accuracy = model.score(&features, &labels).unwrap();
        assert!(
            accuracy > 0.95,
            "{} training accuracy {accuracy} <= 0.95",
            model.kind()
        );
    }
}

// ---------------------------------------------------------------------------
// e) serving_shape
// ---------------------------------------------------------------------------

/// A 37-wide model rejects a 36-wide request instead of defaulting.
#[test]
fn serving_width_is_enforced() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let features: Vec<Vec<f64>> = (0..60)
        .map(|_| (0..37).map(|_| rng.gen_range(0..4) as f64).collect())
        .collect();
    let labels: Vec<usize> = features.iter().map(|r| usize::from(r[3] >= 2.0)).collect();
    let model: Model = RandomForestConfig::new(10)
        .unwrap()
        .fit(&features, &labels, &[])
        .unwrap()
        .into();

    assert_eq!(model.n_features(), 37);
    let err = model.predict(&features[0][..36]).unwrap_err();
    assert_eq!(err.kind(), safeclick_trees::ErrorKind::FeatureMismatch);
}
