//! End-to-end integration tests: CSV -> train -> save -> load -> predict -> JSON.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use safeclick_io::{DatasetReader, ExperimentName, FeatureSchema, IoError, ResultWriter};
use safeclick_trees::{
    CrossValidation, EnsembleSpec, GradientBoostingConfig, MaxFeatures, Model, RandomForestConfig,
};
use tempfile::TempDir;

/// Path to the test fixture directory.
fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Feature `j` of row `i`: small integers like the count-style URL features.
fn cell(i: usize, j: usize) -> f64 {
    ((i * (2 * j + 1) + j) % 9) as f64
}

/// Label 1 (safe) when `NumDots` is below 4.
fn label(i: usize) -> usize {
    usize::from(cell(i, 0) < 4.0)
}

/// Write a URL-feature CSV with the columns in reverse schema order, an `id`
/// column first, and optionally a trailing `CLASS_LABEL` column.
fn write_url_csv(path: &Path, n_rows: usize, labelled: bool) {
    let schema = FeatureSchema::url_features();
    let n = schema.len();
    let mut out = String::from("id");
    for name in schema.columns().iter().rev() {
        out.push(',');
        out.push_str(name);
    }
    if labelled {
        out.push_str(",CLASS_LABEL");
    }
    out.push('\n');

    for i in 0..n_rows {
        write!(out, "url-{i:03}").unwrap();
        for j in (0..n).rev() {
            write!(out, ",{}", cell(i, j)).unwrap();
        }
        if labelled {
            write!(out, ",{}", label(i)).unwrap();
        }
        out.push('\n');
    }
    fs::write(path, out).unwrap();
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn train_save_load_predict_round_trip() {
    let dir = TempDir::new().unwrap();
    let train_csv = dir.path().join("train.csv");
    let serve_csv = dir.path().join("serve.csv");
    write_url_csv(&train_csv, 90, true);
    write_url_csv(&serve_csv, 30, false);

    // 1. Read training CSV, reordered to the serving schema
    let train = DatasetReader::new(&train_csv)
        .with_id_column("id")
        .with_schema(FeatureSchema::url_features())
        .read()
        .expect("training CSV should parse");
    assert_eq!(train.n_samples(), 90);
    assert_eq!(train.feature_names(), FeatureSchema::url_features().columns());
    assert_eq!(train.features()[5][0], cell(5, 0));
    assert_eq!(train.features()[5][36], cell(5, 36));
    let labels = train.labels().expect("training CSV is labelled");

    // 2. Train and save
    let forest = RandomForestConfig::new(15)
        .unwrap()
        .with_max_features(MaxFeatures::All)
        .with_seed(42)
        .fit(train.features(), labels, train.feature_names())
        .unwrap();
    let model = Model::from(forest);
    let writer = ResultWriter::new(
        &dir.path().join("out"),
        ExperimentName::new("rt".into()).unwrap(),
    )
    .unwrap();
    model.save(writer.model_path()).unwrap();

    // 3. Load, then read the serving file using the model's own column names
    let loaded = Model::load(writer.model_path()).unwrap();
    assert_eq!(loaded, model);
    let serve = DatasetReader::new(&serve_csv)
        .with_id_column("id")
        .with_schema(FeatureSchema::new(loaded.feature_names().to_vec()))
        .read()
        .unwrap();
    assert!(serve.labels().is_none());

    // 4. Predict and write JSON
    let predicted = loaded.predict_batch(serve.features()).unwrap();
    let probabilities: Vec<f64> = loaded
        .predict_proba_batch(serve.features())
        .unwrap()
        .iter()
        .map(|p| p.positive())
        .collect();
    let path = writer
        .write_predictions(
            &loaded.kind().to_string(),
            serve.ids(),
            &predicted,
            Some(&probabilities),
        )
        .unwrap();

    // 5. Deserialize back and verify
    let content = read_json(&path);
    assert_eq!(content["experiment"], "rt");
    assert_eq!(content["model_kind"], "forest");
    assert_eq!(content["n_samples"].as_u64().unwrap(), 30);
    let entries = content["predictions"].as_array().unwrap();
    assert_eq!(entries.len(), 30);

    let mut correct = 0;
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry["id"], format!("url-{i:03}"));
        let predicted_label = entry["label"].as_u64().unwrap() as usize;
        let expected_verdict = if predicted_label == 1 { "safe" } else { "unsafe" };
        assert_eq!(entry["verdict"], expected_verdict);
        let p = entry["probability_safe"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&p));
        if predicted_label == label(i) {
            correct += 1;
        }
    }
    assert!(correct >= 27, "only {correct}/30 serving predictions correct");

    let n_safe = content["n_safe"].as_u64().unwrap();
    let n_unsafe = content["n_unsafe"].as_u64().unwrap();
    assert_eq!(n_safe + n_unsafe, 30);
}

#[test]
fn evaluate_writes_cross_validation_summary() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("data.csv");
    write_url_csv(&csv, 90, true);
    let data = DatasetReader::new(&csv)
        .with_id_column("id")
        .with_schema(FeatureSchema::url_features())
        .read()
        .unwrap();

    let spec = EnsembleSpec::Boosted(
        GradientBoostingConfig::new(10)
            .with_learning_rate(0.3)
            .with_max_depth(3),
    );
    let result = CrossValidation::new(3)
        .unwrap()
        .evaluate(&spec, data.features(), data.labels().unwrap(), data.feature_names())
        .unwrap();

    let class_metrics: Vec<(f64, f64, f64, usize)> = result
        .confusion_matrix
        .class_metrics()
        .iter()
        .map(|m| (m.precision, m.recall, m.f1, m.support))
        .collect();
    let writer = ResultWriter::new(dir.path(), ExperimentName::new("cv".into()).unwrap()).unwrap();
    let path = writer
        .write_evaluation(
            &result.kind.to_string(),
            result.n_samples,
            result.n_features,
            &result.fold_accuracies,
            result.mean_accuracy,
            result.std_accuracy,
            result.confusion_matrix.as_rows(),
            &class_metrics,
        )
        .unwrap();

    let content = read_json(&path);
    assert_eq!(content["model_kind"], "boosted");
    assert_eq!(content["n_folds"], 3);
    assert_eq!(content["n_samples"], 90);
    assert_eq!(content["n_features"], 37);
    let total: u64 = content["confusion_matrix"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|row| row.as_array().unwrap())
        .map(|v| v.as_u64().unwrap())
        .sum();
    assert_eq!(total, 90);
    let support: u64 = content["class_metrics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["support"].as_u64().unwrap())
        .sum();
    assert_eq!(support, 90);
}

#[test]
fn serving_file_missing_a_trained_column_is_rejected() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("narrow.csv");
    fs::write(&csv, "id,NumDots\nu1,3\n").unwrap();
    let err = DatasetReader::new(&csv)
        .with_id_column("id")
        .with_schema(FeatureSchema::url_features())
        .read()
        .unwrap_err();
    assert!(
        matches!(err, IoError::MissingFeatureColumn { ref column, .. } if column == "SubdomainLevel"),
        "got: {err:?}"
    );
}

#[test]
fn reader_fixture_files_match_expected_errors() {
    let read = |name: &str| DatasetReader::new(&fixture_path(name)).with_id_column("id").read();

    let result = read("empty.csv");
    assert!(
        matches!(result, Err(IoError::EmptyDataset { .. })),
        "empty.csv should give EmptyDataset, got: {result:?}"
    );

    let result = read("jagged.csv");
    assert!(
        matches!(result, Err(IoError::InconsistentRowLength { row_index: 1, ref id, .. }) if id == "u2"),
        "jagged.csv should give InconsistentRowLength, got: {result:?}"
    );

    let result = read("nan.csv");
    assert!(
        matches!(result, Err(IoError::NonFiniteValue { ref column, .. }) if column == "UrlLength"),
        "nan.csv should give NonFiniteValue, got: {result:?}"
    );

    let result = read("bad_label.csv");
    assert!(
        matches!(result, Err(IoError::InvalidLabel { .. })),
        "bad_label.csv should give InvalidLabel, got: {result:?}"
    );

    let result = read("duplicate_column.csv");
    assert!(
        matches!(result, Err(IoError::DuplicateColumn { ref column, .. }) if column == "NumDots"),
        "duplicate_column.csv should give DuplicateColumn, got: {result:?}"
    );
}
