//! JSON result writer for prediction and evaluation outputs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::domain::{ExperimentName, SampleId};
use crate::IoError;

/// Label the classifier assigns to safe URLs.
const SAFE_LABEL: usize = 1;

/// Writes prediction and evaluation results to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{experiment}_predict.json` and
/// `{experiment}_evaluate.json`; the model binary lives next to them at
/// [`ResultWriter::model_path`].
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Write predictions to `{experiment}_predict.json`.
    ///
    /// `probabilities`, when given, holds the probability of the safe class
    /// for each sample. Label 1 is reported as `"safe"`, label 0 as
    /// `"unsafe"`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all, fields(n_samples = ids.len()))]
    pub fn write_predictions(
        &self,
        model_kind: &str,
        ids: &[SampleId],
        labels: &[usize],
        probabilities: Option<&[f64]>,
    ) -> Result<PathBuf, IoError> {
        debug_assert_eq!(ids.len(), labels.len());
        let path = self.artifact_path("predict");

        let predictions: Vec<PredictionEntry> = ids
            .iter()
            .zip(labels)
            .enumerate()
            .map(|(i, (id, &label))| PredictionEntry {
                id: id.as_str(),
                label,
                verdict: verdict(label),
                probability_safe: probabilities.and_then(|p| p.get(i).copied()),
            })
            .collect();
        let n_safe = labels.iter().filter(|&&l| l == SAFE_LABEL).count();

        let artifact = PredictArtifact {
            experiment: self.experiment.as_str(),
            model_kind,
            n_samples: predictions.len(),
            n_safe,
            n_unsafe: predictions.len() - n_safe,
            predictions,
        };

        write_json(&path, &artifact)?;
        info!(path = %path.display(), n_safe, "predictions written");
        Ok(path)
    }

    /// Write cross-validation results to `{experiment}_evaluate.json`.
    ///
    /// Takes plain values so the writer has no dependency on
    /// `safeclick-trees`. `class_metrics[c]` is
    /// `(precision, recall, f1, support)` for class `c`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(model_kind = %model_kind))]
    pub fn write_evaluation(
        &self,
        model_kind: &str,
        n_samples: usize,
        n_features: usize,
        fold_accuracies: &[f64],
        cv_accuracy_mean: f64,
        cv_accuracy_std: f64,
        confusion_matrix: &[[usize; 2]; 2],
        class_metrics: &[(f64, f64, f64, usize)],
    ) -> Result<PathBuf, IoError> {
        let path = self.artifact_path("evaluate");

        let classes: Vec<ClassEntry> = class_metrics
            .iter()
            .enumerate()
            .map(|(class, &(precision, recall, f1, support))| ClassEntry {
                class,
                verdict: verdict(class),
                precision,
                recall,
                f1,
                support,
            })
            .collect();

        let artifact = EvaluateArtifact {
            experiment: self.experiment.as_str(),
            model_kind,
            n_samples,
            n_features,
            n_folds: fold_accuracies.len(),
            cv_accuracy_mean,
            cv_accuracy_std,
            fold_accuracies,
            confusion_matrix,
            class_metrics: classes,
        };

        write_json(&path, &artifact)?;
        info!(path = %path.display(), "evaluation result written");
        Ok(path)
    }

    /// Return the path where the model binary should be saved.
    ///
    /// Does not write anything; just computes `{output_dir}/{experiment}_model.bin`.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_model.bin", self.experiment.as_str()))
    }

    fn artifact_path(&self, suffix: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{suffix}.json", self.experiment.as_str()))
    }
}

fn verdict(label: usize) -> &'static str {
    if label == SAFE_LABEL { "safe" } else { "unsafe" }
}

fn write_json<T: Serialize>(path: &Path, artifact: &T) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(artifact).map_err(|e| IoError::WriteFile {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    fs::write(path, json).map_err(|e| IoError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct PredictArtifact<'a> {
    experiment: &'a str,
    model_kind: &'a str,
    n_samples: usize,
    n_safe: usize,
    n_unsafe: usize,
    predictions: Vec<PredictionEntry<'a>>,
}

#[derive(Serialize)]
struct PredictionEntry<'a> {
    id: &'a str,
    label: usize,
    verdict: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    probability_safe: Option<f64>,
}

#[derive(Serialize)]
struct EvaluateArtifact<'a> {
    experiment: &'a str,
    model_kind: &'a str,
    n_samples: usize,
    n_features: usize,
    n_folds: usize,
    cv_accuracy_mean: f64,
    cv_accuracy_std: f64,
    fold_accuracies: &'a [f64],
    confusion_matrix: &'a [[usize; 2]; 2],
    class_metrics: Vec<ClassEntry>,
}

#[derive(Serialize)]
struct ClassEntry {
    class: usize,
    verdict: &'static str,
    precision: f64,
    recall: f64,
    f1: f64,
    support: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ids(n: usize) -> Vec<SampleId> {
        (0..n).map(|i| SampleId::new(format!("url-{i}"))).collect()
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn write_predictions_json_structure() {
        let dir = TempDir::new().unwrap();
        let experiment = ExperimentName::new("pred_test".into()).unwrap();
        let writer = ResultWriter::new(dir.path(), experiment).unwrap();

        let path = writer
            .write_predictions("boosted", &ids(3), &[1, 0, 1], Some(&[0.9, 0.2, 0.6]))
            .unwrap();
        assert_eq!(path, dir.path().join("pred_test_predict.json"));

        let content = read_json(&path);
        assert_eq!(content["experiment"], "pred_test");
        assert_eq!(content["model_kind"], "boosted");
        assert_eq!(content["n_samples"], 3);
        assert_eq!(content["n_safe"], 2);
        assert_eq!(content["n_unsafe"], 1);
        let predictions = content["predictions"].as_array().unwrap();
        assert_eq!(predictions[0]["id"], "url-0");
        assert_eq!(predictions[0]["verdict"], "safe");
        assert_eq!(predictions[1]["verdict"], "unsafe");
        assert_eq!(predictions[1]["label"], 0);
        assert!((predictions[2]["probability_safe"].as_f64().unwrap() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn probabilities_omitted_when_absent() {
        let dir = TempDir::new().unwrap();
        let experiment = ExperimentName::new("no_proba".into()).unwrap();
        let writer = ResultWriter::new(dir.path(), experiment).unwrap();
        let path = writer.write_predictions("tree", &ids(1), &[0], None).unwrap();
        let content = read_json(&path);
        assert!(content["predictions"][0].get("probability_safe").is_none());
    }

    #[test]
    fn write_evaluation_json_structure() {
        let dir = TempDir::new().unwrap();
        let experiment = ExperimentName::new("eval_test".into()).unwrap();
        let writer = ResultWriter::new(dir.path(), experiment).unwrap();

        let path = writer
            .write_evaluation(
                "forest",
                20,
                37,
                &[0.9, 1.0],
                0.95,
                0.05,
                &[[9, 1], [0, 10]],
                &[(1.0, 0.9, 0.947, 10), (0.909, 1.0, 0.952, 10)],
            )
            .unwrap();

        let content = read_json(&path);
        assert_eq!(content["experiment"], "eval_test");
        assert_eq!(content["n_folds"], 2);
        assert_eq!(content["n_features"], 37);
        assert_eq!(content["confusion_matrix"][0][1], 1);
        let classes = content["class_metrics"].as_array().unwrap();
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[1]["verdict"], "safe");
        assert_eq!(classes[0]["support"], 10);
    }

    #[test]
    fn creates_nested_output_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested").join("deep");
        let experiment = ExperimentName::new("nested_test".into()).unwrap();
        let writer = ResultWriter::new(&nested, experiment).unwrap();
        writer.write_predictions("forest", &ids(1), &[1], None).unwrap();
        assert!(nested.join("nested_test_predict.json").exists());
    }

    #[test]
    fn model_path_naming() {
        let dir = TempDir::new().unwrap();
        let experiment = ExperimentName::new("m1".into()).unwrap();
        let writer = ResultWriter::new(dir.path(), experiment).unwrap();
        assert_eq!(writer.model_path(), dir.path().join("m1_model.bin"));
    }
}
