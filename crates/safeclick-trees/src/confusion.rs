//! Confusion matrix and per-class classification metrics.

use std::fmt;
use std::ops::AddAssign;

use crate::error::EnsembleError;
use crate::node::N_CLASSES;
use crate::predict::Classifier;

/// A 2x2 confusion matrix.
///
/// Entry `matrix[true_label][predicted_label]` counts how many samples
/// with true label `true_label` were predicted as `predicted_label`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    matrix: [[usize; N_CLASSES]; N_CLASSES],
}

/// Per-class precision, recall, and F1 score.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    /// The label.
    pub class: usize,
    /// Precision: TP / (TP + FP). 0.0 if no predictions for this class.
    pub precision: f64,
    /// Recall: TP / (TP + FN). 0.0 if no true samples for this class.
    pub recall: f64,
    /// F1: 2 * precision * recall / (precision + recall). 0.0 if both are zero.
    pub f1: f64,
    /// Number of true samples in this class.
    pub support: usize,
}

impl ConfusionMatrix {
    /// Build a confusion matrix from true and predicted labels.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`EnsembleError::LengthMismatch`] | the two slices differ in length |
    /// | [`EnsembleError::EmptyDataset`] | zero labels provided |
    /// | [`EnsembleError::LabelOutOfRange`] | a true or predicted label is not 0 or 1 |
    pub fn from_labels(true_labels: &[usize], predicted: &[usize]) -> Result<Self, EnsembleError> {
        if true_labels.len() != predicted.len() {
            return Err(EnsembleError::LengthMismatch {
                n_rows: predicted.len(),
                n_labels: true_labels.len(),
            });
        }
        if true_labels.is_empty() {
            return Err(EnsembleError::EmptyDataset);
        }
        let mut cm = Self::default();
        for (sample_index, (&t, &p)) in true_labels.iter().zip(predicted).enumerate() {
            if let Some(label) = [t, p].into_iter().find(|&l| l >= N_CLASSES) {
                return Err(EnsembleError::LabelOutOfRange {
                    label,
                    sample_index,
                });
            }
            cm.matrix[t][p] += 1;
        }
        Ok(cm)
    }

    /// Predict every row of `features` with `model` and tabulate against `labels`.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::LengthMismatch`] or [`EnsembleError::EmptyDataset`]
    /// on bad shapes, or the first prediction error.
    pub fn evaluate<M: Classifier + ?Sized>(
        model: &M,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<Self, EnsembleError> {
        if features.len() != labels.len() {
            return Err(EnsembleError::LengthMismatch {
                n_rows: features.len(),
                n_labels: labels.len(),
            });
        }
        let predicted = features
            .iter()
            .map(|sample| model.predict(sample))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_labels(labels, &predicted)
    }

    /// Overall accuracy: proportion of correct predictions.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let correct: usize = (0..N_CLASSES).map(|i| self.matrix[i][i]).sum();
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        }
    }

    /// Per-class precision, recall, F1, and support, indexed by label.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        (0..N_CLASSES)
            .map(|c| {
                let other = 1 - c;
                let tp = self.matrix[c][c];
                let fp = self.matrix[other][c];
                let fn_ = self.matrix[c][other];
                let support = tp + fn_;
                let precision = if tp + fp == 0 {
                    0.0
                } else {
                    tp as f64 / (tp + fp) as f64
                };
                let recall = if support == 0 {
                    0.0
                } else {
                    tp as f64 / support as f64
                };
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Return the count for `(true_label, predicted_label)`.
    #[must_use]
    pub fn get(&self, true_label: usize, predicted_label: usize) -> usize {
        self.matrix[true_label][predicted_label]
    }

    /// Return the total number of samples tabulated.
    #[must_use]
    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    /// Return the underlying matrix rows.
    #[must_use]
    pub fn as_rows(&self) -> &[[usize; N_CLASSES]; N_CLASSES] {
        &self.matrix
    }
}

impl AddAssign for ConfusionMatrix {
    fn add_assign(&mut self, rhs: Self) {
        for (row, rhs_row) in self.matrix.iter_mut().zip(rhs.matrix) {
            for (cell, v) in row.iter_mut().zip(rhs_row) {
                *cell += v;
            }
        }
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "")?;
        for j in 0..N_CLASSES {
            write!(f, " pred_{j:>3}")?;
        }
        writeln!(f)?;

        for (i, row) in self.matrix.iter().enumerate() {
            write!(f, "true_{i:>3}")?;
            for val in row {
                write!(f, " {val:>7}")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
