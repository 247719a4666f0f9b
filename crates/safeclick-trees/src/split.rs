use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::EnsembleError;
use crate::node::{ClassCounts, FeatureIndex, Impurity};

/// Partitions at least this large scan their features on the rayon pool.
const PARALLEL_MIN_SAMPLES: usize = 2048;

/// Best gain before any candidate is evaluated. Any positive gain beats it.
const GAIN_SENTINEL: f64 = -1.0;

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    /// Feature used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold value; an observed value of `feature` in the partition.
    pub(crate) threshold: f64,
    /// Information gain (parent Gini minus weighted child Gini).
    pub(crate) gain: f64,
    /// Sample indices going to the left child.
    pub(crate) left_indices: Vec<usize>,
    /// Sample indices going to the right child.
    pub(crate) right_indices: Vec<usize>,
}

/// Best candidate found within a single feature column.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Information gain of splitting `parent` into `left` and `right`.
///
/// # Errors
///
/// Returns [`EnsembleError::EmptyPartition`] if any partition is empty.
pub(crate) fn information_gain(
    parent: &ClassCounts,
    left: &ClassCounts,
    right: &ClassCounts,
) -> Result<f64, EnsembleError> {
    let n = parent.total() as f64;
    let parent_gini = Impurity::gini(parent)?.value();
    let left_gini = Impurity::gini(left)?.value();
    let right_gini = Impurity::gini(right)?.value();
    let weighted = (left.total() as f64 / n) * left_gini + (right.total() as f64 / n) * right_gini;
    Ok(parent_gini - weighted)
}

/// Scan one feature column for its highest-gain threshold.
///
/// Sorts the partition by feature value and sweeps left to right,
/// moving one sample at a time from the right counts to the left counts.
/// Each distinct value `v` except the largest is a candidate threshold
/// (`x <= v` goes left). Candidates are visited in ascending order and
/// only a strictly larger gain replaces the current best.
fn best_for_feature(
    column: &[f64],
    labels: &[usize],
    sample_indices: &[usize],
    parent: &ClassCounts,
    feature: usize,
) -> Result<Option<Candidate>, EnsembleError> {
    let n_samples = sample_indices.len();
    let mut sorted: Vec<(f64, usize)> = sample_indices
        .iter()
        .map(|&si| (column[si], labels[si]))
        .collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut left = ClassCounts::default();
    let mut right = *parent;
    let mut best: Option<Candidate> = None;
    let mut best_gain = GAIN_SENTINEL;

    for i in 0..n_samples.saturating_sub(1) {
        let (value, label) = sorted[i];
        left.add(label);
        right.remove(label);

        if value == sorted[i + 1].0 {
            continue;
        }

        let gain = information_gain(parent, &left, &right)?;
        if gain > best_gain {
            best_gain = gain;
            best = Some(Candidate {
                feature,
                threshold: value,
                gain,
            });
        }
    }

    Ok(best)
}

/// Find the highest-gain `(feature, threshold)` split of a partition.
///
/// Every feature and every distinct observed value is considered.
/// Ties keep the first candidate in ascending-feature,
/// ascending-threshold order; per-feature scans may run in parallel but are
/// reduced in feature order so the result does not depend on scheduling.
///
/// Returns `Ok(None)` when no candidate has a strictly positive gain.
///
/// # Column-major layout
///
/// `features` is column-major: `features[feature_idx][sample_idx]`.
/// `sample_indices` are indices into the inner Vecs.
pub(crate) fn find_best_split(
    features: &[Vec<f64>],
    labels: &[usize],
    sample_indices: &[usize],
) -> Result<Option<SplitResult>, EnsembleError> {
    let n_samples = sample_indices.len();
    if n_samples < 2 || features.is_empty() {
        return Ok(None);
    }

    let parent = ClassCounts::from_indices(labels, sample_indices);
    let scan = |feature: usize| {
        best_for_feature(&features[feature], labels, sample_indices, &parent, feature)
    };

    let per_feature: Vec<Option<Candidate>> = if n_samples >= PARALLEL_MIN_SAMPLES {
        (0..features.len())
            .into_par_iter()
            .map(scan)
            .collect::<Result<_, _>>()?
    } else {
        (0..features.len()).map(scan).collect::<Result<_, _>>()?
    };

    let mut best: Option<Candidate> = None;
    let mut best_gain = GAIN_SENTINEL;
    for candidate in per_feature.into_iter().flatten() {
        if candidate.gain > best_gain {
            best_gain = candidate.gain;
            best = Some(candidate);
        }
    }

    let Some(best) = best else {
        return Ok(None);
    };
    if best.gain <= 0.0 {
        return Ok(None);
    }

    let column = &features[best.feature];
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = sample_indices
        .iter()
        .partition(|&&si| column[si] <= best.threshold);

    Ok(Some(SplitResult {
        feature: FeatureIndex::new(best.feature),
        threshold: best.threshold,
        gain: best.gain,
        left_indices,
        right_indices,
    }))
}
