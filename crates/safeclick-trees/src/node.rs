use std::fmt;

use crate::error::EnsembleError;

/// Number of distinct labels a tree can emit.
pub const N_CLASSES: usize = 2;

/// Zero-based feature column index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    /// Create a new feature index from a zero-based column position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based feature column index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into a `Vec<Node>` arena, identifying a specific node in a decision tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// Create a new node index from a zero-based arena position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-label sample counts of a partition, indexed by label.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq,
    serde::Serialize, serde::Deserialize,
)]
pub struct ClassCounts([usize; N_CLASSES]);

impl ClassCounts {
    /// Count the labels of the rows selected by `sample_indices`.
    pub(crate) fn from_indices(labels: &[usize], sample_indices: &[usize]) -> Self {
        let mut counts = Self::default();
        for &si in sample_indices {
            counts.add(labels[si]);
        }
        counts
    }

    pub(crate) fn add(&mut self, label: usize) {
        self.0[label] += 1;
    }

    pub(crate) fn remove(&mut self, label: usize) {
        self.0[label] -= 1;
    }

    /// Return the count for `label`.
    #[must_use]
    pub fn get(&self, label: usize) -> usize {
        self.0[label]
    }

    /// Return the total number of samples counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    /// Return how many labels have a non-zero count.
    #[must_use]
    pub fn n_distinct(&self) -> usize {
        self.0.iter().filter(|&&c| c > 0).count()
    }

    /// Return the most frequent label.
    ///
    /// Labels are scanned in ascending order and only a strictly larger
    /// count replaces the current best, so ties resolve to the lowest label.
    #[must_use]
    pub fn majority(&self) -> usize {
        let mut best_label = 0;
        let mut best_count = self.0[0];
        for (label, &count) in self.0.iter().enumerate().skip(1) {
            if count > best_count {
                best_label = label;
                best_count = count;
            }
        }
        best_label
    }

    /// Return the counts as a slice indexed by label.
    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

/// Gini impurity value of a partition.
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd,
    serde::Serialize, serde::Deserialize,
)]
pub struct Impurity(f64);

impl Impurity {
    pub(crate) const fn zero() -> Self {
        Self(0.0)
    }

    /// Compute the Gini impurity `1 - Σ(p_i²)` of a label distribution.
    ///
    /// A pure partition yields exactly `0.0`.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::EmptyPartition`] when `counts` is empty,
    /// since the class proportions are undefined.
    pub fn gini(counts: &ClassCounts) -> Result<Self, EnsembleError> {
        let total = counts.total();
        if total == 0 {
            return Err(EnsembleError::EmptyPartition);
        }
        if counts.n_distinct() == 1 {
            return Ok(Self(0.0));
        }
        let n = total as f64;
        let sum_sq: f64 = counts
            .as_slice()
            .iter()
            .map(|&c| {
                let p = c as f64 / n;
                p * p
            })
            .sum();
        Ok(Self(1.0 - sum_sq))
    }

    /// Return the raw impurity value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// A node in a decision tree arena.
///
/// Trees are stored as `Vec<Node>` where children are referenced by
/// [`NodeIndex`] rather than pointers. The root is always at index 0 and
/// every child index is greater than its parent's.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// An interior split node.
    Split {
        /// Feature used for the split.
        feature: FeatureIndex,
        /// Threshold value: samples with feature <= threshold go left.
        threshold: f64,
        /// Index of the left child node.
        left: NodeIndex,
        /// Index of the right child node.
        right: NodeIndex,
        /// Impurity at this node before splitting.
        impurity: Impurity,
        /// Number of training samples that reached this node.
        n_samples: usize,
        /// Information gain of this split.
        gain: f64,
    },
    /// A terminal leaf node.
    Leaf {
        /// Majority label of the training partition.
        label: usize,
        /// Label counts of the training partition.
        counts: ClassCounts,
        /// Impurity at this leaf.
        impurity: Impurity,
        /// Number of training samples in this leaf.
        n_samples: usize,
    },
}

impl Node {
    /// Return the impurity at this node (before splitting for interior nodes).
    #[must_use]
    pub fn impurity(&self) -> Impurity {
        match self {
            Node::Split { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    /// Return the number of training samples that reached this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}
