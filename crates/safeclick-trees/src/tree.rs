use tracing::{debug, instrument};

use crate::error::EnsembleError;
use crate::node::{ClassCounts, Impurity, N_CLASSES, Node, NodeIndex};
use crate::predict::Classifier;
use crate::split::find_best_split;
use crate::validate;

/// Default maximum depth shared by every estimator.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Configuration for a single Gini decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter   | Default |
/// |-------------|---------|
/// | `max_depth` | 10      |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) max_depth: usize,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Set the maximum tree depth. The root is depth 0, so `0` yields a
    /// single leaf.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Return the maximum depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Train a decision tree on the provided row-major dataset.
    ///
    /// `features[sample_idx][feature_idx]` is row-major.
    /// `labels[sample_idx]` is 0 or 1.
    ///
    /// # Errors
    ///
    /// | Variant                              | When                                   |
    /// |--------------------------------------|----------------------------------------|
    /// | [`EnsembleError::LengthMismatch`]    | `features.len() != labels.len()`       |
    /// | [`EnsembleError::EmptyDataset`]      | `features` is empty                    |
    /// | [`EnsembleError::ZeroFeatures`]      | rows have zero feature columns         |
    /// | [`EnsembleError::RaggedRow`]         | rows have inconsistent lengths         |
    /// | [`EnsembleError::NonFiniteValue`]    | any value is NaN or infinite           |
    /// | [`EnsembleError::LabelOutOfRange`]   | any label is not 0 or 1                |
    #[instrument(skip_all, fields(n_samples = features.len(), max_depth = self.max_depth))]
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<DecisionTree, EnsembleError> {
        let n_features = validate::training_set(features, labels)?;
        let rows: Vec<usize> = (0..features.len()).collect();
        let all_columns: Vec<usize> = (0..n_features).collect();
        let columns = validate::gather_columns(features, &rows, &all_columns);

        let tree = grow(&columns, labels, self.max_depth)?;
        debug!(
            n_nodes = tree.n_nodes(),
            n_leaves = tree.n_leaves(),
            depth = tree.depth(),
            "decision tree built"
        );
        Ok(tree)
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Pending node in the induction work stack.
struct Pending {
    slot: usize,
    sample_indices: Vec<usize>,
    depth: usize,
}

/// Induce a tree from already-validated column-major data.
///
/// `columns[feature_idx][sample_idx]`; `labels[sample_idx]`. Every sample
/// index takes part in the root partition.
///
/// Nodes are expanded from an explicit stack rather than by recursion.
/// A slot is reserved in the arena for each child before it is expanded,
/// so child indices are always greater than their parent's.
pub(crate) fn grow(columns: &[Vec<f64>], labels: &[usize], max_depth: usize) -> Result<DecisionTree, EnsembleError> {
    let n_features = columns.len();
    let mut arena: Vec<Node> = vec![placeholder()];
    let mut stack = vec![Pending {
        slot: 0,
        sample_indices: (0..labels.len()).collect(),
        depth: 0,
    }];

    while let Some(Pending {
        slot,
        sample_indices,
        depth,
    }) = stack.pop()
    {
        let counts = ClassCounts::from_indices(labels, &sample_indices);
        let impurity = Impurity::gini(&counts)?;
        let n_samples = sample_indices.len();

        let stop = depth >= max_depth || counts.n_distinct() < 2 || n_samples <= 1;
        let split = if stop {
            None
        } else {
            find_best_split(columns, labels, &sample_indices)?
        };

        let Some(split) = split.filter(|s| !s.left_indices.is_empty() && !s.right_indices.is_empty())
        else {
            arena[slot] = Node::Leaf {
                label: counts.majority(),
                counts,
                impurity,
                n_samples,
            };
            continue;
        };

        let left = arena.len();
        let right = left + 1;
        arena.push(placeholder());
        arena.push(placeholder());
        arena[slot] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: NodeIndex::new(left),
            right: NodeIndex::new(right),
            impurity,
            n_samples,
            gain: split.gain,
        };

        // Right first so the left subtree is expanded first.
        stack.push(Pending {
            slot: right,
            sample_indices: split.right_indices,
            depth: depth + 1,
        });
        stack.push(Pending {
            slot: left,
            sample_indices: split.left_indices,
            depth: depth + 1,
        });
    }

    Ok(DecisionTree {
        nodes: arena,
        n_features,
    })
}

fn placeholder() -> Node {
    Node::Leaf {
        label: 0,
        counts: ClassCounts::default(),
        impurity: Impurity::zero(),
        n_samples: 0,
    }
}

/// A fitted binary decision tree.
///
/// Stored as an arena-based `Vec<Node>` with index references for
/// cache-friendly traversal and trivial serialization.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
}

impl DecisionTree {
    /// Predict the label for a single sample.
    ///
    /// Traverses from the root (index 0): at each `Split`, goes left when
    /// `sample[feature] <= threshold`, right otherwise.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`EnsembleError::PredictionFeatureMismatch`] | `sample.len() != n_features` |
    /// | [`EnsembleError::NonFinitePrediction`] | any value is NaN or infinite |
    pub fn predict(&self, sample: &[f64]) -> Result<usize, EnsembleError> {
        validate::sample(sample, self.n_features)?;
        Ok(self.predict_unchecked(sample))
    }

    /// Return the arena index of the leaf `sample` lands in.
    ///
    /// # Errors
    ///
    /// Same as [`DecisionTree::predict`].
    pub fn apply(&self, sample: &[f64]) -> Result<NodeIndex, EnsembleError> {
        validate::sample(sample, self.n_features)?;
        Ok(NodeIndex::new(self.traverse(sample)))
    }

    /// Label lookup without width or finiteness checks. The caller has
    /// already validated `sample`.
    pub(crate) fn predict_unchecked(&self, sample: &[f64]) -> usize {
        match &self.nodes[self.traverse(sample)] {
            Node::Leaf { label, .. } => *label,
            Node::Split { .. } => 0,
        }
    }

    /// Return the node arena. The root is at index 0.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return the number of features this tree was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0. Children always
    /// follow their parent in the arena, so one forward pass suffices.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        let mut max_depth = 0;
        for (idx, node) in self.nodes.iter().enumerate() {
            let d = depths[idx];
            max_depth = max_depth.max(d);
            if let Node::Split { left, right, .. } = node {
                depths[left.index()] = d + 1;
                depths[right.index()] = d + 1;
            }
        }
        max_depth
    }

    /// Check the arena invariants of a decoded tree.
    ///
    /// Children must point forward into the arena, every non-root node must
    /// have exactly one parent, split features must be below `n_features`,
    /// and leaves must carry a binary label.
    pub(crate) fn check_structure(&self) -> Result<(), EnsembleError> {
        if self.nodes.is_empty() {
            return Err(EnsembleError::CorruptModel {
                reason: "tree has no nodes".to_string(),
            });
        }
        let mut parents = vec![0usize; self.nodes.len()];
        for (idx, node) in self.nodes.iter().enumerate() {
            let (feature, threshold, left, right) = match node {
                Node::Leaf { label, .. } => {
                    if *label >= N_CLASSES {
                        return Err(EnsembleError::CorruptModel {
                            reason: format!("leaf {idx} has label {label}"),
                        });
                    }
                    continue;
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => (feature, threshold, left, right),
            };
            if feature.index() >= self.n_features {
                return Err(EnsembleError::FeatureIndexOutOfRange {
                    feature_index: feature.index(),
                    n_features: self.n_features,
                });
            }
            if !threshold.is_finite() {
                return Err(EnsembleError::CorruptModel {
                    reason: format!("node {idx} has a non-finite threshold"),
                });
            }
            for child in [left.index(), right.index()] {
                if child <= idx || child >= self.nodes.len() {
                    return Err(EnsembleError::CorruptModel {
                        reason: format!("node {idx} has out-of-order child {child}"),
                    });
                }
                parents[child] += 1;
            }
        }
        if let Some(orphan) = parents.iter().skip(1).position(|&p| p != 1) {
            return Err(EnsembleError::CorruptModel {
                reason: format!("node {} is not referenced exactly once", orphan + 1),
            });
        }
        Ok(())
    }

    /// Traverse the tree from the root and return the arena index of the leaf.
    fn traverse(&self, sample: &[f64]) -> usize {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return idx,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if sample[feature.index()] <= *threshold {
                        idx = left.index();
                    } else {
                        idx = right.index();
                    }
                }
            }
        }
    }
}

impl Classifier for DecisionTree {
    fn predict(&self, sample: &[f64]) -> Result<usize, EnsembleError> {
        DecisionTree::predict(self, sample)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}
