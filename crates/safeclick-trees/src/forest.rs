//! Random Forest training with parallel tree construction.

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::RandomForestConfig;
use crate::error::EnsembleError;
use crate::tree::{DecisionTree, grow};
use crate::validate;

/// One bagged tree together with the feature columns it was trained on.
///
/// Column `j` of the tree is original feature `feature_indices[j]`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ForestMember {
    pub(crate) tree: DecisionTree,
    pub(crate) feature_indices: Vec<usize>,
}

impl ForestMember {
    /// Return the tree.
    #[must_use]
    pub fn tree(&self) -> &DecisionTree {
        &self.tree
    }

    /// Return the feature subset, in the order the tree sees it.
    #[must_use]
    pub fn feature_indices(&self) -> &[usize] {
        &self.feature_indices
    }

    /// Project a full-width sample onto this member's subset.
    pub(crate) fn project(&self, sample: &[f64]) -> Vec<f64> {
        self.feature_indices.iter().map(|&i| sample[i]).collect()
    }

    /// Vote of this member for an already-validated full-width sample.
    pub(crate) fn vote(&self, sample: &[f64]) -> usize {
        self.tree.predict_unchecked(&self.project(sample))
    }
}

/// A fitted Random Forest ensemble.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) members: Vec<ForestMember>,
    pub(crate) n_features: usize,
    pub(crate) max_features: usize,
    pub(crate) feature_names: Vec<String>,
}

/// Resolve the configured policy and check it against the data width.
fn resolve_max_features(config: &RandomForestConfig, n_features: usize) -> Result<usize, EnsembleError> {
    let resolved = config.max_features.resolve(n_features);
    if resolved == 0 || resolved > n_features {
        return Err(EnsembleError::InvalidMaxFeatures {
            max_features: resolved,
            n_features,
        });
    }
    Ok(resolved)
}

/// Draw `n_samples` row indices uniformly with replacement.
fn bootstrap_rows(n_samples: usize, rng: &mut impl Rng) -> Vec<usize> {
    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
}

/// Train the Random Forest ensemble.
#[instrument(skip_all, fields(n_estimators = config.n_estimators, n_samples = features.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    labels: &[usize],
    feature_names: &[String],
) -> Result<RandomForest, EnsembleError> {
    if config.n_estimators == 0 {
        return Err(EnsembleError::InvalidEstimatorCount {
            n_estimators: config.n_estimators,
        });
    }
    let n_features = validate::training_set(features, labels)?;
    let feature_names = validate::feature_names(feature_names, n_features)?;
    let max_features = resolve_max_features(config, n_features)?;
    let n_samples = features.len();
    let max_depth = config.max_depth;

    info!(
        n_estimators = config.n_estimators,
        n_samples,
        n_features,
        max_features,
        max_depth,
        "training random forest"
    );

    // Per-tree seeds are drawn up front so results do not depend on scheduling.
    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_estimators).map(|_| master_rng.r#gen()).collect();

    let members: Vec<ForestMember> = tree_seeds
        .into_par_iter()
        .enumerate()
        .map(|(tree_index, seed)| -> Result<ForestMember, EnsembleError> {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let rows = bootstrap_rows(n_samples, &mut rng);
            let feature_indices = index::sample(&mut rng, n_features, max_features).into_vec();

            let columns = validate::gather_columns(features, &rows, &feature_indices);
            let boot_labels: Vec<usize> = rows.iter().map(|&i| labels[i]).collect();
            let tree = grow(&columns, &boot_labels, max_depth)?;

            debug!(
                tree_index,
                n_nodes = tree.n_nodes(),
                depth = tree.depth(),
                "forest tree built"
            );
            Ok(ForestMember {
                tree,
                feature_indices,
            })
        })
        .collect::<Result<_, _>>()?;

    info!(n_trees = members.len(), "random forest trained");

    Ok(RandomForest {
        members,
        n_features,
        max_features,
        feature_names,
    })
}

impl RandomForest {
    /// Return the bagged trees with their feature subsets.
    #[must_use]
    pub fn members(&self) -> &[ForestMember] {
        &self.members
    }

    /// Return the resolved per-tree feature count.
    #[must_use]
    pub fn max_features(&self) -> usize {
        self.max_features
    }

    /// Check the invariants of a decoded forest.
    pub(crate) fn check_structure(&self) -> Result<(), EnsembleError> {
        if self.members.is_empty() {
            return Err(EnsembleError::CorruptModel {
                reason: "forest has no trees".to_string(),
            });
        }
        if self.feature_names.len() != self.n_features {
            return Err(EnsembleError::CorruptModel {
                reason: format!(
                    "{} feature names for {} features",
                    self.feature_names.len(),
                    self.n_features
                ),
            });
        }
        for (tree_index, member) in self.members.iter().enumerate() {
            if member.tree.n_features != member.feature_indices.len() {
                return Err(EnsembleError::CorruptModel {
                    reason: format!("tree {tree_index} width differs from its feature subset"),
                });
            }
            if let Some(&feature_index) = member.feature_indices.iter().find(|&&i| i >= self.n_features) {
                return Err(EnsembleError::FeatureIndexOutOfRange {
                    feature_index,
                    n_features: self.n_features,
                });
            }
            member.tree.check_structure()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::config::MaxFeatures;

    fn make_dataset(n: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let features: Vec<Vec<f64>> = (0..n)
            .map(|_| (0..5).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect();
        let labels = features.iter().map(|r| usize::from(r[0] + r[2] > 0.0)).collect();
        (features, labels)
    }

    #[test]
    fn trains_requested_number_of_trees() {
        let (features, labels) = make_dataset(80, 1);
        let forest = RandomForestConfig::new(7)
            .unwrap()
            .fit(&features, &labels, &[])
            .unwrap();
        assert_eq!(forest.members().len(), 7);
        assert_eq!(forest.max_features(), 2);
        assert_eq!(forest.feature_names, vec!["f0", "f1", "f2", "f3", "f4"]);
    }

    #[test]
    fn feature_subsets_are_distinct_and_in_range() {
        let (features, labels) = make_dataset(60, 2);
        let forest = RandomForestConfig::new(20)
            .unwrap()
            .with_max_features(MaxFeatures::Log2)
            .fit(&features, &labels, &[])
            .unwrap();
        for member in forest.members() {
            let subset = member.feature_indices();
            assert_eq!(subset.len(), 2);
            assert!(subset.iter().all(|&i| i < 5));
            assert_ne!(subset[0], subset[1]);
            assert_eq!(member.tree().n_features(), 2);
        }
    }

    #[test]
    fn same_seed_same_forest() {
        let (features, labels) = make_dataset(60, 3);
        let config = RandomForestConfig::new(10).unwrap().with_seed(9);
        let a = config.fit(&features, &labels, &[]).unwrap();
        let b = config.fit(&features, &labels, &[]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_different_subsets() {
        let (features, labels) = make_dataset(60, 3);
        let a = RandomForestConfig::new(10).unwrap().with_seed(1).fit(&features, &labels, &[]).unwrap();
        let b = RandomForestConfig::new(10).unwrap().with_seed(2).fit(&features, &labels, &[]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn log2_of_single_feature_is_invalid() {
        let features = vec![vec![0.0], vec![1.0]];
        let err = RandomForestConfig::new(3)
            .unwrap()
            .with_max_features(MaxFeatures::Log2)
            .fit(&features, &[0, 1], &[])
            .unwrap_err();
        assert!(matches!(
            err,
            EnsembleError::InvalidMaxFeatures { max_features: 0, n_features: 1 }
        ));
    }

    #[test]
    fn feature_name_count_checked() {
        let (features, labels) = make_dataset(10, 4);
        let names = vec!["only".to_string()];
        let err = RandomForestConfig::new(2)
            .unwrap()
            .fit(&features, &labels, &names)
            .unwrap_err();
        assert!(matches!(err, EnsembleError::FeatureNameCountMismatch { .. }));
    }

    #[test]
    fn depth_bound_holds_for_every_member() {
        let (features, labels) = make_dataset(120, 5);
        let forest = RandomForestConfig::new(8)
            .unwrap()
            .with_max_depth(3)
            .fit(&features, &labels, &[])
            .unwrap();
        assert!(forest.members().iter().all(|m| m.tree().depth() <= 3));
    }

    #[test]
    fn bootstrap_rows_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let rows = bootstrap_rows(50, &mut rng);
        assert_eq!(rows.len(), 50);
        assert!(rows.iter().all(|&r| r < 50));
    }

    #[test]
    fn check_structure_catches_bad_subset() {
        let (features, labels) = make_dataset(30, 6);
        let mut forest = RandomForestConfig::new(2)
            .unwrap()
            .fit(&features, &labels, &[])
            .unwrap();
        forest.members[0].feature_indices[0] = 99;
        let err = forest.check_structure().unwrap_err();
        assert!(matches!(err, EnsembleError::FeatureIndexOutOfRange { feature_index: 99, .. }));
    }
}
