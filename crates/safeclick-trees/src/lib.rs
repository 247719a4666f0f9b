//! Binary classification with decision trees: train, evaluate, predict.
//!
//! Provides a Gini decision tree inducer, a bagged random forest with
//! per-tree feature subsets, stage-wise logistic boosting, stratified
//! cross-validation, and a versioned binary model format.

mod boosted;
mod config;
mod confusion;
mod error;
mod eval;
mod forest;
mod logistic;
mod model;
mod node;
mod predict;
mod serialize;
mod split;
mod tree;
mod validate;

pub use boosted::GradientBoosting;
pub use config::{
    DEFAULT_LEARNING_RATE, DEFAULT_N_ESTIMATORS, DEFAULT_SEED, GradientBoostingConfig, MaxFeatures,
    RandomForestConfig,
};
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use error::{EnsembleError, ErrorKind};
pub use eval::{CrossValidation, CrossValidationResult, EnsembleSpec};
pub use forest::{ForestMember, RandomForest};
pub use logistic::{log_odds, sigmoid};
pub use model::{Model, ModelKind};
pub use node::{ClassCounts, FeatureIndex, Impurity, N_CLASSES, Node, NodeIndex};
pub use predict::{ClassProbabilities, Classifier, Predictions};
pub use serialize::FORMAT_VERSION;
pub use tree::{DEFAULT_MAX_DEPTH, DecisionTree, DecisionTreeConfig};
