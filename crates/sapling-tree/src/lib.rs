//! CART decision trees: fit, predict, evaluate.
//!
//! Provides single-tree regression (squared error) and classification
//! (Gini/Entropy) models stored as index-linked node arenas, plus the
//! holdout metrics used to score them. Split thresholds are chosen so that
//! single-precision inference engines route every sample exactly like the
//! in-process tree.

mod error;
mod metrics;
mod node;
mod split;
mod tree;

pub use error::TreeError;
pub use metrics::{accuracy, mean_squared_error};
pub use node::{ClassLeaf, FeatureIndex, Impurity, Node, NodeIndex};
pub use split::SplitCriterion;
pub use tree::{ClassificationTree, DecisionTree, DecisionTreeConfig, RegressionTree};
