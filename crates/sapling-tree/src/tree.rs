use std::collections::VecDeque;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::TreeError;
use crate::node::{ClassLeaf, Node, NodeIndex};
use crate::split::{ClassStats, NodeStats, SplitCriterion, VarianceStats, find_best_split};

/// Configuration for a single CART decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
/// The same configuration fits either a regression or a classification
/// tree; `criterion` only applies to classification.
///
/// # Defaults
///
/// | Parameter           | Default               |
/// |---------------------|-----------------------|
/// | `criterion`         | `Gini`                |
/// | `max_depth`         | `None` (unlimited)    |
/// | `min_samples_split` | 2                     |
/// | `min_samples_leaf`  | 1                     |
/// | `max_features`      | `None` (all features) |
/// | `seed`              | 42                    |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }

    /// Set the classification split criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the maximum tree depth.
    ///
    /// `None` means grow until all leaves are pure or stopping conditions
    /// are met. `Some(d)` limits depth to `d` levels (root is depth 0).
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of samples required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of samples required in each leaf after a split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the maximum number of features to consider at each split.
    ///
    /// `None` means consider all features.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the random seed that orders feature visits during split search.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum samples required to split a node.
    #[must_use]
    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    /// Return the minimum samples required in each leaf.
    #[must_use]
    pub fn min_samples_leaf(&self) -> usize {
        self.min_samples_leaf
    }

    /// Return the maximum features to consider per split, if set.
    #[must_use]
    pub fn max_features(&self) -> Option<usize> {
        self.max_features
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a classification tree on the provided row-major dataset.
    ///
    /// `features[sample_idx][feature_idx]` is the row-major layout.
    /// `labels[sample_idx]` holds zero-based class labels.
    ///
    /// # Errors
    ///
    /// | Variant                             | When                                              |
    /// |-------------------------------------|---------------------------------------------------|
    /// | [`TreeError::EmptyDataset`]           | `features` is empty                               |
    /// | [`TreeError::ZeroFeatures`]           | rows have zero feature columns                    |
    /// | [`TreeError::FeatureCountMismatch`]   | rows have inconsistent lengths                    |
    /// | [`TreeError::TargetCountMismatch`]    | `labels.len() != features.len()`                  |
    /// | [`TreeError::NonFiniteValue`]         | any value is NaN or infinite                      |
    /// | [`TreeError::InvalidMaxFeatures`]     | `max_features` resolves outside [1, n_features]   |
    /// | [`TreeError::InvalidMaxDepth`]        | `max_depth` is `Some(0)`                          |
    /// | [`TreeError::InvalidMinSamplesSplit`] | `min_samples_split` < 2                           |
    /// | [`TreeError::InvalidMinSamplesLeaf`]  | `min_samples_leaf` < 1                            |
    #[instrument(skip(self, features, labels), fields(n_samples = features.len()))]
    pub fn fit_classifier(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<ClassificationTree, TreeError> {
        let (n_features, max_features) = self.validate(features, labels.len())?;
        let n_classes = labels.iter().max().copied().unwrap_or(0) + 1;

        debug!(n_features, n_classes, max_features, "fitting classification tree");

        let root = ClassStats::new(labels, n_classes, self.criterion);
        let tree = self.grow(features, n_features, max_features, &root);
        debug!(n_nodes = tree.n_nodes(), depth = tree.depth(), "classification tree built");
        Ok(tree)
    }

    /// Train a squared-error regression tree on the provided row-major dataset.
    ///
    /// Leaves predict the mean target of their training samples.
    ///
    /// # Errors
    ///
    /// As [`DecisionTreeConfig::fit_classifier`], plus
    /// [`TreeError::NonFiniteTarget`] when a target is NaN or infinite.
    #[instrument(skip(self, features, targets), fields(n_samples = features.len()))]
    pub fn fit_regressor(
        &self,
        features: &[Vec<f64>],
        targets: &[f64],
    ) -> Result<RegressionTree, TreeError> {
        let (n_features, max_features) = self.validate(features, targets.len())?;
        if let Some(sample_index) = targets.iter().position(|t| !t.is_finite()) {
            return Err(TreeError::NonFiniteTarget { sample_index });
        }

        debug!(n_features, max_features, "fitting regression tree");

        let root = VarianceStats::new(targets);
        let tree = self.grow(features, n_features, max_features, &root);
        debug!(n_nodes = tree.n_nodes(), depth = tree.depth(), "regression tree built");
        Ok(tree)
    }

    /// Check inputs and hyperparameters; return `(n_features, max_features)`.
    fn validate(
        &self,
        features: &[Vec<f64>],
        n_targets: usize,
    ) -> Result<(usize, usize), TreeError> {
        if features.is_empty() {
            return Err(TreeError::EmptyDataset);
        }

        let n_samples = features.len();
        let n_features = features[0].len();

        if n_features == 0 {
            return Err(TreeError::ZeroFeatures);
        }
        if n_targets != n_samples {
            return Err(TreeError::TargetCountMismatch {
                n_samples,
                n_targets,
            });
        }

        for (sample_index, row) in features.iter().enumerate() {
            if row.len() != n_features {
                return Err(TreeError::FeatureCountMismatch {
                    expected: n_features,
                    got: row.len(),
                    sample_index,
                });
            }
            for (feature_index, &val) in row.iter().enumerate() {
                if !val.is_finite() {
                    return Err(TreeError::NonFiniteValue {
                        sample_index,
                        feature_index,
                    });
                }
            }
        }

        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(TreeError::InvalidMaxDepth { max_depth: 0 });
        }

        if self.min_samples_split < 2 {
            return Err(TreeError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }

        if self.min_samples_leaf < 1 {
            return Err(TreeError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }

        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(TreeError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }

        Ok((n_features, max_features))
    }

    fn grow<S: NodeStats>(
        &self,
        features: &[Vec<f64>],
        n_features: usize,
        max_features: usize,
        root: &S,
    ) -> DecisionTree<S::Leaf> {
        // Column-major layout for split search.
        let col_features: Vec<Vec<f64>> = (0..n_features)
            .map(|feat_idx| features.iter().map(|row| row[feat_idx]).collect())
            .collect();

        let sample_indices: Vec<usize> = (0..features.len()).collect();
        let mut grower = Grower {
            col_features: &col_features,
            config: self,
            max_features,
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            arena: Vec::new(),
        };
        grower.build(root, &sample_indices, 0);

        DecisionTree {
            nodes: grower.arena,
            n_features,
        }
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursive arena builder shared by both tree kinds.
struct Grower<'a, L> {
    col_features: &'a [Vec<f64>],
    config: &'a DecisionTreeConfig,
    max_features: usize,
    rng: ChaCha8Rng,
    arena: Vec<Node<L>>,
}

impl<L> Grower<'_, L> {
    /// Build the subtree over `sample_indices` and return its root index.
    fn build<S: NodeStats<Leaf = L>>(
        &mut self,
        template: &S,
        sample_indices: &[usize],
        depth: usize,
    ) -> NodeIndex {
        let stats = template.collect(sample_indices);
        let n_samples = stats.n_samples();
        let impurity = stats.impurity();

        let depth_exceeded = self.config.max_depth.is_some_and(|max_d| depth >= max_d);
        let too_few = n_samples < self.config.min_samples_split;

        let split = if too_few || depth_exceeded || stats.is_pure() {
            None
        } else {
            find_best_split(
                self.col_features,
                sample_indices,
                &stats,
                self.max_features,
                self.config.min_samples_leaf,
                &mut self.rng,
            )
        };

        let Some(split) = split else {
            let idx = self.arena.len();
            self.arena.push(Node::Leaf {
                value: stats.leaf(),
                impurity,
                n_samples,
            });
            return NodeIndex::new(idx);
        };

        // Arena pattern: reserve index, recurse, then overwrite with the split.
        let node_idx = self.arena.len();
        self.arena.push(Node::Leaf {
            value: stats.leaf(),
            impurity,
            n_samples,
        });

        let left = self.build(template, &split.left_indices, depth + 1);
        let right = self.build(template, &split.right_indices, depth + 1);

        self.arena[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            impurity,
            n_samples,
            impurity_decrease: split.impurity_decrease,
        };

        NodeIndex::new(node_idx)
    }
}

/// A fitted CART decision tree.
///
/// Stored as an arena-based `Vec<Node<L>>` with index references. The root
/// is at index 0 and every child index is greater than its parent's.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree<L> {
    pub(crate) nodes: Vec<Node<L>>,
    pub(crate) n_features: usize,
}

/// Squared-error regression tree; leaves hold the mean target.
pub type RegressionTree = DecisionTree<f64>;

/// Classification tree; leaves hold a class distribution.
pub type ClassificationTree = DecisionTree<ClassLeaf>;

impl<L> DecisionTree<L> {
    /// Return the node arena, root first.
    #[must_use]
    pub fn nodes(&self) -> &[Node<L>] {
        &self.nodes
    }

    /// Return the number of features the tree was trained on.
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
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }

        let mut max_depth = 0usize;
        let mut queue = VecDeque::new();
        queue.push_back((0usize, 0usize));

        while let Some((node_idx, d)) = queue.pop_front() {
            match &self.nodes[node_idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    queue.push_back((left.index(), d + 1));
                    queue.push_back((right.index(), d + 1));
                }
            }
        }

        max_depth
    }

    /// Return the leaf payload reached by `sample`.
    ///
    /// Traverses from the root: at each `Split`, goes left when
    /// `sample[feature] <= threshold`, right otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn leaf(&self, sample: &[f64]) -> Result<&L, TreeError> {
        if sample.len() != self.n_features {
            return Err(TreeError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return Ok(value),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[feature.index()] <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }
}

impl DecisionTree<f64> {
    /// Predict the target for a single sample.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<f64, TreeError> {
        self.leaf(sample).copied()
    }

    /// Predict targets for every row of `samples`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::PredictionFeatureMismatch`] for the first row with the wrong width.
    pub fn predict_batch(&self, samples: &[Vec<f64>]) -> Result<Vec<f64>, TreeError> {
        samples.iter().map(|s| self.predict(s)).collect()
    }
}

impl DecisionTree<ClassLeaf> {
    /// Return the number of classes the tree distinguishes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.nodes
            .iter()
            .find_map(|node| match node {
                Node::Leaf { value, .. } => Some(value.distribution().len()),
                Node::Split { .. } => None,
            })
            .unwrap_or(0)
    }

    /// Predict the class label for a single sample.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, TreeError> {
        Ok(self.leaf(sample)?.prediction())
    }

    /// Return the class probability distribution for a single sample.
    ///
    /// The returned slice has length `n_classes`, summing to 1.0.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<&[f64], TreeError> {
        Ok(self.leaf(sample)?.distribution())
    }

    /// Predict class labels for every row of `samples`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::PredictionFeatureMismatch`] for the first row with the wrong width.
    pub fn predict_batch(&self, samples: &[Vec<f64>]) -> Result<Vec<usize>, TreeError> {
        samples.iter().map(|s| self.predict(s)).collect()
    }

    /// Return class distributions for every row of `samples`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::PredictionFeatureMismatch`] for the first row with the wrong width.
    pub fn predict_proba_batch(&self, samples: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, TreeError> {
        samples
            .iter()
            .map(|s| self.predict_proba(s).map(<[f64]>::to_vec))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<usize>) {
        let features = vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 0.0],
            vec![10.0, 0.0],
            vec![11.0, 0.0],
            vec![12.0, 0.0],
        ];
        (features, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn empty_dataset_error() {
        let features: Vec<Vec<f64>> = vec![];
        let err = DecisionTreeConfig::new().fit_classifier(&features, &[]).unwrap_err();
        assert!(matches!(err, TreeError::EmptyDataset));
    }

    #[test]
    fn target_count_mismatch_error() {
        let err = DecisionTreeConfig::new()
            .fit_regressor(&[vec![1.0], vec![2.0]], &[1.0])
            .unwrap_err();
        assert!(matches!(
            err,
            TreeError::TargetCountMismatch {
                n_samples: 2,
                n_targets: 1
            }
        ));
    }

    #[test]
    fn pure_dataset_single_leaf() {
        let features = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let tree = DecisionTreeConfig::new().fit_classifier(&features, &[0, 0, 0]).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict(&[2.0, 3.0]).unwrap(), 0);
    }

    #[test]
    fn linearly_separable_correct_split() {
        let (features, labels) = separable();
        let tree = DecisionTreeConfig::new().fit_classifier(&features, &labels).unwrap();
        assert_eq!(tree.predict(&[2.0, 0.0]).unwrap(), 0);
        assert_eq!(tree.predict(&[11.0, 0.0]).unwrap(), 1);
        assert_eq!(tree.n_classes(), 2);
    }

    #[test]
    fn predict_proba_sums_to_one() {
        let (features, labels) = separable();
        let tree = DecisionTreeConfig::new().fit_classifier(&features, &labels).unwrap();
        let sum: f64 = tree.predict_proba(&[5.0, 0.0]).unwrap().iter().sum();
        assert!((sum - 1.0).abs() < 1e-10);
    }

    #[test]
    fn xor_needs_depth_at_least_2() {
        let features = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ];
        let tree = DecisionTreeConfig::new()
            .fit_classifier(&features, &[0, 1, 1, 0])
            .unwrap();
        assert!(tree.depth() >= 2);
    }

    #[test]
    fn max_depth_limits_tree() {
        let features: Vec<Vec<f64>> = (0..32).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..32).map(|i| (i * i) as f64).collect();
        let tree = DecisionTreeConfig::new()
            .with_max_depth(Some(3))
            .fit_regressor(&features, &targets)
            .unwrap();
        assert!(tree.depth() <= 3);
        assert!(tree.n_leaves() <= 8);
    }

    #[test]
    fn min_samples_leaf_respected() {
        let features: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let tree = DecisionTreeConfig::new()
            .with_min_samples_leaf(4)
            .fit_regressor(&features, &targets)
            .unwrap();
        for node in tree.nodes() {
            if node.is_leaf() {
                assert!(node.n_samples() >= 4);
            }
        }
    }

    #[test]
    fn regression_leaf_is_mean() {
        let features = vec![vec![0.0], vec![1.0], vec![10.0], vec![11.0]];
        let targets = vec![1.0, 3.0, 100.0, 102.0];
        let tree = DecisionTreeConfig::new()
            .with_max_depth(Some(1))
            .fit_regressor(&features, &targets)
            .unwrap();
        assert!((tree.predict(&[0.5]).unwrap() - 2.0).abs() < 1e-12);
        assert!((tree.predict(&[10.5]).unwrap() - 101.0).abs() < 1e-12);
    }

    #[test]
    fn regression_rejects_non_finite_target() {
        let err = DecisionTreeConfig::new()
            .fit_regressor(&[vec![0.0], vec![1.0]], &[1.0, f64::INFINITY])
            .unwrap_err();
        assert!(matches!(err, TreeError::NonFiniteTarget { sample_index: 1 }));
    }

    #[test]
    fn children_follow_parents_in_arena() {
        let features: Vec<Vec<f64>> = (0..16).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let targets: Vec<f64> = (0..16).map(|i| (i % 5) as f64).collect();
        let tree = DecisionTreeConfig::new().fit_regressor(&features, &targets).unwrap();
        for (idx, node) in tree.nodes().iter().enumerate() {
            if let Node::Split { left, right, .. } = node {
                assert!(left.index() > idx && right.index() > idx);
            }
        }
    }

    #[test]
    fn prediction_feature_mismatch() {
        let (features, labels) = separable();
        let tree = DecisionTreeConfig::new().fit_classifier(&features, &labels).unwrap();
        let err = tree.predict(&[1.0]).unwrap_err();
        assert!(matches!(
            err,
            TreeError::PredictionFeatureMismatch { expected: 2, got: 1 }
        ));
    }

    #[test]
    fn invalid_hyperparameters() {
        let (features, labels) = separable();
        let err = DecisionTreeConfig::new()
            .with_max_depth(Some(0))
            .fit_classifier(&features, &labels)
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidMaxDepth { max_depth: 0 }));

        let err = DecisionTreeConfig::new()
            .with_min_samples_split(1)
            .fit_classifier(&features, &labels)
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidMinSamplesSplit { .. }));

        let err = DecisionTreeConfig::new()
            .with_max_features(Some(3))
            .fit_classifier(&features, &labels)
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidMaxFeatures { max_features: 3, n_features: 2 }));
    }
}
