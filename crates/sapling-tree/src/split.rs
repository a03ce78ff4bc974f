use rand::Rng;

use crate::node::{ClassLeaf, FeatureIndex, Impurity};

/// Criterion for measuring the quality of a classification split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Compute the impurity of a node from its class counts.
    ///
    /// Returns [`Impurity::new(0.0)`] when `n_samples` is zero (pure node).
    #[must_use]
    pub fn impurity(&self, class_counts: &[usize], n_samples: usize) -> Impurity {
        if n_samples == 0 {
            return Impurity::new(0.0);
        }
        let n = n_samples as f64;
        let value = match self {
            SplitCriterion::Gini => {
                let sum_sq: f64 = class_counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p
                    })
                    .sum();
                1.0 - sum_sq
            }
            SplitCriterion::Entropy => -class_counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
        };
        Impurity::new(value)
    }
}

/// Sufficient statistics of the samples reaching a node.
///
/// Split search moves samples one at a time from a right-hand accumulator
/// into a left-hand one, so both operations must be O(1) amortized.
pub(crate) trait NodeStats: Clone {
    /// Leaf payload produced from these statistics.
    type Leaf;

    /// Statistics over no samples, sharing this accumulator's targets.
    fn empty(&self) -> Self;

    /// Add one sample.
    fn push(&mut self, sample: usize);

    /// Remove one previously added sample.
    fn pop(&mut self, sample: usize);

    /// Number of samples accumulated.
    fn n_samples(&self) -> usize;

    /// Impurity of the accumulated samples.
    fn impurity(&self) -> Impurity;

    /// Whether every accumulated sample shares the same target.
    fn is_pure(&self) -> bool;

    /// Leaf payload summarising the accumulated samples.
    fn leaf(&self) -> Self::Leaf;

    /// Accumulate every sample in `indices`.
    fn collect(&self, indices: &[usize]) -> Self {
        let mut stats = self.empty();
        for &si in indices {
            stats.push(si);
        }
        stats
    }

    /// Impurity scaled by sample count, the quantity split gains compare.
    fn weighted_impurity(&self) -> f64 {
        self.n_samples() as f64 * self.impurity().value()
    }
}

/// Class counts for classification trees.
#[derive(Debug, Clone)]
pub(crate) struct ClassStats<'a> {
    labels: &'a [usize],
    counts: Vec<usize>,
    n_samples: usize,
    criterion: SplitCriterion,
}

impl<'a> ClassStats<'a> {
    pub(crate) fn new(labels: &'a [usize], n_classes: usize, criterion: SplitCriterion) -> Self {
        Self {
            labels,
            counts: vec![0; n_classes],
            n_samples: 0,
            criterion,
        }
    }
}

impl NodeStats for ClassStats<'_> {
    type Leaf = ClassLeaf;

    fn empty(&self) -> Self {
        Self::new(self.labels, self.counts.len(), self.criterion)
    }

    fn push(&mut self, sample: usize) {
        self.counts[self.labels[sample]] += 1;
        self.n_samples += 1;
    }

    fn pop(&mut self, sample: usize) {
        self.counts[self.labels[sample]] -= 1;
        self.n_samples -= 1;
    }

    fn n_samples(&self) -> usize {
        self.n_samples
    }

    fn impurity(&self) -> Impurity {
        self.criterion.impurity(&self.counts, self.n_samples)
    }

    fn is_pure(&self) -> bool {
        self.counts.iter().filter(|&&c| c > 0).count() <= 1
    }

    fn leaf(&self) -> ClassLeaf {
        ClassLeaf::from_counts(&self.counts)
    }
}

/// Running sums for squared-error regression trees.
#[derive(Debug, Clone)]
pub(crate) struct VarianceStats<'a> {
    targets: &'a [f64],
    sum: f64,
    sum_sq: f64,
    n_samples: usize,
    min: f64,
    max: f64,
}

impl<'a> VarianceStats<'a> {
    pub(crate) fn new(targets: &'a [f64]) -> Self {
        Self {
            targets,
            sum: 0.0,
            sum_sq: 0.0,
            n_samples: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl NodeStats for VarianceStats<'_> {
    type Leaf = f64;

    fn empty(&self) -> Self {
        Self::new(self.targets)
    }

    fn push(&mut self, sample: usize) {
        let y = self.targets[sample];
        self.sum += y;
        self.sum_sq += y * y;
        self.n_samples += 1;
        self.min = self.min.min(y);
        self.max = self.max.max(y);
    }

    // min/max are only consulted on node-level stats, which never pop.
    fn pop(&mut self, sample: usize) {
        let y = self.targets[sample];
        self.sum -= y;
        self.sum_sq -= y * y;
        self.n_samples -= 1;
    }

    fn n_samples(&self) -> usize {
        self.n_samples
    }

    fn impurity(&self) -> Impurity {
        if self.n_samples == 0 {
            return Impurity::new(0.0);
        }
        let n = self.n_samples as f64;
        let mean = self.sum / n;
        Impurity::new((self.sum_sq / n - mean * mean).max(0.0))
    }

    fn is_pure(&self) -> bool {
        self.n_samples == 0 || self.min == self.max
    }

    fn leaf(&self) -> f64 {
        if self.n_samples == 0 {
            0.0
        } else {
            self.sum / self.n_samples as f64
        }
    }

    fn weighted_impurity(&self) -> f64 {
        if self.n_samples == 0 {
            return 0.0;
        }
        self.sum_sq - self.sum * self.sum / self.n_samples as f64
    }
}

/// Pick a threshold separating `lo` from `hi` (`lo < hi`).
///
/// The midpoint is rounded to the nearest `f32` and falls back to `lo` when
/// rounding would reach `hi`, so `lo <= t < hi` holds both in `f64` and for
/// single-precision comparisons against `f32` inputs.
pub(crate) fn split_threshold(lo: f64, hi: f64) -> f64 {
    let mid = ((lo + hi) / 2.0) as f32 as f64;
    if mid >= hi || mid < lo { lo } else { mid }
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    /// Feature used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold value.
    pub(crate) threshold: f64,
    /// Weighted impurity decrease from this split (MDI formula).
    pub(crate) impurity_decrease: f64,
    /// Sample indices going to the left child.
    pub(crate) left_indices: Vec<usize>,
    /// Sample indices going to the right child.
    pub(crate) right_indices: Vec<usize>,
}

/// Find the best split among a random subset of features.
///
/// For each of `max_features` randomly chosen features, sorts the samples
/// by value, scans left-to-right with incremental statistic updates, and
/// tracks the globally best split by weighted impurity decrease.
///
/// Returns `None` when no valid split exists (all values identical,
/// or split would violate `min_samples_leaf`).
///
/// `features` is column-major: `features[feature_idx][sample_idx]`.
pub(crate) fn find_best_split<S: NodeStats>(
    features: &[Vec<f64>],
    sample_indices: &[usize],
    parent: &S,
    max_features: usize,
    min_samples_leaf: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_features = features.len();
    let n_samples = sample_indices.len();

    if n_samples < 2 || n_features == 0 {
        return None;
    }

    let parent_weighted = parent.weighted_impurity();

    // Partial Fisher-Yates: shuffle only the first `max_features` positions.
    let mut feature_order: Vec<usize> = (0..n_features).collect();
    let take = max_features.min(n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        feature_order.swap(i, j);
    }

    let mut best_decrease = f64::NEG_INFINITY;
    let mut best: Option<(FeatureIndex, f64)> = None;

    for &feat_idx in &feature_order[..take] {
        let feat_col = &features[feat_idx];

        let mut sorted: Vec<(f64, usize)> = sample_indices
            .iter()
            .map(|&si| (feat_col[si], si))
            .collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left = parent.empty();
        let mut right = parent.clone();

        for i in 0..(n_samples - 1) {
            let (val_i, si) = sorted[i];
            left.push(si);
            right.pop(si);

            let val_next = sorted[i + 1].0;
            if val_i == val_next {
                continue;
            }

            let n_left = i + 1;
            let n_right = n_samples - n_left;
            if n_left < min_samples_leaf || n_right < min_samples_leaf {
                continue;
            }

            let decrease = parent_weighted - left.weighted_impurity() - right.weighted_impurity();
            if decrease > best_decrease {
                best_decrease = decrease;
                best = Some((FeatureIndex::new(feat_idx), split_threshold(val_i, val_next)));
            }
        }
    }

    let (feature, threshold) = best?;

    let feat_col = &features[feature.index()];
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = sample_indices
        .iter()
        .partition(|&&si| feat_col[si] <= threshold);

    Some(SplitResult {
        feature,
        threshold,
        impurity_decrease: best_decrease,
        left_indices,
        right_indices,
    })
}
