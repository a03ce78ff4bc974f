//! Seeded train/holdout partitioning.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::dataset::Dataset;
use crate::error::DataError;

/// Disjoint training and holdout subsets of one [`Dataset`].
#[derive(Debug, Clone)]
pub struct Split<T> {
    /// Rows used to fit the model.
    pub train: Dataset<T>,
    /// Rows withheld for evaluation.
    pub holdout: Dataset<T>,
}

impl<T: Clone> Dataset<T> {
    /// Shuffle the rows with a seeded RNG and partition them.
    ///
    /// The training subset receives `round((1 - test_fraction) * n)` rows and
    /// the holdout subset the remainder. Rows are neither duplicated nor
    /// dropped, and identical inputs always yield identical subsets.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DataError::InvalidTestFraction`] | `test_fraction` is not in (0.0, 1.0) |
    /// | [`DataError::DegenerateSplit`] | either subset would be empty |
    #[instrument(skip(self), fields(n_samples = self.n_samples()))]
    pub fn train_test_split(&self, test_fraction: f64, seed: u64) -> Result<Split<T>, DataError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(DataError::InvalidTestFraction {
                fraction: test_fraction,
            });
        }

        let n_samples = self.n_samples();
        let n_train = ((1.0 - test_fraction) * n_samples as f64).round() as usize;
        let n_holdout = n_samples - n_train.min(n_samples);
        if n_train == 0 || n_holdout == 0 {
            return Err(DataError::DegenerateSplit {
                n_samples,
                fraction: test_fraction,
            });
        }

        let mut order: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        order.shuffle(&mut rng);

        let (holdout_idx, train_idx) = order.split_at(n_holdout);
        debug!(n_train, n_holdout, "dataset split");

        Ok(Split {
            train: self.select(train_idx),
            holdout: self.select(holdout_idx),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn indexed(n: usize) -> Dataset<usize> {
        let features = (0..n).map(|i| vec![i as f64]).collect();
        let targets = (0..n).collect();
        Dataset::new(features, targets).unwrap()
    }

    #[test]
    fn sizes_follow_rounding_rule() {
        for n in 5..=200 {
            let split = indexed(n).train_test_split(0.2, 42).unwrap();
            assert_eq!(split.train.n_samples() + split.holdout.n_samples(), n);
            assert_eq!(
                split.holdout.n_samples(),
                (0.2 * n as f64).round() as usize,
                "n = {n}"
            );
        }
    }

    #[test]
    fn partition_is_disjoint_and_complete() {
        let split = indexed(97).train_test_split(0.2, 7).unwrap();
        let train: HashSet<usize> = split.train.targets().iter().copied().collect();
        let holdout: HashSet<usize> = split.holdout.targets().iter().copied().collect();
        assert!(train.is_disjoint(&holdout));
        assert_eq!(train.len() + holdout.len(), 97);
    }

    #[test]
    fn same_seed_same_split() {
        let ds = indexed(50);
        let a = ds.train_test_split(0.2, 42).unwrap();
        let b = ds.train_test_split(0.2, 42).unwrap();
        assert_eq!(a.holdout.targets(), b.holdout.targets());
        assert_eq!(a.train.targets(), b.train.targets());
    }

    #[test]
    fn different_seed_changes_holdout() {
        let ds = indexed(50);
        let a = ds.train_test_split(0.2, 1).unwrap();
        let b = ds.train_test_split(0.2, 2).unwrap();
        assert_ne!(a.holdout.targets(), b.holdout.targets());
    }

    #[test]
    fn rejects_out_of_range_fraction() {
        for fraction in [0.0, 1.0, -0.1, f64::NAN] {
            let err = indexed(10).train_test_split(fraction, 42).unwrap_err();
            assert!(matches!(err, DataError::InvalidTestFraction { .. }));
        }
    }

    #[test]
    fn rejects_empty_holdout() {
        let err = indexed(2).train_test_split(0.2, 42).unwrap_err();
        assert!(matches!(err, DataError::DegenerateSplit { n_samples: 2, .. }));
    }
}
