//! Accuracy regression tests for sapling-tree.
//!
//! These tests guard against algorithmic changes that degrade holdout
//! quality on the seeded synthetic problems the pipeline trains on.

use sapling_data::{ClassificationSpec, RegressionSpec};
use sapling_tree::{DecisionTreeConfig, Node, accuracy, mean_squared_error};

fn regression_config() -> DecisionTreeConfig {
    DecisionTreeConfig::new()
        .with_max_depth(Some(10))
        .with_min_samples_split(5)
        .with_min_samples_leaf(2)
        .with_seed(42)
}

fn classification_config() -> DecisionTreeConfig {
    DecisionTreeConfig::new()
        .with_max_depth(Some(8))
        .with_min_samples_split(5)
        .with_min_samples_leaf(2)
        .with_seed(42)
}

fn variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

// ---------------------------------------------------------------------------
// a) regression_explains_most_variance
// ---------------------------------------------------------------------------

/// Holdout MSE must stay well under the holdout target variance.
#[test]
fn regression_explains_most_variance() {
    let data = RegressionSpec::new(1000, 3)
        .with_noise(0.1)
        .with_seed(42)
        .generate()
        .unwrap();
    let split = data.train_test_split(0.2, 42).unwrap();

    let tree = regression_config()
        .fit_regressor(split.train.features(), split.train.targets())
        .unwrap();
    let predictions = tree.predict_batch(split.holdout.features()).unwrap();
    let mse = mean_squared_error(split.holdout.targets(), &predictions).unwrap();
    let var = variance(split.holdout.targets());

    assert!(mse < 0.5 * var, "mse {mse} >= half of variance {var}");
    assert!(tree.depth() <= 10);
}

// ---------------------------------------------------------------------------
// b) classification_accuracy_above_threshold
// ---------------------------------------------------------------------------

/// Holdout accuracy on the default binary problem must exceed 0.7.
#[test]
fn classification_accuracy_above_threshold() {
    let data = ClassificationSpec::new(1000, 4)
        .with_n_informative(3)
        .with_n_redundant(1)
        .with_seed(42)
        .generate()
        .unwrap();
    let split = data.train_test_split(0.2, 42).unwrap();

    let tree = classification_config()
        .fit_classifier(split.train.features(), split.train.targets())
        .unwrap();
    let predictions = tree.predict_batch(split.holdout.features()).unwrap();
    let acc = accuracy(split.holdout.targets(), &predictions).unwrap();

    assert!(acc > 0.7, "holdout accuracy {acc} <= 0.7");
    assert!(tree.depth() <= 8);
    assert_eq!(tree.n_classes(), 2);
}

// ---------------------------------------------------------------------------
// c) fitting_is_deterministic
// ---------------------------------------------------------------------------

#[test]
fn fitting_is_deterministic() {
    let data = ClassificationSpec::new(300, 4)
        .with_n_informative(3)
        .with_n_redundant(1)
        .generate()
        .unwrap();
    let a = classification_config()
        .fit_classifier(data.features(), data.targets())
        .unwrap();
    let b = classification_config()
        .fit_classifier(data.features(), data.targets())
        .unwrap();
    assert_eq!(a, b);
}

// ---------------------------------------------------------------------------
// d) thresholds_are_single_precision
// ---------------------------------------------------------------------------

/// Every split threshold survives a round trip through `f32` and routes
/// single-precision copies of the training rows exactly like the originals.
#[test]
fn thresholds_are_single_precision() {
    let data = RegressionSpec::new(500, 3).with_noise(0.1).generate().unwrap();
    let tree = regression_config()
        .fit_regressor(data.features(), data.targets())
        .unwrap();

    for node in tree.nodes() {
        if let Node::Split { threshold, .. } = node {
            assert_eq!(*threshold, f64::from(*threshold as f32));
        }
    }
    for row in data.features() {
        let narrowed: Vec<f64> = row.iter().map(|&v| f64::from(v as f32)).collect();
        assert_eq!(
            tree.predict(row).unwrap(),
            tree.predict(&narrowed).unwrap()
        );
    }
}
