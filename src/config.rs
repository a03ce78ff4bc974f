//! Pipeline configuration.

use std::path::{Path, PathBuf};

use sapling_tree::DecisionTreeConfig;

/// File name of the regression artifact inside the output directory.
pub const REGRESSION_ARTIFACT: &str = "regression_model.onnx";

/// File name of the classification artifact inside the output directory.
pub const CLASSIFICATION_ARTIFACT: &str = "classification_model.onnx";

/// Per-task dataset, split, tree and verification settings.
///
/// # Defaults
///
/// | Parameter           | Regression | Classification |
/// |---------------------|------------|----------------|
/// | `n_samples`         | 1000       | 1000           |
/// | `n_features`        | 3          | 4              |
/// | `test_fraction`     | 0.2        | 0.2            |
/// | `max_depth`         | 10         | 8              |
/// | `min_samples_split` | 5          | 5              |
/// | `min_samples_leaf`  | 2          | 2              |
/// | `verify_rows`       | 5          | 5              |
/// | `tolerance`         | 1e-4       | 1e-4           |
#[derive(Debug, Clone)]
pub struct TaskSettings {
    n_samples: usize,
    n_features: usize,
    test_fraction: f64,
    max_depth: usize,
    min_samples_split: usize,
    min_samples_leaf: usize,
    verify_rows: usize,
    tolerance: f64,
}

impl TaskSettings {
    /// Settings for the regression task.
    #[must_use]
    pub fn regression() -> Self {
        Self {
            n_samples: 1000,
            n_features: 3,
            test_fraction: 0.2,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            verify_rows: 5,
            tolerance: 1e-4,
        }
    }

    /// Settings for the binary classification task.
    #[must_use]
    pub fn classification() -> Self {
        Self {
            n_features: 4,
            max_depth: 8,
            ..Self::regression()
        }
    }

    /// Set the number of generated samples.
    #[must_use]
    pub fn with_n_samples(mut self, n_samples: usize) -> Self {
        self.n_samples = n_samples;
        self
    }

    /// Set the holdout fraction.
    #[must_use]
    pub fn with_test_fraction(mut self, test_fraction: f64) -> Self {
        self.test_fraction = test_fraction;
        self
    }

    /// Set the maximum tree depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set how many holdout rows are replayed through the artifact.
    #[must_use]
    pub fn with_verify_rows(mut self, verify_rows: usize) -> Self {
        self.verify_rows = verify_rows;
        self
    }

    /// Set the relative tolerance for artifact agreement.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    // --- Getters ---

    /// Return the number of generated samples.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Return the feature width, which is also the artifact's declared width.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the holdout fraction.
    #[must_use]
    pub fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    /// Return the maximum tree depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Return how many holdout rows are verified.
    #[must_use]
    pub fn verify_rows(&self) -> usize {
        self.verify_rows
    }

    /// Return the relative verification tolerance.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Tree configuration for this task.
    #[must_use]
    pub fn tree_config(&self, seed: u64) -> DecisionTreeConfig {
        DecisionTreeConfig::new()
            .with_max_depth(Some(self.max_depth))
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_seed(seed)
    }
}

/// Top-level configuration shared by every pipeline stage.
///
/// The output directory is passed explicitly to export, verification and
/// the sample runner.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    output_dir: PathBuf,
    seed: u64,
    noise: f64,
    regression: TaskSettings,
    classification: TaskSettings,
}

impl PipelineConfig {
    /// Defaults: output directory `trained`, seed 42, regression noise 0.1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            output_dir: PathBuf::from("trained"),
            seed: 42,
            noise: 0.1,
            regression: TaskSettings::regression(),
            classification: TaskSettings::classification(),
        }
    }

    /// Set the artifact directory.
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Set the seed used for synthesis, splitting and fitting.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the standard deviation of regression target noise.
    #[must_use]
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Replace the regression task settings.
    #[must_use]
    pub fn with_regression(mut self, settings: TaskSettings) -> Self {
        self.regression = settings;
        self
    }

    /// Replace the classification task settings.
    #[must_use]
    pub fn with_classification(mut self, settings: TaskSettings) -> Self {
        self.classification = settings;
        self
    }

    // --- Getters ---

    /// Return the artifact directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Return the seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the regression target noise.
    #[must_use]
    pub fn noise(&self) -> f64 {
        self.noise
    }

    /// Return the regression task settings.
    #[must_use]
    pub fn regression(&self) -> &TaskSettings {
        &self.regression
    }

    /// Return the classification task settings.
    #[must_use]
    pub fn classification(&self) -> &TaskSettings {
        &self.classification
    }

    /// Path of the regression artifact.
    #[must_use]
    pub fn regression_artifact(&self) -> PathBuf {
        self.output_dir.join(REGRESSION_ARTIFACT)
    }

    /// Path of the classification artifact.
    #[must_use]
    pub fn classification_artifact(&self) -> PathBuf {
        self.output_dir.join(CLASSIFICATION_ARTIFACT)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_defaults() {
        let reg = TaskSettings::regression();
        assert_eq!((reg.n_features(), reg.max_depth()), (3, 10));
        let cls = TaskSettings::classification();
        assert_eq!((cls.n_features(), cls.max_depth()), (4, 8));
        assert_eq!(cls.n_samples(), 1000);
        assert!((cls.test_fraction() - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn artifact_paths_follow_output_dir() {
        let config = PipelineConfig::new().with_output_dir("out/models");
        assert_eq!(
            config.regression_artifact(),
            Path::new("out/models").join("regression_model.onnx")
        );
        assert_eq!(
            config.classification_artifact(),
            Path::new("out/models").join("classification_model.onnx")
        );
    }

    #[test]
    fn tree_config_carries_settings() {
        let tree = TaskSettings::classification().tree_config(7);
        assert_eq!(tree.max_depth(), Some(8));
        assert_eq!(tree.min_samples_split(), 5);
        assert_eq!(tree.min_samples_leaf(), 2);
        assert_eq!(tree.seed(), 7);
    }
}
