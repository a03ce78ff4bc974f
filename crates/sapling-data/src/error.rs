//! Error types for dataset synthesis and splitting.

/// Errors from synthetic data generation and train/holdout splitting.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// Returned when a generator is asked for zero samples.
    #[error("n_samples must be at least 1, got {n_samples}")]
    InvalidSampleCount {
        /// The invalid sample count.
        n_samples: usize,
    },

    /// Returned when a generator is asked for zero feature columns.
    #[error("n_features must be at least 1, got {n_features}")]
    InvalidFeatureCount {
        /// The invalid feature count.
        n_features: usize,
    },

    /// Returned when informative, redundant features do not fit in the feature budget.
    #[error(
        "n_informative ({n_informative}) + n_redundant ({n_redundant}) must not exceed n_features ({n_features})"
    )]
    FeatureBudgetExceeded {
        /// Requested informative features.
        n_informative: usize,
        /// Requested redundant features.
        n_redundant: usize,
        /// Total feature columns.
        n_features: usize,
    },

    /// Returned when no informative feature is requested.
    #[error("n_informative must be at least 1")]
    NoInformativeFeatures,

    /// Returned when fewer than two classes are requested.
    #[error("n_classes must be at least 2, got {n_classes}")]
    InvalidClassCount {
        /// The invalid class count.
        n_classes: usize,
    },

    /// Returned when the hypercube has too few vertices to host every cluster.
    #[error(
        "n_classes ({n_classes}) * n_clusters_per_class ({n_clusters_per_class}) must be at most 2^n_informative ({n_vertices})"
    )]
    TooManyClusters {
        /// Requested class count.
        n_classes: usize,
        /// Requested clusters per class.
        n_clusters_per_class: usize,
        /// Available hypercube vertices.
        n_vertices: u64,
    },

    /// Returned when a real-valued generator parameter is out of range.
    #[error("parameter {name} must be {expected}, got {value}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Human-readable description of the accepted range.
        expected: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Returned when feature rows and targets disagree in length or width.
    #[error("row {row} has {got} features, expected {expected}")]
    RaggedFeatures {
        /// Expected row width.
        expected: usize,
        /// Actual row width.
        got: usize,
        /// Zero-based row index.
        row: usize,
    },

    /// Returned when the number of targets differs from the number of feature rows.
    #[error("dataset has {n_rows} feature rows but {n_targets} targets")]
    TargetCountMismatch {
        /// Number of feature rows.
        n_rows: usize,
        /// Number of targets.
        n_targets: usize,
    },

    /// Returned when the holdout fraction is not in (0.0, 1.0).
    #[error("test_fraction must be in (0.0, 1.0), got {fraction}")]
    InvalidTestFraction {
        /// The rejected fraction.
        fraction: f64,
    },

    /// Returned when a split would leave the training or holdout subset empty.
    #[error("splitting {n_samples} samples at test_fraction {fraction} leaves an empty subset")]
    DegenerateSplit {
        /// Total samples in the dataset.
        n_samples: usize,
        /// The requested holdout fraction.
        fraction: f64,
    },
}
