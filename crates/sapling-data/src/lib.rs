//! Seeded synthetic datasets for tree fitting.
//!
//! Generates labeled regression and binary/multiclass classification data
//! from a fixed seed and partitions it into training and holdout subsets.
//! Every generator draws from a ChaCha8 stream, so identical parameters
//! always produce bit-identical datasets.

mod dataset;
mod error;
mod split;
mod synth;

pub use dataset::Dataset;
pub use error::DataError;
pub use split::Split;
pub use synth::{ClassificationSpec, RegressionSpec};
