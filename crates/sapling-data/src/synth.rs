//! Seeded generators for regression and classification problems.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use tracing::{debug, instrument};

use crate::dataset::Dataset;
use crate::error::DataError;

/// Round a value to the nearest `f32`, keeping it in an `f64`.
///
/// Generated features are stored at the precision inference runtimes
/// consume, so a fitted tree and its exported form route identically.
fn to_single(value: f64) -> f64 {
    value as f32 as f64
}

fn standard_normal(rng: &mut ChaCha8Rng) -> f64 {
    rng.sample(StandardNormal)
}

fn check_shape(n_samples: usize, n_features: usize) -> Result<(), DataError> {
    if n_samples == 0 {
        return Err(DataError::InvalidSampleCount { n_samples });
    }
    if n_features == 0 {
        return Err(DataError::InvalidFeatureCount { n_features });
    }
    Ok(())
}

/// Linear regression problem with Gaussian features.
///
/// Features are drawn i.i.d. from a standard normal. The first
/// `n_informative` columns receive a ground-truth coefficient drawn from
/// `100 * U[0, 1)`; the rest have zero weight. Targets are
/// `X·w + bias + noise * N(0, 1)`.
///
/// # Defaults
///
/// | Parameter       | Default        |
/// |-----------------|----------------|
/// | `n_informative` | `n_features`   |
/// | `noise`         | 0.0            |
/// | `bias`          | 0.0            |
/// | `seed`          | 42             |
#[derive(Debug, Clone)]
pub struct RegressionSpec {
    n_samples: usize,
    n_features: usize,
    n_informative: usize,
    noise: f64,
    bias: f64,
    seed: u64,
}

impl RegressionSpec {
    /// Create a spec for `n_samples` rows of `n_features` columns.
    #[must_use]
    pub fn new(n_samples: usize, n_features: usize) -> Self {
        Self {
            n_samples,
            n_features,
            n_informative: n_features,
            noise: 0.0,
            bias: 0.0,
            seed: 42,
        }
    }

    /// Set how many columns carry signal. Must not exceed `n_features`.
    #[must_use]
    pub fn with_n_informative(mut self, n_informative: usize) -> Self {
        self.n_informative = n_informative;
        self
    }

    /// Set the standard deviation of the Gaussian noise added to targets.
    #[must_use]
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Set the constant offset added to every target.
    #[must_use]
    pub fn with_bias(mut self, bias: f64) -> Self {
        self.bias = bias;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generate the dataset.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DataError::InvalidSampleCount`] | `n_samples` is zero |
    /// | [`DataError::InvalidFeatureCount`] | `n_features` is zero |
    /// | [`DataError::NoInformativeFeatures`] | `n_informative` is zero |
    /// | [`DataError::FeatureBudgetExceeded`] | `n_informative > n_features` |
    /// | [`DataError::InvalidParameter`] | `noise` is negative or non-finite, `bias` is non-finite |
    #[instrument(skip(self), fields(n_samples = self.n_samples, n_features = self.n_features))]
    pub fn generate(&self) -> Result<Dataset<f64>, DataError> {
        check_shape(self.n_samples, self.n_features)?;
        if self.n_informative == 0 {
            return Err(DataError::NoInformativeFeatures);
        }
        if self.n_informative > self.n_features {
            return Err(DataError::FeatureBudgetExceeded {
                n_informative: self.n_informative,
                n_redundant: 0,
                n_features: self.n_features,
            });
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(DataError::InvalidParameter {
                name: "noise",
                expected: "finite and non-negative",
                value: self.noise,
            });
        }
        if !self.bias.is_finite() {
            return Err(DataError::InvalidParameter {
                name: "bias",
                expected: "finite",
                value: self.bias,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let n_informative = self.n_informative;

        let features: Vec<Vec<f64>> = (0..self.n_samples)
            .map(|_| {
                (0..self.n_features)
                    .map(|_| to_single(standard_normal(&mut rng)))
                    .collect()
            })
            .collect();

        let coef: Vec<f64> = (0..self.n_features)
            .map(|j| {
                if j < n_informative {
                    100.0 * rng.r#gen::<f64>()
                } else {
                    0.0
                }
            })
            .collect();

        let targets: Vec<f64> = features
            .iter()
            .map(|row| {
                let signal: f64 = row.iter().zip(&coef).map(|(x, w)| x * w).sum();
                let noise = if self.noise > 0.0 {
                    self.noise * standard_normal(&mut rng)
                } else {
                    0.0
                };
                signal + self.bias + noise
            })
            .collect();

        debug!(n_informative, "regression dataset generated");
        Dataset::new(features, targets)
    }
}

/// Classification problem with Gaussian clusters on hypercube vertices.
///
/// Each class owns `n_clusters_per_class` clusters. Cluster centroids sit on
/// distinct vertices of a hypercube of side `2 * class_sep` in the
/// informative subspace, and each cluster is stretched by its own random
/// linear transform. Redundant columns are random linear combinations of the
/// informative ones; any remaining columns are pure noise. A fraction
/// `flip_y` of labels is reassigned at random, then rows and columns are
/// shuffled.
///
/// # Defaults
///
/// | Parameter              | Default |
/// |------------------------|---------|
/// | `n_informative`        | 2       |
/// | `n_redundant`          | 2       |
/// | `n_classes`            | 2       |
/// | `n_clusters_per_class` | 2       |
/// | `class_sep`            | 1.0     |
/// | `flip_y`               | 0.01    |
/// | `seed`                 | 42      |
#[derive(Debug, Clone)]
pub struct ClassificationSpec {
    n_samples: usize,
    n_features: usize,
    n_informative: usize,
    n_redundant: usize,
    n_classes: usize,
    n_clusters_per_class: usize,
    class_sep: f64,
    flip_y: f64,
    seed: u64,
}

impl ClassificationSpec {
    /// Create a spec for `n_samples` rows of `n_features` columns.
    #[must_use]
    pub fn new(n_samples: usize, n_features: usize) -> Self {
        Self {
            n_samples,
            n_features,
            n_informative: 2,
            n_redundant: 2,
            n_classes: 2,
            n_clusters_per_class: 2,
            class_sep: 1.0,
            flip_y: 0.01,
            seed: 42,
        }
    }

    /// Set the number of informative columns.
    #[must_use]
    pub fn with_n_informative(mut self, n_informative: usize) -> Self {
        self.n_informative = n_informative;
        self
    }

    /// Set the number of redundant (linearly dependent) columns.
    #[must_use]
    pub fn with_n_redundant(mut self, n_redundant: usize) -> Self {
        self.n_redundant = n_redundant;
        self
    }

    /// Set the number of classes.
    #[must_use]
    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Set the number of Gaussian clusters per class.
    #[must_use]
    pub fn with_n_clusters_per_class(mut self, n_clusters_per_class: usize) -> Self {
        self.n_clusters_per_class = n_clusters_per_class;
        self
    }

    /// Set half the hypercube side length.
    #[must_use]
    pub fn with_class_sep(mut self, class_sep: f64) -> Self {
        self.class_sep = class_sep;
        self
    }

    /// Set the fraction of labels reassigned at random.
    #[must_use]
    pub fn with_flip_y(mut self, flip_y: f64) -> Self {
        self.flip_y = flip_y;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn validate(&self) -> Result<(), DataError> {
        check_shape(self.n_samples, self.n_features)?;
        if self.n_informative == 0 {
            return Err(DataError::NoInformativeFeatures);
        }
        if self.n_informative + self.n_redundant > self.n_features {
            return Err(DataError::FeatureBudgetExceeded {
                n_informative: self.n_informative,
                n_redundant: self.n_redundant,
                n_features: self.n_features,
            });
        }
        if self.n_classes < 2 {
            return Err(DataError::InvalidClassCount {
                n_classes: self.n_classes,
            });
        }
        if self.n_clusters_per_class == 0 {
            return Err(DataError::InvalidParameter {
                name: "n_clusters_per_class",
                expected: "at least 1",
                value: 0.0,
            });
        }
        let n_clusters = self.n_classes * self.n_clusters_per_class;
        if self.n_informative < 64 {
            let n_vertices = 1u64 << self.n_informative;
            if n_clusters as u64 > n_vertices {
                return Err(DataError::TooManyClusters {
                    n_classes: self.n_classes,
                    n_clusters_per_class: self.n_clusters_per_class,
                    n_vertices,
                });
            }
        }
        if !(self.class_sep.is_finite() && self.class_sep > 0.0) {
            return Err(DataError::InvalidParameter {
                name: "class_sep",
                expected: "finite and positive",
                value: self.class_sep,
            });
        }
        if !(0.0..=1.0).contains(&self.flip_y) {
            return Err(DataError::InvalidParameter {
                name: "flip_y",
                expected: "in [0.0, 1.0]",
                value: self.flip_y,
            });
        }
        Ok(())
    }

    /// Generate the dataset. Labels are zero-based class indices.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DataError::InvalidSampleCount`] | `n_samples` is zero |
    /// | [`DataError::InvalidFeatureCount`] | `n_features` is zero |
    /// | [`DataError::NoInformativeFeatures`] | `n_informative` is zero |
    /// | [`DataError::FeatureBudgetExceeded`] | `n_informative + n_redundant > n_features` |
    /// | [`DataError::InvalidClassCount`] | `n_classes` < 2 |
    /// | [`DataError::TooManyClusters`] | clusters outnumber hypercube vertices |
    /// | [`DataError::InvalidParameter`] | `class_sep`, `flip_y` or `n_clusters_per_class` out of range |
    #[instrument(skip(self), fields(n_samples = self.n_samples, n_features = self.n_features))]
    pub fn generate(&self) -> Result<Dataset<usize>, DataError> {
        self.validate()?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let n_informative = self.n_informative;
        let n_clusters = self.n_classes * self.n_clusters_per_class;

        // Distinct hypercube vertices, one per cluster.
        let mut seen: HashSet<Vec<bool>> = HashSet::with_capacity(n_clusters);
        let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(n_clusters);
        while centroids.len() < n_clusters {
            let bits: Vec<bool> = (0..n_informative).map(|_| rng.r#gen::<bool>()).collect();
            if seen.insert(bits.clone()) {
                centroids.push(
                    bits.iter()
                        .map(|&b| if b { self.class_sep } else { -self.class_sep })
                        .collect(),
                );
            }
        }

        let base = self.n_samples / n_clusters;
        let remainder = self.n_samples % n_clusters;

        let mut rows: Vec<Vec<f64>> = Vec::with_capacity(self.n_samples);
        let mut labels: Vec<usize> = Vec::with_capacity(self.n_samples);

        for (cluster, centroid) in centroids.iter().enumerate() {
            let size = base + usize::from(cluster < remainder);
            let mixing: Vec<Vec<f64>> = (0..n_informative)
                .map(|_| {
                    (0..n_informative)
                        .map(|_| 2.0 * rng.r#gen::<f64>() - 1.0)
                        .collect()
                })
                .collect();

            for _ in 0..size {
                let z: Vec<f64> = (0..n_informative).map(|_| standard_normal(&mut rng)).collect();
                let informative: Vec<f64> = (0..n_informative)
                    .map(|j| {
                        let mixed: f64 = z.iter().zip(&mixing).map(|(zi, row)| zi * row[j]).sum();
                        mixed + centroid[j]
                    })
                    .collect();
                rows.push(informative);
                labels.push(cluster % self.n_classes);
            }
        }

        // Redundant columns share one random projection across all rows.
        let projection: Vec<Vec<f64>> = (0..n_informative)
            .map(|_| {
                (0..self.n_redundant)
                    .map(|_| 2.0 * rng.r#gen::<f64>() - 1.0)
                    .collect()
            })
            .collect();
        let n_noise = self.n_features - n_informative - self.n_redundant;

        for row in &mut rows {
            let redundant: Vec<f64> = (0..self.n_redundant)
                .map(|k| row.iter().zip(&projection).map(|(x, p)| x * p[k]).sum())
                .collect();
            row.extend(redundant);
            row.extend((0..n_noise).map(|_| standard_normal(&mut rng)));
        }

        let mut n_flipped = 0usize;
        for label in &mut labels {
            if rng.r#gen::<f64>() < self.flip_y {
                *label = rng.gen_range(0..self.n_classes);
                n_flipped += 1;
            }
        }

        let mut row_order: Vec<usize> = (0..self.n_samples).collect();
        row_order.shuffle(&mut rng);
        let mut column_order: Vec<usize> = (0..self.n_features).collect();
        column_order.shuffle(&mut rng);

        let features: Vec<Vec<f64>> = row_order
            .iter()
            .map(|&r| column_order.iter().map(|&c| to_single(rows[r][c])).collect())
            .collect();
        let targets: Vec<usize> = row_order.iter().map(|&r| labels[r]).collect();

        debug!(n_clusters, n_flipped, "classification dataset generated");
        Dataset::new(features, targets)
    }
}
