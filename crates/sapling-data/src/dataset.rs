use crate::error::DataError;

/// Row-major feature matrix paired with one target per row.
///
/// `T` is `f64` for regression and `usize` (zero-based class label) for
/// classification. All rows share the same width.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<T> {
    features: Vec<Vec<f64>>,
    targets: Vec<T>,
    n_features: usize,
}

impl<T: Clone> Dataset<T> {
    /// Build a dataset from row-major features and targets.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DataError::TargetCountMismatch`] | `features.len() != targets.len()` |
    /// | [`DataError::RaggedFeatures`] | a row differs in width from the first row |
    pub fn new(features: Vec<Vec<f64>>, targets: Vec<T>) -> Result<Self, DataError> {
        if features.len() != targets.len() {
            return Err(DataError::TargetCountMismatch {
                n_rows: features.len(),
                n_targets: targets.len(),
            });
        }
        let n_features = features.first().map_or(0, Vec::len);
        for (row, values) in features.iter().enumerate() {
            if values.len() != n_features {
                return Err(DataError::RaggedFeatures {
                    expected: n_features,
                    got: values.len(),
                    row,
                });
            }
        }
        Ok(Self {
            features,
            targets,
            n_features,
        })
    }

    /// Return the feature rows.
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Return the targets, aligned with [`Dataset::features`].
    #[must_use]
    pub fn targets(&self) -> &[T] {
        &self.targets
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    /// Return the width of every feature row.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return `true` when the dataset has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Copy the rows at `indices` (in that order) into a new dataset.
    pub(crate) fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i].clone()).collect(),
            n_features: self.n_features,
        }
    }
}
