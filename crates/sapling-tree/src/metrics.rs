//! Holdout scoring for fitted trees.

use crate::TreeError;

fn check_lengths(n_true: usize, n_pred: usize) -> Result<(), TreeError> {
    if n_true != n_pred {
        return Err(TreeError::MetricLengthMismatch { n_true, n_pred });
    }
    if n_true == 0 {
        return Err(TreeError::EmptyMetricInput);
    }
    Ok(())
}

/// Mean of squared differences between truth and prediction.
///
/// # Errors
///
/// | Variant                              | When                           |
/// |--------------------------------------|--------------------------------|
/// | [`TreeError::MetricLengthMismatch`]  | slices differ in length        |
/// | [`TreeError::EmptyMetricInput`]      | both slices are empty          |
pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64, TreeError> {
    check_lengths(y_true.len(), y_pred.len())?;
    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    Ok(sum / y_true.len() as f64)
}

/// Fraction of predictions equal to the true label, in [0, 1].
///
/// # Errors
///
/// Same conditions as [`mean_squared_error`].
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> Result<f64, TreeError> {
    check_lengths(y_true.len(), y_pred.len())?;
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}
