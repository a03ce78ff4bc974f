//! Replay holdout rows through a reloaded artifact and compare against the
//! in-process model.

use std::path::Path;

use sapling_onnx::InferenceSession;
use tracing::{debug, instrument};

use crate::error::VerifyError;

/// Summary of a successful verification.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    /// Number of rows replayed.
    pub n_rows: usize,
    /// Largest absolute difference between artifact and model outputs.
    pub max_abs_diff: f64,
}

fn check_shape(output: &'static str, expected: Vec<i64>, got: &[i64]) -> Result<(), VerifyError> {
    if got != expected.as_slice() {
        return Err(VerifyError::ShapeMismatch {
            output,
            expected,
            got: got.to_vec(),
        });
    }
    Ok(())
}

/// Compare one value, returning its absolute difference.
fn compare(row: usize, expected: f64, got: f32, tolerance: f64) -> Result<f64, VerifyError> {
    let got = f64::from(got);
    let allowed = tolerance * expected.abs().max(1.0);
    let diff = (got - expected).abs();
    if diff.is_nan() || diff > allowed {
        return Err(VerifyError::Mismatch {
            row,
            expected,
            got,
            tolerance: allowed,
        });
    }
    Ok(diff)
}

/// Reload a regression artifact and check it reproduces `expected`.
///
/// Each value must agree within `tolerance · max(1, |expected|)` and the
/// output must have shape `[inputs.len()]`.
///
/// # Errors
///
/// | Variant                          | When                                    |
/// |----------------------------------|-----------------------------------------|
/// | [`VerifyError::LengthMismatch`]  | `inputs` and `expected` differ in length |
/// | [`VerifyError::Runtime`]         | the artifact cannot be loaded or run    |
/// | [`VerifyError::ShapeMismatch`]   | the output shape is wrong               |
/// | [`VerifyError::Mismatch`]        | a value differs beyond tolerance        |
#[instrument(skip_all, fields(path = %path.display(), n_rows = inputs.len()))]
pub fn verify_regression(
    path: &Path,
    inputs: &[Vec<f64>],
    expected: &[f64],
    tolerance: f64,
) -> Result<Verification, VerifyError> {
    if inputs.len() != expected.len() {
        return Err(VerifyError::LengthMismatch {
            n_inputs: inputs.len(),
            n_expected: expected.len(),
        });
    }

    let mut session = InferenceSession::load(path)?;
    let output = session.run_regression(inputs)?;
    check_shape("variable", vec![inputs.len() as i64], &output.shape)?;

    let mut max_abs_diff = 0.0f64;
    for (row, (&want, &got)) in expected.iter().zip(&output.values).enumerate() {
        debug!(row, expected = want, got, "regression row");
        max_abs_diff = max_abs_diff.max(compare(row, want, got, tolerance)?);
    }

    Ok(Verification {
        n_rows: inputs.len(),
        max_abs_diff,
    })
}

/// Reload a classification artifact and check it reproduces the model.
///
/// Labels must match exactly; probabilities must agree within `tolerance`.
/// Outputs must have shapes `[n]` and `[n, n_classes]`.
///
/// # Errors
///
/// As [`verify_regression`], plus [`VerifyError::LabelMismatch`] when a
/// label differs.
#[instrument(skip_all, fields(path = %path.display(), n_rows = inputs.len()))]
pub fn verify_classification(
    path: &Path,
    inputs: &[Vec<f64>],
    expected_labels: &[usize],
    expected_proba: &[Vec<f64>],
    tolerance: f64,
) -> Result<Verification, VerifyError> {
    if inputs.len() != expected_labels.len() || inputs.len() != expected_proba.len() {
        return Err(VerifyError::LengthMismatch {
            n_inputs: inputs.len(),
            n_expected: expected_labels.len().min(expected_proba.len()),
        });
    }

    let mut session = InferenceSession::load(path)?;
    let output = session.run_classification(inputs)?;

    let n = inputs.len() as i64;
    let n_classes = expected_proba.first().map_or(0, Vec::len) as i64;
    check_shape("label", vec![n], &output.label_shape)?;
    check_shape("probabilities", vec![n, n_classes], &output.probability_shape)?;

    let mut max_abs_diff = 0.0f64;
    for (row, ((&want, &got), (want_proba, got_proba))) in expected_labels
        .iter()
        .zip(&output.labels)
        .zip(expected_proba.iter().zip(output.probability_rows()))
        .enumerate()
    {
        debug!(row, expected = want, got, "classification row");
        if i64::try_from(want).ok() != Some(got) {
            return Err(VerifyError::LabelMismatch {
                row,
                expected: want,
                got,
            });
        }
        for (&p_want, &p_got) in want_proba.iter().zip(got_proba) {
            max_abs_diff = max_abs_diff.max(compare(row, p_want, p_got, tolerance)?);
        }
    }

    Ok(Verification {
        n_rows: inputs.len(),
        max_abs_diff,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difference_within_relative_tolerance_passes() {
        // allowed = 1e-4 * 10 = 1e-3
        let diff = compare(0, 10.0, 10.0005, 1e-4).unwrap();
        assert!(diff < 1e-3);
        assert!(compare(1, 0.0, 5e-5, 1e-4).is_ok());
    }

    #[test]
    fn difference_beyond_tolerance_is_mismatch() {
        let err = compare(3, 10.0, 10.5, 1e-4).unwrap_err();
        match err {
            VerifyError::Mismatch {
                row,
                expected,
                tolerance,
                ..
            } => {
                assert_eq!(row, 3);
                assert_eq!(expected, 10.0);
                assert!((tolerance - 1e-3).abs() < 1e-12);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn nan_output_is_mismatch() {
        assert!(matches!(
            compare(0, 1.0, f32::NAN, 1e-4),
            Err(VerifyError::Mismatch { row: 0, .. })
        ));
    }

    #[test]
    fn wrong_shape_is_reported() {
        assert!(check_shape("variable", vec![2], &[2]).is_ok());
        let err = check_shape("variable", vec![2], &[2, 1]).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::ShapeMismatch { output: "variable", ref got, .. } if got == &[2, 1]
        ));
    }
}
