//! End-to-end runs into temporary directories.

use std::fs;

use sapling::{
    CLASSIFICATION_SAMPLE, PipelineConfig, PipelineError, Prediction, REGRESSION_SAMPLE, Stage,
    TaskSettings, VerifyError, predict, run, run_classification, run_regression, run_samples,
    verify_classification, verify_regression,
};
use sapling_onnx::{ArtifactInfo, Dim, OnnxError};
use tempfile::TempDir;

fn small_config(dir: &std::path::Path) -> PipelineConfig {
    PipelineConfig::new()
        .with_output_dir(dir)
        .with_regression(TaskSettings::regression().with_n_samples(400))
        .with_classification(TaskSettings::classification().with_n_samples(400))
}

// ---------------------------------------------------------------------------
// Full run
// ---------------------------------------------------------------------------

#[test]
fn default_run_writes_verified_artifacts() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::new().with_output_dir(dir.path());
    let report = run(&config).unwrap();

    assert_eq!(report.regression.n_train, 800);
    assert_eq!(report.regression.n_holdout, 200);
    assert!(report.regression.depth <= 10);
    assert!(report.regression.verification.is_ok());

    assert_eq!(report.classification.n_holdout, 200);
    assert!(report.classification.depth <= 8);
    assert!(report.classification.accuracy > 0.5);
    assert!(report.classification.verification.is_ok());

    assert!(matches!(
        report.samples.regression.result,
        Ok(Prediction::Value(_))
    ));
    match &report.samples.classification.result {
        Ok(Prediction::Class {
            label,
            probabilities,
        }) => {
            assert!((0..=1).contains(label));
            assert_eq!(probabilities.len(), 2);
        }
        other => panic!("unexpected classification sample: {other:?}"),
    }
}

#[test]
fn artifacts_declare_expected_interface() {
    let dir = TempDir::new().unwrap();
    let config = small_config(dir.path());
    run(&config).unwrap();

    let reg = ArtifactInfo::read(&config.regression_artifact()).unwrap();
    assert_eq!(reg.input_name, "float_input");
    assert_eq!(reg.input_dims, vec![Dim::Symbolic("N".into()), Dim::Fixed(3)]);
    assert_eq!(reg.opset(""), Some(11));

    let cls = ArtifactInfo::read(&config.classification_artifact()).unwrap();
    assert_eq!(cls.feature_width(), Some(4));
    assert_eq!(cls.output_names, vec!["label", "probabilities"]);
}

#[test]
fn missing_output_directory_is_created() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("does").join("not").join("exist");
    let config = small_config(&nested);
    run_regression(&config).unwrap();
    assert!(nested.join("regression_model.onnx").is_file());
}

#[test]
fn identical_seeds_give_identical_bytes() {
    let dir = TempDir::new().unwrap();
    let config = small_config(dir.path());

    run(&config).unwrap();
    let first_reg = fs::read(config.regression_artifact()).unwrap();
    let first_cls = fs::read(config.classification_artifact()).unwrap();

    run(&config).unwrap();
    assert_eq!(fs::read(config.regression_artifact()).unwrap(), first_reg);
    assert_eq!(fs::read(config.classification_artifact()).unwrap(), first_cls);
}

// ---------------------------------------------------------------------------
// Verification failures
// ---------------------------------------------------------------------------

#[test]
fn wrong_expected_values_are_rejected() {
    let dir = TempDir::new().unwrap();
    let config = small_config(dir.path());
    let report = run_regression(&config).unwrap();

    let rows = vec![vec![1.0, 2.0, 3.0], vec![-1.0, 0.5, 2.0]];
    let actual: Vec<f64> = rows
        .iter()
        .map(|row| match predict(&report.artifact, row).unwrap() {
            Prediction::Value(v) => f64::from(v),
            other => panic!("regressor returned {other:?}"),
        })
        .collect();

    let ok = verify_regression(&report.artifact, &rows, &actual, 1e-4).unwrap();
    assert_eq!(ok.n_rows, 2);

    let wrong: Vec<f64> = actual.iter().map(|v| v + 1000.0).collect();
    let err = verify_regression(&report.artifact, &rows, &wrong, 1e-4).unwrap_err();
    assert!(matches!(err, VerifyError::Mismatch { row: 0, .. }));
}

#[test]
fn wrong_expected_labels_are_rejected() {
    let dir = TempDir::new().unwrap();
    let config = small_config(dir.path());
    let report = run_classification(&config).unwrap();

    let rows = vec![vec![1.0, 2.0, 3.0, 4.0]];
    let (label, proba) = match predict(&report.artifact, &rows[0]).unwrap() {
        Prediction::Class {
            label,
            probabilities,
        } => (label as usize, probabilities),
        other => panic!("classifier returned {other:?}"),
    };
    let proba: Vec<Vec<f64>> = vec![proba.iter().map(|&p| f64::from(p)).collect()];

    assert!(verify_classification(&report.artifact, &rows, &[label], &proba, 1e-4).is_ok());

    let err =
        verify_classification(&report.artifact, &rows, &[1 - label], &proba, 1e-4).unwrap_err();
    assert!(matches!(err, VerifyError::LabelMismatch { row: 0, .. }));
}

#[test]
fn missing_artifact_is_runtime_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.onnx");
    let err = verify_classification(&path, &[vec![0.0; 4]], &[0], &[vec![1.0, 0.0]], 1e-4)
        .unwrap_err();
    assert!(matches!(err, VerifyError::Runtime { .. }));
}

#[test]
fn corrupt_artifact_is_runtime_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corrupt.onnx");
    fs::write(&path, b"not a model").unwrap();
    let err = verify_regression(&path, &[vec![0.0; 3]], &[0.0], 1e-4).unwrap_err();
    assert!(matches!(err, VerifyError::Runtime { .. }));
}

#[test]
fn length_mismatch_checked_before_loading() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.onnx");
    let err = verify_regression(&path, &[vec![0.0; 3]], &[0.0, 1.0], 1e-4).unwrap_err();
    assert!(matches!(
        err,
        VerifyError::LengthMismatch {
            n_inputs: 1,
            n_expected: 2
        }
    ));
}

#[test]
fn failed_verification_is_advisory() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::new()
        .with_output_dir(dir.path())
        .with_regression(
            TaskSettings::regression()
                .with_n_samples(400)
                .with_tolerance(-1.0),
        )
        .with_classification(TaskSettings::classification().with_n_samples(400));

    let report = run(&config).unwrap();
    assert!(matches!(
        report.regression.verification,
        Err(VerifyError::Mismatch { row: 0, .. })
    ));
    assert!(report.classification.verification.is_ok());
    assert!(config.regression_artifact().is_file());
    assert!(report.samples.regression.result.is_ok());
}

#[test]
fn invalid_split_fraction_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::new()
        .with_output_dir(dir.path())
        .with_regression(TaskSettings::regression().with_test_fraction(1.5));
    let err = run(&config).unwrap_err();
    assert!(matches!(err, PipelineError::Data { .. }));
    assert!(!config.regression_artifact().exists());
}

// ---------------------------------------------------------------------------
// Sample runner and predict
// ---------------------------------------------------------------------------

#[test]
fn sample_runner_reports_missing_artifact() {
    let dir = TempDir::new().unwrap();
    let config = small_config(dir.path());
    run(&config).unwrap();
    fs::remove_file(config.regression_artifact()).unwrap();

    let report = run_samples(&config);
    assert!(matches!(
        report.regression.result,
        Err(OnnxError::ReadArtifact { .. })
    ));
    assert!(report.classification.result.is_ok());
    assert_eq!(report.regression.input, REGRESSION_SAMPLE.to_vec());
    assert_eq!(report.classification.input, CLASSIFICATION_SAMPLE.to_vec());
}

#[test]
fn single_row_predictions() {
    let dir = TempDir::new().unwrap();
    let config = small_config(dir.path());
    run(&config).unwrap();

    let value = predict(&config.regression_artifact(), &[1.0, 2.0, 3.0]).unwrap();
    assert!(matches!(value, Prediction::Value(v) if v.is_finite()));

    match predict(&config.classification_artifact(), &[1.0, 2.0, 3.0, 4.0]).unwrap() {
        Prediction::Class {
            label,
            probabilities,
        } => {
            assert!((0..=1).contains(&label));
            let sum: f32 = probabilities.iter().sum();
            assert!((0.99..=1.01).contains(&sum));
        }
        Prediction::Value(v) => panic!("classifier returned a value {v}"),
    }

    let err = predict(&config.regression_artifact(), &[1.0, 2.0]).unwrap_err();
    assert!(matches!(
        err,
        OnnxError::InputWidthMismatch {
            expected: 3,
            got: 2,
            ..
        }
    ));
}

#[test]
fn stage_order_matches_run_order() {
    assert!(Stage::Init < Stage::RegressionPipeline);
    assert!(Stage::ClassificationPipeline < Stage::SampleDemo);
}
