//! End-to-end runs over npz files in a scratch directory, with a stand-in
//! classifier in place of the ONNX model.

mod common;

use std::collections::BTreeSet;

use ndarray::{Array, Array4, ArrayD, IxDyn};
use sleep_stager::*;
use tempfile::TempDir;

/// Always predicts the class in the first sample of each epoch, rounded.
struct FirstSample;

impl StageClassifier for FirstSample {
    fn predict(&mut self, input: &Array4<f32>) -> anyhow::Result<ArrayD<f32>> {
        let (b, t) = (input.shape()[0], input.shape()[1]);
        Ok(Array::from_shape_fn(IxDyn(&[b, t, NUM_STAGES]), |ix| {
            let class = input[[ix[0], ix[1], 0, 0]].round().clamp(0.0, 5.0) as usize;
            if ix[2] == class {
                1.0
            } else {
                0.0
            }
        }))
    }
}

fn write_dataset(dir: &TempDir, n: usize) -> Vec<std::path::PathBuf> {
    (0..n)
        .map(|i| {
            let len = 150 + 13 * i;
            common::write_recording(
                dir.path(),
                &format!("SC4{:03}E0", i),
                &common::epochs(len, 30),
                &common::cycling_stages(len),
            )
        })
        .collect()
}

#[test]
fn discovers_only_matching_files_in_order() {
    let dir = TempDir::new().unwrap();
    write_dataset(&dir, 4);
    std::fs::write(dir.path().join("notes.txt"), "not a recording").unwrap();

    let files = discover_files(dir.path(), "*.npz").unwrap();
    let keys: Vec<_> = files.iter().map(|p| recording_key(p)).collect();
    assert_eq!(keys, vec!["SC4000E0", "SC4001E0", "SC4002E0", "SC4003E0"]);
}

#[test]
fn loads_converter_output() {
    let dir = TempDir::new().unwrap();
    let files = write_dataset(&dir, 3);
    let data = load_recordings(&files, &DataConfig::default()).unwrap();

    assert_eq!(data.len(), 3);
    let rec = &data["SC4001E0"];
    assert_eq!(rec.len(), 163);
    assert_eq!(rec.raw().shape(), &[163, 30, 1]);
    assert_eq!(rec.stages()[7], 1);
}

#[test]
fn predictions_keep_discovery_order() {
    // Sorted paths put `a-b.npz` before `a.npz`; sorted keys would not.
    let dir = TempDir::new().unwrap();
    for key in ["a", "a-b"] {
        common::write_recording(dir.path(), key, &common::epochs(12, 4), &[2; 12]);
    }
    let files = discover_files(dir.path(), "*.npz").unwrap();
    let discovered: Vec<_> = files.iter().map(|p| recording_key(p)).collect();
    assert_eq!(discovered, vec!["a-b", "a"]);

    let data = load_recordings(&files, &DataConfig::default()).unwrap();
    let preds = predict_stages(&mut FirstSample, &data, &Rescale::default()).unwrap();
    let predicted: Vec<_> = preds.iter().map(|p| p.key.clone()).collect();
    assert_eq!(predicted, discovered);
}

#[test]
fn mismatched_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = common::write_recording(dir.path(), "bad", &common::epochs(20, 4), &[0; 19]);
    let err = load_recording(&path, &DataConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            source: PreconditionError::LengthMismatch { raw: 20, stage: 19 },
            ..
        }
    ));
}

#[test]
fn float_labels_load_only_when_whole() {
    let dir = TempDir::new().unwrap();
    let whole = ndarray::arr1(&[0.0_f64, 3.0, 5.0]);
    let path = common::write_with_stages(dir.path(), "whole", &common::epochs(3, 4), &whole);
    let rec = load_recording(&path, &DataConfig::default()).unwrap();
    assert_eq!(rec.stages().to_vec(), vec![0, 3, 5]);

    let fractional = ndarray::arr1(&[0.0_f64, 2.7, 1.0]);
    let path = common::write_with_stages(dir.path(), "frac", &common::epochs(3, 4), &fractional);
    assert!(matches!(
        load_recording(&path, &DataConfig::default()),
        Err(LoadError::Invalid {
            source: PreconditionError::FractionalStage(_),
            ..
        })
    ));

    let nan = ndarray::arr1(&[f64::NAN, 1.0, 1.0]);
    let path = common::write_with_stages(dir.path(), "nan", &common::epochs(3, 4), &nan);
    assert!(load_recording(&path, &DataConfig::default()).is_err());
}

#[test]
fn two_dimensional_labels_keep_the_decode_error() {
    let dir = TempDir::new().unwrap();
    let stages = ndarray::Array2::<i64>::zeros((3, 2));
    let path = common::write_with_stages(dir.path(), "grid", &common::epochs(3, 4), &stages);
    assert!(matches!(
        load_recording(&path, &DataConfig::default()),
        Err(LoadError::Npz { .. })
    ));
}

#[test]
fn unknown_label_dtype_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let stages = ndarray::arr1(&[true, false, true]);
    let path = common::write_with_stages(dir.path(), "flags", &common::epochs(3, 4), &stages);
    assert!(matches!(
        load_recording(&path, &DataConfig::default()),
        Err(LoadError::UnsupportedDtype { .. })
    ));
}

#[test]
fn missing_array_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = common::write_recording(dir.path(), "x", &common::epochs(5, 4), &[0; 5]);
    let cfg = DataConfig {
        stage_key: "labels".into(),
        ..DataConfig::default()
    };
    assert!(matches!(
        load_recording(&path, &cfg),
        Err(LoadError::MissingArray { .. })
    ));
}

#[test]
fn split_then_train_windows_then_predict() {
    let dir = TempDir::new().unwrap();
    let files = write_dataset(&dir, 20);
    let config = Config::default();

    let (train, test, val) = train_test_validation_split(&files, &config.split);
    let all: BTreeSet<_> = train.iter().chain(&test).chain(&val).collect();
    assert_eq!(all.len(), 20);
    assert_eq!(test.len(), 3);
    assert_eq!(val.len(), 2);

    let train_data = load_recordings(&train, &config.data).unwrap();
    let mut gen = WindowGenerator::with_seed(
        &train_data,
        config.window.clone(),
        config.rescale.clone(),
        Some(42),
    );
    for _ in 0..35 {
        let pair = gen.pull().unwrap();
        assert_eq!(pair.raw.ndim(), 4);
        assert_eq!(pair.raw.shape(), &[1, 100, 30, 1]);
        assert_eq!(pair.stages.shape(), &[1, 100, 1]);
        assert!(pair.raw.iter().all(|v| (-5.0..=5.0).contains(v)));
    }

    let test_data = load_recordings(&test, &config.data).unwrap();
    let preds = predict_stages(&mut FirstSample, &test_data, &config.rescale).unwrap();
    assert_eq!(preds.len(), 3);
    for p in &preds {
        assert_eq!(p.stage_values.len(), p.predicted_stages.len());
        assert_eq!(p.raw_values.len(), p.stage_values.len() * 30);
    }
}

#[test]
fn predictions_are_handed_off_as_yaml() {
    let dir = TempDir::new().unwrap();
    let files = write_dataset(&dir, 2);
    let reports = dir.path().join("reports");
    let plots = dir.path().join("plots");
    std::fs::create_dir_all(&reports).unwrap();

    let data = load_recordings(&files, &DataConfig::default()).unwrap();
    let preds = predict_stages(&mut FirstSample, &data, &Rescale::default()).unwrap();
    let mut sink = YamlHandoff::new();
    hand_off(&preds, &mut sink, &plots, &reports).unwrap();

    let names: Vec<_> = sink
        .written()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["SC4000E0.yaml", "SC4001E0.yaml", "summary.yaml"]);

    let summary: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(reports.join("summary.yaml")).unwrap())
            .unwrap();
    assert_eq!(summary["name"].as_str(), Some("summary"));
    let truth = summary["stage_values"].as_sequence().unwrap();
    let predicted = summary["predicted_stages"].as_sequence().unwrap();
    assert_eq!(truth.len(), 150 + 163);
    assert_eq!(truth.len(), predicted.len());
}

#[test]
fn one_window_recording_hits_the_boundary() {
    // 0, 20, ..., 1980: exactly one window at the default size.
    let raw = Array::from_shape_fn(IxDyn(&[100]), |ix| ix[0] as f32 * 20.0);
    let recording = Recording::new(raw.clone(), ndarray::Array1::zeros(100)).unwrap();

    let prepared = prepare_for_model(raw, &Rescale::default()).unwrap();
    assert_eq!(prepared.shape(), &[1, 1, 1, 100]);
    assert!(prepared.iter().all(|v| (0.0..=5.0).contains(v)));
    assert_eq!(prepared[[0, 0, 0, 1]], 1.0);

    let mut data = RecordingSet::new();
    data.insert("one_window".into(), recording);
    let mut gen = WindowGenerator::with_seed(&data, WindowConfig::default(), Rescale::default(), Some(0));
    assert!(matches!(
        gen.pull(),
        Err(PreconditionError::WindowTooLarge { len: 100, window_size: 100, .. })
    ));
}
