use ndarray::{ArrayD, ArrayViewD, Axis};
use serde::Serialize;
use tracing::info;

use crate::{prepare_for_model, RecordingSet, Rescale, StageClassifier};

/// Model output for one recording, flattened for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagePrediction {
    pub key: String,
    pub raw_values: Vec<f32>,
    pub stage_values: Vec<u8>,
    pub predicted_stages: Vec<u8>,
}

/// Index of the largest value along the last axis. The first maximum wins.
pub fn argmax_last_axis(probabilities: ArrayViewD<'_, f32>) -> ArrayD<u8> {
    let last = Axis(probabilities.ndim().saturating_sub(1));
    probabilities.map_axis(last, |lane| {
        let mut best = 0;
        for (i, &p) in lane.iter().enumerate() {
            if p > lane[best] {
                best = i;
            }
        }
        best as u8
    })
}

/// Logical (row-major) order, regardless of memory layout.
pub fn flatten<T: Clone>(array: ArrayViewD<'_, T>) -> Vec<T> {
    array.iter().cloned().collect()
}

/// Runs the classifier over every full recording, in the set's order.
pub fn predict_stages(
    classifier: &mut dyn StageClassifier,
    recordings: &RecordingSet,
    rescale: &Rescale,
) -> anyhow::Result<Vec<StagePrediction>> {
    let total = recordings.len();
    let mut out = Vec::with_capacity(total);

    for (i, (key, recording)) in recordings.iter().enumerate() {
        let input = prepare_for_model(recording.raw().to_owned(), rescale)?;
        let probabilities = classifier.predict(&input)?;
        let predicted = argmax_last_axis(probabilities.view());

        out.push(StagePrediction {
            key: key.clone(),
            raw_values: flatten(input.view().into_dyn()),
            stage_values: recording.stages().to_vec(),
            predicted_stages: flatten(predicted.view()),
        });
        info!("[{}/{}] predicted {}", i + 1, total, key);
    }

    Ok(out)
}

/// Ground truth and predictions of every recording, concatenated in order.
pub fn summarize(predictions: &[StagePrediction]) -> (Vec<u8>, Vec<u8>) {
    let mut stage_values = Vec::new();
    let mut predicted_stages = Vec::new();
    for p in predictions {
        stage_values.extend_from_slice(&p.stage_values);
        predicted_stages.extend_from_slice(&p.predicted_stages);
    }
    (stage_values, predicted_stages)
}
