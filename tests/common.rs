//! Shared helpers for writing recording files.
use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::{Array1, ArrayBase, ArrayD, Data, Dimension};
use ndarray_npy::{NpzWriter, WritableElement};

/// Writes `raw_values` (f64, as numpy saves by default) and `stage_values`
/// (i64) to `<dir>/<key>.npz`.
#[allow(unused)]
pub fn write_recording(dir: &Path, key: &str, raw: &ArrayD<f64>, stages: &[i64]) -> PathBuf {
    let path = dir.join(format!("{key}.npz"));
    let mut npz = NpzWriter::new(File::create(&path).unwrap());
    npz.add_array("raw_values", raw).unwrap();
    npz.add_array("stage_values", &Array1::from(stages.to_vec()))
        .unwrap();
    npz.finish().unwrap();
    path
}

/// A recording of `len` epochs with `samples` values each, shaped like the
/// converter's output: `[len, samples, 1]`.
#[allow(unused)]
pub fn epochs(len: usize, samples: usize) -> ArrayD<f64> {
    ArrayD::from_shape_fn(ndarray::IxDyn(&[len, samples, 1]), |ix| {
        ((ix[0] * samples + ix[1]) as f64 * 0.37).sin() * 80.0
    })
}

#[allow(unused)]
pub fn cycling_stages(len: usize) -> Vec<i64> {
    (0..len).map(|i| ((i / 7) % 6) as i64).collect()
}

/// Writes `raw_values` next to a stage array of any dtype and shape.
#[allow(unused)]
pub fn write_with_stages<S, D>(dir: &Path, key: &str, raw: &ArrayD<f64>, stages: &ArrayBase<S, D>) -> PathBuf
where
    S: Data,
    S::Elem: WritableElement,
    D: Dimension,
{
    let path = dir.join(format!("{key}.npz"));
    let mut npz = NpzWriter::new(File::create(&path).unwrap());
    npz.add_array("raw_values", raw).unwrap();
    npz.add_array("stage_values", stages).unwrap();
    npz.finish().unwrap();
    path
}
