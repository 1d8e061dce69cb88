use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::{Array, ArrayD, Dimension, Ix1, IxDyn, OwnedRepr};
use ndarray_npy::{NpzReader, ReadNpyError, ReadNpzError, ReadableElement};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{LoadError, PreconditionError, Recording, RecordingSet};

/// Where recordings live on disk and how their arrays are named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub file_pattern: String,
    pub raw_key: String,
    pub stage_key: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            file_pattern: "*.npz".into(),
            raw_key: "raw_values".into(),
            stage_key: "stage_values".into(),
        }
    }
}

/// Lists the files in `dir` matching `pattern`, sorted by path.
pub fn discover_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::Io {
            path: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }

    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let full = Path::new(&escaped).join(pattern).to_string_lossy().into_owned();
    let entries = glob::glob(&full).map_err(|source| LoadError::Pattern {
        pattern: full.clone(),
        source,
    })?;

    let mut files = entries.collect::<Result<Vec<_>, _>>()?;
    files.sort();
    debug!("{} files match {}", files.len(), full);
    Ok(files)
}

/// The recording key: the file name without its extension.
pub fn recording_key(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Finds the archive entry for `name`, which numpy stores as `name.npy`.
fn entry_name(
    npz: &mut NpzReader<File>,
    path: &Path,
    name: &str,
) -> Result<String, LoadError> {
    let names = npz.names().map_err(|source| LoadError::Npz {
        path: path.to_path_buf(),
        source,
    })?;
    names
        .into_iter()
        .find(|n| n == name || n.strip_suffix(".npy") == Some(name))
        .ok_or_else(|| LoadError::MissingArray {
            path: path.to_path_buf(),
            name: name.to_string(),
        })
}

/// Reads `entry` as elements of type `A`. `Ok(None)` means the array is
/// stored with some other dtype; any other failure is an error.
fn try_read<A, D>(
    npz: &mut NpzReader<File>,
    path: &Path,
    entry: &str,
) -> Result<Option<Array<A, D>>, LoadError>
where
    A: ReadableElement,
    D: Dimension,
{
    match npz.by_name::<OwnedRepr<A>, D>(entry) {
        Ok(a) => Ok(Some(a)),
        Err(ReadNpzError::Npy(ReadNpyError::WrongDescriptor(_))) => Ok(None),
        Err(source) => Err(LoadError::Npz {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn unsupported(path: &Path, name: &str) -> LoadError {
    LoadError::UnsupportedDtype {
        path: path.to_path_buf(),
        name: name.to_string(),
    }
}

fn read_raw(npz: &mut NpzReader<File>, path: &Path, name: &str) -> Result<ArrayD<f32>, LoadError> {
    let entry = entry_name(npz, path, name)?;
    if let Some(a) = try_read::<f32, IxDyn>(npz, path, &entry)? {
        return Ok(a);
    }
    if let Some(a) = try_read::<f64, IxDyn>(npz, path, &entry)? {
        return Ok(a.mapv(|v| v as f32));
    }
    Err(unsupported(path, name))
}

/// Float labels must hold whole numbers; anything else is not a stage code.
fn whole_codes(path: &Path, values: impl Iterator<Item = f64>) -> Result<Vec<i64>, LoadError> {
    values
        .map(|v| {
            if v.is_finite() && v.fract() == 0.0 {
                Ok(v as i64)
            } else {
                Err(LoadError::Invalid {
                    path: path.to_path_buf(),
                    source: PreconditionError::FractionalStage(v),
                })
            }
        })
        .collect()
}

fn read_stages(npz: &mut NpzReader<File>, path: &Path, name: &str) -> Result<Vec<i64>, LoadError> {
    let entry = entry_name(npz, path, name)?;
    if let Some(a) = try_read::<i64, Ix1>(npz, path, &entry)? {
        return Ok(a.to_vec());
    }
    if let Some(a) = try_read::<i32, Ix1>(npz, path, &entry)? {
        return Ok(a.iter().map(|&v| v as i64).collect());
    }
    if let Some(a) = try_read::<u8, Ix1>(npz, path, &entry)? {
        return Ok(a.iter().map(|&v| v as i64).collect());
    }
    if let Some(a) = try_read::<f64, Ix1>(npz, path, &entry)? {
        return whole_codes(path, a.iter().copied());
    }
    if let Some(a) = try_read::<f32, Ix1>(npz, path, &entry)? {
        return whole_codes(path, a.iter().map(|&v| v as f64));
    }
    Err(unsupported(path, name))
}

/// Reads one recording file.
pub fn load_recording(path: &Path, config: &DataConfig) -> Result<Recording, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut npz = NpzReader::new(file).map_err(|source| LoadError::Npz {
        path: path.to_path_buf(),
        source,
    })?;

    let raw = read_raw(&mut npz, path, &config.raw_key)?;
    let stages = read_stages(&mut npz, path, &config.stage_key)?;

    Recording::from_codes(raw, &stages).map_err(|source| LoadError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads every file into memory, keyed by [`recording_key`], in the order of
/// `paths`. The whole set is held for the rest of the run.
pub fn load_recordings(paths: &[PathBuf], config: &DataConfig) -> Result<RecordingSet, LoadError> {
    let mut out = RecordingSet::new();
    for path in paths {
        let recording = load_recording(path, config)?;
        debug!("loaded {} ({} epochs)", path.display(), recording.len());
        out.insert(recording_key(path), recording);
    }
    info!("loaded {} recordings", out.len());
    Ok(out)
}
