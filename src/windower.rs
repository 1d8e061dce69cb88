use ndarray::{Array3, Array4, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{prepare_for_model, PreconditionError, RecordingSet, Rescale};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Length of every window along the time axis.
    pub window_size: usize,
    /// Windows drawn from one recording before another one is chosen.
    pub count: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size: 100,
            count: 10,
        }
    }
}

/// One training example.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingPair {
    /// Prepared raw window, shape (1, window_size, ..) padded to rank 4.
    pub raw: Array4<f32>,
    /// Stage codes, shape (1, window_size, 1).
    pub stages: Array3<u8>,
}

/// Something a training loop can pull examples from. The consumer decides how
/// many pulls make an epoch; sources never run dry on their own.
pub trait PairSource {
    fn pull(&mut self) -> Result<TrainingPair, PreconditionError>;
}

/// WindowGenerator draws random fixed-length windows from a set of
/// recordings, `count` at a time from the same recording.
pub struct WindowGenerator<'a> {
    recordings: &'a RecordingSet,
    keys: Vec<&'a str>,
    config: WindowConfig,
    rescale: Rescale,
    rng: StdRng,
    current: Option<&'a str>,
    remaining: usize,
}

impl<'a> WindowGenerator<'a> {
    pub fn new(
        recordings: &'a RecordingSet,
        config: WindowConfig,
        rescale: Rescale,
        rng: StdRng,
    ) -> Self {
        Self {
            keys: recordings.keys().map(String::as_str).collect(),
            recordings,
            config,
            rescale,
            rng,
            current: None,
            remaining: 0,
        }
    }

    /// Seeds the generator's random stream, or draws one from the OS.
    pub fn with_seed(
        recordings: &'a RecordingSet,
        config: WindowConfig,
        rescale: Rescale,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self::new(recordings, config, rescale, rng)
    }

    fn choose_recording(&mut self) -> Result<&'a str, PreconditionError> {
        if self.keys.is_empty() {
            return Err(PreconditionError::EmptyRecordingSet);
        }
        let key = self.keys[self.rng.gen_range(0..self.keys.len())];
        let len = self.recordings[key].len();

        // Start offsets come from [0, len - window_size), which must not be empty.
        if len <= self.config.window_size {
            return Err(PreconditionError::WindowTooLarge {
                key: key.to_string(),
                len,
                window_size: self.config.window_size,
            });
        }
        debug!("drawing {} windows from {}", self.config.count, key);
        Ok(key)
    }
}

impl PairSource for WindowGenerator<'_> {
    fn pull(&mut self) -> Result<TrainingPair, PreconditionError> {
        let key = match self.current {
            Some(key) if self.remaining > 0 => key,
            _ => {
                let key = self.choose_recording()?;
                self.current = Some(key);
                self.remaining = self.config.count.max(1);
                key
            }
        };
        self.remaining -= 1;

        let recording = &self.recordings[key];
        let size = self.config.window_size;
        let start = self.rng.gen_range(0..recording.len() - size);
        let (raw, stages) = recording.window(start, size).ok_or_else(|| {
            PreconditionError::WindowTooLarge {
                key: key.to_string(),
                len: recording.len(),
                window_size: size,
            }
        })?;

        let raw = prepare_for_model(raw.to_owned(), &self.rescale)?;
        let stages = stages.to_owned().insert_axis(Axis(1)).insert_axis(Axis(0));

        Ok(TrainingPair { raw, stages })
    }
}

impl Iterator for WindowGenerator<'_> {
    type Item = Result<TrainingPair, PreconditionError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.pull())
    }
}
