use indexmap::IndexMap;
use ndarray::{Array1, ArrayD, ArrayView1, ArrayViewD, Axis, Slice};

use crate::{PreconditionError, Stage};

/// Recordings keyed by their file stem, iterated in insertion order.
pub type RecordingSet = IndexMap<String, Recording>;

/// One subject-session: the EEG signal and its per-epoch stage labels.
///
/// The first axis of `raw` is the time axis and has exactly one entry per
/// stage label.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    raw: ArrayD<f32>,
    stages: Array1<u8>,
}

impl Recording {
    pub fn new(raw: ArrayD<f32>, stages: Array1<u8>) -> Result<Self, PreconditionError> {
        if raw.ndim() == 0 {
            return Err(PreconditionError::ScalarRaw);
        }
        let raw_len = raw.len_of(Axis(0));
        if raw_len != stages.len() {
            return Err(PreconditionError::LengthMismatch {
                raw: raw_len,
                stage: stages.len(),
            });
        }
        for &code in stages.iter() {
            Stage::try_from(code as i64)?;
        }
        Ok(Self { raw, stages })
    }

    /// Builds a recording from stage codes as stored on disk, rejecting any
    /// code outside the known stages.
    pub fn from_codes(raw: ArrayD<f32>, codes: &[i64]) -> Result<Self, PreconditionError> {
        let stages = codes
            .iter()
            .map(|&c| Stage::try_from(c).map(Stage::code))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(raw, Array1::from(stages))
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn raw(&self) -> ArrayViewD<'_, f32> {
        self.raw.view()
    }

    pub fn stages(&self) -> ArrayView1<'_, u8> {
        self.stages.view()
    }

    /// The `size` entries starting at `start`, along the time axis, or `None`
    /// when they run past the end.
    pub fn window(
        &self,
        start: usize,
        size: usize,
    ) -> Option<(ArrayViewD<'_, f32>, ArrayView1<'_, u8>)> {
        let end = start.checked_add(size)?;
        if end > self.len() {
            return None;
        }
        let range = Slice::from(start..end);
        Some((
            self.raw.slice_axis(Axis(0), range),
            self.stages.slice_axis(Axis(0), range),
        ))
    }
}
