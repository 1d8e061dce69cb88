use ndarray::{Array4, ArrayD, Axis, Ix4};
use serde::{Deserialize, Serialize};

use crate::PreconditionError;

/// Rank every model input is brought to: (batch, time, samples, channels).
pub const MODEL_RANK: usize = 4;

/// Amplitude rescaling applied to every raw value before it reaches the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rescale {
    pub scale: f32,        // multiplier for the raw value
    pub clamp: (f32, f32), // bounds for the scaled value
}

impl Default for Rescale {
    fn default() -> Self {
        Self::with_scale(0.05)
    }
}

impl Rescale {
    /// Clip bounds follow the scale: `[-scale * 100, scale * 100]`.
    pub fn with_scale(scale: f32) -> Self {
        let bound = (scale * 100.0).abs();
        Self {
            scale,
            clamp: (-bound, bound),
        }
    }

    /// Scales and clips one value. NaN passes through unchanged.
    pub fn apply(&self, raw: f32) -> f32 {
        let (lo, hi) = self.clamp;
        let v = raw * self.scale;
        if v > hi {
            hi
        } else if v < lo {
            lo
        } else {
            v
        }
    }

    pub fn validate(&self) -> Result<(), PreconditionError> {
        let (lo, hi) = self.clamp;
        if lo <= hi {
            Ok(())
        } else {
            Err(PreconditionError::InvalidClamp { lo, hi })
        }
    }
}

/// Brings `array` to rank 4 by prepending singleton axes, then rescales and
/// clips every value. Used for training windows and full recordings alike.
pub fn prepare_for_model(
    array: ArrayD<f32>,
    rescale: &Rescale,
) -> Result<Array4<f32>, PreconditionError> {
    if array.ndim() > MODEL_RANK {
        return Err(PreconditionError::RankTooHigh(array.ndim()));
    }

    let mut array = array;
    while array.ndim() != MODEL_RANK {
        array = array.insert_axis(Axis(0));
    }
    array.mapv_inplace(|v| rescale.apply(v));

    // Rank was checked above.
    array
        .into_dimensionality::<Ix4>()
        .map_err(|_| PreconditionError::RankTooHigh(MODEL_RANK + 1))
}
