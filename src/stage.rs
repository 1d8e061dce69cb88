use serde::{Deserialize, Serialize};

use crate::PreconditionError;

/// Number of distinct stage codes the classifier predicts.
pub const NUM_STAGES: usize = 6;

/// A scored sleep stage. The discriminant is the integer code stored in the
/// label arrays and predicted by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Stage {
    W = 0,
    N1 = 1,
    N2 = 2,
    N3 = 3,
    Rem = 4,
    Unknown = 5,
}

impl Stage {
    pub const ALL: [Stage; NUM_STAGES] = [
        Stage::W,
        Stage::N1,
        Stage::N2,
        Stage::N3,
        Stage::Rem,
        Stage::Unknown,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Maps a hypnogram annotation to its stage. Stage 4 is merged into N3
    /// and movement time is treated as unscored.
    pub fn from_annotation(text: &str) -> Option<Stage> {
        match text {
            "Sleep stage W" => Some(Stage::W),
            "Sleep stage 1" => Some(Stage::N1),
            "Sleep stage 2" => Some(Stage::N2),
            "Sleep stage 3" | "Sleep stage 4" => Some(Stage::N3),
            "Sleep stage R" => Some(Stage::Rem),
            "Sleep stage ?" | "Movement time" => Some(Stage::Unknown),
            _ => None,
        }
    }
}

impl TryFrom<i64> for Stage {
    type Error = PreconditionError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Stage::W),
            1 => Ok(Stage::N1),
            2 => Ok(Stage::N2),
            3 => Ok(Stage::N3),
            4 => Ok(Stage::Rem),
            5 => Ok(Stage::Unknown),
            _ => Err(PreconditionError::InvalidStage(code)),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::W => "W",
            Stage::N1 => "N1",
            Stage::N2 => "N2",
            Stage::N3 => "N3",
            Stage::Rem => "REM",
            Stage::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for stage in Stage::ALL {
            assert_eq!(Stage::try_from(stage.code() as i64).unwrap(), stage);
        }
    }

    #[test]
    fn stage_four_collapses_into_n3() {
        assert_eq!(Stage::from_annotation("Sleep stage 3"), Some(Stage::N3));
        assert_eq!(Stage::from_annotation("Sleep stage 4"), Some(Stage::N3));
        assert_eq!(Stage::from_annotation("Movement time"), Some(Stage::Unknown));
        assert_eq!(Stage::from_annotation("Lights off"), None);
    }

    #[test]
    fn out_of_range_code_is_rejected() {
        assert!(matches!(
            Stage::try_from(6),
            Err(PreconditionError::InvalidStage(6))
        ));
        assert!(Stage::try_from(-1).is_err());
    }
}
