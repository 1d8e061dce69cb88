use serde::{Deserialize, Serialize};
use std::path::Path;

mod error;
pub use error::{LoadError, PreconditionError};

mod stage;
pub use stage::{Stage, NUM_STAGES};

mod recording;
pub use recording::{Recording, RecordingSet};

mod loader;
pub use loader::{discover_files, load_recording, load_recordings, recording_key, DataConfig};

mod split;
pub use split::{train_test_validation_split, SplitConfig};

mod rescale;
pub use rescale::{prepare_for_model, Rescale, MODEL_RANK};

mod windower;
pub use windower::{PairSource, TrainingPair, WindowConfig, WindowGenerator};

mod runner;
pub use runner::{OnnxStageModel, StageClassifier};

mod predict;
pub use predict::{argmax_last_axis, flatten, predict_stages, summarize, StagePrediction};

mod trainer;
pub use trainer::{
    write_frame, ExternalTrainer, FitConfig, FitPlan, Mode, Monitor, TrainerConfig,
    TrainingEngine, TrainingPolicy, TRAIN_FRAME, VALIDATION_FRAME,
};

mod handoff;
pub use handoff::{hand_off, ReportRequest, ReportSink, YamlHandoff, SUMMARY_NAME};

/// Every tunable of a run. Each section falls back to its defaults, so a
/// YAML file only needs the values it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub window: WindowConfig,
    pub rescale: Rescale,
    pub split: SplitConfig,
    pub fit: FitConfig,
    pub trainer: TrainerConfig,
    /// Seed for the training generator; the validation generator uses the
    /// next value. Unset draws both from the OS.
    pub generator_seed: Option<u64>,
}

impl Config {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&text)?;
        config.rescale.validate()?;
        Ok(config)
    }
}
