use std::io::{BufWriter, ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{PairSource, TrainingPair};

/// Metric a policy watches at the end of each epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Monitor {
    ValAcc,
    ValLoss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Max,
    Min,
    Auto,
}

impl Monitor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Monitor::ValAcc => "val_acc",
            Monitor::ValLoss => "val_loss",
        }
    }
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Max => "max",
            Mode::Min => "min",
            Mode::Auto => "auto",
        }
    }
}

/// Side effects the training engine applies between epochs.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingPolicy {
    /// Write the weights to `path` whenever the monitored metric improves.
    CheckpointOnBest {
        path: PathBuf,
        monitor: Monitor,
        mode: Mode,
    },
    /// Stop once the metric has not improved for `patience` epochs.
    StopOnPlateau {
        monitor: Monitor,
        mode: Mode,
        patience: usize,
    },
    /// Lower the learning rate once the metric has not improved for `patience` epochs.
    ReduceLrOnPlateau {
        monitor: Monitor,
        mode: Mode,
        patience: usize,
    },
}

impl TrainingPolicy {
    /// Command-line form understood by external trainers.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            TrainingPolicy::CheckpointOnBest {
                path,
                monitor,
                mode,
            } => vec![
                "--checkpoint".into(),
                path.display().to_string(),
                "--checkpoint-monitor".into(),
                monitor.as_str().into(),
                "--checkpoint-mode".into(),
                mode.as_str().into(),
            ],
            TrainingPolicy::StopOnPlateau {
                monitor,
                mode,
                patience,
            } => vec![
                "--early-stopping-patience".into(),
                patience.to_string(),
                "--early-stopping-monitor".into(),
                monitor.as_str().into(),
                "--early-stopping-mode".into(),
                mode.as_str().into(),
            ],
            TrainingPolicy::ReduceLrOnPlateau {
                monitor,
                mode,
                patience,
            } => vec![
                "--reduce-lr-patience".into(),
                patience.to_string(),
                "--reduce-lr-monitor".into(),
                monitor.as_str().into(),
                "--reduce-lr-mode".into(),
                mode.as_str().into(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub epochs: usize,
    pub steps_per_epoch: usize,
    pub validation_steps: usize,
    pub monitor: Monitor,
    pub mode: Mode,
    pub early_stopping_patience: usize,
    pub reduce_lr_patience: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            steps_per_epoch: 1000,
            validation_steps: 300,
            monitor: Monitor::ValAcc,
            mode: Mode::Max,
            early_stopping_patience: 10,
            reduce_lr_patience: 5,
        }
    }
}

/// How long to train and what to do along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct FitPlan {
    pub epochs: usize,
    pub steps_per_epoch: usize,
    pub validation_steps: usize,
    pub policies: Vec<TrainingPolicy>,
}

impl FitPlan {
    /// Checkpoint on best, early stopping and learning-rate decay, all
    /// watching the same metric.
    pub fn new(config: &FitConfig, model_path: PathBuf) -> Self {
        let (monitor, mode) = (config.monitor, config.mode);
        Self {
            epochs: config.epochs,
            steps_per_epoch: config.steps_per_epoch,
            validation_steps: config.validation_steps,
            policies: vec![
                TrainingPolicy::CheckpointOnBest {
                    path: model_path,
                    monitor,
                    mode,
                },
                TrainingPolicy::StopOnPlateau {
                    monitor,
                    mode,
                    patience: config.early_stopping_patience,
                },
                TrainingPolicy::ReduceLrOnPlateau {
                    monitor,
                    mode,
                    patience: config.reduce_lr_patience,
                },
            ],
        }
    }
}

/// The engine that owns the network and its optimiser. It pulls as many
/// examples as it needs; the sources are abandoned when it returns.
pub trait TrainingEngine {
    fn fit(
        &mut self,
        train: &mut dyn PairSource,
        validation: &mut dyn PairSource,
        plan: &FitPlan,
    ) -> anyhow::Result<()>;
}

/// Program used as the training engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

pub const TRAIN_FRAME: u8 = 0;
pub const VALIDATION_FRAME: u8 = 1;

/// Writes one pair: tag byte, raw window as little-endian f32, stage codes as u8.
pub fn write_frame<W: Write>(out: &mut W, tag: u8, pair: &TrainingPair) -> std::io::Result<()> {
    out.write_all(&[tag])?;
    for v in pair.raw.iter() {
        out.write_all(&v.to_le_bytes())?;
    }
    let stages: Vec<u8> = pair.stages.iter().copied().collect();
    out.write_all(&stages)
}

/// ExternalTrainer runs a training program as a child process and feeds it
/// examples over stdin.
///
/// Per epoch the program receives `steps_per_epoch` train frames followed by
/// `validation_steps` validation frames. The plan and policies are passed as
/// arguments. Closing stdin early ends the stream, which is how the program
/// signals early stopping.
pub struct ExternalTrainer {
    config: TrainerConfig,
}

impl ExternalTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    fn command(&self, plan: &FitPlan, raw_shape: &[usize], stage_shape: &[usize]) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg("--epochs")
            .arg(plan.epochs.to_string())
            .arg("--steps-per-epoch")
            .arg(plan.steps_per_epoch.to_string())
            .arg("--validation-steps")
            .arg(plan.validation_steps.to_string())
            .arg("--raw-shape")
            .arg(join_shape(raw_shape))
            .arg("--stage-shape")
            .arg(join_shape(stage_shape));
        for policy in &plan.policies {
            cmd.args(policy.to_args());
        }
        cmd.stdin(Stdio::piped());
        cmd
    }
}

fn join_shape(shape: &[usize]) -> String {
    shape
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Result of streaming into the trainer.
enum Stream {
    Finished,
    ClosedEarly,
}

fn stream<W: Write>(
    out: &mut W,
    first: TrainingPair,
    train: &mut dyn PairSource,
    validation: &mut dyn PairSource,
    plan: &FitPlan,
) -> anyhow::Result<Stream> {
    let mut pending = Some(first);
    for epoch in 0..plan.epochs {
        for _ in 0..plan.steps_per_epoch {
            let pair = match pending.take() {
                Some(p) => p,
                None => train.pull()?,
            };
            if let Err(e) = write_frame(out, TRAIN_FRAME, &pair) {
                return closed_or_fail(e);
            }
        }
        for _ in 0..plan.validation_steps {
            let pair = validation.pull()?;
            if let Err(e) = write_frame(out, VALIDATION_FRAME, &pair) {
                return closed_or_fail(e);
            }
        }
        if let Err(e) = out.flush() {
            return closed_or_fail(e);
        }
        info!("epoch {}/{} streamed", epoch + 1, plan.epochs);
    }
    Ok(Stream::Finished)
}

fn closed_or_fail(e: std::io::Error) -> anyhow::Result<Stream> {
    if e.kind() == ErrorKind::BrokenPipe {
        Ok(Stream::ClosedEarly)
    } else {
        Err(e.into())
    }
}

impl TrainingEngine for ExternalTrainer {
    fn fit(
        &mut self,
        train: &mut dyn PairSource,
        validation: &mut dyn PairSource,
        plan: &FitPlan,
    ) -> anyhow::Result<()> {
        if self.config.program.is_empty() {
            anyhow::bail!("no training program configured");
        }

        // The first pair fixes the frame layout announced to the program.
        let first = train.pull()?;
        let mut cmd = self.command(plan, first.raw.shape(), first.stages.shape());
        info!("spawning trainer: {:?}", &cmd);
        let mut child = cmd.spawn()?;

        let stdin = match child.stdin.take() {
            Some(s) => s,
            None => anyhow::bail!("trainer stdin was not captured"),
        };
        let mut out = BufWriter::new(stdin);
        let streamed = stream(&mut out, first, train, validation, plan);
        // Closing stdin tells the program the stream is over.
        drop(out);

        let status = child.wait()?;
        if let Stream::ClosedEarly = streamed? {
            warn!("trainer stopped reading before the last epoch");
        }
        if !status.success() {
            anyhow::bail!("trainer exited with {}", status);
        }
        Ok(())
    }
}
