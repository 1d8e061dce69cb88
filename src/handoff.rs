use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::{summarize, StagePrediction};

/// Name under which the all-recordings aggregate is reported.
pub const SUMMARY_NAME: &str = "summary";

/// Everything the plotting and reporting tools need for one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRequest<'a> {
    pub name: &'a str,
    pub stage_values: &'a [u8],
    pub predicted_stages: &'a [u8],
    pub plot_dir: &'a Path,
    pub report_dir: &'a Path,
}

/// Consumer of finished predictions.
pub trait ReportSink {
    fn submit(&mut self, request: &ReportRequest<'_>) -> anyhow::Result<()>;
}

/// Serialises each request to `<report_dir>/<name>.yaml` for the external
/// reporting tools to pick up.
#[derive(Debug, Default)]
pub struct YamlHandoff {
    written: Vec<PathBuf>,
}

impl YamlHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl ReportSink for YamlHandoff {
    fn submit(&mut self, request: &ReportRequest<'_>) -> anyhow::Result<()> {
        let path = request.report_dir.join(format!("{}.yaml", request.name));
        let out = BufWriter::new(File::create(&path)?);
        serde_yaml::to_writer(out, request)?;
        self.written.push(path);
        Ok(())
    }
}

/// Submits one request per recording, then the summary over all of them.
pub fn hand_off(
    predictions: &[StagePrediction],
    sink: &mut dyn ReportSink,
    plot_dir: &Path,
    report_dir: &Path,
) -> anyhow::Result<()> {
    for p in predictions {
        sink.submit(&ReportRequest {
            name: &p.key,
            stage_values: &p.stage_values,
            predicted_stages: &p.predicted_stages,
            plot_dir,
            report_dir,
        })?;
    }

    let (stage_values, predicted_stages) = summarize(predictions);
    let agree = stage_values
        .iter()
        .zip(&predicted_stages)
        .filter(|(a, b)| a == b)
        .count();
    info!(
        "{} recordings, {} epochs, {} predicted as scored",
        predictions.len(),
        stage_values.len(),
        agree
    );

    sink.submit(&ReportRequest {
        name: SUMMARY_NAME,
        stage_values: &stage_values,
        predicted_stages: &predicted_stages,
        plot_dir,
        report_dir,
    })
}
