use std::path::{Path, PathBuf};

use ndarray::{Array4, ArrayD};
use tract_onnx::prelude::*;
use tracing::{debug, info};

/// Anything that maps a prepared (batch, time, samples, channels) input to
/// per-timestep class probabilities. The class axis is last.
pub trait StageClassifier {
    fn predict(&mut self, input: &Array4<f32>) -> anyhow::Result<ArrayD<f32>>;
}

/// An ONNX sleep-stage model evaluated with tract.
///
/// The time axis differs between recordings, so the graph is kept in its
/// inference form and concretised for each input shape; the last optimised
/// plan is reused while the shape stays the same.
pub struct OnnxStageModel {
    path: PathBuf,
    model: InferenceModel,
    plan: Option<(Vec<usize>, TypedRunnableModel<TypedModel>)>,
}

impl OnnxStageModel {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let model = tract_onnx::onnx()
            // load the model
            .model_for_path(&path)?;
        info!("loaded model {}", path.display());

        Ok(Self {
            path,
            model,
            plan: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn plan_for(&mut self, shape: &[usize]) -> anyhow::Result<&TypedRunnableModel<TypedModel>> {
        let stale = match &self.plan {
            Some((planned, _)) => planned.as_slice() != shape,
            None => true,
        };
        if stale {
            debug!("optimising {} for input {:?}", self.path.display(), shape);
            let plan = self
                .model
                .clone()
                .with_input_fact(0, f32::fact(shape.to_vec()).into())?
                .into_optimized()?
                .into_runnable()?;
            self.plan = Some((shape.to_vec(), plan));
        }
        match &self.plan {
            Some((_, plan)) => Ok(plan),
            None => anyhow::bail!("no execution plan for {}", self.path.display()),
        }
    }
}

impl StageClassifier for OnnxStageModel {
    fn predict(&mut self, input: &Array4<f32>) -> anyhow::Result<ArrayD<f32>> {
        let plan = self.plan_for(input.shape())?;
        let tensor: Tensor = input.clone().into_dyn().into();
        let out = plan.run(tvec!(tensor.into()))?.remove(0);
        Ok(out.to_array_view::<f32>()?.to_owned())
    }
}
