//! Power model evaluation with tract
//!
//! Each prediction target ships as its own ONNX regressor taking a
//! `f32[1, 9]` input and producing the wattage estimate as its first
//! output value.

use super::{ModelSource, PowerModel, NUM_FEATURES};
use crate::models::{FeatureVector, PowerTarget};
use crate::observability::PipelineMetrics;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::debug;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// File name of the model for a target
pub fn model_file_name(target: PowerTarget) -> String {
    format!("cpu_power_model_{}.onnx", target.key())
}

/// Regression model evaluated with tract
pub struct OnnxPowerModel {
    model: TractModel,
}

impl OnnxPowerModel {
    /// Load and optimize an ONNX model from bytes
    pub fn from_bytes(model_bytes: &[u8]) -> Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, NUM_FEATURES]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(Self { model })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read model {}", path.display()))?;
        Self::from_bytes(&bytes).with_context(|| format!("Invalid model {}", path.display()))
    }

    fn features_to_tensor(features: &FeatureVector) -> Result<Tensor> {
        let data: Vec<f32> = features.to_array().iter().map(|v| *v as f32).collect();
        let array = tract_ndarray::Array2::from_shape_vec((1, NUM_FEATURES), data)?;
        Ok(array.into())
    }
}

impl PowerModel for OnnxPowerModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let start = Instant::now();
        let input = Self::features_to_tensor(features)?;

        let result = self.model.run(tvec!(input.into()))?;
        let output = result.first().context("No output from model")?;
        let view = output.to_array_view::<f32>()?;
        let estimate = view.iter().next().copied().context("Model output is empty")?;

        debug!(elapsed_us = start.elapsed().as_micros(), "Inference completed");
        Ok(estimate as f64)
    }
}

/// Loads models from a directory of `cpu_power_model_<key>.onnx` files
#[derive(Debug, Clone)]
pub struct ModelDirectory {
    dir: PathBuf,
    metrics: PipelineMetrics,
}

impl ModelDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn path_for(&self, target: PowerTarget) -> PathBuf {
        self.dir.join(model_file_name(target))
    }
}

impl ModelSource for ModelDirectory {
    fn load(&self, target: PowerTarget) -> Result<Arc<dyn PowerModel>> {
        let path = self.path_for(target);
        debug!(model = %target, path = %path.display(), "Loading power model");
        let model = OnnxPowerModel::from_path(&path)?;
        self.metrics.inc_model_loads();
        Ok(Arc::new(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_file_names() {
        assert_eq!(model_file_name(PowerTarget::Avg), "cpu_power_model_avg.onnx");
        assert_eq!(model_file_name(PowerTarget::Peak), "cpu_power_model_peak.onnx");
    }

    #[test]
    fn test_invalid_model_bytes_rejected() {
        assert!(OnnxPowerModel::from_bytes(b"not an onnx model").is_err());
    }

    #[test]
    fn test_missing_model_file_reports_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = ModelDirectory::new(dir.path());
        let err = source.load(PowerTarget::Min).err().unwrap();
        assert!(format!("{err:#}").contains("cpu_power_model_min.onnx"));
    }
}
