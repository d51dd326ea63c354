//! Mode dispatch over the per-target power models
//!
//! Models are loaded lazily on each call. Batch callers can opt into a
//! cache, which is safe because loaded models are never mutated.

use super::{ModelSource, PowerModel};
use crate::models::{FeatureVector, PowerPrediction, PowerTarget, PredictionMode};
use crate::observability::PipelineMetrics;
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::info;

/// Evaluates the model(s) selected by a prediction mode
pub struct PowerPredictor<S: ModelSource> {
    source: S,
    cache: Option<RwLock<HashMap<PowerTarget, Arc<dyn PowerModel>>>>,
    metrics: PipelineMetrics,
}

impl<S: ModelSource> PowerPredictor<S> {
    /// Create a predictor that reloads models on every call
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: None,
            metrics: PipelineMetrics::new(),
        }
    }

    /// Create a predictor that keeps models loaded across calls
    pub fn with_cache(source: S) -> Self {
        Self {
            source,
            cache: Some(RwLock::new(HashMap::new())),
            metrics: PipelineMetrics::new(),
        }
    }

    /// Predict wattage for every target of the mode
    ///
    /// The model output is returned as-is, with no clamping or rounding.
    pub fn predict(&self, features: &FeatureVector, mode: PredictionMode) -> Result<PowerPrediction> {
        let start = Instant::now();
        let mut prediction = PowerPrediction::new();

        for target in mode.targets() {
            let model = self.model(target)?;
            let watts = model.predict(features).map_err(|e| {
                self.metrics.inc_prediction_errors();
                e.context(format!("{target} model evaluation failed"))
            })?;
            info!(power_target = %target, watts, "Predicted {} power: {:.2} watts", target, watts);
            prediction.insert(target, watts);
        }

        self.metrics.observe_prediction_latency(start.elapsed().as_secs_f64());
        self.metrics.inc_predictions_generated();
        Ok(prediction)
    }

    /// Parse a textual mode and predict
    ///
    /// An unknown mode is rejected before any model is loaded.
    pub fn predict_str(&self, features: &FeatureVector, mode: &str) -> Result<PowerPrediction> {
        let mode: PredictionMode = mode.parse()?;
        self.predict(features, mode)
    }

    fn model(&self, target: PowerTarget) -> Result<Arc<dyn PowerModel>> {
        let Some(cache) = &self.cache else {
            return self
                .source
                .load(target)
                .with_context(|| format!("Failed to load {target} model"));
        };

        if let Some(model) = cache
            .read()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?
            .get(&target)
        {
            return Ok(Arc::clone(model));
        }

        let model = self
            .source
            .load(target)
            .with_context(|| format!("Failed to load {target} model"))?;
        cache
            .write()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?
            .insert(target, Arc::clone(&model));
        Ok(model)
    }
}
