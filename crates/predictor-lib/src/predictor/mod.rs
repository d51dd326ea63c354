//! Power prediction engine

mod engine;
mod features;
mod inference;

pub use engine::PowerPredictor;
pub use features::{FeatureVectorBuilder, FEATURE_NAMES, NUM_FEATURES};
pub use inference::{model_file_name, ModelDirectory, OnnxPowerModel};

use crate::models::{FeatureVector, PowerTarget};
use anyhow::Result;
use std::sync::Arc;

/// Trait for a loaded regression model
pub trait PowerModel: Send + Sync {
    /// Estimate wattage from the pinned feature vector
    fn predict(&self, features: &FeatureVector) -> Result<f64>;
}

/// Trait for locating and loading the model of a prediction target
pub trait ModelSource: Send + Sync {
    fn load(&self, target: PowerTarget) -> Result<Arc<dyn PowerModel>>;
}
