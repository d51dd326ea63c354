//! Predictor library for CPU power estimation
//!
//! This crate provides the core functionality for:
//! - Reconciling raw profiler reports into normalized metric aggregates
//! - Building the pinned feature vector consumed by the power models
//! - ONNX-based min/avg/peak power prediction
//! - RAPL package-energy sampling of a workload
//! - Driving the external profiler and observability

pub mod cpu;
pub mod energy;
pub mod error;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod predictor;
pub mod profiler;
pub mod reconciler;

pub use error::PowerError;
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
