//! Loaded model artifacts and the per-dimension adapters that turn their native
//! outputs into 0-100 sub-scores.

pub mod adapters;
pub mod centroid;
pub mod loader;
pub mod onnx;

pub use adapters::{DatetimeAdapter, GeolocationAdapter, IpAdapter, ModelAdapter, UserAgentAdapter};
pub use centroid::CentroidEstimator;
pub use loader::{Calibration, Manifest, ModelLoader, ModelSet};
pub use onnx::OnnxEstimator;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model artifact not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to load model {path}: {reason}")]
    Load { path: PathBuf, reason: String },
    #[error("invalid model manifest: {0}")]
    Manifest(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// A loaded, read-only model: one flat f32 input row in, the first output tensor out.
pub trait Estimator: Send + Sync {
    fn run(&self, input: &[f32]) -> Result<Vec<f32>, ModelError>;
}
