//! ONNX Runtime estimator. Input: [1, input_dim] f32; output: the first output tensor, flattened.
//! Used for the SVM, isolation forest and autoencoder artifacts.

use super::{Estimator, ModelError};
use ndarray::{Array2, CowArray};
use ort::{Environment, GraphOptimizationLevel, Session, SessionBuilder, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

static ORT_ENV: OnceLock<Result<Arc<Environment>, String>> = OnceLock::new();

fn environment() -> Result<Arc<Environment>, String> {
    ORT_ENV
        .get_or_init(|| {
            Environment::builder()
                .with_name("risk-scoring")
                .build()
                .map(|env| env.into_arc())
                .map_err(|e| e.to_string())
        })
        .clone()
}

pub struct OnnxEstimator {
    session: Session,
    input_dim: usize,
    path: PathBuf,
}

impl OnnxEstimator {
    /// Load a model file. A missing or unreadable file is an error; there is no no-op mode.
    pub fn load(path: &Path, input_dim: usize) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }
        let load_err = |reason: String| ModelError::Load {
            path: path.to_path_buf(),
            reason,
        };

        let env = environment().map_err(load_err)?;
        let session = SessionBuilder::new(&env)
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level1))
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.with_model_from_file(path))
            .map_err(|e| load_err(e.to_string()))?;

        tracing::info!(path = %path.display(), input_dim, "ONNX model loaded");
        Ok(Self {
            session,
            input_dim,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Estimator for OnnxEstimator {
    fn run(&self, input: &[f32]) -> Result<Vec<f32>, ModelError> {
        if input.len() != self.input_dim {
            return Err(ModelError::Inference(format!(
                "expected {} features, got {}",
                self.input_dim,
                input.len()
            )));
        }
        let infer_err = |e: ort::OrtError| ModelError::Inference(e.to_string());

        let arr = Array2::from_shape_vec((1, self.input_dim), input.to_vec())
            .map_err(|e| ModelError::Inference(e.to_string()))?;
        let arr = CowArray::from(arr.into_dyn());
        let value = Value::from_array(self.session.allocator(), &arr).map_err(infer_err)?;

        let outputs = self.session.run(vec![value]).map_err(infer_err)?;
        let first = outputs
            .first()
            .ok_or_else(|| ModelError::Inference("model produced no outputs".into()))?;
        let tensor = first.try_extract::<f32>().map_err(infer_err)?;
        let values: Vec<f32> = tensor.view().iter().copied().collect();
        Ok(values)
    }
}
