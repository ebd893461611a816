//! Startup model loading from a manifest-described directory.
//!
//! `manifest.json` names one artifact per dimension plus its calibration:
//!
//! ```json
//! {
//!   "version": "1.0.0",
//!   "ip":          { "artifact": "ip_svm.onnx",           "calibration": { "decisionRange": 5.0 } },
//!   "datetime":    { "artifact": "datetime_iforest.onnx", "calibration": { "offset": 0.5 } },
//!   "useragent":   { "artifact": "useragent_ae.onnx",     "calibration": { "threshold": 0.08 } },
//!   "geolocation": { "artifact": "geo_centroids.json",    "calibration": { "maxDistanceDeg": 50.0 } }
//! }
//! ```
//!
//! `.onnx` artifacts run through ONNX Runtime, `.json` artifacts are centroid tables.

use super::adapters::{DatetimeAdapter, GeolocationAdapter, IpAdapter, ModelAdapter, UserAgentAdapter};
use super::{CentroidEstimator, Estimator, ModelError, OnnxEstimator};
use crate::features::{Dimension, IpIntel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Model input widths per dimension.
const IP_INPUTS: usize = 10;
const DATETIME_INPUTS: usize = 10;
const USERAGENT_INPUTS: usize = 18;
const GEO_INPUTS: usize = 9;

/// Constants mapping a model's native output onto 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Calibration {
    /// One-class SVM: decision values in [-R, R] span the scale
    pub decision_range: f32,
    /// Isolation forest: scores above -offset count as normal
    pub offset: f32,
    /// Autoencoder: reconstruction error at the edge of normal
    pub threshold: f32,
    /// Centroid model: distance (degrees) that maps to 100
    pub max_distance_deg: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            decision_range: 5.0,
            offset: 0.5,
            threshold: 0.1,
            max_distance_deg: 50.0,
        }
    }
}

impl Calibration {
    fn validate(&self, dimension: Dimension) -> Result<(), ModelError> {
        let bad = |what: &str| Err(ModelError::Manifest(format!("{}: {}", dimension, what)));
        if !(self.decision_range > 0.0) {
            return bad("decisionRange must be positive");
        }
        if !(0.0..1.0).contains(&self.offset) {
            return bad("offset must be within [0, 1)");
        }
        if !(self.threshold > 0.0) {
            return bad("threshold must be positive");
        }
        if !(self.max_distance_deg > 0.0) {
            return bad("maxDistanceDeg must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Relative to the models directory
    pub artifact: PathBuf,
    #[serde(default)]
    pub calibration: Calibration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub ip: ManifestEntry,
    pub datetime: ManifestEntry,
    #[serde(rename = "useragent")]
    pub user_agent: ManifestEntry,
    pub geolocation: ManifestEntry,
}

impl Manifest {
    pub fn read(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ModelError::Manifest(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw).map_err(|e| ModelError::Manifest(format!("{}: {}", path.display(), e)))
    }
}

/// Four ready adapters and the version tag they were loaded under.
#[derive(Clone)]
pub struct ModelSet {
    pub version: String,
    pub adapters: Vec<Arc<dyn ModelAdapter>>,
}

impl std::fmt::Debug for ModelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dims: Vec<Dimension> = self.adapters.iter().map(|a| a.dimension()).collect();
        f.debug_struct("ModelSet")
            .field("version", &self.version)
            .field("adapters", &dims)
            .finish()
    }
}

pub struct ModelLoader {
    models_dir: PathBuf,
    intel: IpIntel,
    max_speed_kmh: f64,
}

impl ModelLoader {
    pub fn new(models_dir: impl Into<PathBuf>, intel: IpIntel, max_speed_kmh: f64) -> Self {
        Self {
            models_dir: models_dir.into(),
            intel,
            max_speed_kmh,
        }
    }

    /// Load one artifact, choosing the runtime by file extension.
    pub fn load_estimator(&self, artifact: &Path, input_dim: usize) -> Result<Arc<dyn Estimator>, ModelError> {
        let path = self.models_dir.join(artifact);
        match path.extension().and_then(|e| e.to_str()) {
            Some("onnx") => Ok(Arc::new(OnnxEstimator::load(&path, input_dim)?)),
            Some("json") => Ok(Arc::new(CentroidEstimator::load(&path)?)),
            _ => Err(ModelError::Manifest(format!(
                "unsupported artifact type: {}",
                path.display()
            ))),
        }
    }

    /// Read the manifest and build all four adapters. Any missing or invalid artifact fails the whole load.
    pub fn load(&self, expected_version: &str) -> Result<ModelSet, ModelError> {
        let manifest = Manifest::read(&self.models_dir.join(MANIFEST_FILE))?;
        if manifest.version != expected_version {
            warn!(
                manifest = %manifest.version,
                configured = %expected_version,
                "model manifest version differs from configured version; using manifest"
            );
        }

        let entries = [
            (Dimension::Ip, &manifest.ip),
            (Dimension::Datetime, &manifest.datetime),
            (Dimension::UserAgent, &manifest.user_agent),
            (Dimension::Geolocation, &manifest.geolocation),
        ];
        for (dimension, entry) in &entries {
            entry.calibration.validate(*dimension)?;
        }

        let ip = self.load_estimator(&manifest.ip.artifact, IP_INPUTS)?;
        let datetime = self.load_estimator(&manifest.datetime.artifact, DATETIME_INPUTS)?;
        let user_agent = self.load_estimator(&manifest.user_agent.artifact, USERAGENT_INPUTS)?;
        let geo = self.load_estimator(&manifest.geolocation.artifact, GEO_INPUTS)?;

        let adapters: Vec<Arc<dyn ModelAdapter>> = vec![
            Arc::new(IpAdapter::new(
                ip,
                self.intel.clone(),
                manifest.ip.calibration.decision_range,
            )),
            Arc::new(DatetimeAdapter::new(datetime, manifest.datetime.calibration.offset)),
            Arc::new(UserAgentAdapter::new(user_agent, manifest.user_agent.calibration.threshold)),
            Arc::new(GeolocationAdapter::new(
                geo,
                manifest.geolocation.calibration.max_distance_deg,
                self.max_speed_kmh,
            )),
        ];

        info!(
            version = %manifest.version,
            dir = %self.models_dir.display(),
            "Loaded {} models",
            adapters.len()
        );
        Ok(ModelSet {
            version: manifest.version,
            adapters,
        })
    }
}
