//! Nearest-centroid estimator for the geolocation dimension.
//!
//! The artifact is a JSON document `{"centroids": [[lat, lon], ...]}` holding the
//! cluster centres of normal login locations. Output is the Euclidean distance in
//! degrees from the input's leading (lat, lon) pair to the nearest centre.

use super::{Estimator, ModelError};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CentroidFile {
    centroids: Vec<[f64; 2]>,
}

#[derive(Debug, Clone)]
pub struct CentroidEstimator {
    centroids: Vec<[f64; 2]>,
}

impl CentroidEstimator {
    pub fn new(centroids: Vec<[f64; 2]>) -> Result<Self, ModelError> {
        if centroids.is_empty() {
            return Err(ModelError::Manifest("centroid model has no centroids".into()));
        }
        Ok(Self { centroids })
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ModelError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let file: CentroidFile = serde_json::from_str(&raw).map_err(|e| ModelError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        tracing::info!(path = %path.display(), centroids = file.centroids.len(), "centroid model loaded");
        Self::new(file.centroids)
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }
}

impl Estimator for CentroidEstimator {
    fn run(&self, input: &[f32]) -> Result<Vec<f32>, ModelError> {
        let [lat, lon] = match input {
            [lat, lon, ..] => [*lat as f64, *lon as f64],
            _ => return Err(ModelError::Inference("centroid model needs latitude and longitude".into())),
        };
        let nearest = self
            .centroids
            .iter()
            .map(|[clat, clon]| ((lat - clat).powi(2) + (lon - clon).powi(2)).sqrt())
            .fold(f64::INFINITY, f64::min);
        Ok(vec![nearest as f32])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_nearest_centre() {
        let est = CentroidEstimator::new(vec![[0.0, 0.0], [40.0, -74.0]]).unwrap();
        let out = est.run(&[43.0, -70.0, 1.0]).unwrap();
        assert!((out[0] - 5.0).abs() < 1e-4);
        assert!(est.run(&[1.0]).is_err());
    }

    #[test]
    fn empty_model_is_rejected() {
        assert!(matches!(CentroidEstimator::new(Vec::new()), Err(ModelError::Manifest(_))));
    }
}
