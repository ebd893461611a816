//! Uniform per-dimension scoring: extract -> infer -> normalize -> calibrate.
//!
//! Each adapter owns a read-only [`Estimator`] and the constants needed to map its
//! native output onto the 0-100 scale, plus a rule overlay over the typed features.

use super::{Estimator, ModelError};
use crate::features::{self, Dimension, FeatureDetail, FeatureVector, IpIntel, ScoringContext};
use crate::risk::SubScore;
use std::sync::Arc;

pub trait ModelAdapter: Send + Sync {
    fn dimension(&self) -> Dimension;

    fn extract(&self, ctx: &ScoringContext) -> FeatureVector;

    /// Native model output for one feature vector.
    fn infer(&self, features: &FeatureVector) -> Result<f32, ModelError>;

    /// Map native output onto 0-100; monotonic in anomaly, clipped.
    fn normalize(&self, raw: f32) -> SubScore;

    /// Rule overlay on top of the normalized model score.
    fn calibrate(&self, _features: &FeatureVector, base: SubScore) -> SubScore {
        base
    }

    fn score(&self, ctx: &ScoringContext) -> Result<SubScore, ModelError> {
        let features = self.extract(ctx);
        let raw = self.infer(&features)?;
        Ok(self.calibrate(&features, self.normalize(raw)))
    }
}

/// A non-finite output is a failed inference, never a zero-risk score.
fn finite(raw: f32) -> Result<f32, ModelError> {
    if raw.is_finite() {
        Ok(raw)
    } else {
        Err(ModelError::Inference(format!("non-finite model output: {}", raw)))
    }
}

fn first_output(model: &dyn Estimator, input: &[f32]) -> Result<f32, ModelError> {
    let raw = model
        .run(input)?
        .first()
        .copied()
        .ok_or_else(|| ModelError::Inference("empty model output".into()))?;
    finite(raw)
}

/// One-class SVM over IP features. Decision value below zero means outlier.
pub struct IpAdapter {
    model: Arc<dyn Estimator>,
    intel: IpIntel,
    decision_range: f32,
}

impl IpAdapter {
    pub fn new(model: Arc<dyn Estimator>, intel: IpIntel, decision_range: f32) -> Self {
        Self {
            model,
            intel,
            decision_range,
        }
    }
}

impl ModelAdapter for IpAdapter {
    fn dimension(&self) -> Dimension {
        Dimension::Ip
    }

    fn extract(&self, ctx: &ScoringContext) -> FeatureVector {
        features::ip::extract(ctx, &self.intel)
    }

    fn infer(&self, features: &FeatureVector) -> Result<f32, ModelError> {
        first_output(self.model.as_ref(), features.as_slice())
    }

    fn normalize(&self, raw: f32) -> SubScore {
        let r = self.decision_range as f64;
        SubScore::from_f64((-(raw as f64) + r) / (2.0 * r) * 100.0)
    }

    fn calibrate(&self, features: &FeatureVector, base: SubScore) -> SubScore {
        let FeatureDetail::Ip(f) = &features.detail else {
            return base;
        };
        let mut bump = 0;
        if f.is_tor {
            bump += 30;
        } else if f.is_datacenter {
            bump += 20;
        }
        if f.is_new_ip && f.is_suspicious_type {
            bump += 15;
        }
        if f.is_private {
            bump += 10;
        }
        base.adjusted(bump)
    }
}

/// Isolation forest over login-time features. `score_samples` lies in [-1, 0]; lower is more anomalous.
pub struct DatetimeAdapter {
    model: Arc<dyn Estimator>,
    offset: f32,
}

impl DatetimeAdapter {
    pub fn new(model: Arc<dyn Estimator>, offset: f32) -> Self {
        Self { model, offset }
    }
}

impl ModelAdapter for DatetimeAdapter {
    fn dimension(&self) -> Dimension {
        Dimension::Datetime
    }

    fn extract(&self, ctx: &ScoringContext) -> FeatureVector {
        features::datetime::extract(ctx)
    }

    fn infer(&self, features: &FeatureVector) -> Result<f32, ModelError> {
        first_output(self.model.as_ref(), features.as_slice())
    }

    fn normalize(&self, raw: f32) -> SubScore {
        let o = self.offset as f64;
        SubScore::from_f64((-(raw as f64) - o) / (1.0 - o) * 100.0)
    }

    fn calibrate(&self, features: &FeatureVector, base: SubScore) -> SubScore {
        let FeatureDetail::Datetime(f) = &features.detail else {
            return base;
        };
        let mut bump = 0;
        if (2..=5).contains(&f.hour) {
            bump += 20;
        }
        if f.is_burst {
            bump += 25;
        }
        if f.login_velocity > 20.0 {
            bump += 30;
        }
        if f.is_cold_start && f.is_night {
            bump += 15;
        }
        if f.hours_since_last_login > 720.0 {
            bump += 10;
        }
        base.adjusted(bump)
    }
}

/// Autoencoder over user-agent features; the raw output is reconstruction error (MSE).
pub struct UserAgentAdapter {
    model: Arc<dyn Estimator>,
    threshold: f32,
}

impl UserAgentAdapter {
    pub fn new(model: Arc<dyn Estimator>, threshold: f32) -> Self {
        Self { model, threshold }
    }
}

impl ModelAdapter for UserAgentAdapter {
    fn dimension(&self) -> Dimension {
        Dimension::UserAgent
    }

    fn extract(&self, ctx: &ScoringContext) -> FeatureVector {
        features::useragent::extract(ctx)
    }

    fn infer(&self, features: &FeatureVector) -> Result<f32, ModelError> {
        let input = features.as_slice();
        let recon = self.model.run(input)?;
        if recon.len() != input.len() {
            return Err(ModelError::Inference(format!(
                "reconstruction has {} values for {} inputs",
                recon.len(),
                input.len()
            )));
        }
        let sse: f32 = input.iter().zip(&recon).map(|(a, b)| (a - b).powi(2)).sum();
        finite(sse / input.len().max(1) as f32)
    }

    fn normalize(&self, raw: f32) -> SubScore {
        let (e, t) = (raw as f64, self.threshold as f64);
        if e <= t {
            SubScore::from_f64(e / t * 30.0)
        } else {
            SubScore::from_f64(30.0 + ((e - t) / t * 35.0).min(70.0))
        }
    }

    fn calibrate(&self, features: &FeatureVector, base: SubScore) -> SubScore {
        let FeatureDetail::UserAgent(f) = &features.detail else {
            return base;
        };
        let mut bump = 0;
        if f.is_bot {
            bump += 30;
        }
        if f.is_suspicious {
            bump += 20;
        }
        if f.length < 20 || f.length > 500 {
            bump += 15;
        }
        if f.browser_version.is_none() {
            bump += 10;
        }
        if f.entropy > 5.5 {
            bump += 15;
        }
        base.adjusted(bump)
    }
}

/// Nearest-centroid distance over location features, with a physical travel check.
pub struct GeolocationAdapter {
    model: Arc<dyn Estimator>,
    max_distance_deg: f32,
    max_speed_kmh: f64,
}

impl GeolocationAdapter {
    pub fn new(model: Arc<dyn Estimator>, max_distance_deg: f32, max_speed_kmh: f64) -> Self {
        Self {
            model,
            max_distance_deg,
            max_speed_kmh,
        }
    }
}

impl ModelAdapter for GeolocationAdapter {
    fn dimension(&self) -> Dimension {
        Dimension::Geolocation
    }

    fn extract(&self, ctx: &ScoringContext) -> FeatureVector {
        features::geo::extract(ctx)
    }

    fn infer(&self, features: &FeatureVector) -> Result<f32, ModelError> {
        // Nothing to measure without a resolved location.
        if let FeatureDetail::Geolocation(f) = &features.detail {
            if !f.location_known {
                return Ok(0.0);
            }
        }
        first_output(self.model.as_ref(), features.as_slice())
    }

    fn normalize(&self, raw: f32) -> SubScore {
        let ratio = (raw as f64 / self.max_distance_deg as f64).min(1.0);
        SubScore::from_f64(ratio * 100.0)
    }

    fn calibrate(&self, features: &FeatureVector, base: SubScore) -> SubScore {
        let FeatureDetail::Geolocation(f) = &features.detail else {
            return base;
        };
        if f.max_implied_speed_kmh > self.max_speed_kmh {
            return SubScore::MAX;
        }
        let mut bump = 0;
        if f.is_new_country {
            bump += 15;
        }
        if f.distinct_recent_countries > 3 {
            bump += 20;
        }
        if f.country_risk > 70 {
            bump += 15;
        }
        base.adjusted(bump)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<f32>);

    impl Estimator for Fixed {
        fn run(&self, _input: &[f32]) -> Result<Vec<f32>, ModelError> {
            Ok(self.0.clone())
        }
    }

    fn fixed(v: f32) -> Arc<dyn Estimator> {
        Arc::new(Fixed(vec![v]))
    }

    fn features(adapter: &dyn ModelAdapter) -> FeatureVector {
        let request: crate::request::AnalysisRequest = serde_json::from_value(serde_json::json!({
            "userId": "u1",
            "currentSession": {
                "ip": "81.2.69.160",
                "userAgent": "Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0",
                "timestamp": 1_700_000_000_000i64
            }
        }))
        .unwrap();
        adapter.extract(&ScoringContext::new(&request, &crate::features::HistoryGeoResolver))
    }

    #[test]
    fn svm_decision_maps_to_range() {
        let a = IpAdapter::new(fixed(0.0), IpIntel::default(), 5.0);
        assert_eq!(a.normalize(5.0).value(), 0);
        assert_eq!(a.normalize(0.0).value(), 50);
        assert_eq!(a.normalize(-5.0).value(), 100);
        assert_eq!(a.normalize(-40.0).value(), 100);
    }

    #[test]
    fn isolation_forest_offset() {
        let a = DatetimeAdapter::new(fixed(0.0), 0.5);
        assert_eq!(a.normalize(-0.4).value(), 0);
        assert_eq!(a.normalize(-0.75).value(), 50);
        assert_eq!(a.normalize(-1.0).value(), 100);
    }

    #[test]
    fn autoencoder_error_bands() {
        let a = UserAgentAdapter::new(fixed(0.0), 0.1);
        assert_eq!(a.normalize(0.05).value(), 15);
        assert_eq!(a.normalize(0.1).value(), 30);
        assert_eq!(a.normalize(0.2).value(), 65);
        assert_eq!(a.normalize(10.0).value(), 100);
    }

    #[test]
    fn non_finite_output_is_an_error() {
        let ip = IpAdapter::new(fixed(f32::NAN), IpIntel::default(), 5.0);
        assert!(matches!(ip.infer(&features(&ip)), Err(ModelError::Inference(_))));

        let ua = UserAgentAdapter::new(Arc::new(Fixed(vec![f32::INFINITY; 18])), 0.1);
        assert!(matches!(ua.infer(&features(&ua)), Err(ModelError::Inference(_))));
    }

    #[test]
    fn centroid_distance_caps() {
        let a = GeolocationAdapter::new(fixed(0.0), 50.0, 900.0);
        assert_eq!(a.normalize(25.0).value(), 50);
        assert_eq!(a.normalize(500.0).value(), 100);
    }
}
