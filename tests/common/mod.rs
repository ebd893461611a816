//! Shared fixtures: stub estimators, request builders, engine/service wiring.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use risk_scoring::cache::{CacheError, ResultCache};
use risk_scoring::fingerprint::Fingerprint;
use risk_scoring::features::{HistoryGeoResolver, IpIntel};
use risk_scoring::model::{
    CentroidEstimator, DatetimeAdapter, Estimator, GeolocationAdapter, IpAdapter, ModelAdapter, ModelError,
    UserAgentAdapter,
};
use risk_scoring::ratelimit::RateLimiter;
use risk_scoring::request::{AnalysisRequest, HistoryEntry, Location, LoginStatus, Session};
use risk_scoring::risk::{EngineSettings, RiskEngine, ScoreSet, Weights};
use risk_scoring::service::{RiskService, ServiceSettings};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const CHROME_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const HOME_IP: &str = "81.2.69.160";
pub const MS_PER_MIN: i64 = 60 * 1000;
pub const MS_PER_DAY: i64 = 24 * 60 * MS_PER_MIN;

/// Always answers with the same output.
pub struct Fixed(pub Vec<f32>);

impl Estimator for Fixed {
    fn run(&self, _input: &[f32]) -> Result<Vec<f32>, ModelError> {
        Ok(self.0.clone())
    }
}

/// Perfect autoencoder: reconstruction equals input.
pub struct Echo;

impl Estimator for Echo {
    fn run(&self, input: &[f32]) -> Result<Vec<f32>, ModelError> {
        Ok(input.to_vec())
    }
}

/// Output can be changed between calls.
pub struct Switch(AtomicU32);

impl Switch {
    pub fn new(v: f32) -> Arc<Self> {
        Arc::new(Self(AtomicU32::new(v.to_bits())))
    }

    pub fn set(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::SeqCst);
    }
}

impl Estimator for Switch {
    fn run(&self, _input: &[f32]) -> Result<Vec<f32>, ModelError> {
        Ok(vec![f32::from_bits(self.0.load(Ordering::SeqCst))])
    }
}

/// Blocks longer than any sane budget.
pub struct Slow(pub Duration);

impl Estimator for Slow {
    fn run(&self, _input: &[f32]) -> Result<Vec<f32>, ModelError> {
        std::thread::sleep(self.0);
        Ok(vec![5.0])
    }
}

pub struct Broken;

impl Estimator for Broken {
    fn run(&self, _input: &[f32]) -> Result<Vec<f32>, ModelError> {
        Err(ModelError::Inference("stub failure".into()))
    }
}

pub fn fixed(v: f32) -> Arc<dyn Estimator> {
    Arc::new(Fixed(vec![v]))
}

/// SVM decision +5 (normal), isolation score -0.3 (normal), perfect reconstruction,
/// centroid on New York.
pub fn adapters_with_ip(ip_model: Arc<dyn Estimator>) -> Vec<Arc<dyn ModelAdapter>> {
    let centroids = CentroidEstimator::new(vec![[40.7128, -74.0060]]).unwrap();
    vec![
        Arc::new(IpAdapter::new(ip_model, IpIntel::default(), 5.0)),
        Arc::new(DatetimeAdapter::new(fixed(-0.3), 0.5)),
        Arc::new(UserAgentAdapter::new(Arc::new(Echo), 0.1)),
        Arc::new(GeolocationAdapter::new(Arc::new(centroids), 50.0, 900.0)),
    ]
}

pub fn benign_adapters() -> Vec<Arc<dyn ModelAdapter>> {
    adapters_with_ip(fixed(5.0))
}

pub fn engine_with(adapters: Vec<Arc<dyn ModelAdapter>>, timeout: Duration) -> RiskEngine {
    let settings = EngineSettings {
        model_timeout: timeout,
        ..EngineSettings::default()
    };
    RiskEngine::new(adapters, Weights::default(), settings, Arc::new(HistoryGeoResolver)).unwrap()
}

pub fn engine(adapters: Vec<Arc<dyn ModelAdapter>>) -> RiskEngine {
    engine_with(adapters, Duration::from_millis(500))
}

pub fn service(engine: RiskEngine, limit: u32, cache_ttl: Duration) -> RiskService {
    let limiter = Arc::new(RateLimiter::new(limit, Duration::from_secs(60)));
    let settings = ServiceSettings {
        cache_ttl,
        cache_timeout: Duration::from_millis(200),
        models_version: "test-1".to_string(),
    };
    RiskService::new(engine, limiter, settings)
}

/// Today at `hour`:00 UTC, epoch millis. Within the accepted timestamp window at any time of day.
pub fn today_at(hour: u32) -> i64 {
    Utc::now()
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp_millis()
}

pub fn location(country: &str, city: &str, lat: f64, lon: f64) -> Location {
    Location {
        country: country.into(),
        city: city.into(),
        latitude: lat,
        longitude: lon,
    }
}

pub fn new_york() -> Location {
    location("United States", "New York", 40.7128, -74.0060)
}

pub fn chicago() -> Location {
    location("United States", "Chicago", 41.8781, -87.6298)
}

pub fn entry(ip: &str, ts: i64, loc: Location) -> HistoryEntry {
    HistoryEntry {
        ip: ip.into(),
        user_agent: CHROME_UA.into(),
        timestamp: ts,
        location: loc,
        login_status: LoginStatus::Success,
    }
}

/// Same browser, same IP, New York, every afternoon for the past five days.
pub fn benign_request() -> AnalysisRequest {
    let now = today_at(14);
    AnalysisRequest {
        current_session: Session::new(HOME_IP, CHROME_UA, now),
        login_history: (1..=5).map(|d| entry(HOME_IP, now - d * MS_PER_DAY, new_york())).collect(),
        user_id: "alice@example.com".into(),
    }
}

pub fn days_ago(days: i64) -> i64 {
    (Utc::now() - ChronoDuration::days(days)).timestamp_millis()
}

/// Cache backend that is down: every call fails.
pub struct DownCache;

#[async_trait]
impl ResultCache for DownCache {
    async fn get(&self, _key: &Fingerprint) -> Result<Option<ScoreSet>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn put(&self, _key: &Fingerprint, _scores: ScoreSet, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn flush(&self) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

/// Cache backend that never answers within any reasonable budget.
pub struct HungCache;

impl HungCache {
    async fn stall() {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
}

#[async_trait]
impl ResultCache for HungCache {
    async fn get(&self, _key: &Fingerprint) -> Result<Option<ScoreSet>, CacheError> {
        Self::stall().await;
        Ok(None)
    }

    async fn put(&self, _key: &Fingerprint, _scores: ScoreSet, _ttl: Duration) -> Result<(), CacheError> {
        Self::stall().await;
        Ok(())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Self::stall().await;
        Ok(())
    }
}
