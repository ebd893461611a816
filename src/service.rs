//! The request path: admission, validation, fingerprint, cache, aggregation, audit.

use crate::cache::{CacheError, ResultCache};
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::ratelimit::{Admission, RateLimiter};
use crate::request::{AnalysisRequest, ValidationErrors};
use crate::risk::{RiskEngine, ScoreSet};
use crate::storage::{AuditRecord, AuditSink, AuditWriter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("rate limit exceeded; retry after {}s", .retry_after.as_secs().max(1))]
    RateLimited { retry_after: Duration },
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub cache_ttl: Duration,
    /// Budget for one cache read or write
    pub cache_timeout: Duration,
    pub models_version: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            cache_timeout: Duration::from_millis(50),
            models_version: "1.0.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub request_id: String,
    pub user_id: String,
    /// RFC 3339, UTC
    pub timestamp: String,
    /// Milliseconds
    pub processing_time: f64,
    pub models_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub meta: ResponseMeta,
    pub scores: ScoreSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: String,
    pub version: String,
    pub models_version: String,
    pub models_loaded: usize,
    pub cache_connected: bool,
    pub persistence_connected: bool,
}

pub struct RiskService {
    engine: RiskEngine,
    limiter: Arc<RateLimiter>,
    cache: Option<Arc<dyn ResultCache>>,
    audit: Option<(AuditWriter, Arc<dyn AuditSink>)>,
    settings: ServiceSettings,
}

fn new_request_id() -> String {
    format!("req_{}", Uuid::new_v4())
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

impl RiskService {
    pub fn new(engine: RiskEngine, limiter: Arc<RateLimiter>, settings: ServiceSettings) -> Self {
        Self {
            engine,
            limiter,
            cache: None,
            audit: None,
            settings,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_audit(mut self, writer: AuditWriter, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some((writer, sink));
        self
    }

    pub fn engine(&self) -> &RiskEngine {
        &self.engine
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Charge one request against `api_key`'s window. Returns the remaining allowance.
    pub fn admit(&self, api_key: &str) -> Result<u32, ServiceError> {
        match self.limiter.admit(api_key) {
            Admission::Allowed { remaining } => Ok(remaining),
            Admission::Rejected { retry_after } => {
                warn!(retry_after_ms = retry_after.as_millis() as u64, "rate limit exceeded");
                Err(ServiceError::RateLimited { retry_after })
            }
        }
    }

    /// Validate and score. Identical requests within the cache TTL return the cached
    /// scores with fresh metadata.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResponse, ServiceError> {
        let started = Instant::now();
        request.validate(Utc::now().timestamp_millis())?;

        let fp = fingerprint(&request);
        let (scores, cache_hit) = match self.cached(&fp).await {
            Some(scores) => (scores, true),
            None => {
                let scores = self.engine.score(&request).await;
                self.remember(&fp, scores).await;
                (scores, false)
            }
        };

        let now = Utc::now();
        let processing_time = (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;
        let meta = ResponseMeta {
            request_id: new_request_id(),
            user_id: request.user_id.clone(),
            timestamp: rfc3339(now),
            processing_time,
            models_version: self.settings.models_version.clone(),
        };

        info!(
            request_id = %meta.request_id,
            cache_hit,
            overall = scores.overall.value(),
            processing_time_ms = processing_time,
            "request scored"
        );

        if let Some((writer, _)) = &self.audit {
            writer.submit(AuditRecord {
                request_id: meta.request_id.clone(),
                user_id: request.user_id.clone(),
                fingerprint: fp.as_str().to_string(),
                cache_hit,
                timestamp: now.timestamp_millis(),
                session: request.current_session,
                scores,
                processing_time,
            });
        }

        Ok(AnalysisResponse { meta, scores })
    }

    async fn cached(&self, fp: &Fingerprint) -> Option<ScoreSet> {
        let cache = self.cache.as_ref()?;
        let budget = self.settings.cache_timeout;
        let result = tokio::time::timeout(budget, cache.get(fp))
            .await
            .unwrap_or(Err(CacheError::Timeout(budget)));
        match result {
            Ok(hit) => hit,
            Err(e) => {
                warn!(key = %fp.cache_key(), error = %e, "cache read failed; scoring without cache");
                None
            }
        }
    }

    async fn remember(&self, fp: &Fingerprint, scores: ScoreSet) {
        let Some(cache) = &self.cache else { return };
        let budget = self.settings.cache_timeout;
        let result = tokio::time::timeout(budget, cache.put(fp, scores, self.settings.cache_ttl))
            .await
            .unwrap_or(Err(CacheError::Timeout(budget)));
        if let Err(e) = result {
            warn!(key = %fp.cache_key(), error = %e, "cache write failed");
        }
    }

    /// Liveness of every collaborator. Never runs a model.
    pub async fn health(&self) -> HealthReport {
        let cache_connected = match &self.cache {
            Some(cache) => matches!(
                tokio::time::timeout(self.settings.cache_timeout, cache.ping()).await,
                Ok(Ok(()))
            ),
            None => false,
        };
        let persistence_connected = match &self.audit {
            Some((_, sink)) => {
                let sink = Arc::clone(sink);
                matches!(tokio::task::spawn_blocking(move || sink.ping()).await, Ok(Ok(())))
            }
            None => false,
        };

        let models_loaded = self.engine.models_loaded();
        let healthy = models_loaded == crate::features::Dimension::ALL.len()
            && (self.cache.is_none() || cache_connected)
            && (self.audit.is_none() || persistence_connected);

        HealthReport {
            status: if healthy { HealthStatus::Healthy } else { HealthStatus::Degraded },
            timestamp: rfc3339(Utc::now()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            models_version: self.settings.models_version.clone(),
            models_loaded,
            cache_connected,
            persistence_connected,
        }
    }
}
