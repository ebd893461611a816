//! Fans a request out to the four adapters, bounds each by a timeout, and combines
//! the sub-scores into a weighted overall score.

use super::{ScoreSet, SubScore, Weights};
use crate::config::ConfigError;
use crate::features::{Dimension, GeoResolver, ScoringContext};
use crate::model::{ModelAdapter, ModelError};
use crate::request::AnalysisRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub model_timeout: Duration,
    pub fallback_score: SubScore,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            model_timeout: Duration::from_millis(150),
            fallback_score: SubScore::new(50),
        }
    }
}

enum Outcome {
    Scored(SubScore),
    Failed(ModelError),
    Panicked(String),
    TimedOut,
}

pub struct RiskEngine {
    /// Indexed by [`Dimension::index`]
    adapters: Vec<Arc<dyn ModelAdapter>>,
    weights: Weights,
    settings: EngineSettings,
    geo: Arc<dyn GeoResolver>,
}

impl RiskEngine {
    /// Refuses invalid weights and any model set that does not cover each dimension exactly once.
    pub fn new(
        adapters: Vec<Arc<dyn ModelAdapter>>,
        weights: Weights,
        settings: EngineSettings,
        geo: Arc<dyn GeoResolver>,
    ) -> Result<Self, ConfigError> {
        weights.validate()?;

        let mut slots: Vec<Option<Arc<dyn ModelAdapter>>> = vec![None; Dimension::ALL.len()];
        for adapter in adapters {
            let d = adapter.dimension();
            if slots[d.index()].replace(adapter).is_some() {
                return Err(ConfigError::Invalid(format!("more than one model for {}", d)));
            }
        }
        let adapters = Dimension::ALL
            .iter()
            .zip(slots)
            .map(|(d, slot)| slot.ok_or_else(|| ConfigError::Invalid(format!("no model for {}", d))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            adapters,
            weights,
            settings,
            geo,
        })
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn models_loaded(&self) -> usize {
        self.adapters.len()
    }

    /// Score all four dimensions concurrently. Never fails: a model that errors,
    /// panics or overruns its budget contributes the fallback score.
    pub async fn score(&self, request: &AnalysisRequest) -> ScoreSet {
        let ctx = Arc::new(ScoringContext::new(request, self.geo.as_ref()));
        let budget = self.settings.model_timeout;

        let mut tasks = JoinSet::new();
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let ctx = Arc::clone(&ctx);
            tasks.spawn(async move {
                let dimension = adapter.dimension();
                let work = tokio::task::spawn_blocking(move || adapter.score(&ctx));
                let outcome = match tokio::time::timeout(budget, work).await {
                    Ok(Ok(Ok(score))) => Outcome::Scored(score),
                    Ok(Ok(Err(e))) => Outcome::Failed(e),
                    Ok(Err(join)) => Outcome::Panicked(join.to_string()),
                    Err(_) => Outcome::TimedOut,
                };
                (dimension, outcome)
            });
        }

        let fallback = self.settings.fallback_score;
        let mut subs = [fallback; 4];
        while let Some(joined) = tasks.join_next().await {
            let (dimension, outcome) = match joined {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "scoring task aborted");
                    continue;
                }
            };
            subs[dimension.index()] = match outcome {
                Outcome::Scored(score) => score,
                Outcome::Failed(e) => {
                    warn!(%dimension, error = %e, "model inference failed; using fallback score");
                    fallback
                }
                Outcome::Panicked(e) => {
                    warn!(%dimension, error = %e, "model panicked; using fallback score");
                    fallback
                }
                Outcome::TimedOut => {
                    warn!(%dimension, timeout_ms = budget.as_millis() as u64, "model timed out; using fallback score");
                    fallback
                }
            };
        }

        combine(&self.weights, subs)
    }
}

/// Weighted mean of the four sub-scores, rounded half-up.
pub fn combine(weights: &Weights, subs: [SubScore; 4]) -> ScoreSet {
    let total = weights.sum();
    let weighted: f64 = Dimension::ALL
        .iter()
        .map(|d| weights.get(*d) * f64::from(subs[d.index()]))
        .sum();
    // Overall stays within [min, max] of the sub-scores.
    let overall = if total > 0.0 { weighted / total } else { 0.0 };
    ScoreSet {
        ip: subs[Dimension::Ip.index()],
        datetime: subs[Dimension::Datetime.index()],
        user_agent: subs[Dimension::UserAgent.index()],
        geolocation: subs[Dimension::Geolocation.index()],
        overall: SubScore::from_f64(overall),
    }
}
