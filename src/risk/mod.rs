//! Sub-score types, dimension weights and the aggregation engine.

pub mod engine;
pub mod score;

pub use engine::{EngineSettings, RiskEngine};
pub use score::{ScoreSet, SubScore};

use crate::config::ConfigError;
use crate::features::Dimension;
use serde::{Deserialize, Serialize};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// Relative contribution of each dimension to the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weights {
    pub ip: f64,
    pub datetime: f64,
    #[serde(alias = "useragent")]
    pub user_agent: f64,
    pub geolocation: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            ip: 0.30,
            datetime: 0.20,
            user_agent: 0.25,
            geolocation: 0.25,
        }
    }
}

impl Weights {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Ip => self.ip,
            Dimension::Datetime => self.datetime,
            Dimension::UserAgent => self.user_agent,
            Dimension::Geolocation => self.geolocation,
        }
    }

    fn get_mut(&mut self, dimension: Dimension) -> &mut f64 {
        match dimension {
            Dimension::Ip => &mut self.ip,
            Dimension::Datetime => &mut self.datetime,
            Dimension::UserAgent => &mut self.user_agent,
            Dimension::Geolocation => &mut self.geolocation,
        }
    }

    pub fn sum(&self) -> f64 {
        Dimension::ALL.iter().map(|d| self.get(*d)).sum()
    }

    /// Every weight finite and non-negative, total 1.0 within 1e-3.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for d in Dimension::ALL {
            let w = self.get(d);
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::Weights(format!("{} weight {} must be a non-negative number", d, w)));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::Weights(format!("weights sum to {:.4}, expected 1.0", sum)));
        }
        Ok(())
    }

    /// Parse `ip=0.3,datetime=0.2,useragent=0.25,geolocation=0.25`. All four must be present.
    pub fn parse(list: &str) -> Result<Self, ConfigError> {
        let mut weights = Weights {
            ip: f64::NAN,
            datetime: f64::NAN,
            user_agent: f64::NAN,
            geolocation: f64::NAN,
        };
        for pair in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| ConfigError::Weights(format!("expected name=value, got '{}'", pair)))?;
            let dimension = Dimension::ALL
                .into_iter()
                .find(|d| d.as_str().eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| ConfigError::Weights(format!("unknown dimension '{}'", name.trim())))?;
            *weights.get_mut(dimension) = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Weights(format!("'{}' is not a number", value.trim())))?;
        }
        if let Some(missing) = Dimension::ALL.into_iter().find(|d| weights.get(*d).is_nan()) {
            return Err(ConfigError::Weights(format!("missing weight for {}", missing)));
        }
        Ok(weights)
    }
}
