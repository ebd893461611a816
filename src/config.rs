//! Service configuration: JSON file, then `RISK_*` environment overrides, then validation.
//! The validated value is immutable and handed to constructors.

use crate::risk::Weights;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_PATH_VAR: &str = "RISK_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {var} ({value:?}): {reason}")]
    Override { var: String, value: String, reason: String },
    #[error("invalid weights: {0}")]
    Weights(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Socket address the HTTP server binds
    pub listen_addr: String,
    /// Accepted `X-API-Key` values
    pub api_keys: Vec<String>,
    pub weights: Weights,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub models: ModelsConfig,
    pub audit: AuditConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    /// Entry bound for the in-process cache
    pub capacity: u64,
    /// Budget for a single cache read or write
    pub op_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests admitted per key per period
    pub requests: u32,
    pub period_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory holding `manifest.json` and the artifacts it names
    pub dir: PathBuf,
    pub version: String,
    /// Per-model inference budget
    pub timeout_ms: u64,
    /// Sub-score used when a model times out or fails
    pub fallback_score: u8,
    pub max_travel_speed_kmh: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub queue_capacity: usize,
    pub retention_days: u32,
    /// Encryption secret; only ever taken from `RISK_AUDIT_SECRET`
    #[serde(skip)]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            api_keys: Vec::new(),
            weights: Weights::default(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            models: ModelsConfig::default(),
            audit: AuditConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
            capacity: 100_000,
            op_timeout_ms: 50,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            period_secs: 60,
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            version: "1.0.0".to_string(),
            timeout_ms: 150,
            fallback_score: 50,
            max_travel_speed_kmh: 900.0,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("audit.db"),
            queue_capacity: 1024,
            retention_days: 90,
            secret: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Override {
        var: var.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// `"100/60"` -> (100 requests, 60 seconds)
fn parse_rate(var: &str, value: &str) -> Result<(u32, u64), ConfigError> {
    let (count, period) = value.split_once('/').ok_or_else(|| ConfigError::Override {
        var: var.to_string(),
        value: value.to_string(),
        reason: "expected <requests>/<seconds>".to_string(),
    })?;
    Ok((parse_var(var, count)?, parse_var(var, period)?))
}

impl ServiceConfig {
    /// Load from a JSON file. A missing file yields defaults; an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// File named by `RISK_CONFIG_PATH` (default `config.json`), process environment applied, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load(Path::new(&path))?;
        config.apply_overrides(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `RISK_*` overrides from any variable source. Unknown variables are ignored.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (var, value) in vars {
            match var.as_str() {
                "RISK_LISTEN_ADDR" => self.listen_addr = value,
                "RISK_API_KEYS" => {
                    self.api_keys = value
                        .split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(String::from)
                        .collect();
                }
                "RISK_WEIGHTS" => self.weights = Weights::parse(&value)?,
                "RISK_CACHE_TTL_SECS" => self.cache.ttl_secs = parse_var(&var, &value)?,
                "RISK_CACHE_ENABLED" => self.cache.enabled = parse_var(&var, &value)?,
                "RISK_RATE_LIMIT" => {
                    let (requests, period_secs) = parse_rate(&var, &value)?;
                    self.rate_limit = RateLimitConfig { requests, period_secs };
                }
                "RISK_MODEL_TIMEOUT_MS" => self.models.timeout_ms = parse_var(&var, &value)?,
                "RISK_FALLBACK_SCORE" => self.models.fallback_score = parse_var(&var, &value)?,
                "RISK_MAX_TRAVEL_SPEED_KMH" => self.models.max_travel_speed_kmh = parse_var(&var, &value)?,
                "RISK_MODELS_DIR" => self.models.dir = PathBuf::from(value),
                "RISK_MODELS_VERSION" => self.models.version = value,
                "RISK_AUDIT_ENABLED" => self.audit.enabled = parse_var(&var, &value)?,
                "RISK_AUDIT_PATH" => self.audit.path = PathBuf::from(value),
                "RISK_AUDIT_SECRET" => self.audit.secret = Some(value),
                "RISK_LOG_LEVEL" => self.log.level = value,
                "RISK_LOG_JSON" => self.log.json = parse_var(&var, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        if self.api_keys.is_empty() {
            return Err(ConfigError::Invalid("at least one API key is required".into()));
        }
        if self.rate_limit.requests == 0 || self.rate_limit.period_secs == 0 {
            return Err(ConfigError::Invalid("rate limit needs a positive count and period".into()));
        }
        if self.cache.enabled && (self.cache.ttl_secs == 0 || self.cache.capacity == 0) {
            return Err(ConfigError::Invalid("cache ttl and capacity must be positive".into()));
        }
        if self.models.timeout_ms == 0 {
            return Err(ConfigError::Invalid("model timeout must be positive".into()));
        }
        if self.models.fallback_score > 100 {
            return Err(ConfigError::Invalid("fallback score must be within 0-100".into()));
        }
        if !(self.models.max_travel_speed_kmh > 0.0) {
            return Err(ConfigError::Invalid("max travel speed must be positive".into()));
        }
        if self.audit.enabled {
            if self.audit.queue_capacity == 0 {
                return Err(ConfigError::Invalid("audit queue capacity must be positive".into()));
            }
            if self.audit.secret.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Invalid("RISK_AUDIT_SECRET is required when audit is enabled".into()));
            }
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn cache_op_timeout(&self) -> Duration {
        Duration::from_millis(self.cache.op_timeout_ms)
    }

    pub fn rate_period(&self) -> Duration {
        Duration::from_secs(self.rate_limit.period_secs)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.models.timeout_ms)
    }
}
