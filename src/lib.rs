//! Login risk scoring service.
//!
//! Modular structure:
//! - [`request`] - Inbound request model and field validation
//! - [`features`] - Per-dimension feature extraction (IP, datetime, user agent, geolocation)
//! - [`model`] - Loaded estimators and the adapters that normalize them to 0-100
//! - [`risk`] - Concurrent aggregation into a weighted overall score
//! - [`fingerprint`] / [`cache`] - Request fingerprinting and TTL result cache
//! - [`ratelimit`] - Per-key admission control
//! - [`storage`] - Encrypted audit log
//! - [`service`] / [`api`] - Request path and HTTP surface
//! - [`config`] / [`logging`] - Configuration and structured logging

pub mod api;
pub mod cache;
pub mod config;
pub mod features;
pub mod fingerprint;
pub mod logging;
pub mod model;
pub mod ratelimit;
pub mod request;
pub mod risk;
pub mod service;
pub mod storage;

pub use cache::{MemoryCache, ResultCache};
pub use config::ServiceConfig;
pub use logging::StructuredLogger;
pub use ratelimit::RateLimiter;
pub use request::AnalysisRequest;
pub use risk::{RiskEngine, ScoreSet, SubScore};
pub use service::RiskService;
