//! Feature extraction: one pure extractor per risk dimension.
//!
//! Extractors read a [`ScoringContext`] (session, sorted history, resolved location)
//! and never perform I/O; external lookups arrive as injected tables.

pub mod datetime;
pub mod geo;
pub mod ip;
pub mod useragent;

pub use datetime::DatetimeFeatures;
pub use geo::{GeoFeatures, GeoResolver, HistoryGeoResolver, TableGeoResolver};
pub use ip::{IpFeatures, IpIntel};
pub use useragent::UserAgentFeatures;

use crate::request::{AnalysisRequest, HistoryEntry, Location, Session};
use serde::{Deserialize, Serialize};

/// The four risk dimensions scored per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    Ip,
    Datetime,
    UserAgent,
    Geolocation,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Ip,
        Dimension::Datetime,
        Dimension::UserAgent,
        Dimension::Geolocation,
    ];

    /// Position in [`Dimension::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Ip => "ip",
            Dimension::Datetime => "datetime",
            Dimension::UserAgent => "useragent",
            Dimension::Geolocation => "geolocation",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed features behind a vector, kept for the adapters' rule overlays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "dimension", rename_all = "camelCase")]
pub enum FeatureDetail {
    Ip(IpFeatures),
    Datetime(DatetimeFeatures),
    UserAgent(UserAgentFeatures),
    Geolocation(GeoFeatures),
}

/// Dense model input plus the typed features it was encoded from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: Vec<f32>,
    pub detail: FeatureDetail,
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

/// Everything an extractor may read, built once per request.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub session: Session,
    /// Sorted by timestamp, oldest first
    pub history: Vec<HistoryEntry>,
    /// Location of the current session if the resolver knew it
    pub location: Option<Location>,
}

impl ScoringContext {
    pub fn new(request: &AnalysisRequest, resolver: &dyn GeoResolver) -> Self {
        let history = request.sorted_history();
        let location = resolver.resolve(&request.current_session, &history);
        Self {
            session: request.current_session.clone(),
            history,
            location,
        }
    }

    pub fn is_cold_start(&self) -> bool {
        self.history.is_empty()
    }
}
