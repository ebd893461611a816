//! Score types shared by adapters, the engine and the cache.

use crate::features::Dimension;
use serde::{Deserialize, Serialize};

/// Integer risk on the common 0-100 scale; higher is riskier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubScore(u8);

impl SubScore {
    pub const MIN: SubScore = SubScore(0);
    pub const MAX: SubScore = SubScore(100);

    /// Clamp to [0, 100].
    pub fn new(value: u8) -> Self {
        SubScore(value.min(100))
    }

    /// Round half-up to the nearest integer, then clip. NaN maps to 0.
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return SubScore::MIN;
        }
        let rounded = (value + 0.5).floor().clamp(0.0, 100.0);
        SubScore(rounded as u8)
    }

    /// Add a signed rule adjustment, clipping at the bounds.
    pub fn adjusted(self, delta: i32) -> Self {
        SubScore((self.0 as i32 + delta).clamp(0, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl From<SubScore> for f64 {
    fn from(s: SubScore) -> f64 {
        s.0 as f64
    }
}

impl std::fmt::Display for SubScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four dimension scores plus their weighted combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSet {
    pub ip: SubScore,
    pub datetime: SubScore,
    pub user_agent: SubScore,
    pub geolocation: SubScore,
    pub overall: SubScore,
}

impl ScoreSet {
    pub fn get(&self, dimension: Dimension) -> SubScore {
        match dimension {
            Dimension::Ip => self.ip,
            Dimension::Datetime => self.datetime,
            Dimension::UserAgent => self.user_agent,
            Dimension::Geolocation => self.geolocation,
        }
    }

    /// Smallest and largest of the four dimension scores.
    pub fn bounds(&self) -> (SubScore, SubScore) {
        let subs = [self.ip, self.datetime, self.user_agent, self.geolocation];
        let min = subs.iter().copied().min().unwrap_or(SubScore::MIN);
        let max = subs.iter().copied().max().unwrap_or(SubScore::MAX);
        (min, max)
    }
}
