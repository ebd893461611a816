//! Geolocation plausibility features: distance from habitual locations,
//! country novelty and risk, implied travel speed.

use super::{FeatureDetail, FeatureVector, ScoringContext};
use crate::request::{HistoryEntry, Location, Session};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const EARTH_RADIUS_KM: f64 = 6371.0;
const MS_PER_HOUR: f64 = 60.0 * 60.0 * 1000.0;
/// The hop into the current session counts only if the previous login is this recent
const TRAVEL_LOOKBACK_MS: i64 = 24 * 60 * 60 * 1000;
/// Gaps shorter than this (3.6 s) are treated as simultaneous
const MIN_TRAVEL_HOURS: f64 = 0.001;
/// Movement below this is GPS/geo-IP noise
const MIN_TRAVEL_KM: f64 = 0.1;
const RECENT_ENTRIES: usize = 5;

/// Maps the current session to a location using pre-fetched data only.
pub trait GeoResolver: Send + Sync {
    fn resolve(&self, session: &Session, history: &[HistoryEntry]) -> Option<Location>;
}

/// Most recent location seen for the same IP, else the most recent location in history.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryGeoResolver;

impl GeoResolver for HistoryGeoResolver {
    fn resolve(&self, session: &Session, history: &[HistoryEntry]) -> Option<Location> {
        history
            .iter()
            .rev()
            .find(|h| h.ip == session.ip)
            .or_else(|| history.last())
            .map(|h| h.location.clone())
    }
}

/// Exact-IP lookup table, falling back to [`HistoryGeoResolver`] for unknown addresses.
#[derive(Debug, Clone, Default)]
pub struct TableGeoResolver {
    table: HashMap<String, Location>,
}

impl TableGeoResolver {
    pub fn new(table: HashMap<String, Location>) -> Self {
        Self { table }
    }
}

impl GeoResolver for TableGeoResolver {
    fn resolve(&self, session: &Session, history: &[HistoryEntry]) -> Option<Location> {
        self.table
            .get(&session.ip)
            .cloned()
            .or_else(|| HistoryGeoResolver.resolve(session, history))
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

fn distance_km(a: &Location, b: &Location) -> f64 {
    haversine_km(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Static per-country risk, 0-100. Unlisted countries get 30.
pub fn country_risk(country: &str) -> u8 {
    match country {
        "North Korea" => 95,
        "Iran" => 85,
        "China" | "Russia" => 75,
        "Nigeria" => 70,
        "Romania" => 65,
        "Brazil" => 60,
        "India" | "Vietnam" => 55,
        "Indonesia" => 50,
        "South Korea" | "Singapore" | "Netherlands" => 15,
        "United States" | "Canada" | "United Kingdom" | "Germany" | "France" | "Australia" | "Japan" => 10,
        _ => 30,
    }
}

/// Speed in km/h between two timestamped points; infinite for a jump with no elapsed time.
fn implied_speed_kmh(from: (&Location, i64), to: (&Location, i64)) -> f64 {
    let km = distance_km(from.0, to.0);
    let hours = (to.1 - from.1).abs() as f64 / MS_PER_HOUR;
    if hours < MIN_TRAVEL_HOURS {
        if km > MIN_TRAVEL_KM {
            f64::INFINITY
        } else {
            0.0
        }
    } else {
        km / hours
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoFeatures {
    pub location_known: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub is_new_country: bool,
    pub is_new_city: bool,
    pub country_risk: u8,
    pub avg_distance_km: f64,
    pub max_distance_km: f64,
    pub distance_stddev_km: f64,
    /// Distinct countries across the last five history entries and the current session
    pub distinct_recent_countries: usize,
    /// Fastest hop between consecutive history logins, or from the last one (within 24h)
    /// into the current location; `inf` for a simultaneous jump
    pub max_implied_speed_kmh: f64,
}

impl GeoFeatures {
    pub fn extract(ctx: &ScoringContext) -> Self {
        let history = &ctx.history;
        let mut f = GeoFeatures::default();

        let recent = &history[history.len().saturating_sub(RECENT_ENTRIES)..];
        let mut recent_countries: HashSet<&str> = recent.iter().map(|h| h.location.country.as_str()).collect();

        if let Some(current) = &ctx.location {
            f.location_known = true;
            f.latitude = current.latitude;
            f.longitude = current.longitude;
            f.country_risk = country_risk(&current.country);
            recent_countries.insert(current.country.as_str());

            if !history.is_empty() {
                f.is_new_country = !history.iter().any(|h| h.location.country == current.country);
                f.is_new_city = !history.iter().any(|h| h.location.city == current.city);

                let distances: Vec<f64> = history.iter().map(|h| distance_km(current, &h.location)).collect();
                let n = distances.len() as f64;
                let mean = distances.iter().sum::<f64>() / n;
                let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
                f.avg_distance_km = mean;
                f.max_distance_km = distances.iter().copied().fold(0.0, f64::max);
                f.distance_stddev_km = variance.sqrt();
            }
        }
        f.distinct_recent_countries = recent_countries.len();
        f.max_implied_speed_kmh = max_trail_speed(ctx);
        f
    }

    /// Encode to the 9-dim model input. Latitude and longitude stay in degrees
    /// so centroid models can measure distance directly.
    pub fn to_vector(&self) -> Vec<f32> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        vec![
            self.latitude as f32,
            self.longitude as f32,
            flag(self.is_new_country),
            flag(self.is_new_city),
            self.country_risk as f32 / 100.0,
            (self.avg_distance_km / 5000.0).min(1.0) as f32,
            (self.max_distance_km / 10000.0).min(1.0) as f32,
            (self.distance_stddev_km / 1000.0).min(1.0) as f32,
            (self.distinct_recent_countries as f32 / (RECENT_ENTRIES + 1) as f32).min(1.0),
        ]
    }
}

fn max_trail_speed(ctx: &ScoringContext) -> f64 {
    fn at(h: &HistoryEntry) -> (&Location, i64) {
        (&h.location, h.timestamp)
    }
    let history_max = ctx
        .history
        .windows(2)
        .map(|w| implied_speed_kmh(at(&w[0]), at(&w[1])))
        .fold(0.0, f64::max);

    let now = ctx.session.timestamp;
    let previous = ctx.history.iter().rev().find(|h| h.timestamp <= now);
    let into_current = match (&ctx.location, previous) {
        (Some(current), Some(prev)) if now - prev.timestamp <= TRAVEL_LOOKBACK_MS => {
            implied_speed_kmh(at(prev), (current, now))
        }
        _ => 0.0,
    };
    history_max.max(into_current)
}

pub fn extract(ctx: &ScoringContext) -> FeatureVector {
    let features = GeoFeatures::extract(ctx);
    FeatureVector {
        values: features.to_vector(),
        detail: FeatureDetail::Geolocation(features),
    }
}
