//! Inbound request model: the login being scored plus the user's prior logins.
//! Field names follow the public JSON contract (camelCase).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::OnceLock;
use thiserror::Error;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;
/// Oldest accepted session timestamp, relative to now.
const MAX_PAST_MS: i64 = 365 * MS_PER_DAY;
/// Clock drift tolerated for timestamps ahead of now.
const MAX_FUTURE_MS: i64 = MS_PER_DAY;

/// The login attempt being scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub ip: String,
    pub user_agent: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_concurrency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub touch_support: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_cookie_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_language: Option<String>,
}

impl Session {
    /// Minimal session with only the required fields set.
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>, timestamp: i64) -> Self {
        Self {
            ip: ip.into(),
            user_agent: user_agent.into(),
            timestamp,
            screen_resolution: None,
            timezone: None,
            platform: None,
            hardware_concurrency: None,
            touch_support: None,
            is_cookie_enabled: None,
            accept_language: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginStatus {
    Success,
    Failure,
}

/// A prior login of the same user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub ip: String,
    pub user_agent: String,
    pub timestamp: i64,
    pub location: Location,
    pub login_status: LoginStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub current_session: Session,
    /// Caller order is not trusted; consumers sort by timestamp.
    #[serde(default)]
    pub login_history: Vec<HistoryEntry>,
    pub user_id: String,
}

/// One rejected field, addressed by its JSON path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("request validation failed: {} invalid field(s)", .errors.len())]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }
}

fn resolution_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{3,5}x\d{3,5}$").expect("static regex"))
}

fn timezone_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[+-]\d{2}:\d{2}|[A-Za-z]+(?:/[A-Za-z_+-]+)+|UTC)$").expect("static regex")
    })
}

impl AnalysisRequest {
    /// Check every field that scoring depends on. `now_ms` bounds the accepted
    /// timestamp window. All problems are reported together.
    pub fn validate(&self, now_ms: i64) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors { errors: Vec::new() };
        let s = &self.current_session;

        if self.user_id.trim().is_empty() {
            errs.push("userId", "must not be empty");
        }
        if s.ip.parse::<IpAddr>().is_err() {
            errs.push("currentSession.ip", format!("'{}' is not a valid IPv4/IPv6 address", s.ip));
        }
        if s.user_agent.trim().is_empty() {
            errs.push("currentSession.userAgent", "must not be empty");
        }
        if s.timestamp <= 0 {
            errs.push("currentSession.timestamp", "must be a positive epoch millisecond value");
        } else if s.timestamp < now_ms - MAX_PAST_MS {
            errs.push("currentSession.timestamp", "is more than one year in the past");
        } else if s.timestamp > now_ms + MAX_FUTURE_MS {
            errs.push("currentSession.timestamp", "is more than one day in the future");
        }
        if let Some(res) = &s.screen_resolution {
            if !resolution_pattern().is_match(res) {
                errs.push("currentSession.screenResolution", "expected WIDTHxHEIGHT, e.g. 1920x1080");
            }
        }
        if let Some(tz) = &s.timezone {
            if !timezone_pattern().is_match(tz) {
                errs.push("currentSession.timezone", "expected a UTC offset (+05:30) or an Area/Location name");
            }
        }

        for (i, entry) in self.login_history.iter().enumerate() {
            let path = format!("loginHistory[{}]", i);
            if entry.ip.parse::<IpAddr>().is_err() {
                errs.push(format!("{}.ip", path), format!("'{}' is not a valid IPv4/IPv6 address", entry.ip));
            }
            if entry.timestamp <= 0 {
                errs.push(format!("{}.timestamp", path), "must be a positive epoch millisecond value");
            }
            let loc = &entry.location;
            if !(-90.0..=90.0).contains(&loc.latitude) {
                errs.push(format!("{}.location.latitude", path), "must be within [-90, 90]");
            }
            if !(-180.0..=180.0).contains(&loc.longitude) {
                errs.push(format!("{}.location.longitude", path), "must be within [-180, 180]");
            }
        }

        if errs.errors.is_empty() {
            Ok(())
        } else {
            Err(errs)
        }
    }

    /// History sorted by timestamp (stable for equal timestamps).
    pub fn sorted_history(&self) -> Vec<HistoryEntry> {
        let mut history = self.login_history.clone();
        history.sort_by_key(|h| h.timestamp);
        history
    }
}
