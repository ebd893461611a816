//! Login-time features: hour/weekday, recency, velocity, bursts, deviation from habit.

use super::{FeatureDetail, FeatureVector, ScoringContext};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const MS_PER_HOUR: f64 = 60.0 * 60.0 * 1000.0;
const MS_PER_DAY: f64 = 24.0 * MS_PER_HOUR;
/// More than this many logins within the last hour is a burst
const BURST_LOGINS_PER_HOUR: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatetimeFeatures {
    /// UTC hour of the current session, 0-23
    pub hour: u32,
    /// Monday = 0
    pub day_of_week: u32,
    pub is_weekend: bool,
    pub is_business_hours: bool,
    pub is_night: bool,
    /// 0 on cold start
    pub hours_since_last_login: f64,
    /// Logins per hour over the trailing 24h
    pub login_velocity: f64,
    pub is_burst: bool,
    /// Circular distance from the user's mean login hour, 0-1 (0.5 on cold start)
    pub hour_deviation: f64,
    /// Weekly login frequency, capped and scaled to 0-1
    pub login_frequency: f64,
    pub is_cold_start: bool,
}

fn utc_hour(ts_ms: i64) -> u32 {
    DateTime::<Utc>::from_timestamp_millis(ts_ms).map(|d| d.hour()).unwrap_or(0)
}

fn hour_deviation(current_hour: u32, history: &[i64]) -> f64 {
    if history.is_empty() {
        return 0.5;
    }
    let (sin_sum, cos_sum) = history.iter().fold((0.0f64, 0.0f64), |(s, c), ts| {
        let angle = utc_hour(*ts) as f64 * (2.0 * PI / 24.0);
        (s + angle.sin(), c + angle.cos())
    });
    let n = history.len() as f64;
    let mut mean_hour = (sin_sum / n).atan2(cos_sum / n) * (24.0 / (2.0 * PI));
    if mean_hour < 0.0 {
        mean_hour += 24.0;
    }
    let diff = (current_hour as f64 - mean_hour).abs();
    diff.min(24.0 - diff) / 12.0
}

fn login_frequency(sorted: &[i64]) -> f64 {
    if sorted.len() < 2 {
        return 0.0;
    }
    let intervals: Vec<f64> = sorted.windows(2).map(|w| (w[1] - w[0]) as f64 / MS_PER_DAY).collect();
    let avg = intervals.iter().sum::<f64>() / intervals.len() as f64;
    let per_week = 7.0 / avg.max(0.1);
    (per_week / 20.0).min(1.0)
}

impl DatetimeFeatures {
    pub fn extract(ctx: &ScoringContext) -> Self {
        let ts = ctx.session.timestamp;
        let dt = DateTime::<Utc>::from_timestamp_millis(ts).unwrap_or_default();
        let hour = dt.hour();
        let day_of_week = dt.weekday().num_days_from_monday();

        let mut f = DatetimeFeatures {
            hour,
            day_of_week,
            is_weekend: day_of_week >= 5,
            is_business_hours: (9..=17).contains(&hour),
            is_night: hour < 6 || hour > 22,
            is_cold_start: ctx.is_cold_start(),
            ..Default::default()
        };

        // History is already sorted by timestamp.
        let history: Vec<i64> = ctx.history.iter().map(|h| h.timestamp).collect();
        f.hour_deviation = hour_deviation(hour, &history);
        f.login_frequency = login_frequency(&history);

        if let Some(last) = history.last() {
            f.hours_since_last_login = ((ts - last) as f64 / MS_PER_HOUR).max(0.0);

            let day_ago = ts - MS_PER_DAY as i64;
            let recent: Vec<i64> = history.iter().copied().filter(|t| *t > day_ago).collect();
            if let Some(first) = recent.first() {
                let span_hours = (ts - first) as f64 / MS_PER_HOUR;
                if span_hours > 0.0 {
                    f.login_velocity = recent.len() as f64 / span_hours;
                }
            }

            let hour_ago = ts - MS_PER_HOUR as i64;
            f.is_burst = history.iter().filter(|t| **t > hour_ago).count() > BURST_LOGINS_PER_HOUR;
        }
        f
    }

    /// Encode to the 10-dim model input
    pub fn to_vector(&self) -> Vec<f32> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        vec![
            self.hour as f32 / 23.0,
            self.day_of_week as f32 / 6.0,
            flag(self.is_weekend),
            flag(self.is_business_hours),
            flag(self.is_night),
            (self.hours_since_last_login / 168.0).min(1.0) as f32,
            (self.login_velocity / 10.0).min(1.0) as f32,
            flag(self.is_burst),
            self.hour_deviation as f32,
            self.login_frequency as f32,
        ]
    }
}

pub fn extract(ctx: &ScoringContext) -> FeatureVector {
    let features = DatetimeFeatures::extract(ctx);
    FeatureVector {
        values: features.to_vector(),
        detail: FeatureDetail::Datetime(features),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deviation_wraps_midnight() {
        // 23:00 habit vs 01:00 login is two hours apart, not 22
        let h23 = 23 * 3_600_000;
        let d = hour_deviation(1, &[h23, h23]);
        assert!((d - 2.0 / 12.0).abs() < 1e-6);
    }

    #[test]
    fn frequency_caps() {
        let minute = 60_000;
        let ts: Vec<i64> = (0..10).map(|i| i * minute).collect();
        assert_eq!(login_frequency(&ts), 1.0);
        assert_eq!(login_frequency(&ts[..1]), 0.0);
    }
}
