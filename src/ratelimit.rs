//! Per-API-key sliding-log rate limiter.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// Admits at most `limit` requests per key in any trailing `period`.
pub struct RateLimiter {
    logs: Mutex<HashMap<String, VecDeque<Instant>>>,
    limit: u32,
    period: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32, period: Duration) -> Self {
        Self {
            logs: Mutex::new(HashMap::new()),
            limit: limit.max(1),
            period,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn admit(&self, key: &str) -> Admission {
        let now = Instant::now();
        let mut logs = self.logs.lock();
        let log = logs.entry(key.to_string()).or_default();
        while log.front().is_some_and(|t| now.duration_since(*t) >= self.period) {
            log.pop_front();
        }

        if log.len() < self.limit as usize {
            log.push_back(now);
            Admission::Allowed {
                remaining: self.limit - log.len() as u32,
            }
        } else {
            // Full log: the oldest admission leaves the window first.
            let oldest = log.front().copied().unwrap_or(now);
            let retry_after = self.period.saturating_sub(now.duration_since(oldest));
            Admission::Rejected {
                retry_after: retry_after.max(Duration::from_millis(1)),
            }
        }
    }

    /// Forget keys with no admissions inside the window. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut logs = self.logs.lock();
        let before = logs.len();
        logs.retain(|_, log| log.back().is_some_and(|t| now.duration_since(*t) < self.period));
        before - logs.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.logs.lock().len()
    }

    /// Prune idle keys once per period until the limiter is dropped.
    pub fn spawn_pruner(limiter: &Arc<RateLimiter>) -> JoinHandle<()> {
        let weak: Weak<RateLimiter> = Arc::downgrade(limiter);
        let period = limiter.period;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.tick().await;
            loop {
                tick.tick().await;
                let Some(limiter) = weak.upgrade() else { break };
                let dropped = limiter.prune();
                if dropped > 0 {
                    tracing::debug!(dropped, "pruned idle rate-limit keys");
                }
            }
        })
    }
}
