//! Audit persistence: one encrypted row per scored request, written off the request path.

mod audit;
mod writer;

pub use audit::AuditStore;
pub use writer::AuditWriter;

use crate::request::Session;
use crate::risk::ScoreSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("audit record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("audit encryption failed: {0}")]
    Crypto(String),
}

/// What was scored, for whom, and with what result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub request_id: String,
    pub user_id: String,
    pub fingerprint: String,
    pub cache_hit: bool,
    /// Epoch milliseconds when the response was produced
    pub timestamp: i64,
    pub session: Session,
    pub scores: ScoreSet,
    /// Milliseconds
    pub processing_time: f64,
}

/// Blocking persistence backend; the writer calls it from the blocking pool.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError>;
    fn ping(&self) -> Result<(), AuditError>;
}
