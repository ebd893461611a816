//! Fire-and-forget audit queue in front of a blocking [`AuditSink`].

use super::{AuditRecord, AuditSink};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Clone)]
pub struct AuditWriter {
    tx: mpsc::Sender<AuditRecord>,
}

impl AuditWriter {
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Start the drain task. It exits once every writer clone is dropped and the queue is empty.
    pub fn spawn(sink: Arc<dyn AuditSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<AuditRecord>(capacity.max(1));
        let handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let sink = Arc::clone(&sink);
                let request_id = record.request_id.clone();
                match tokio::task::spawn_blocking(move || sink.record(&record)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(%request_id, error = %e, "audit write failed; record dropped"),
                    Err(e) => warn!(%request_id, error = %e, "audit write task failed; record dropped"),
                }
            }
        });
        (Self { tx }, handle)
    }

    /// Queue a record without waiting. Returns false if it was dropped.
    pub fn submit(&self, record: AuditRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Full(r)) => {
                warn!(request_id = %r.request_id, "audit queue full; record dropped");
                false
            }
            Err(TrySendError::Closed(r)) => {
                warn!(request_id = %r.request_id, "audit queue closed; record dropped");
                false
            }
        }
    }
}
