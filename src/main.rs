//! Risk scoring service entrypoint: load config and models, then serve HTTP until Ctrl-C.

use risk_scoring::{
    api::{self, AppState},
    cache::MemoryCache,
    config::ServiceConfig,
    features::{HistoryGeoResolver, IpIntel},
    logging::StructuredLogger,
    model::ModelLoader,
    ratelimit::RateLimiter,
    risk::{EngineSettings, RiskEngine, SubScore},
    service::{RiskService, ServiceSettings},
    storage::{AuditStore, AuditWriter},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn spawn_audit_retention(store: Arc<AuditStore>, retention_days: u32) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60 * 60));
        loop {
            tick.tick().await;
            let cutoff = chrono::Utc::now().timestamp_millis() - retention_days as i64 * MS_PER_DAY;
            let store = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || store.prune_before(cutoff)).await {
                Ok(Ok(n)) if n > 0 => info!(removed = n, "audit retention applied"),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(error = %e, "audit retention failed"),
                Err(e) => warn!(error = %e, "audit retention task failed"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = ServiceConfig::from_env()?;

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(listen_addr = %config.listen_addr, models_dir = ?config.models.dir, "risk scoring service starting");

    let loader = ModelLoader::new(&config.models.dir, IpIntel::default(), config.models.max_travel_speed_kmh);
    let models = loader.load(&config.models.version)?;
    let models_version = models.version.clone();

    let engine = RiskEngine::new(
        models.adapters,
        config.weights,
        EngineSettings {
            model_timeout: config.model_timeout(),
            fallback_score: SubScore::new(config.models.fallback_score),
        },
        Arc::new(HistoryGeoResolver),
    )?;

    let limiter = Arc::new(RateLimiter::new(config.rate_limit.requests, config.rate_period()));
    let pruner = RateLimiter::spawn_pruner(&limiter);

    let settings = ServiceSettings {
        cache_ttl: config.cache_ttl(),
        cache_timeout: config.cache_op_timeout(),
        models_version,
    };
    let mut service = RiskService::new(engine, limiter, settings);

    if config.cache.enabled {
        service = service.with_cache(Arc::new(MemoryCache::new(config.cache.capacity)));
        info!(ttl_secs = config.cache.ttl_secs, capacity = config.cache.capacity, "result cache enabled");
    }

    let mut audit_task = None;
    if config.audit.enabled {
        let secret = config.audit.secret.as_deref().unwrap_or_default();
        let store = Arc::new(AuditStore::open(&config.audit.path, secret.as_bytes())?);
        spawn_audit_retention(Arc::clone(&store), config.audit.retention_days);
        let (writer, task) = AuditWriter::spawn(store.clone(), config.audit.queue_capacity);
        service = service.with_audit(writer, store);
        audit_task = Some(task);
        info!(path = ?config.audit.path, "audit log enabled");
    }

    let state = AppState::new(Arc::new(service), config.api_keys.iter().cloned());
    let app = api::router(state);

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pruner.abort();
    // The router (and with it the last audit writer) is gone; let queued records drain.
    if let Some(task) = audit_task {
        if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
            warn!("audit queue did not drain before shutdown");
        }
    }
    info!("risk scoring service stopped");
    Ok(())
}
