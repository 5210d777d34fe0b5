//! sitewatch - Website Availability Monitor
//!
//! Periodically probes a registry of target URLs, records
//! availability, latency, and response-size samples, evaluates
//! threshold rules over the sample stream, and keeps an alarm history
//! behind a small CRUD API.

mod alerts;
mod config;
mod crawler;
mod db;
mod metrics;
mod probe;
mod web;

use alerts::{default_rules, AlarmRecorder, AlertEngine};
use config::ServerConfig;
use crawler::{Crawler, CycleScheduler};
use db::{NewTarget, Store};
use metrics::MetricsSink;
use web::Server;

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("sitewatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting sitewatch on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Seed an empty registry from configuration
    seed_targets(&store, &cfg.seed_urls);

    // Shared probe client; per-target timeouts are applied per request
    let client = reqwest::Client::builder()
        .user_agent(concat!("sitewatch/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let sink = MetricsSink::new(store.clone(), cfg.namespace.clone());
    let recorder = AlarmRecorder::new(store.clone());

    // Start the probe cycle loop
    let crawler = Arc::new(Crawler::new(store.clone(), sink.clone(), client));
    let scheduler = CycleScheduler::new(crawler, Duration::from_secs(cfg.check_interval_secs));
    scheduler.start();

    // Start the alert evaluation loop. The lookback spans two crawl
    // cadences so a pass between cycles still sees the latest sample.
    let engine = AlertEngine::new(
        store.clone(),
        sink,
        recorder.clone(),
        default_rules(),
        Duration::from_secs(cfg.alert_interval_secs),
        Duration::from_secs(cfg.check_interval_secs.saturating_mul(2)),
    );
    engine.start();

    // Start web server
    let server = Server::new(cfg, store, recorder);
    server.start().await?;

    Ok(())
}

/// Create targets from the configured seed URLs, but only into an
/// empty registry; an existing table wins.
fn seed_targets(store: &Store, urls: &[String]) {
    match store.list_targets() {
        Ok(existing) if !existing.is_empty() => return,
        Ok(_) => {}
        Err(e) => {
            tracing::error!(error = %e, "could not inspect registry for seeding");
            return;
        }
    }

    for url in urls {
        let new = NewTarget {
            url: Some(url.clone()),
            ..Default::default()
        };
        match store.create_target(new) {
            Ok(target) => tracing::info!(url = %target.url, id = %target.id, "seeded target"),
            Err(e) => tracing::warn!(url = %url, error = %e, "skipping seed url"),
        }
    }
}
