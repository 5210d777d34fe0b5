//! Cycle orchestrator: checks every enabled target once per cycle and
//! records the resulting signals.

use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::db::{Store, StoreError};
use crate::metrics::MetricsSink;
use crate::probe;

/// Cycle error types.
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// The target registry could not be read; without it the cycle is
    /// meaningless and fails as a whole.
    #[error("registry unavailable: {0}")]
    Registry(#[from] StoreError),
}

/// Outcome of one cycle across all enabled targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub checked: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Runs the probe-and-record cycle.
pub struct Crawler {
    store: Arc<Store>,
    sink: MetricsSink,
    client: Client,
}

impl Crawler {
    pub fn new(store: Arc<Store>, sink: MetricsSink, client: Client) -> Self {
        Self {
            store,
            sink,
            client,
        }
    }

    /// Check every enabled target once.
    ///
    /// Probes are total, so a down target records its zero sentinel and
    /// still counts as successful; `failed` counts targets whose sample
    /// batch could not be written. Per-target trouble never aborts the
    /// loop. There are no retries within a cycle; the next cycle is the
    /// retry mechanism.
    pub async fn run_cycle(&self) -> Result<CycleSummary, CrawlerError> {
        let targets = self.store.list_enabled_targets()?;
        if targets.is_empty() {
            tracing::info!("no enabled targets; nothing to check");
            return Ok(CycleSummary::default());
        }

        // All samples in one cycle share the cycle's execution time.
        let cycle_time = Utc::now();
        let mut summary = CycleSummary::default();

        for target in &targets {
            summary.checked += 1;
            let signals = probe::probe_target(&self.client, target).await;
            tracing::debug!(
                url = %target.url,
                availability = signals.availability,
                latency_ms = signals.latency_ms,
                size_bytes = signals.size_bytes,
                "probed target"
            );

            match self.sink.record(&target.url, &signals, cycle_time) {
                Ok(()) => summary.successful += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(url = %target.url, error = %e, "failed to record samples");
                }
            }
        }

        tracing::info!(
            checked = summary.checked,
            successful = summary.successful,
            failed = summary.failed,
            "cycle complete"
        );
        Ok(summary)
    }
}

/// Fixed-interval driver for the crawler. Cycles do not overlap: the
/// next tick fires only after the previous cycle returns.
pub struct CycleScheduler {
    crawler: Arc<Crawler>,
    period: Duration,
    stop: Arc<Mutex<Option<tokio::sync::broadcast::Sender<()>>>>,
}

impl CycleScheduler {
    pub fn new(crawler: Arc<Crawler>, period: Duration) -> Self {
        Self {
            crawler,
            period,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the cycle loop in a background task.
    pub fn start(&self) {
        let crawler = self.crawler.clone();
        let period = self.period;
        let stop = self.stop.clone();

        tokio::spawn(async move {
            let (tx, _) = tokio::sync::broadcast::channel(1);
            {
                let mut stop_guard = stop.lock().await;
                *stop_guard = Some(tx.clone());
            }

            let mut rx = tx.subscribe();
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        if let Err(e) = crawler.run_cycle().await {
                            tracing::error!(error = %e, "cycle failed");
                        }
                    }
                }
            }
        });
    }

    /// Stop the cycle loop.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}
