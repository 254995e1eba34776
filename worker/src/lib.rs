//! Worker Node - cluster status reporter
//!
//! Stateless reporting loop that:
//! - Samples CPU, memory, GPU and top-process usage once per tick
//! - Encodes the sample as one fixed-width line
//! - Pushes the line to every configured aggregator

pub mod config;
pub mod metrics;
pub mod probe;
pub mod push;

use config::WorkerConfig;
use metrics::MetricsCollector;
use probe::Probe;
use push::{rand_jitter, Pusher};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Report this host forever. Only returns on a setup error.
pub async fn run(config: WorkerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = MetricsCollector::new(&config);
    run_with(config, metrics).await
}

/// Report whatever `metrics` samples, once per configured interval.
pub async fn run_with<P: Probe>(
    config: WorkerConfig,
    mut metrics: MetricsCollector<P>,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.master_urls.is_empty() {
        return Err("no aggregator URLs configured".into());
    }

    let pusher = Pusher::new(&config)?;
    metrics.prime();

    let delay = rand_jitter(config.report_interval);
    info!(
        masters = ?config.master_urls,
        interval_secs = config.report_interval.as_secs(),
        delay_ms = delay.as_millis() as u64,
        "Starting reporter"
    );
    tokio::time::sleep(delay).await;

    let mut ticker = interval(config.report_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let record = common::encode(&metrics.sample().await);
        let delivered = pusher.push_all(&record).await;

        debug!(
            delivered,
            destinations = pusher.destinations().len(),
            "Tick complete"
        );
    }
}
