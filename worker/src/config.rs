use std::env;
use std::time::Duration;

use crate::metrics::DEFAULT_GPU_BUSY_THRESHOLD_MB;
use crate::probe::DEFAULT_COMMAND_TIMEOUT;

const DEFAULT_REPORT_INTERVAL_SECS: u64 = 60;
const DEFAULT_PUSH_TIMEOUT_MS: u64 = 10_000;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Aggregator base URLs; the record goes to `<url>/in` on each.
    pub master_urls: Vec<String>,
    pub report_interval: Duration,
    pub gpu_busy_threshold_mb: u64,
    pub push_timeout: Duration,
    /// Upper bound for one `nvidia-smi` or `ps` run.
    pub command_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            master_urls: Vec::new(),
            report_interval: Duration::from_secs(DEFAULT_REPORT_INTERVAL_SECS),
            gpu_busy_threshold_mb: DEFAULT_GPU_BUSY_THRESHOLD_MB,
            push_timeout: Duration::from_millis(DEFAULT_PUSH_TIMEOUT_MS),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            master_urls: env::var("NODESTAT_SEND")
                .map(|v| parse_master_urls(&v))
                .unwrap_or_default(),

            report_interval: interval_from_secs(
                env::var("NODESTAT_INTERVAL_SEC")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_REPORT_INTERVAL_SECS),
            ),

            gpu_busy_threshold_mb: env::var("NODESTAT_GPU_THRESHOLD_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_GPU_BUSY_THRESHOLD_MB),

            push_timeout: Duration::from_millis(
                env::var("NODESTAT_PUSH_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_PUSH_TIMEOUT_MS),
            ),

            command_timeout: env::var("NODESTAT_COMMAND_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT),
        }
    }

    pub fn with_master_urls(mut self, list: &str) -> Self {
        self.master_urls = parse_master_urls(list);
        self
    }

    pub fn with_report_interval_secs(mut self, secs: u64) -> Self {
        self.report_interval = interval_from_secs(secs);
        self
    }
}

/// Split a comma-separated URL list, dropping blanks.
pub fn parse_master_urls(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tick interval, never shorter than one second.
fn interval_from_secs(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}
