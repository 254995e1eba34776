//! Worker Node - System Metrics
//!
//! Collects CPU, memory, GPU and top-process readings into a [`Sample`].
//! A reading that cannot be taken becomes a placeholder; it never fails the
//! whole sample.

use common::{GpuSummary, Sample, TopConsumer};
use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::probe::{HostProbe, Probe, ProbeError};

/// Stand-in node name for a host that reports an empty one, so the
/// record's first token is still a name.
pub const UNNAMED_HOST: &str = "?";

/// Default used-memory threshold (MiB) above which a GPU counts as busy.
pub const DEFAULT_GPU_BUSY_THRESHOLD_MB: u64 = 64;

const PS_CPU_COLUMN: usize = 2;
const PS_MEM_COLUMN: usize = 3;

/// Cumulative time-in-state counters of the aggregate `cpu` line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    /// Parse the aggregate line of `/proc/stat`.
    ///
    /// Format: `cpu user nice system idle [iowait irq softirq steal ...]`.
    /// Kernels that omit the trailing fields report them as zero.
    pub fn parse(stat: &str) -> Result<Self, ProbeError> {
        let line = stat
            .lines()
            .find(|l| l.starts_with("cpu "))
            .ok_or_else(|| ProbeError::parse("/proc/stat", "no aggregate cpu line"))?;

        let fields = line
            .split_whitespace()
            .skip(1)
            .take(8)
            .map(|f| f.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProbeError::parse("/proc/stat", format!("{}: {:?}", e, line)))?;

        if fields.len() < 4 {
            return Err(ProbeError::parse(
                "/proc/stat",
                format!("expected at least 4 counters, got {}", fields.len()),
            ));
        }
        let at = |i: usize| fields.get(i).copied().unwrap_or(0);

        Ok(Self {
            user: at(0),
            nice: at(1),
            system: at(2),
            idle: at(3),
            iowait: at(4),
            irq: at(5),
            softirq: at(6),
            steal: at(7),
        })
    }

    /// Idle plus I/O wait.
    pub fn idle_like(&self) -> u64 {
        self.idle + self.iowait
    }

    pub fn total(&self) -> u64 {
        self.idle_like() + self.user + self.nice + self.system + self.irq + self.softirq + self.steal
    }
}

/// Fraction of CPU time spent busy between two readings.
///
/// `None` when no time elapsed between them.
pub fn cpu_usage_between(prev: &CpuTimes, curr: &CpuTimes) -> Option<f64> {
    let idle_delta = curr.idle_like().saturating_sub(prev.idle_like());
    let total_delta = curr.total().saturating_sub(prev.total());
    if total_delta == 0 {
        return None;
    }
    Some(1.0 - idle_delta as f64 / total_delta as f64)
}

/// Count busy GPUs from one used-memory value (MiB) per line.
///
/// Any line that is not a number means the query did not produce what we
/// asked for, and the whole summary degrades to `0/0`.
pub fn parse_gpu_memory(output: &str, busy_threshold_mb: u64) -> GpuSummary {
    let mut summary = GpuSummary::default();
    for line in output.trim().lines() {
        match line.trim().parse::<u64>() {
            Ok(used) => {
                if used > busy_threshold_mb {
                    summary.busy += 1;
                }
                summary.total += 1;
            }
            Err(_) => return GpuSummary::default(),
        }
    }
    summary
}

/// Owner and percentage of the first process row of a `ps aux` listing.
pub fn parse_top_process(listing: &str, column: usize) -> Result<TopConsumer, ProbeError> {
    let row = listing
        .lines()
        .nth(1)
        .ok_or_else(|| ProbeError::parse("ps output", "no process rows"))?;
    let fields: Vec<&str> = row.split_whitespace().collect();

    let user = fields
        .first()
        .ok_or_else(|| ProbeError::parse("ps output", "empty process row"))?;
    let percent = fields
        .get(column)
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| ProbeError::parse("ps output", row.to_string()))?;

    Ok(TopConsumer::new(*user, percent))
}

/// Samples the host once per tick.
///
/// Holds the previous CPU counters so each tick reports usage since the
/// last one rather than since boot.
pub struct MetricsCollector<P = HostProbe> {
    probe: P,
    previous_cpu: CpuTimes,
    gpu_busy_threshold_mb: u64,
}

impl MetricsCollector<HostProbe> {
    pub fn new(config: &WorkerConfig) -> Self {
        Self::with_probe(
            HostProbe::new(config.command_timeout),
            config.gpu_busy_threshold_mb,
        )
    }
}

impl<P: Probe> MetricsCollector<P> {
    pub fn with_probe(probe: P, gpu_busy_threshold_mb: u64) -> Self {
        Self {
            probe,
            previous_cpu: CpuTimes::default(),
            gpu_busy_threshold_mb,
        }
    }

    /// Record the current CPU counters as the baseline for the next tick.
    ///
    /// Without this the first [`cpu_usage`](Self::cpu_usage) is the average
    /// since boot.
    pub fn prime(&mut self) {
        match self.read_cpu_times() {
            Ok(times) => self.previous_cpu = times,
            Err(e) => warn!(error = %e, "Could not prime CPU counters"),
        }
    }

    /// CPU utilization since the previous call.
    pub fn cpu_usage(&mut self) -> Option<f64> {
        let current = match self.read_cpu_times() {
            Ok(times) => times,
            Err(e) => {
                warn!(error = %e, "Read CPU info failed");
                return None;
            }
        };
        let usage = cpu_usage_between(&self.previous_cpu, &current);
        self.previous_cpu = current;
        usage
    }

    pub fn memory_usage(&mut self) -> Option<f64> {
        match self.probe.memory() {
            Ok(info) => info.usage(),
            Err(e) => {
                warn!(error = %e, "Read memory info failed");
                None
            }
        }
    }

    pub async fn gpu_usage(&self) -> GpuSummary {
        let output = self
            .probe
            .command(
                "nvidia-smi",
                &["--query-gpu=memory.used", "--format=csv,noheader,nounits"],
            )
            .await;
        match output {
            Ok(text) => parse_gpu_memory(&text, self.gpu_busy_threshold_mb),
            Err(e) => {
                // Hosts without GPUs land here on every tick.
                debug!(error = %e, "GPU query failed");
                GpuSummary::default()
            }
        }
    }

    /// Heaviest process owner by CPU and by memory.
    pub async fn top_consumers(&self) -> (TopConsumer, TopConsumer) {
        (
            self.top_process("--sort=-pcpu", PS_CPU_COLUMN).await,
            self.top_process("--sort=-pmem", PS_MEM_COLUMN).await,
        )
    }

    pub fn hostname(&self) -> String {
        match self.probe.hostname() {
            Ok(name) if name.trim().is_empty() => UNNAMED_HOST.to_string(),
            Ok(name) => name,
            Err(e) => format!("Hostname error: {}", e),
        }
    }

    /// Take one complete sample.
    pub async fn sample(&mut self) -> Sample {
        let cpu = self.cpu_usage();
        let memory = self.memory_usage();
        let gpu = self.gpu_usage().await;
        let (top_cpu, top_memory) = self.top_consumers().await;

        Sample {
            node: self.hostname(),
            cpu,
            memory,
            gpu,
            top_cpu,
            top_memory,
        }
    }

    fn read_cpu_times(&self) -> Result<CpuTimes, ProbeError> {
        self.probe.proc_stat().and_then(|s| CpuTimes::parse(&s))
    }

    async fn top_process(&self, sort: &str, column: usize) -> TopConsumer {
        let result = self
            .probe
            .command("ps", &["aux", sort])
            .await
            .and_then(|listing| parse_top_process(&listing, column));
        match result {
            Ok(top) => top,
            Err(e) => {
                warn!(error = %e, sort, "Process listing failed");
                TopConsumer::unavailable(e.to_string())
            }
        }
    }
}
