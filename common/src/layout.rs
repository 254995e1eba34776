//! Fixed-width record layout.
//!
//! Columns, left to right: node, %cpu, %mem, gpu busy/total, top cpu user,
//! its %cpu, top memory user, its %mem. Every cell keeps at least one blank
//! between itself and its left neighbour, so header and records line up and
//! every line is exactly [`LINE_WIDTH`] characters.
//!
//! Values that do not fit are shortened by keeping their *tail*: a host named
//! `gpu-node-17` is shown as `ode-17`. Cluster host names usually differ in
//! their trailing digits, not in their prefix.

use crate::sample::{GpuSummary, Sample};

/// Longest node name kept in a record.
pub const NODE_NAME_WIDTH: usize = 6;
/// Longest user name kept in a record.
pub const USER_NAME_WIDTH: usize = 7;
/// Longest numeric cell content.
pub const VALUE_WIDTH: usize = 5;

/// Character width of the header and of every encoded record.
pub const LINE_WIDTH: usize =
    (NODE_NAME_WIDTH + 1) + 3 * (VALUE_WIDTH + 1) + 2 * ((USER_NAME_WIDTH + 1) + (VALUE_WIDTH + 1));

/// Highest utilization percentage written, so noise never widens the cell.
pub const MAX_PERCENT: f64 = 99.9;
const MAX_PROCESS_PERCENT: f64 = 9999.0;

const PLACEHOLDER: &str = "NaN";

macro_rules! row {
    ($node:expr, $cpu:expr, $mem:expr, $gpu:expr, $cuser:expr, $ucpu:expr, $muser:expr, $umem:expr) => {
        format!(
            "{:<7}{:>6}{:>6}{:>6}{:>8}{:>6}{:>8}{:>6}",
            $node, $cpu, $mem, $gpu, $cuser, $ucpu, $muser, $umem
        )
    };
}

/// Column titles, aligned with [`encode`].
pub fn header() -> String {
    row!("node", "%cpu", "%mem", "gpu", "cpuuser", "%cpu", "memuser", "%mem")
}

/// Encode a sample as one fixed-width line (no trailing newline).
pub fn encode(sample: &Sample) -> String {
    row!(
        fit_tail(&sample.node, NODE_NAME_WIDTH),
        format_fraction(sample.cpu),
        format_fraction(sample.memory),
        fit_tail(&format_gpu(sample.gpu), VALUE_WIDTH),
        fit_tail(&sample.top_cpu.user, USER_NAME_WIDTH),
        format_process_percent(sample.top_cpu.percent),
        fit_tail(&sample.top_memory.user, USER_NAME_WIDTH),
        format_process_percent(sample.top_memory.percent)
    )
}

/// Keep at most `max` trailing characters of `value`.
pub fn fit_tail(value: &str, max: usize) -> &str {
    let count = value.chars().count();
    if count <= max {
        return value;
    }
    match value.char_indices().nth(count - max) {
        Some((idx, _)) => &value[idx..],
        None => value,
    }
}

/// Render a `[0, 1]` fraction as a percentage with one decimal.
pub fn format_fraction(fraction: Option<f64>) -> String {
    match fraction {
        Some(f) if !f.is_nan() => format!("{:.1}", (f * 100.0).clamp(0.0, MAX_PERCENT)),
        _ => PLACEHOLDER.to_string(),
    }
}

/// Render a per-process percentage as reported by `ps`.
///
/// Multi-threaded processes go past 100%; those lose their decimal.
pub fn format_process_percent(percent: Option<f64>) -> String {
    match percent {
        Some(p) if !p.is_nan() => {
            let p = p.clamp(0.0, MAX_PROCESS_PERCENT);
            if p >= 100.0 {
                format!("{:.0}", p)
            } else {
                format!("{:.1}", p)
            }
        }
        _ => PLACEHOLDER.to_string(),
    }
}

fn format_gpu(gpu: GpuSummary) -> String {
    format!("{}/{}", gpu.busy, gpu.total)
}
