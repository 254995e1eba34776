//! Point-in-time node status, as produced by a reporter on every tick.

/// Busy and total GPU counts.
///
/// `(0, 0)` both for hosts without GPUs and for hosts where the GPU query
/// failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpuSummary {
    pub busy: u32,
    pub total: u32,
}

/// Heaviest process owner for one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct TopConsumer {
    /// Owner of the top process, or a description of why it is unknown.
    pub user: String,
    /// Percentage reported by the process listing, `None` when unavailable.
    pub percent: Option<f64>,
}

impl TopConsumer {
    pub fn new(user: impl Into<String>, percent: f64) -> Self {
        Self {
            user: user.into(),
            percent: Some(percent),
        }
    }

    /// Consumer standing in for a failed process listing.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            user: reason.into(),
            percent: None,
        }
    }
}

/// One snapshot of a node. Built once per tick and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub node: String,
    /// CPU utilization in `[0, 1]`.
    pub cpu: Option<f64>,
    /// Memory utilization in `[0, 1]`.
    pub memory: Option<f64>,
    pub gpu: GpuSummary,
    pub top_cpu: TopConsumer,
    pub top_memory: TopConsumer,
}
