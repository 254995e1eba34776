//! Common crate for the status record shared by reporters and aggregators
//!
//! A reporter turns a [`Sample`] into one fixed-width line with
//! [`layout::encode`]; the aggregator only ever looks at the first token of
//! that line, see [`node_id`].

pub mod layout;
pub mod sample;

// Re-export commonly used types for convenience
pub use layout::{encode, header, LINE_WIDTH};
pub use sample::{GpuSummary, Sample, TopConsumer};

/// Extract the node identifier from an encoded record.
///
/// This is the first whitespace-delimited token; an all-blank record yields
/// the empty string.
pub fn node_id(record: &str) -> &str {
    record.split_whitespace().next().unwrap_or("")
}
