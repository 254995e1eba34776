//! Master Node - State Management
//!
//! Holds the latest record per reporting node behind a single reader/writer
//! lock, plus the process-wide view counter.

use chrono::{DateTime, Local};
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::MasterConfig;

/// Latest report from one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    /// When the aggregator received the record.
    pub received_at: DateTime<Local>,
    /// The record exactly as pushed.
    pub record: String,
}

/// Node identifier -> latest record.
///
/// Writers are exclusive, readers share. Entries are never removed, so a
/// node that stops reporting keeps its last line with an ageing timestamp.
#[derive(Debug, Default)]
pub struct NodeTable {
    entries: RwLock<HashMap<String, NodeEntry>>,
    views: AtomicU64,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` under its node identifier, stamped with the current time.
    ///
    /// Returns the identifier used as key.
    pub async fn ingest(&self, record: String) -> String {
        let node = common::node_id(&record).to_string();
        self.upsert(node.clone(), record, Local::now()).await;
        node
    }

    /// Insert or overwrite the entry for `node`.
    pub async fn upsert(&self, node: String, record: String, received_at: DateTime<Local>) {
        let mut entries = self.entries.write().await;
        entries.insert(node, NodeEntry { received_at, record });
    }

    pub async fn get(&self, node: &str) -> Option<NodeEntry> {
        self.entries.read().await.get(node).cloned()
    }

    /// All known node identifiers in display order.
    pub async fn node_ids(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut ids: Vec<String> = entries.keys().cloned().collect();
        ids.sort_by(|a, b| display_order(a, b));
        ids
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Render the table: a header, then one `HHMM record` line per node.
    ///
    /// Counts as one view once the text is complete.
    pub async fn render(&self) -> Result<String, std::fmt::Error> {
        let entries = self.entries.read().await;
        let mut rows: Vec<(&String, &NodeEntry)> = entries.iter().collect();
        rows.sort_by(|a, b| display_order(a.0, b.0));

        let mut out = String::with_capacity((rows.len() + 1) * (common::LINE_WIDTH + 6));
        writeln!(out, "time {}", common::header())?;
        for (_, entry) in rows {
            writeln!(out, "{} {}", entry.received_at.format("%H%M"), entry.record)?;
        }

        // Still under the read lock; the counter itself is atomic so
        // concurrent renders do not lose increments.
        self.views.fetch_add(1, Ordering::Relaxed);
        Ok(out)
    }

    /// Number of completed renders since start.
    pub fn views(&self) -> u64 {
        self.views.load(Ordering::Relaxed)
    }
}

/// Shorter identifiers first, equal lengths lexicographically.
pub fn display_order(a: &str, b: &str) -> CmpOrdering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Application-wide shared state
#[derive(Clone)]
pub struct AppState {
    pub nodes: Arc<NodeTable>,
    /// Static identity line served by `/ver`.
    pub identity: Arc<str>,
}

impl AppState {
    pub fn new(config: &MasterConfig) -> Self {
        Self {
            nodes: Arc::new(NodeTable::new()),
            identity: Arc::from(config.identity.as_str()),
        }
    }
}
