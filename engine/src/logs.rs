//! Operation logs.
//!
//! Recoverable problems (an unknown mapping field, a skipped subtree) are
//! recorded as [`LogEntry`] values. Entries are kept on the owning
//! operation/execution so they stay readable after an error aborts a run,
//! and every entry is mirrored to `tracing`.

use serde::{Deserialize, Serialize};

use crate::graph::NodeId;

/// Log level of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Graph node the entry belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), node: None }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into(), node: None }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into(), node: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into(), node: None }
    }

    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }
}

/// Append-only log owned by an operation or an execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationLog {
    entries: Vec<LogEntry>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry and forward it to `tracing`.
    pub fn push(&mut self, entry: LogEntry) {
        let node = entry.node.map(|n| n as i64).unwrap_or(-1);
        match entry.level {
            LogLevel::Info => tracing::info!(node, "{}", entry.message),
            LogLevel::Success => tracing::info!(node, success = true, "{}", entry.message),
            LogLevel::Warning => tracing::warn!(node, "{}", entry.message),
            LogLevel::Error => tracing::error!(node, "{}", entry.message),
        }
        self.entries.push(entry);
    }

    pub fn info(&mut self, node: NodeId, msg: impl Into<String>) {
        self.push(LogEntry::info(msg).with_node(node));
    }

    pub fn success(&mut self, node: NodeId, msg: impl Into<String>) {
        self.push(LogEntry::success(msg).with_node(node));
    }

    pub fn warning(&mut self, node: NodeId, msg: impl Into<String>) {
        self.push(LogEntry::warning(msg).with_node(node));
    }

    pub fn error(&mut self, node: NodeId, msg: impl Into<String>) {
        self.push(LogEntry::error(msg).with_node(node));
    }

    /// Move every entry of `other` into this log (already traced, not re-emitted).
    pub fn append(&mut self, other: &mut OperationLog) {
        self.entries.append(&mut other.entries);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries at `Warning` level or above.
    pub fn problems(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.level, LogLevel::Warning | LogLevel::Error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serialization() {
        let entry = LogEntry::warning("Unknown source field 'x'").with_node(4);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["node"], 4);
    }

    #[test]
    fn test_append_moves_entries() {
        let mut op_log = OperationLog::new();
        op_log.info(1, "extracted 2 records");
        op_log.warning(1, "skipped mapping entry");

        let mut run_log = OperationLog::new();
        run_log.append(&mut op_log);

        assert!(op_log.is_empty());
        assert_eq!(run_log.len(), 2);
        assert_eq!(run_log.problems().count(), 1);
    }
}
