//! ---
//! gw_section: "02-reconciliation-engine"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Reconciliation engine for node telemetry snapshots."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
//! Detects newly appended log entries that carry an inquiry trigger.
//!
//! Each log list is treated as append-only. A cursor remembers how many entries were
//! already examined; only entries past the cursor are scanned. When a list comes back
//! shorter than the cursor the server has reset it, and the cursor is re-baselined to the
//! new length without emitting anything.
//!
//! With a global cursor the logs of every node in one poll are read as a single stream in
//! snapshot order, so the shared cursor advances once per poll rather than once per node.

use std::collections::HashMap;

use gridwatch_common::{CursorScope, WatcherConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Cursor key used when all nodes share one cursor.
pub const GLOBAL_CURSOR_KEY: &str = "*";

/// Case-insensitive substring match against a fixed phrase list.
#[derive(Debug, Clone)]
pub struct TriggerPattern {
    phrases: Vec<String>,
}

impl TriggerPattern {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, entry: &str) -> bool {
        let entry = entry.to_lowercase();
        self.phrases.iter().any(|phrase| entry.contains(phrase))
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

/// Number of entries of one log list already examined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCursor {
    pub last_seen_count: usize,
}

/// A newly observed log entry that matched the trigger pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub node_id: String,
    pub text: String,
    /// Position of the entry in the node's log list.
    pub index: usize,
}

#[derive(Debug)]
pub struct LogWatcher {
    pattern: TriggerPattern,
    scope: CursorScope,
    cursors: HashMap<String, LogCursor>,
}

impl LogWatcher {
    pub fn new(pattern: TriggerPattern, scope: CursorScope) -> Self {
        Self {
            pattern,
            scope,
            cursors: HashMap::new(),
        }
    }

    pub fn from_config(config: &WatcherConfig) -> Self {
        Self::new(TriggerPattern::new(&config.trigger_phrases), config.scope)
    }

    fn key<'a>(&self, node_id: &'a str) -> &'a str {
        match self.scope {
            CursorScope::PerNode => node_id,
            CursorScope::Global => GLOBAL_CURSOR_KEY,
        }
    }

    /// Examine one node's current log list and return triggers in entries not seen before.
    ///
    /// A node seen for the first time starts at a cursor of zero, so matching entries
    /// already present fire once.
    pub fn scan(&mut self, node_id: &str, logs: &[String]) -> Vec<TriggerEvent> {
        self.scan_poll([(node_id, logs)])
    }

    /// Examine the logs of every node in one poll.
    pub fn scan_poll<'a, I>(&mut self, nodes: I) -> Vec<TriggerEvent>
    where
        I: IntoIterator<Item = (&'a str, &'a [String])>,
    {
        let events = match self.scope {
            CursorScope::PerNode => {
                let mut events = Vec::new();
                for (node_id, logs) in nodes {
                    events.extend(self.advance(node_id, &[(node_id, logs)]));
                }
                events
            }
            CursorScope::Global => {
                let streams: Vec<(&str, &[String])> = nodes.into_iter().collect();
                self.advance(GLOBAL_CURSOR_KEY, &streams)
            }
        };

        for event in &events {
            info!(node_id = %event.node_id, index = event.index, text = %event.text, "inquiry trigger observed");
        }
        events
    }

    /// Move the cursor under `key` across `streams`, read back to back.
    fn advance(&mut self, key: &str, streams: &[(&str, &[String])]) -> Vec<TriggerEvent> {
        let cursor = self.cursors.entry(key.to_owned()).or_default();
        let seen = cursor.last_seen_count;
        let count: usize = streams.iter().map(|(_, logs)| logs.len()).sum();

        if count < seen {
            debug!(cursor = key, previous = seen, current = count, "log list shrank; re-baselining cursor");
            cursor.last_seen_count = count;
            return Vec::new();
        }
        cursor.last_seen_count = count;

        let mut events = Vec::new();
        let mut offset = 0;
        for (node_id, logs) in streams {
            for (index, entry) in logs.iter().enumerate() {
                if offset + index >= seen && self.pattern.matches(entry) {
                    events.push(TriggerEvent {
                        node_id: (*node_id).to_owned(),
                        text: entry.clone(),
                        index,
                    });
                }
            }
            offset += logs.len();
        }
        events
    }

    pub fn cursor(&self, node_id: &str) -> Option<LogCursor> {
        self.cursors.get(self.key(node_id)).copied()
    }

    /// Drop the cursor of a node that has disappeared. A shared cursor is never dropped.
    pub fn forget(&mut self, node_id: &str) {
        if self.scope == CursorScope::PerNode {
            self.cursors.remove(node_id);
        }
    }

    pub fn scope(&self) -> CursorScope {
        self.scope
    }

    pub fn pattern(&self) -> &TriggerPattern {
        &self.pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logs(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|e| e.to_string()).collect()
    }

    fn watcher() -> LogWatcher {
        LogWatcher::from_config(&WatcherConfig::default())
    }

    #[test]
    fn trigger_fires_once_across_repeated_polls() {
        let mut watcher = watcher();
        let first = logs(&["a", "b", "TRIGGER: hq inquiry"]);
        let events = watcher.scan("n1", &first);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 2);
        assert_eq!(events[0].text, "TRIGGER: hq inquiry");
        assert_eq!(watcher.cursor("n1").unwrap().last_seen_count, 3);

        assert!(watcher.scan("n1", &first).is_empty());
        assert!(watcher.scan("n1", &first).is_empty());
    }

    #[test]
    fn only_appended_entries_are_scanned() {
        let mut watcher = watcher();
        watcher.scan("n1", &logs(&["HQ is inquiring if the problem is solved..."]));
        let events = watcher.scan(
            "n1",
            &logs(&[
                "HQ is inquiring if the problem is solved...",
                "[12:00:01] Voltage restored",
                "[12:00:05] HQ IS INQUIRING if the problem is solved...",
            ]),
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 2);
    }

    #[test]
    fn shrink_rebaselines_without_emitting() {
        let mut watcher = watcher();
        watcher.scan("n1", &logs(&["1", "2", "3", "4", "5"]));
        let events = watcher.scan("n1", &logs(&["hq inquiry", "x"]));
        assert!(events.is_empty());
        assert_eq!(watcher.cursor("n1").unwrap().last_seen_count, 2);

        let events = watcher.scan("n1", &logs(&["hq inquiry", "x", "hq inquiry again"]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 2);
    }

    #[test]
    fn per_node_cursors_are_independent() {
        let mut watcher = watcher();
        let entries = logs(&["hq inquiry"]);
        assert_eq!(watcher.scan("a", &entries).len(), 1);
        assert_eq!(watcher.scan("b", &entries).len(), 1);
        watcher.forget("a");
        assert!(watcher.cursor("a").is_none());
        assert_eq!(watcher.scan("a", &entries).len(), 1);
    }

    #[test]
    fn global_scope_shares_one_cursor() {
        let mut watcher = LogWatcher::new(TriggerPattern::new(["hq inquiry"]), CursorScope::Global);
        assert_eq!(watcher.scan("unconfigured", &logs(&["hq inquiry"])).len(), 1);
        assert!(watcher.scan("addis_001", &logs(&["hq inquiry"])).is_empty());
        watcher.forget("addis_001");
        assert_eq!(watcher.cursor("anything").unwrap().last_seen_count, 1);
    }

    #[test]
    fn global_scope_reads_one_poll_as_a_single_stream() {
        let mut watcher = LogWatcher::new(TriggerPattern::new(["hq inquiry"]), CursorScope::Global);
        let a = logs(&["x", "y", "hq inquiry"]);
        let b = logs(&["z"]);
        let mut total = 0;
        for _ in 0..4 {
            total += watcher
                .scan_poll([("A", a.as_slice()), ("B", b.as_slice())])
                .len();
        }
        assert_eq!(total, 1);
        assert_eq!(watcher.cursor("A").unwrap().last_seen_count, 4);

        let b = logs(&["z", "HQ inquiry from B"]);
        let events = watcher.scan_poll([("A", a.as_slice()), ("B", b.as_slice())]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].node_id, "B");
        assert_eq!(events[0].index, 1);
    }

    #[test]
    fn empty_log_list_sets_zero_cursor() {
        let mut watcher = watcher();
        assert!(watcher.scan("n1", &[]).is_empty());
        assert_eq!(watcher.cursor("n1"), Some(LogCursor { last_seen_count: 0 }));
    }

    #[test]
    fn pattern_ignores_blank_phrases() {
        let pattern = TriggerPattern::new(["  ", "Is Inquiring"]);
        assert_eq!(pattern.phrases(), ["is inquiring".to_owned()]);
        assert!(!pattern.matches("all quiet"));
    }
}
