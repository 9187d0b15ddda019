//! Session History
//!
//! Per-frame history state ([`HistoryTracker`]), per top-level context list counters
//! ([`HistoryCounters`]) and the opaque [`HistoryEntry`] blob both operate on.

mod counters;
mod entry;

pub use counters::HistoryCounters;
pub use entry::{HistoryEntry, HistorySnapshot, HISTORY_ENTRY_VERSION};

use std::collections::HashMap;

/// A child frame the coordinator expects to restore during a history navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedChildEntry {
    pub unique_name: String,
    /// The stored entry is just the initial empty document.
    pub is_about_blank: bool,
}

/// Per-frame record of the current history entry and of the child frames a pending
/// history navigation expects to restore.
#[derive(Debug, Default)]
pub struct HistoryTracker {
    current: Option<HistoryEntry>,
    expected_children: HashMap<String, bool>,
}

impl HistoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_entry(&self) -> Option<&HistoryEntry> {
        self.current.as_ref()
    }

    /// Make `entry` current and apply the commit to `counters`. Returns the entry that
    /// was current before.
    pub fn record_commit(
        &mut self,
        entry: HistoryEntry,
        created_new: bool,
        replaced: bool,
        counters: &mut HistoryCounters,
    ) -> Option<HistoryEntry> {
        counters.record_commit(created_new, replaced);
        self.current.replace(entry)
    }

    /// Replace the expected child map; called when a history navigation starts loading.
    pub fn set_expected_children(&mut self, children: HashMap<String, bool>) {
        self.expected_children = children;
    }

    /// Consume the expectation for `unique_name`. A second call for the same name
    /// returns `None`.
    pub fn take_expected_child(&mut self, unique_name: &str) -> Option<ExpectedChildEntry> {
        self.expected_children
            .remove_entry(unique_name)
            .map(|(unique_name, is_about_blank)| ExpectedChildEntry {
                unique_name,
                is_about_blank,
            })
    }

    pub fn clear_expected_children(&mut self) {
        self.expected_children.clear();
    }

    pub fn expected_child_count(&self) -> usize {
        self.expected_children.len()
    }
}
