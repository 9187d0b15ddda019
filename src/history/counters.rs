//! Per top-level context history list counters.

use crate::error::InvariantViolation;

/// Offset of the current entry and total entry count for one top-level context.
///
/// `length >= offset + 1` holds after every mutation, and `offset` never exceeds
/// `max_entries - 1`. A fresh context sits at `offset = -1, length = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryCounters {
    offset: i32,
    length: i32,
    max_entries: i32,
}

impl HistoryCounters {
    pub fn new(max_entries: i32) -> Self {
        Self {
            offset: -1,
            length: 0,
            max_entries: max_entries.max(1),
        }
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn length(&self) -> i32 {
        self.length
    }

    pub fn max_entries(&self) -> i32 {
        self.max_entries
    }

    pub fn back_count(&self) -> i32 {
        self.offset.max(0)
    }

    pub fn forward_count(&self) -> i32 {
        (self.length - self.back_count() - 1).max(0)
    }

    /// Apply a committed navigation. A new, non-replacing entry advances `offset` (capped)
    /// and truncates forward history.
    pub fn record_commit(&mut self, created_new: bool, replaced: bool) {
        if created_new && !replaced {
            self.offset = (self.offset + 1).min(self.max_entries - 1);
            self.length = self.offset + 1;
        } else {
            self.restore_invariant();
        }
    }

    /// Adopt the coordinator-supplied offset of a session history navigation.
    pub fn adopt_offset(&mut self, offset: i32) {
        self.offset = offset.clamp(-1, self.max_entries - 1);
        self.restore_invariant();
    }

    /// Overwrite both counters with the coordinator's view before a navigation.
    pub fn overwrite(&mut self, offset: i32, length: i32) {
        self.offset = offset.clamp(-1, self.max_entries - 1);
        self.length = length.max(0);
        self.restore_invariant();
    }

    /// Apply a coordinator request to clear the history list. The coordinator must have
    /// already supplied the cleared values.
    pub fn reset_for_clear(&mut self, supplied_offset: i32, supplied_length: i32) -> Result<(), InvariantViolation> {
        if supplied_offset != -1 || supplied_length != 0 {
            return Err(InvariantViolation::HistoryNotCleared {
                offset: supplied_offset,
                length: supplied_length,
            });
        }
        self.offset = -1;
        self.length = 0;
        Ok(())
    }

    fn restore_invariant(&mut self) {
        if self.length < self.offset + 1 {
            self.length = self.offset + 1;
        }
    }
}

impl Default for HistoryCounters {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_HISTORY_ENTRIES)
    }
}
