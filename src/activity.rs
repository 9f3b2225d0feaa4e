//! Bounded activity feed shown in the panel.

use crate::model::Level;
use std::collections::VecDeque;
use time::macros::format_description;
use time::OffsetDateTime;

/// Most-recent entries kept; older ones are dropped.
const MAX_ENTRIES: usize = 10;

#[derive(Debug, Clone)]
pub struct ActivityEntry {
    pub at: OffsetDateTime,
    pub level: Level,
    pub message: String,
}

impl ActivityEntry {
    /// Wall-clock time for display, e.g. `14:03:52`.
    pub fn time_label(&self) -> String {
        let fmt = format_description!("[hour]:[minute]:[second]");
        self.at.format(&fmt).unwrap_or_else(|_| String::from("--:--:--"))
    }
}

/// Chronological event feed, newest first, capped at [`MAX_ENTRIES`].
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
}

impl ActivityLog {
    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        let at = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        self.entries.push_front(ActivityEntry {
            at,
            level,
            message: message.into(),
        });
        while self.entries.len() > MAX_ENTRIES {
            self.entries.pop_back();
        }
    }

    /// Entries newest first.
    pub fn iter(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_is_capped_at_ten() {
        let mut log = ActivityLog::default();
        for i in 0..25 {
            log.push(Level::Info, format!("entry {i}"));
        }
        assert_eq!(log.len(), MAX_ENTRIES);
    }

    #[test]
    fn newest_entry_comes_first() {
        let mut log = ActivityLog::default();
        log.push(Level::Info, "first");
        log.push(Level::Warning, "second");
        let newest = log.iter().next().unwrap();
        assert_eq!(newest.message, "second");
        assert_eq!(newest.level, Level::Warning);
    }

    #[test]
    fn oldest_entries_are_dropped() {
        let mut log = ActivityLog::default();
        for i in 0..12 {
            log.push(Level::Info, format!("entry {i}"));
        }
        assert!(log.iter().all(|e| e.message != "entry 0"));
        assert!(log.iter().any(|e| e.message == "entry 11"));
    }
}
