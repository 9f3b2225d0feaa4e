//! Transient user-visible notifications.
//!
//! Notices live for a fixed interval and are pruned when the active set is
//! read; there is no state beyond the display queue.

use crate::model::Level;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// How long a notice stays visible.
const DEFAULT_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone)]
pub struct Notice {
    pub level: Level,
    pub message: String,
    posted: Instant,
}

#[derive(Debug)]
pub struct NotificationSink {
    notices: VecDeque<Notice>,
    ttl: Duration,
}

impl Default for NotificationSink {
    fn default() -> Self {
        Self {
            notices: VecDeque::new(),
            ttl: DEFAULT_TTL,
        }
    }
}

impl NotificationSink {
    #[cfg(test)]
    fn with_ttl(ttl: Duration) -> Self {
        Self {
            notices: VecDeque::new(),
            ttl,
        }
    }

    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        self.notices.push_back(Notice {
            level,
            message: message.into(),
            posted: Instant::now(),
        });
    }

    /// Currently visible notices, oldest first. Expired ones are dropped.
    pub fn active(&mut self) -> impl Iterator<Item = &Notice> {
        let ttl = self.ttl;
        while self
            .notices
            .front()
            .is_some_and(|n| n.posted.elapsed() >= ttl)
        {
            self.notices.pop_front();
        }
        self.notices.iter()
    }
}
