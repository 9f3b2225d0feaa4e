//! Aggregate statistics for a batch run.
//!
//! Owned exclusively by the controller; presentation layers receive
//! snapshots through `PanelEvent`s and never mutate the live counters.

use crate::model::AttemptResult;
use serde::{Deserialize, Serialize};

/// Counters for the current run. `shares` always equals `success + failed`
/// once ingestion of a result list completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub shares: u32,
    pub success: u32,
    pub failed: u32,
}

impl RunStats {
    /// Whole-number success percentage, 0 when nothing has been processed.
    pub fn success_rate(&self) -> u32 {
        if self.shares == 0 {
            0
        } else {
            (f64::from(self.success) / f64::from(self.shares) * 100.0).round() as u32
        }
    }
}

/// Folds per-attempt results into [`RunStats`] and tracks run progress.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    stats: RunStats,
    progress: f64,
}

impl StatsAggregator {
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Progress through the current result list as a percentage.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Zero the counters and progress. Called at the start of every run.
    pub fn reset(&mut self) {
        self.stats = RunStats::default();
        self.progress = 0.0;
    }

    /// Record one attempt at position `index` of a list of `total` results.
    /// Returns the updated snapshot for event emission.
    pub fn record(&mut self, result: &AttemptResult, index: usize, total: usize) -> (RunStats, f64) {
        if result.success {
            self.stats.success += 1;
        } else {
            self.stats.failed += 1;
        }
        self.stats.shares += 1;
        if total > 0 {
            self.progress = (index + 1) as f64 / total as f64 * 100.0;
        }
        (self.stats, self.progress)
    }
}
