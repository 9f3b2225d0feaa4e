//! Text summary builder for CLI output.
//!
//! Formats the final human-readable lines for text mode.

use crate::model::RunSummary;
use crate::stats::RunStats;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build the closing summary from the run outcome.
pub(crate) fn build_text_summary(
    user: Option<&str>,
    summary: &RunSummary,
    stats: &RunStats,
) -> TextSummary {
    let mut lines = Vec::new();

    if let Some(user) = user {
        lines.push(format!("Session: {user}"));
    }
    lines.push(format!(
        "Shares: {} total, {} successful, {} failed",
        summary.total, summary.successful, summary.failed
    ));
    lines.push(format!("Success rate: {}%", stats.success_rate()));

    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lines_include_session_and_counts() {
        let summary = RunSummary {
            total: 5,
            successful: 4,
            failed: 1,
        };
        let stats = RunStats {
            shares: 5,
            success: 4,
            failed: 1,
        };
        let text = build_text_summary(Some("alice"), &summary, &stats);
        assert_eq!(text.lines[0], "Session: alice");
        assert_eq!(text.lines[1], "Shares: 5 total, 4 successful, 1 failed");
        assert_eq!(text.lines[2], "Success rate: 80%");
    }

    #[test]
    fn session_line_is_optional() {
        let summary = RunSummary {
            total: 0,
            successful: 0,
            failed: 0,
        };
        let text = build_text_summary(None, &summary, &RunStats::default());
        assert!(text.lines[0].starts_with("Shares:"));
    }
}
