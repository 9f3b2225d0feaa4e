use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attempt count applied when the configured value is missing or unusable.
pub const DEFAULT_COUNT: u32 = 5;
/// Inter-attempt delay (seconds) applied when the configured value is missing or unusable.
pub const DEFAULT_DELAY_SECS: u32 = 15;

/// Severity attached to log entries and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    /// Glyph shown next to feed entries and notices.
    pub fn glyph(self) -> &'static str {
        match self {
            Level::Info => "ℹ",
            Level::Success => "✔",
            Level::Warning => "⚠",
            Level::Error => "✖",
        }
    }
}

/// Lifecycle state of the panel's one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Validating,
    Ready,
    Running,
    Error,
}

/// A validated backend session. Exists only for the process lifetime;
/// the credential blob is held verbatim and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user: String,
    pub appstate: Value,
}

/// Immutable input to one batch run, built fresh from CLI/config state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub appstate: Value,
    pub message: String,
    pub link: String,
    pub count: u32,
    pub delay_secs: u32,
}

impl RunRequest {
    /// Build a request from raw form-style inputs. Count and delay are parsed
    /// permissively: anything non-numeric or non-positive falls back to the
    /// defaults rather than failing.
    pub fn from_raw(
        appstate: Value,
        message: impl Into<String>,
        link: impl Into<String>,
        count: &str,
        delay: &str,
    ) -> Self {
        Self {
            appstate,
            message: message.into(),
            link: link.into(),
            count: parse_count(count),
            delay_secs: parse_delay(delay),
        }
    }
}

/// Parse an attempt count, falling back to [`DEFAULT_COUNT`].
pub fn parse_count(raw: &str) -> u32 {
    parse_positive(raw, DEFAULT_COUNT)
}

/// Parse a delay in seconds, falling back to [`DEFAULT_DELAY_SECS`].
pub fn parse_delay(raw: &str) -> u32 {
    parse_positive(raw, DEFAULT_DELAY_SECS)
}

fn parse_positive(raw: &str, default: u32) -> u32 {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

/// One unit of the batch outcome, produced by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub attempt: u32,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Totals for one completed batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: u32,
    pub successful: u32,
    pub failed: u32,
}

/// Events emitted by the controller and folded into presentation state.
/// All observers are write-only consumers of this stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PanelEvent {
    StateChanged {
        state: RunState,
    },
    Log {
        level: Level,
        message: String,
    },
    Notice {
        level: Level,
        message: String,
    },
    StatsReset,
    Attempt {
        result: AttemptResult,
        stats: crate::stats::RunStats,
        progress: f64,
    },
    RunCompleted {
        summary: RunSummary,
    },
    SessionValidated {
        user: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_parses_positive_integers() {
        assert_eq!(parse_count("3"), 3);
        assert_eq!(parse_count(" 12 "), 12);
    }

    #[test]
    fn count_falls_back_on_garbage() {
        assert_eq!(parse_count("abc"), DEFAULT_COUNT);
        assert_eq!(parse_count(""), DEFAULT_COUNT);
        assert_eq!(parse_count("0"), DEFAULT_COUNT);
        assert_eq!(parse_count("-3"), DEFAULT_COUNT);
    }

    #[test]
    fn delay_falls_back_on_garbage() {
        assert_eq!(parse_delay("7"), 7);
        assert_eq!(parse_delay("soon"), DEFAULT_DELAY_SECS);
        assert_eq!(parse_delay("0"), DEFAULT_DELAY_SECS);
    }

    #[test]
    fn run_request_applies_fallbacks() {
        let req = RunRequest::from_raw(
            serde_json::json!({"token": "t"}),
            "hello",
            "",
            "nope",
            "10",
        );
        assert_eq!(req.count, DEFAULT_COUNT);
        assert_eq!(req.delay_secs, 10);
        assert_eq!(req.message, "hello");
    }

    #[test]
    fn attempt_result_decodes_without_error_field() {
        let r: AttemptResult = serde_json::from_str(r#"{"attempt":1,"success":true}"#).unwrap();
        assert_eq!(r.attempt, 1);
        assert!(r.success);
        assert!(r.error.is_none());
    }
}
