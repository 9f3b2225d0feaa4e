//! Projection of the lifecycle state onto a display status.
//!
//! Pure mapping with no side effects; the TUI picks colors from the tone
//! so the core stays free of any rendering dependency.

use crate::model::RunState;

/// Color intent for a status, resolved to a concrete style by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Muted,
    Accent,
    Positive,
    Caution,
    Danger,
}

/// Discrete display status for one lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusView {
    pub label: &'static str,
    pub glyph: &'static str,
    pub tone: Tone,
}

/// Map a lifecycle state to its one display status.
pub fn project(state: RunState) -> StatusView {
    match state {
        RunState::Idle => StatusView {
            label: "Idle",
            glyph: "○",
            tone: Tone::Muted,
        },
        RunState::Validating => StatusView {
            label: "Validating…",
            glyph: "◌",
            tone: Tone::Caution,
        },
        RunState::Ready => StatusView {
            label: "Ready",
            glyph: "●",
            tone: Tone::Positive,
        },
        RunState::Running => StatusView {
            label: "Running",
            glyph: "●",
            tone: Tone::Accent,
        },
        RunState::Error => StatusView {
            label: "Error",
            glyph: "●",
            tone: Tone::Danger,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_state_has_a_fixed_label() {
        assert_eq!(project(RunState::Idle).label, "Idle");
        assert_eq!(project(RunState::Validating).label, "Validating…");
        assert_eq!(project(RunState::Ready).label, "Ready");
        assert_eq!(project(RunState::Running).label, "Running");
        assert_eq!(project(RunState::Error).label, "Error");
    }

    #[test]
    fn tones_distinguish_health() {
        assert_eq!(project(RunState::Ready).tone, Tone::Positive);
        assert_eq!(project(RunState::Error).tone, Tone::Danger);
        assert_ne!(project(RunState::Running).tone, project(RunState::Idle).tone);
    }
}
