//! Task status state machine

use serde::{Deserialize, Serialize};

/// Lifecycle states of a bridged task
///
/// The wire form (snake_case) is what lands in `status.json` and what
/// operator tooling matches against, so it never changes shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Supervisor is up, agent session not yet established
    Starting,

    /// Agent session is active and producing output
    Running,

    /// A clarification question is pending an operator answer
    WaitingForAnswer,

    /// Task finished successfully (terminal)
    Complete,

    /// Task failed or was terminated (terminal)
    Error,
}

impl TaskStatus {
    /// Check if this is a terminal state (cannot transition further)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Error)
    }

    /// Active states imply a live supervisor process behind the task
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Wire/display name for the status
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Starting => "starting",
            TaskStatus::Running => "running",
            TaskStatus::WaitingForAnswer => "waiting_for_answer",
            TaskStatus::Complete => "complete",
            TaskStatus::Error => "error",
        }
    }

    /// Get a symbol for the status (for list output)
    pub fn symbol(&self) -> &'static str {
        match self {
            TaskStatus::Starting => "◯",
            TaskStatus::Running => "⟳",
            TaskStatus::WaitingForAnswer => "⧖",
            TaskStatus::Complete => "✓",
            TaskStatus::Error => "✗",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_form_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::WaitingForAnswer).unwrap(),
            "\"waiting_for_answer\""
        );
        assert_eq!(
            serde_json::to_string(&TaskStatus::Starting).unwrap(),
            "\"starting\""
        );

        let parsed: TaskStatus = serde_json::from_str("\"complete\"").unwrap();
        assert_eq!(parsed, TaskStatus::Complete);
    }

    #[test]
    fn test_terminal_classification() {
        assert!(TaskStatus::Complete.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
        assert!(!TaskStatus::Starting.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::WaitingForAnswer.is_terminal());
    }

    #[test]
    fn test_active_is_complement_of_terminal() {
        for status in [
            TaskStatus::Starting,
            TaskStatus::Running,
            TaskStatus::WaitingForAnswer,
            TaskStatus::Complete,
            TaskStatus::Error,
        ] {
            assert_eq!(status.is_active(), !status.is_terminal());
        }
    }

    #[test]
    fn test_display_matches_wire_form() {
        assert_eq!(TaskStatus::WaitingForAnswer.to_string(), "waiting_for_answer");
    }
}
