//! Debate status machine: the three lifecycle states and their guards.

use serde::{Deserialize, Serialize};

/// Authoritative lifecycle status of a debate.
///
/// ```text
/// CollectingOpinions ──vote──▶ Voting ──resolve──▶ Completed
/// ```
///
/// Monotonic: no backward transition, no skipping, no reentry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateStatus {
    /// Initial. Opinions are collected before the debate is first stored.
    CollectingOpinions,
    /// Votes are stored, results not yet computed.
    Voting,
    /// Results are stored. Terminal.
    Completed,
}

impl DebateStatus {
    /// Whether this is the terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// The single status this one may advance to.
    pub fn next(self) -> Option<DebateStatus> {
        match self {
            Self::CollectingOpinions => Some(Self::Voting),
            Self::Voting => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    /// Check that advancing from `self` to `to` is the one legal step.
    pub fn check_transition(self, to: DebateStatus) -> Result<(), TransitionError> {
        if self.next() == Some(to) {
            Ok(())
        } else {
            Err(TransitionError {
                from: self,
                to,
                reason: match self.next() {
                    Some(next) => format!("only {} may follow {}", next, self),
                    None => format!("{} is terminal", self),
                },
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CollectingOpinions => "collecting_opinions",
            Self::Voting => "voting",
            Self::Completed => "completed",
        }
    }

    /// Parse the stored string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "collecting_opinions" => Some(Self::CollectingOpinions),
            "voting" => Some(Self::Voting),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DebateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for invalid status transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: DebateStatus,
    pub to: DebateStatus,
    pub reason: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid transition {} → {}: {}",
            self.from, self.to, self.reason
        )
    }
}

impl std::error::Error for TransitionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(DebateStatus::CollectingOpinions
            .check_transition(DebateStatus::Voting)
            .is_ok());
        assert!(DebateStatus::Voting
            .check_transition(DebateStatus::Completed)
            .is_ok());
    }

    #[test]
    fn test_skip_rejected() {
        let err = DebateStatus::CollectingOpinions
            .check_transition(DebateStatus::Completed)
            .unwrap_err();
        assert_eq!(err.from, DebateStatus::CollectingOpinions);
        assert_eq!(err.to, DebateStatus::Completed);
        assert!(err.reason.contains("voting"));
    }

    #[test]
    fn test_backward_and_repeat_rejected() {
        assert!(DebateStatus::Voting
            .check_transition(DebateStatus::CollectingOpinions)
            .is_err());
        assert!(DebateStatus::Voting
            .check_transition(DebateStatus::Voting)
            .is_err());
    }

    #[test]
    fn test_terminal_no_transitions() {
        assert!(DebateStatus::Completed.is_terminal());
        assert_eq!(DebateStatus::Completed.next(), None);
        let err = DebateStatus::Completed
            .check_transition(DebateStatus::Voting)
            .unwrap_err();
        assert!(err.to_string().contains("terminal"));
    }

    #[test]
    fn test_status_display_and_parse() {
        for status in [
            DebateStatus::CollectingOpinions,
            DebateStatus::Voting,
            DebateStatus::Completed,
        ] {
            assert_eq!(DebateStatus::parse(&status.to_string()), Some(status));
        }
        assert_eq!(DebateStatus::parse("in_progress"), None);
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&DebateStatus::CollectingOpinions).unwrap();
        assert_eq!(json, "\"collecting_opinions\"");
    }
}
