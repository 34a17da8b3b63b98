//! Council error types
//!
//! One taxonomy for every failure the engine can surface. Each kind tells the
//! caller what to do next: fix the input, wait, fix its call ordering, or
//! retry a whole phase. Tool surfaces render errors through
//! [`CouncilError::to_structured`] so an agent can act on them without
//! string matching.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::debate::state::DebateStatus;
use crate::state::StoreError;

/// Result type alias for council operations
pub type CouncilResult<T> = Result<T, CouncilError>;

/// What kind of input check rejected a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    EmptyPrompt,
    PromptLength,
    PromptInjection,
    DebateIdLength,
    PathTraversal,
    DebateIdFormat,
}

impl ValidationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmptyPrompt => "empty_prompt",
            Self::PromptLength => "prompt_length",
            Self::PromptInjection => "prompt_injection",
            Self::DebateIdLength => "debate_id_length",
            Self::PathTraversal => "path_traversal",
            Self::DebateIdFormat => "debate_id_format",
        }
    }
}

impl std::fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which admission ceiling was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    /// Debates created in the trailing 60 minutes.
    Hourly,
    /// Debates created over the lifetime of the store.
    Total,
}

impl std::fmt::Display for LimitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hourly => write!(f, "hourly"),
            Self::Total => write!(f, "total"),
        }
    }
}

/// Fan-out phase a member call belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionPhase {
    Opinions,
    Voting,
}

impl std::fmt::Display for CollectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opinions => write!(f, "opinions"),
            Self::Voting => write!(f, "voting"),
        }
    }
}

/// Errors that can occur during council operations
#[derive(Error, Debug)]
pub enum CouncilError {
    /// Bad or unsafe input. Never retried automatically.
    #[error("validation failed ({kind}): {message}")]
    Validation {
        kind: ValidationKind,
        message: String,
        field: Option<String>,
    },

    /// Admission denied by one of the rate ceilings.
    #[error("rate limit exceeded ({limit_type}): {current}/{limit}")]
    RateLimitExceeded {
        limit_type: LimitType,
        current: u64,
        limit: u64,
        retry_after_seconds: Option<u64>,
    },

    /// A lifecycle transition was attempted out of order.
    #[error("invalid state: debate is {current}, operation requires {required} ({reason})")]
    InvalidState {
        current: DebateStatus,
        required: DebateStatus,
        reason: String,
    },

    /// The referenced debate does not exist.
    #[error("debate not found: {debate_id}")]
    NotFound { debate_id: String },

    /// One panel member's sampler call or response parse failed. The whole
    /// phase fails with it.
    #[error("{phase} call failed for member {member_id}: {reason}")]
    MemberCallFailure {
        phase: CollectionPhase,
        member_id: String,
        member_name: String,
        reason: String,
    },

    /// The persistence layer failed.
    #[error("store operation {operation} failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl CouncilError {
    /// Shorthand for a validation failure without a field name.
    pub fn validation(kind: ValidationKind, message: impl Into<String>) -> Self {
        Self::Validation {
            kind,
            message: message.into(),
            field: None,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_FAILED",
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::NotFound { .. } => "DEBATE_NOT_FOUND",
            Self::MemberCallFailure { .. } => "MEMBER_CALL_FAILED",
            Self::Store { .. } => "STORE_FAILURE",
        }
    }

    /// Whether a caller may retry the same request unchanged.
    ///
    /// Member failures are retryable only as a whole phase; rate limits after
    /// the stated window.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded { .. } | Self::MemberCallFailure { .. }
        )
    }

    /// Get recovery action for this error
    pub fn recovery_action(&self) -> String {
        match self {
            Self::Validation { kind, .. } => match kind {
                ValidationKind::PromptInjection => {
                    "Rephrase the topic without instructions aimed at the council".to_string()
                }
                ValidationKind::EmptyPrompt | ValidationKind::PromptLength => {
                    "Provide a non-empty topic within the length limit".to_string()
                }
                _ => "Use a debate_id returned by start_council_debate or list_past_debates"
                    .to_string(),
            },
            Self::RateLimitExceeded {
                retry_after_seconds: Some(secs),
                ..
            } => format!("Wait {} seconds before starting another debate", secs),
            Self::RateLimitExceeded { .. } => {
                "The lifetime debate ceiling is reached; no new debates can be started".to_string()
            }
            Self::InvalidState { current, .. } => match current {
                DebateStatus::CollectingOpinions => {
                    "Call conduct_voting before requesting results".to_string()
                }
                DebateStatus::Voting => {
                    "Voting already ran; call get_results for this debate".to_string()
                }
                DebateStatus::Completed => {
                    "Debate is completed; call get_results to read the outcome".to_string()
                }
            },
            Self::NotFound { .. } => "Call list_past_debates to find a valid debate_id".to_string(),
            Self::MemberCallFailure { phase, .. } => match phase {
                CollectionPhase::Opinions => {
                    "Retry start_council_debate; no debate was recorded".to_string()
                }
                CollectionPhase::Voting => {
                    "Retry conduct_voting; the debate is unchanged".to_string()
                }
            },
            Self::Store { .. } => "Check the debate store and retry the operation".to_string(),
        }
    }

    /// Convert to an agent-friendly structured error.
    pub fn to_structured(&self) -> StructuredError {
        let mut err = StructuredError::new(self.code(), self.to_string(), self.recovery_action());
        err.retryable = self.is_retryable();

        match self {
            Self::Validation { kind, field, .. } => {
                err = err.with_context("validation_type", kind.as_str());
                if let Some(field) = field {
                    err = err.with_context("field", field.clone());
                }
            }
            Self::RateLimitExceeded {
                limit_type,
                current,
                limit,
                retry_after_seconds,
            } => {
                err = err
                    .with_context("limit_type", limit_type.to_string())
                    .with_context("current_count", *current)
                    .with_context("limit", *limit);
                if let Some(secs) = retry_after_seconds {
                    err = err.with_context("retry_after_seconds", *secs);
                }
            }
            Self::InvalidState {
                current, required, ..
            } => {
                err = err
                    .with_context("current_status", current.to_string())
                    .with_context("required_status", required.to_string());
            }
            Self::NotFound { debate_id } => {
                err = err.with_context("debate_id", debate_id.clone());
            }
            Self::MemberCallFailure {
                phase,
                member_id,
                member_name,
                ..
            } => {
                err = err
                    .with_context("phase", phase.to_string())
                    .with_context("member_id", member_id.clone())
                    .with_context("member_name", member_name.clone());
            }
            Self::Store { operation, .. } => {
                err = err.with_context("operation", *operation);
            }
        }

        err
    }

    /// Convert to JSON string for MCP responses
    pub fn to_structured_json(&self) -> String {
        serde_json::to_string_pretty(&self.to_structured())
            .unwrap_or_else(|_| format!("{{\"code\":\"{}\"}}", self.code()))
    }
}

/// Structured error response for MCP tools.
///
/// ```json
/// {
///   "code": "RATE_LIMIT_EXCEEDED",
///   "message": "rate limit exceeded (hourly): 50/50",
///   "recovery_action": "Wait 1260 seconds before starting another debate",
///   "context": { "limit_type": "hourly", "current_count": 50, "limit": 50 },
///   "retryable": true
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Actionable recovery instruction for the caller
    pub recovery_action: String,

    /// Relevant context for debugging and recovery
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Whether this error is retryable
    #[serde(default)]
    pub retryable: bool,
}

impl StructuredError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        recovery_action: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            recovery_action: recovery_action.into(),
            context: HashMap::new(),
            retryable: false,
        }
    }

    /// Add context key-value pair
    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for StructuredError {}
