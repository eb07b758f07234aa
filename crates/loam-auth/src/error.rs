//! Auth layer errors.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`ParseFailed`](AuthError::ParseFailed) | `AUTH_PARSE_FAILED` | No |
//! | [`ConditionFailed`](AuthError::ConditionFailed) | `AUTH_CONDITION_FAILED` | Yes |
//! | [`RecursiveCondition`](AuthError::RecursiveCondition) | `AUTH_RECURSIVE_CONDITION` | No |

use loam_types::ErrorCode;
use thiserror::Error;

/// Auth layer error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// A grant line was malformed.
    #[error("bad grant line '{line}': {reason}")]
    ParseFailed {
        /// The offending line.
        line: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A condition could not be evaluated (environment fault, not a
    /// false answer).
    ///
    /// **Recoverable** — the environment may heal; the decision pass
    /// skips the grant.
    #[error("condition evaluation failed: {0}")]
    ConditionFailed(String),

    /// A postponed condition class re-entered its own evaluation —
    /// fatal configuration error, never tolerated silently.
    #[error("condition class '{0}' re-entered its own postponed evaluation")]
    RecursiveCondition(String),
}

impl AuthError {
    /// Convenience constructor for parse failures.
    #[must_use]
    pub fn parse(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseFailed {
            line: line.into(),
            reason: reason.into(),
        }
    }
}

impl ErrorCode for AuthError {
    fn code(&self) -> &'static str {
        match self {
            Self::ParseFailed { .. } => "AUTH_PARSE_FAILED",
            Self::ConditionFailed(_) => "AUTH_CONDITION_FAILED",
            Self::RecursiveCondition(_) => "AUTH_RECURSIVE_CONDITION",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::ConditionFailed(_))
    }
}
