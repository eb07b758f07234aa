//! Module layer errors.
//!
//! # Error Code Convention
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`InvalidDescriptor`](ModuleError::InvalidDescriptor) | `MODULE_INVALID_DESCRIPTOR` | No |
//! | [`MissingHeader`](ModuleError::MissingHeader) | `MODULE_MISSING_HEADER` | No |
//! | [`InvalidClause`](ModuleError::InvalidClause) | `MODULE_INVALID_CLAUSE` | No |
//! | [`Version`](ModuleError::Version) | (version error code) | No |
//! | [`Filter`](ModuleError::Filter) | (filter error code) | No |
//! | [`IllegalTransition`](ModuleError::IllegalTransition) | `MODULE_ILLEGAL_TRANSITION` | No |
//! | [`ActivationFailed`](ModuleError::ActivationFailed) | `MODULE_ACTIVATION_FAILED` | Yes |

use crate::ModuleState;
use loam_types::{ErrorCode, FilterError, VersionError};
use thiserror::Error;

/// Module layer error.
///
/// Descriptor errors make install fail atomically: no partial
/// `ModuleId` is ever retained. Transition errors reject the call and
/// leave the module in its prior state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModuleError {
    /// Manifest text was structurally malformed.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// A mandatory header was absent or empty.
    #[error("missing mandatory header '{0}'")]
    MissingHeader(String),

    /// A capability/requirement clause was malformed.
    #[error("invalid clause: {0}")]
    InvalidClause(String),

    /// A version or range inside the manifest failed to parse.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// A filter expression inside the manifest failed to parse.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// The requested lifecycle operation is not legal in the current
    /// state (e.g. `start()` on an uninstalled module).
    #[error("cannot {operation} while {from}")]
    IllegalTransition {
        /// State the module was in.
        from: ModuleState,
        /// Operation that was rejected.
        operation: String,
    },

    /// The activation entry point reported failure; the module was
    /// unwound to RESOLVED.
    ///
    /// **Recoverable** — a later `start()` may succeed once the cause
    /// is fixed.
    #[error("activation failed: {0}")]
    ActivationFailed(String),
}

impl ModuleError {
    /// Convenience constructor for transition rejections.
    #[must_use]
    pub fn illegal(from: ModuleState, operation: impl Into<String>) -> Self {
        Self::IllegalTransition {
            from,
            operation: operation.into(),
        }
    }
}

impl ErrorCode for ModuleError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidDescriptor(_) => "MODULE_INVALID_DESCRIPTOR",
            Self::MissingHeader(_) => "MODULE_MISSING_HEADER",
            Self::InvalidClause(_) => "MODULE_INVALID_CLAUSE",
            Self::Version(e) => e.code(),
            Self::Filter(e) => e.code(),
            Self::IllegalTransition { .. } => "MODULE_ILLEGAL_TRANSITION",
            Self::ActivationFailed(_) => "MODULE_ACTIVATION_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::ActivationFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_types::assert_error_codes;

    #[test]
    fn own_error_codes_valid() {
        assert_error_codes(
            &[
                ModuleError::InvalidDescriptor("x".into()),
                ModuleError::MissingHeader("H".into()),
                ModuleError::InvalidClause("c".into()),
                ModuleError::illegal(ModuleState::Uninstalled, "start"),
                ModuleError::ActivationFailed("boom".into()),
            ],
            "MODULE_",
        );
    }

    #[test]
    fn wrapped_errors_keep_their_codes() {
        let err: ModuleError = VersionError::Empty.into();
        assert_eq!(err.code(), "VERSION_EMPTY");
        let err: ModuleError = FilterError::Empty.into();
        assert_eq!(err.code(), "FILTER_EMPTY");
    }

    #[test]
    fn activation_failure_recoverable() {
        assert!(ModuleError::ActivationFailed("x".into()).is_recoverable());
        assert!(!ModuleError::illegal(ModuleState::Active, "uninstall").is_recoverable());
    }

    #[test]
    fn illegal_transition_message() {
        let err = ModuleError::illegal(ModuleState::Uninstalled, "start");
        assert_eq!(err.to_string(), "cannot start while uninstalled");
    }
}
