//! Resolution errors.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`Unresolved`](ResolveError::Unresolved) | `RESOLVE_UNRESOLVED` | Yes |
//! | [`UsesConflict`](ResolveError::UsesConflict) | `RESOLVE_USES_CONFLICT` | Yes |

use loam_module::Requirement;
use loam_types::{ErrorCode, ModuleId};
use thiserror::Error;

/// Per-module resolution failure. Always local: siblings in the same
/// batch resolve or fail on their own.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// One or more mandatory requirements found no candidate.
    ///
    /// **Recoverable** — installing a provider and re-resolving can
    /// succeed.
    #[error("module {module} unresolved: {} unmet requirement(s)", unmet.len())]
    Unresolved {
        /// The module that failed.
        module: ModuleId,
        /// Every mandatory requirement that found no candidate.
        unmet: Vec<Requirement>,
    },

    /// Every candidate assignment violated the uses-constraint
    /// closure.
    ///
    /// **Recoverable** — the conflicting provider set can change.
    #[error("module {module}: no candidate for '{namespace}' survives the uses check")]
    UsesConflict {
        /// The module that failed.
        module: ModuleId,
        /// Namespace whose candidates were exhausted.
        namespace: String,
    },
}

impl ErrorCode for ResolveError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unresolved { .. } => "RESOLVE_UNRESOLVED",
            Self::UsesConflict { .. } => "RESOLVE_USES_CONFLICT",
        }
    }

    fn is_recoverable(&self) -> bool {
        true
    }
}
