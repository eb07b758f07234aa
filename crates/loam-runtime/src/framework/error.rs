//! Runtime errors — the framework's public error surface.
//!
//! Every public call either returns a result or one of these; there
//! is no silent partial success.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`UnknownModule`](RuntimeError::UnknownModule) | `RUNTIME_UNKNOWN_MODULE` | No |
//! | [`UnknownActivator`](RuntimeError::UnknownActivator) | `RUNTIME_UNKNOWN_ACTIVATOR` | No |
//! | [`ActivationFailed`](RuntimeError::ActivationFailed) | `RUNTIME_ACTIVATION_FAILED` | Yes |
//! | [`PermissionDenied`](RuntimeError::PermissionDenied) | `RUNTIME_PERMISSION_DENIED` | No |
//! | wrapped layer errors | (their own codes) | (their own) |

use crate::{ConfigError, ResolveError, StoreError};
use loam_auth::AuthError;
use loam_module::ModuleError;
use loam_types::ErrorCode;
use thiserror::Error;

/// Framework-level error.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No installed module carries this numeric id.
    #[error("no module #{0}")]
    UnknownModule(u64),

    /// The descriptor names an activator factory nobody registered.
    #[error("no registered activator factory '{0}'")]
    UnknownActivator(String),

    /// The module's activation entry point reported failure; the
    /// module was rolled back to RESOLVED.
    ///
    /// **Recoverable** — a later start may succeed once the cause is
    /// fixed.
    #[error("module {module}: activation failed: {cause}")]
    ActivationFailed {
        /// The module that failed to activate.
        module: String,
        /// Whatever the entry point raised, as text.
        cause: String,
    },

    /// The permission domain denied the checked operation.
    #[error("module {module}: denied {permission}")]
    PermissionDenied {
        /// The module that was checked.
        module: String,
        /// The permission that was required.
        permission: String,
    },

    /// Descriptor or transition error from the module layer.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// Archive store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Per-module resolution failure.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Permission model failure (parse or condition evaluation).
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Configuration failure at framework construction.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ErrorCode for RuntimeError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownModule(_) => "RUNTIME_UNKNOWN_MODULE",
            Self::UnknownActivator(_) => "RUNTIME_UNKNOWN_ACTIVATOR",
            Self::ActivationFailed { .. } => "RUNTIME_ACTIVATION_FAILED",
            Self::PermissionDenied { .. } => "RUNTIME_PERMISSION_DENIED",
            Self::Module(e) => e.code(),
            Self::Store(e) => e.code(),
            Self::Resolve(e) => e.code(),
            Self::Auth(e) => e.code(),
            Self::Config(e) => e.code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::ActivationFailed { .. } => true,
            Self::UnknownModule(_) | Self::UnknownActivator(_) | Self::PermissionDenied { .. } => {
                false
            }
            Self::Module(e) => e.is_recoverable(),
            Self::Store(e) => e.is_recoverable(),
            Self::Resolve(e) => e.is_recoverable(),
            Self::Auth(e) => e.is_recoverable(),
            Self::Config(e) => e.is_recoverable(),
        }
    }
}
