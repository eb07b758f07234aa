//! Archive store errors.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`Io`](StoreError::Io) | `STORE_IO` | Yes |
//! | [`BadArchive`](StoreError::BadArchive) | `STORE_BAD_ARCHIVE` | No |
//! | [`Corrupt`](StoreError::Corrupt) | `STORE_CORRUPT` | No |
//! | [`MissingModule`](StoreError::MissingModule) | `STORE_MISSING_MODULE` | No |
//! | [`MissingResource`](StoreError::MissingResource) | `STORE_MISSING_RESOURCE` | No |

use loam_types::ErrorCode;
use std::path::Path;
use thiserror::Error;

/// Archive store error. Surfaced to the caller; the operation aborts
/// and existing state is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    ///
    /// **Recoverable** — transient conditions (permissions fixed, disk
    /// freed) can clear it.
    #[error("io failure at '{path}': {reason}")]
    Io {
        /// Path involved.
        path: String,
        /// OS error text.
        reason: String,
    },

    /// The installed content stream was not a valid module archive.
    #[error("bad module archive: {0}")]
    BadArchive(String),

    /// Persisted store state failed to parse.
    #[error("store state corrupt: {0}")]
    Corrupt(String),

    /// No content stored for the module id.
    #[error("no stored content for module #{0}")]
    MissingModule(u64),

    /// A named resource is absent from the module's content.
    #[error("module #{module} has no resource '{name}'")]
    MissingResource {
        /// Owning module id.
        module: u64,
        /// Requested resource name.
        name: String,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl AsRef<Path>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            reason: err.to_string(),
        }
    }
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "STORE_IO",
            Self::BadArchive(_) => "STORE_BAD_ARCHIVE",
            Self::Corrupt(_) => "STORE_CORRUPT",
            Self::MissingModule(_) => "STORE_MISSING_MODULE",
            Self::MissingResource { .. } => "STORE_MISSING_RESOURCE",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_types::assert_error_codes;

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(
            &[
                StoreError::Io {
                    path: "p".into(),
                    reason: "r".into(),
                },
                StoreError::BadArchive("x".into()),
                StoreError::Corrupt("x".into()),
                StoreError::MissingModule(1),
                StoreError::MissingResource {
                    module: 1,
                    name: "r".into(),
                },
            ],
            "STORE_",
        );
    }

    #[test]
    fn only_io_recoverable() {
        assert!(StoreError::Io {
            path: "p".into(),
            reason: "r".into()
        }
        .is_recoverable());
        assert!(!StoreError::BadArchive("x".into()).is_recoverable());
        assert!(!StoreError::MissingModule(1).is_recoverable());
    }
}
