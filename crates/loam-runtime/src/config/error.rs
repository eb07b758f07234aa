//! Configuration errors.

use loam_types::ErrorCode;
use thiserror::Error;

/// Configuration layer error.
///
/// | Error | Code | Recoverable |
/// |-------|------|-------------|
/// | [`ReadFailed`](ConfigError::ReadFailed) | `CONFIG_READ_FAILED` | Yes |
/// | [`ParseFailed`](ConfigError::ParseFailed) | `CONFIG_PARSE_FAILED` | No |
/// | [`InvalidEnvVar`](ConfigError::InvalidEnvVar) | `CONFIG_INVALID_ENV_VAR` | No |
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("cannot read config '{path}': {reason}")]
    ReadFailed {
        /// File path.
        path: String,
        /// IO error text.
        reason: String,
    },

    /// A config file exists but is not valid TOML for [`super::LoamConfig`].
    #[error("cannot parse config '{path}': {reason}")]
    ParseFailed {
        /// File path (or `<merged>` for the merged layer).
        path: String,
        /// Parser error text.
        reason: String,
    },

    /// An environment variable carried an unusable value.
    #[error("invalid env var {var}: {reason}")]
    InvalidEnvVar {
        /// Variable name.
        var: String,
        /// What was expected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn read(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn env(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            var: var.into(),
            reason: reason.into(),
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::ReadFailed { .. } => "CONFIG_READ_FAILED",
            Self::ParseFailed { .. } => "CONFIG_PARSE_FAILED",
            Self::InvalidEnvVar { .. } => "CONFIG_INVALID_ENV_VAR",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::ReadFailed { .. })
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
                ConfigError::read("p", "r"),
                ConfigError::parse("p", "r"),
                ConfigError::env("V", "r"),
            ],
            "CONFIG_",
        );
    }
}
