//! Unified error interface for LOAM.
//!
//! Every error enum in the workspace implements [`ErrorCode`] so that
//! the framework's error surface (spec'd per layer: resolution,
//! activation, permission, descriptor, storage) can be logged and
//! matched on uniformly.
//!
//! # Code Format
//!
//! - UPPER_SNAKE_CASE, prefixed by layer: `RESOLVE_`, `MODULE_`,
//!   `AUTH_`, `STORE_`, `EVENT_`, `RUNTIME_`
//! - Stable once defined (changing a code is a breaking change)
//!
//! # Example
//!
//! ```
//! use loam_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum StoreFault {
//!     Corrupt(String),
//!     Busy,
//! }
//!
//! impl ErrorCode for StoreFault {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Corrupt(_) => "STORE_CORRUPT",
//!             Self::Busy => "STORE_BUSY",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Busy)
//!     }
//! }
//!
//! assert_eq!(StoreFault::Busy.code(), "STORE_BUSY");
//! assert!(StoreFault::Busy.is_recoverable());
//! ```

/// Machine-readable error classification.
///
/// Recoverable means a retry or corrective action can succeed
/// (transient storage faults, full queues); not recoverable means the
/// input or configuration must change first (malformed descriptors,
/// denied permissions, unsatisfiable requirements).
pub trait ErrorCode {
    /// Returns the stable machine-readable code for this error.
    fn code(&self) -> &'static str;

    /// Returns whether retrying can succeed without a code or
    /// configuration change.
    fn is_recoverable(&self) -> bool;
}

/// Asserts that an error's code is non-empty, carries the expected
/// layer prefix and is UPPER_SNAKE_CASE.
///
/// # Panics
///
/// Panics with a descriptive message on violation; intended for use in
/// each crate's error tests.
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();
    assert!(!code.is_empty(), "error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );
    assert!(
        is_upper_snake_case(code),
        "error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// [`assert_error_code`] over every variant of an error enum.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('_')
        && !s.ends_with('_')
        && !s.contains("__")
        && s.chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
