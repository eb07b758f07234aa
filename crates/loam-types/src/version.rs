//! Module version numbers.
//!
//! A [`Version`] is a dotted triplet plus an optional qualifier:
//! `major.minor.micro[.qualifier]`. Missing numeric segments default
//! to zero, so `"1"` and `"1.0.0"` denote the same version.
//!
//! # Ordering
//!
//! Versions order by `major`, then `minor`, then `micro`, then
//! qualifier (byte-wise). The empty qualifier sorts *before* any
//! non-empty qualifier:
//!
//! ```
//! use loam_types::Version;
//!
//! let plain = Version::parse("1.0.0").unwrap();
//! let tagged = Version::parse("1.0.0.beta").unwrap();
//! assert!(plain < tagged);
//! ```
//!
//! This is the opposite of semver pre-release ordering, which is why
//! the type is defined here rather than borrowed from the semver crate.

use crate::ErrorCode;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error produced when parsing a [`Version`] or version range text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The version string was empty.
    #[error("empty version string")]
    Empty,

    /// A numeric segment was not a valid number.
    #[error("invalid version segment '{0}'")]
    InvalidSegment(String),

    /// The qualifier contained a forbidden character.
    #[error("invalid qualifier '{0}': only [A-Za-z0-9_-] allowed")]
    InvalidQualifier(String),

    /// A range expression was malformed.
    #[error("invalid version range '{0}': {1}")]
    InvalidRange(String, String),

    /// Range floor was above the ceiling.
    #[error("range floor {floor} exceeds ceiling {ceiling}")]
    FloorAboveCeiling {
        /// Lower bound of the offending range.
        floor: Version,
        /// Upper bound of the offending range.
        ceiling: Version,
    },
}

impl ErrorCode for VersionError {
    fn code(&self) -> &'static str {
        match self {
            Self::Empty => "VERSION_EMPTY",
            Self::InvalidSegment(_) => "VERSION_INVALID_SEGMENT",
            Self::InvalidQualifier(_) => "VERSION_INVALID_QUALIFIER",
            Self::InvalidRange(_, _) => "VERSION_INVALID_RANGE",
            Self::FloorAboveCeiling { .. } => "VERSION_FLOOR_ABOVE_CEILING",
        }
    }

    fn is_recoverable(&self) -> bool {
        // Malformed input never becomes valid on retry.
        false
    }
}

/// A module or capability version: `major.minor.micro[.qualifier]`.
///
/// # Example
///
/// ```
/// use loam_types::Version;
///
/// let v = Version::new(1, 2, 3);
/// assert_eq!(v.to_string(), "1.2.3");
///
/// let v = Version::parse("2.0").unwrap();
/// assert_eq!(v, Version::new(2, 0, 0));
///
/// let v = Version::parse("1.4.0.rc1").unwrap();
/// assert_eq!(v.qualifier(), "rc1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    /// Major segment.
    pub major: u32,
    /// Minor segment.
    pub minor: u32,
    /// Micro segment.
    pub micro: u32,
    /// Optional qualifier; empty string when absent.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    qualifier: String,
}

impl Version {
    /// The zero version `0.0.0`.
    pub const ZERO: Version = Version {
        major: 0,
        minor: 0,
        micro: 0,
        qualifier: String::new(),
    };

    /// Creates a version without a qualifier.
    #[must_use]
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// Creates a version with a qualifier.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidQualifier`] if the qualifier
    /// contains characters outside `[A-Za-z0-9_-]`.
    pub fn with_qualifier(
        major: u32,
        minor: u32,
        micro: u32,
        qualifier: impl Into<String>,
    ) -> Result<Self, VersionError> {
        let qualifier = qualifier.into();
        if !qualifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(VersionError::InvalidQualifier(qualifier));
        }
        Ok(Self {
            major,
            minor,
            micro,
            qualifier,
        })
    }

    /// Parses a version string.
    ///
    /// Missing numeric segments default to zero; everything after the
    /// third dot is the qualifier.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] on empty input, non-numeric segments or
    /// an invalid qualifier.
    ///
    /// # Example
    ///
    /// ```
    /// use loam_types::Version;
    ///
    /// assert_eq!(Version::parse("3").unwrap(), Version::new(3, 0, 0));
    /// assert_eq!(Version::parse("3.1").unwrap(), Version::new(3, 1, 0));
    /// assert!(Version::parse("3.x").is_err());
    /// assert!(Version::parse("").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut parts = text.splitn(4, '.');
        let major = parse_segment(parts.next().unwrap_or(""))?;
        let minor = match parts.next() {
            Some(s) => parse_segment(s)?,
            None => 0,
        };
        let micro = match parts.next() {
            Some(s) => parse_segment(s)?,
            None => 0,
        };
        match parts.next() {
            Some(q) => Self::with_qualifier(major, minor, micro, q),
            None => Ok(Self::new(major, minor, micro)),
        }
    }

    /// Returns the qualifier, or `""` when absent.
    #[must_use]
    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }
}

fn parse_segment(s: &str) -> Result<u32, VersionError> {
    s.parse::<u32>()
        .map_err(|_| VersionError::InvalidSegment(s.to_string()))
}

impl Default for Version {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then(self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_triplet() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(v, Version::new(1, 2, 3));
        assert_eq!(v.qualifier(), "");
    }

    #[test]
    fn parse_partial_defaults_to_zero() {
        assert_eq!(Version::parse("1").unwrap(), Version::new(1, 0, 0));
        assert_eq!(Version::parse("1.5").unwrap(), Version::new(1, 5, 0));
    }

    #[test]
    fn parse_with_qualifier() {
        let v = Version::parse("1.0.0.rc-1").unwrap();
        assert_eq!(v.qualifier(), "rc-1");
        assert_eq!(v.to_string(), "1.0.0.rc-1");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Version::parse(""), Err(VersionError::Empty));
        assert!(matches!(
            Version::parse("a.b"),
            Err(VersionError::InvalidSegment(_))
        ));
        assert!(matches!(
            Version::parse("1.0.0.bad qualifier"),
            Err(VersionError::InvalidQualifier(_))
        ));
    }

    #[test]
    fn ordering_numeric_then_qualifier() {
        let a = Version::parse("1.0.0").unwrap();
        let b = Version::parse("1.0.1").unwrap();
        let c = Version::parse("1.1.0").unwrap();
        let d = Version::parse("2.0.0").unwrap();
        assert!(a < b && b < c && c < d);
    }

    #[test]
    fn empty_qualifier_sorts_first() {
        let plain = Version::parse("1.0.0").unwrap();
        let alpha = Version::parse("1.0.0.alpha").unwrap();
        let beta = Version::parse("1.0.0.beta").unwrap();
        assert!(plain < alpha);
        assert!(alpha < beta);
    }

    #[test]
    fn display_roundtrip() {
        for text in ["0.0.0", "1.2.3", "10.0.4.final"] {
            let v = Version::parse(text).unwrap();
            assert_eq!(v.to_string(), text);
            assert_eq!(Version::parse(&v.to_string()).unwrap(), v);
        }
    }

    #[test]
    fn from_str_trait() {
        let v: Version = "1.2".parse().unwrap();
        assert_eq!(v, Version::new(1, 2, 0));
    }

    #[test]
    fn serde_roundtrip() {
        let v = Version::parse("1.0.0.beta").unwrap();
        let json = serde_json::to_string(&v).unwrap();
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
