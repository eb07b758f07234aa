//! Typed attribute values.
//!
//! Capabilities, service properties and event property bags all carry
//! ordered maps of `String → AttrValue`. Values are typed so that
//! filter comparisons can be numeric or version-aware instead of
//! falling back to string comparison.

use crate::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An ordered attribute map.
///
/// `BTreeMap` keeps declaration-independent, deterministic iteration
/// order, which the resolver relies on for reproducible candidate
/// ordering.
pub type Attrs = BTreeMap<String, AttrValue>;

/// A typed attribute value.
///
/// # Example
///
/// ```
/// use loam_types::{AttrValue, Version};
///
/// let v = AttrValue::from("hello");
/// assert_eq!(v.as_str(), Some("hello"));
///
/// let v = AttrValue::Version(Version::new(1, 2, 0));
/// assert_eq!(v.to_string(), "1.2.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    /// A plain string.
    Str(String),
    /// A signed integer.
    Int(i64),
    /// A boolean.
    Bool(bool),
    /// A version, compared with version ordering in filters.
    Version(Version),
}

impl AttrValue {
    /// Returns the string payload, if this is a `Str`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the version payload, if this is a `Version`.
    #[must_use]
    pub fn as_version(&self) -> Option<&Version> {
        match self {
            Self::Version(v) => Some(v),
            _ => None,
        }
    }

    /// Parses a filter literal against this value's type.
    ///
    /// Typed comparison needs both sides in the same domain: the
    /// literal from the filter text is re-interpreted as the attribute
    /// value's own type. Returns `None` when the literal does not parse
    /// in that domain.
    #[must_use]
    pub fn coerce(&self, literal: &str) -> Option<AttrValue> {
        match self {
            Self::Str(_) => Some(Self::Str(literal.to_string())),
            Self::Int(_) => literal.trim().parse::<i64>().ok().map(Self::Int),
            Self::Bool(_) => match literal.trim() {
                "true" => Some(Self::Bool(true)),
                "false" => Some(Self::Bool(false)),
                _ => None,
            },
            Self::Version(_) => Version::parse(literal).ok().map(Self::Version),
        }
    }

    /// Total order within a single type; `None` across types.
    #[must_use]
    pub fn partial_cmp_same_type(&self, other: &AttrValue) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Version(a), Self::Version(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Version> for AttrValue {
    fn from(v: Version) -> Self {
        Self::Version(v)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Version(v) => write!(f, "{v}"),
        }
    }
}
