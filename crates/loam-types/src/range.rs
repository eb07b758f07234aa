//! Version ranges with exact boundary semantics.
//!
//! A [`VersionRange`] is an interval over [`Version`]s written in the
//! usual mathematical notation:
//!
//! ```text
//! [1.0,2.0)   1.0 <= v <  2.0
//! (1.0,2.0]   1.0 <  v <= 2.0
//! [1.0,1.0]   exactly 1.0
//! 1.0         [1.0,∞)  — a bare version is sugar for "at least"
//! ```
//!
//! Boundary inclusivity is honoured exactly: `[1.0,2.0)` contains
//! `1.0` and `1.9.9` but not `2.0`.

use crate::{Version, VersionError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An interval over versions.
///
/// Invariant: when a ceiling is present, `floor <= ceiling`; violated
/// ranges fail to construct.
///
/// # Example
///
/// ```
/// use loam_types::{Version, VersionRange};
///
/// let range = VersionRange::parse("[1.0,2.0)").unwrap();
/// assert!(range.includes(&Version::new(1, 0, 0)));
/// assert!(range.includes(&Version::parse("1.9.9").unwrap()));
/// assert!(!range.includes(&Version::new(2, 0, 0)));
///
/// // Bare version means "this or anything newer".
/// let open = VersionRange::parse("1.5").unwrap();
/// assert!(open.includes(&Version::new(9, 0, 0)));
/// assert!(!open.includes(&Version::new(1, 4, 0)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRange {
    /// Lower bound.
    pub floor: Version,
    /// Upper bound; `None` means unbounded above.
    pub ceiling: Option<Version>,
    /// Whether the floor itself is inside the range.
    pub floor_inclusive: bool,
    /// Whether the ceiling itself is inside the range.
    pub ceiling_inclusive: bool,
}

impl VersionRange {
    /// The range `[0.0.0,∞)` — matches every version.
    #[must_use]
    pub fn any() -> Self {
        Self::at_least(Version::ZERO)
    }

    /// Creates the unbounded range `[floor,∞)`.
    #[must_use]
    pub fn at_least(floor: Version) -> Self {
        Self {
            floor,
            ceiling: None,
            floor_inclusive: true,
            ceiling_inclusive: false,
        }
    }

    /// Creates the single-point range `[v,v]`.
    #[must_use]
    pub fn exact(version: Version) -> Self {
        Self {
            floor: version.clone(),
            ceiling: Some(version),
            floor_inclusive: true,
            ceiling_inclusive: true,
        }
    }

    /// Creates a bounded range, validating the floor/ceiling invariant.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::FloorAboveCeiling`] if `floor > ceiling`.
    pub fn bounded(
        floor: Version,
        ceiling: Version,
        floor_inclusive: bool,
        ceiling_inclusive: bool,
    ) -> Result<Self, VersionError> {
        if floor > ceiling {
            return Err(VersionError::FloorAboveCeiling { floor, ceiling });
        }
        Ok(Self {
            floor,
            ceiling: Some(ceiling),
            floor_inclusive,
            ceiling_inclusive,
        })
    }

    /// Parses a range expression.
    ///
    /// Accepted forms: `[floor,ceiling)`, `[floor,ceiling]`,
    /// `(floor,ceiling)`, `(floor,ceiling]`, or a bare version meaning
    /// `[version,∞)`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] on malformed brackets, missing comma,
    /// unparsable versions or a floor above the ceiling.
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VersionError::Empty);
        }

        let first = text.chars().next().unwrap_or(' ');
        if first != '[' && first != '(' {
            // Bare version: sugar for [V,∞).
            return Ok(Self::at_least(Version::parse(text)?));
        }

        let floor_inclusive = first == '[';
        let last = text.chars().last().unwrap_or(' ');
        let ceiling_inclusive = match last {
            ']' => true,
            ')' => false,
            _ => {
                return Err(VersionError::InvalidRange(
                    text.to_string(),
                    "missing closing bracket".to_string(),
                ))
            }
        };

        let inner = &text[1..text.len() - 1];
        let (floor_text, ceiling_text) = inner.split_once(',').ok_or_else(|| {
            VersionError::InvalidRange(text.to_string(), "missing comma".to_string())
        })?;

        let floor = Version::parse(floor_text)?;
        let ceiling = Version::parse(ceiling_text)?;
        Self::bounded(floor, ceiling, floor_inclusive, ceiling_inclusive)
    }

    /// Returns `true` if `version` lies within this range, honouring
    /// boundary inclusivity exactly.
    #[must_use]
    pub fn includes(&self, version: &Version) -> bool {
        let above_floor = if self.floor_inclusive {
            *version >= self.floor
        } else {
            *version > self.floor
        };
        if !above_floor {
            return false;
        }

        match &self.ceiling {
            None => true,
            Some(ceiling) => {
                if self.ceiling_inclusive {
                    *version <= *ceiling
                } else {
                    *version < *ceiling
                }
            }
        }
    }

    /// Returns `true` if the range can match no version at all
    /// (e.g. `(1.0,1.0)`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.ceiling {
            None => false,
            Some(ceiling) => {
                self.floor == *ceiling && !(self.floor_inclusive && self.ceiling_inclusive)
            }
        }
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ceiling {
            None => {
                // Canonical display for [V,∞) is the bare version.
                write!(f, "{}", self.floor)
            }
            Some(ceiling) => {
                let open = if self.floor_inclusive { '[' } else { '(' };
                let close = if self.ceiling_inclusive { ']' } else { ')' };
                write!(f, "{}{},{}{}", open, self.floor, ceiling, close)
            }
        }
    }
}
