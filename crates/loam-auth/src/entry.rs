//! Textual permission grants.
//!
//! Grant files are line-oriented:
//!
//! ```text
//! # default grants for sandboxed modules
//! module  "org.loam.*"      "start,stop"
//! service "svc.log.Logger"  "get"
//! // storage is read-only
//! storage "store"           "read"
//! ```
//!
//! One grant per line, `#`/`//` comment lines and blank lines
//! ignored. Entries stay textual until the owning module is first
//! checked — resolution into concrete [`Permission`]s is deferred and
//! cached by the runtime's permission domain.

use crate::{AuthError, Permission};
use serde::{Deserialize, Serialize};

/// A single unresolved grant line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    /// Permission kind token.
    pub kind: String,
    /// Quoted target.
    pub target: String,
    /// Quoted comma-separated action list.
    pub actions: String,
}

impl PermissionEntry {
    /// Creates an entry directly (admin API path).
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        target: impl Into<String>,
        actions: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            target: target.into(),
            actions: actions.into(),
        }
    }

    /// Parses one grant line: `kind "target" "actions"`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ParseFailed`] on a malformed line.
    pub fn parse_line(line: &str) -> Result<Self, AuthError> {
        let line = line.trim();
        let (kind, rest) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| AuthError::parse(line, "expected kind token"))?;

        let (target, rest) = take_quoted(rest.trim_start())
            .ok_or_else(|| AuthError::parse(line, "expected quoted target"))?;
        let (actions, rest) = take_quoted(rest.trim_start())
            .ok_or_else(|| AuthError::parse(line, "expected quoted actions"))?;
        if !rest.trim().is_empty() {
            return Err(AuthError::parse(line, "trailing input after actions"));
        }

        Ok(Self::new(kind, target, actions))
    }

    /// Parses a whole grant file, skipping comments and blank lines.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ParseFailed`] naming the first bad line.
    pub fn parse_lines(text: &str) -> Result<Vec<Self>, AuthError> {
        let mut entries = Vec::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
                continue;
            }
            entries.push(Self::parse_line(trimmed)?);
        }
        Ok(entries)
    }

    /// Resolves the textual entry into a concrete [`Permission`].
    ///
    /// Resolution itself cannot fail — unknown kinds produce a
    /// permission the runtime will log about and which implies
    /// nothing it enforces.
    #[must_use]
    pub fn resolve(&self) -> Permission {
        Permission::new(&self.kind, &self.target, &self.actions)
    }
}

/// Extracts a leading `"..."` token; returns (content, remainder).
fn take_quoted(input: &str) -> Option<(&str, &str)> {
    let rest = input.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some((&rest[..end], &rest[end + 1..]))
}

impl std::fmt::Display for PermissionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} \"{}\" \"{}\"", self.kind, self.target, self.actions)
    }
}
