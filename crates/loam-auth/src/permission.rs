//! Concrete permissions.
//!
//! A [`Permission`] is (kind, target, actions). Granted permissions
//! *imply* requested ones:
//!
//! - kind: equal, or the grant kind is [`KIND_ALL`]
//! - target: equal, `*`, or trailing-`*` prefix match
//! - actions: superset, or the grant contains `*`
//!
//! # Example
//!
//! ```
//! use loam_auth::Permission;
//!
//! let grant = Permission::new("service", "svc.log.*", "get,register");
//! let wanted = Permission::new("service", "svc.log.Logger", "get");
//! assert!(grant.implies(&wanted));
//!
//! let broader = Permission::new("service", "svc.log.Logger", "get,unregister");
//! assert!(!grant.implies(&broader));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Grant kind implying every other kind.
pub const KIND_ALL: &str = "all";
/// Kind gating module lifecycle operations (`start`, `stop`, `exec`).
pub const KIND_MODULE: &str = "module";
/// Kind gating service registry operations (`register`, `get`, `unregister`).
pub const KIND_SERVICE: &str = "service";
/// Kind gating archive store access (`read`, `write`).
pub const KIND_STORAGE: &str = "storage";

/// The built-in permission kinds the runtime resolves eagerly.
pub const BUILTIN_KINDS: &[&str] = &[KIND_ALL, KIND_MODULE, KIND_SERVICE, KIND_STORAGE];

/// A concrete permission: kind, target and an action set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Permission kind (see the `KIND_*` constants).
    pub kind: String,
    /// Target expression; `*` and trailing-`*` wildcards allowed in
    /// grants.
    pub target: String,
    /// Actions, normalized to a sorted set.
    pub actions: BTreeSet<String>,
}

impl Permission {
    /// Creates a permission from a comma-separated action list.
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        target: impl Into<String>,
        actions: impl AsRef<str>,
    ) -> Self {
        Self {
            kind: kind.into(),
            target: target.into(),
            actions: actions
                .as_ref()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// The all-implying permission (`all * *`).
    #[must_use]
    pub fn all() -> Self {
        Self::new(KIND_ALL, "*", "*")
    }

    /// Returns `true` if this permission's kind is one the runtime
    /// knows how to enforce.
    #[must_use]
    pub fn is_builtin_kind(&self) -> bool {
        BUILTIN_KINDS.contains(&self.kind.as_str())
    }

    /// Returns `true` if this (granted) permission covers `requested`.
    #[must_use]
    pub fn implies(&self, requested: &Permission) -> bool {
        self.kind_implies(&requested.kind)
            && self.target_implies(&requested.target)
            && self.actions_imply(&requested.actions)
    }

    fn kind_implies(&self, kind: &str) -> bool {
        self.kind == KIND_ALL || self.kind == kind
    }

    fn target_implies(&self, target: &str) -> bool {
        if self.target == "*" {
            return true;
        }
        if let Some(prefix) = self.target.strip_suffix('*') {
            return target.starts_with(prefix);
        }
        self.target == target
    }

    fn actions_imply(&self, actions: &BTreeSet<String>) -> bool {
        if self.actions.contains("*") {
            return true;
        }
        actions.iter().all(|a| self.actions.contains(a))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions: Vec<&str> = self.actions.iter().map(String::as_str).collect();
        write!(f, "{} \"{}\" \"{}\"", self.kind, self.target, actions.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_implication() {
        let grant = Permission::new("module", "org.loam.a", "start,stop");
        assert!(grant.implies(&Permission::new("module", "org.loam.a", "start")));
        assert!(grant.implies(&Permission::new("module", "org.loam.a", "start,stop")));
        assert!(!grant.implies(&Permission::new("module", "org.loam.b", "start")));
        assert!(!grant.implies(&Permission::new("module", "org.loam.a", "exec")));
    }

    #[test]
    fn kind_all_implies_everything() {
        let grant = Permission::all();
        assert!(grant.implies(&Permission::new("service", "x", "get")));
        assert!(grant.implies(&Permission::new("storage", "y", "write")));
    }

    #[test]
    fn target_wildcards() {
        let grant = Permission::new("service", "svc.log.*", "get");
        assert!(grant.implies(&Permission::new("service", "svc.log.Logger", "get")));
        assert!(!grant.implies(&Permission::new("service", "svc.http.Server", "get")));

        let star = Permission::new("service", "*", "get");
        assert!(star.implies(&Permission::new("service", "anything", "get")));
    }

    #[test]
    fn action_wildcard() {
        let grant = Permission::new("module", "m", "*");
        assert!(grant.implies(&Permission::new("module", "m", "start,stop,exec")));
    }

    #[test]
    fn kind_mismatch_never_implies() {
        let grant = Permission::new("service", "*", "*");
        assert!(!grant.implies(&Permission::new("module", "m", "start")));
    }

    #[test]
    fn actions_normalized() {
        let p = Permission::new("module", "m", " stop , start ,");
        let actions: Vec<&str> = p.actions.iter().map(String::as_str).collect();
        assert_eq!(actions, vec!["start", "stop"]);
    }

    #[test]
    fn builtin_kind_detection() {
        assert!(Permission::new("module", "m", "start").is_builtin_kind());
        assert!(!Permission::new("custom.widget", "m", "spin").is_builtin_kind());
    }

    #[test]
    fn display_grant_text_shape() {
        let p = Permission::new("module", "org.loam.a", "start,stop");
        assert_eq!(p.to_string(), "module \"org.loam.a\" \"start,stop\"");
    }
}
