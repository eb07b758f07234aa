//! Conditions gating conditional grants.
//!
//! A [`Condition`] answers "does this grant currently apply?".
//! Conditions come in two evaluation phases:
//!
//! - **immediate** — checked eagerly when a grant is considered
//! - **postponed** — deferred into a single per-decision pass where
//!   all postponed conditions across all candidate grants are
//!   evaluated jointly, sharing state keyed by condition class
//!
//! A condition is additionally **mutable** or not: an immutable
//! immediate condition that fails can never become true again, so the
//! owning grant is permanently disabled.
//!
//! # Shared evaluation state
//!
//! Conditions of the same class evaluated several times within one
//! decision reuse a dictionary slot in [`ConditionState`] — e.g. a
//! call-stack inspection done once and consulted by every instance.
//! A condition class that re-enters its own postponed evaluation
//! during the pass is a fatal configuration error
//! ([`AuthError::RecursiveCondition`]), not a silent allow.

use crate::AuthError;
use std::collections::HashMap;

/// Per-decision evaluation state for postponed conditions.
///
/// One instance lives for the duration of a single permission
/// decision; it is dropped when the decision completes.
#[derive(Debug, Default)]
pub struct ConditionState {
    slots: HashMap<&'static str, serde_json::Value>,
    in_progress: Vec<&'static str>,
}

impl ConditionState {
    /// Creates a fresh per-decision state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared slot for `class`, if previously stored.
    #[must_use]
    pub fn get(&self, class: &str) -> Option<&serde_json::Value> {
        self.slots.get(class)
    }

    /// Stores the shared slot for `class`.
    pub fn put(&mut self, class: &'static str, value: serde_json::Value) {
        self.slots.insert(class, value);
    }

    /// Marks `class` as being evaluated; detects re-entrance.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RecursiveCondition`] if the class is
    /// already on the evaluation stack of this pass.
    pub fn enter(&mut self, class: &'static str) -> Result<(), AuthError> {
        if self.in_progress.contains(&class) {
            return Err(AuthError::RecursiveCondition(class.to_string()));
        }
        self.in_progress.push(class);
        Ok(())
    }

    /// Unmarks `class` after its evaluation returned.
    pub fn exit(&mut self, class: &'static str) {
        if let Some(pos) = self.in_progress.iter().rposition(|c| *c == class) {
            self.in_progress.remove(pos);
        }
    }
}

/// A condition attached to a conditional grant.
pub trait Condition: Send + Sync {
    /// Stable identifier of the condition class; keys the shared
    /// evaluation dictionary.
    fn class_id(&self) -> &'static str;

    /// `true` if evaluation must be deferred to the joint per-decision
    /// pass.
    fn is_postponed(&self) -> bool {
        false
    }

    /// `true` if the condition's truth value can change over time.
    /// Immutable conditions that fail immediately disable their grant
    /// permanently.
    fn is_mutable(&self) -> bool {
        false
    }

    /// Eager evaluation; called for non-postponed conditions.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ConditionFailed`] if the condition cannot
    /// be evaluated at all.
    fn check_immediate(&self) -> Result<bool, AuthError>;

    /// Deferred evaluation with access to the decision-wide shared
    /// state. Default delegates to [`check_immediate`](Self::check_immediate).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if evaluation fails.
    fn check_postponed(&self, state: &mut ConditionState) -> Result<bool, AuthError> {
        let _ = state;
        self.check_immediate()
    }
}

/// A condition with a fixed truth value; immutable and immediate.
///
/// The building block for tests and for default allow/deny grants.
#[derive(Debug, Clone, Copy)]
pub struct FixedCondition(pub bool);

impl Condition for FixedCondition {
    fn class_id(&self) -> &'static str {
        "loam.condition.fixed"
    }

    fn check_immediate(&self) -> Result<bool, AuthError> {
        Ok(self.0)
    }
}
