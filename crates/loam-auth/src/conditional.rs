//! Conditional grants and the decision procedure.
//!
//! A [`ConditionalGrant`] couples an ordered condition list with a
//! permission collection and an allow/deny decision. The admin-ordered
//! [`ConditionalPermissions`] table answers, for a requested
//! permission, whether some grant whose conditions all hold allows or
//! denies it — the first such grant in table order wins.
//!
//! # Evaluation order
//!
//! 1. Grants whose collection does not mention the requested
//!    permission are skipped.
//! 2. Immediate conditions run eagerly. A failing *immutable*
//!    immediate condition disables the grant permanently (it can
//!    never become true again); a failing mutable one only skips the
//!    grant for this decision.
//! 3. Surviving grants with postponed conditions enter a single joint
//!    pass sharing one [`ConditionState`], so same-class conditions
//!    reuse state and re-entrance is caught as a configuration error.

use crate::{AuthError, Condition, ConditionState, Permission, PermissionCollection};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Allow or deny, attached to a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Matching requests are allowed.
    Allow,
    /// Matching requests are denied.
    Deny,
}

/// One conditional grant: conditions + permissions + decision.
pub struct ConditionalGrant {
    /// Ordered conditions; all must hold for the grant to apply.
    conditions: Vec<Arc<dyn Condition>>,
    /// Permissions this grant speaks for.
    permissions: PermissionCollection,
    /// Allow or deny when the grant applies.
    decision: Decision,
    /// Set once an immutable immediate condition fails; the grant is
    /// then dead for the lifetime of the table.
    disabled: AtomicBool,
}

/// Outcome of evaluating one grant's immediate conditions.
enum ImmediateOutcome {
    /// Every condition (immediate ones) passed; none postponed.
    Applies,
    /// Immediate conditions passed but postponed ones remain.
    Pending(Vec<Arc<dyn Condition>>),
    /// An immediate condition failed for this decision.
    Skipped,
}

impl ConditionalGrant {
    /// Creates a grant.
    #[must_use]
    pub fn new(
        conditions: Vec<Arc<dyn Condition>>,
        permissions: PermissionCollection,
        decision: Decision,
    ) -> Self {
        Self {
            conditions,
            permissions,
            decision,
            disabled: AtomicBool::new(false),
        }
    }

    /// An unconditional grant (applies whenever the permissions match).
    #[must_use]
    pub fn unconditional(permissions: PermissionCollection, decision: Decision) -> Self {
        Self::new(Vec::new(), permissions, decision)
    }

    /// Returns the grant's decision.
    #[must_use]
    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// Returns `true` once the grant has been permanently disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Returns `true` if this grant's collection mentions `requested`.
    #[must_use]
    pub fn mentions(&self, requested: &Permission) -> bool {
        self.permissions.implies(requested)
    }

    /// Runs the immediate conditions.
    fn evaluate_immediate(&self) -> Result<ImmediateOutcome, AuthError> {
        let mut postponed = Vec::new();
        for condition in &self.conditions {
            if condition.is_postponed() {
                postponed.push(Arc::clone(condition));
                continue;
            }
            if !condition.check_immediate()? {
                if !condition.is_mutable() {
                    // An immutable condition cannot change truth value;
                    // cache the failure forever.
                    self.disabled.store(true, Ordering::Release);
                    debug!(
                        class = condition.class_id(),
                        "immutable condition failed, grant permanently disabled"
                    );
                }
                return Ok(ImmediateOutcome::Skipped);
            }
        }
        if postponed.is_empty() {
            Ok(ImmediateOutcome::Applies)
        } else {
            Ok(ImmediateOutcome::Pending(postponed))
        }
    }
}

/// The ordered conditional-grant table.
#[derive(Default)]
pub struct ConditionalPermissions {
    grants: Vec<Arc<ConditionalGrant>>,
}

impl ConditionalPermissions {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table from an ordered grant list.
    #[must_use]
    pub fn with_grants(grants: Vec<Arc<ConditionalGrant>>) -> Self {
        Self { grants }
    }

    /// Appends a grant (admin order = evaluation order).
    pub fn push(&mut self, grant: ConditionalGrant) {
        self.grants.push(Arc::new(grant));
    }

    /// Number of grants, disabled ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Decides `requested`: `Some(Allow/Deny)` from the first grant
    /// whose conditions all hold, `None` when no grant speaks for the
    /// permission at all.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RecursiveCondition`] when a postponed
    /// condition class re-enters its own evaluation — a configuration
    /// error that must surface, not default to deny silently.
    pub fn decide(&self, requested: &Permission) -> Result<Option<Decision>, AuthError> {
        // Joint pass state shared by every postponed condition in this
        // decision, keyed by condition class.
        let mut state = ConditionState::new();

        for grant in &self.grants {
            if grant.is_disabled() || !grant.mentions(requested) {
                continue;
            }

            match grant.evaluate_immediate()? {
                ImmediateOutcome::Skipped => continue,
                ImmediateOutcome::Applies => return Ok(Some(grant.decision())),
                ImmediateOutcome::Pending(postponed) => {
                    match evaluate_postponed(&postponed, &mut state) {
                        Ok(true) => return Ok(Some(grant.decision())),
                        Ok(false) => continue,
                        Err(err @ AuthError::RecursiveCondition(_)) => {
                            warn!(error = %err, "fatal condition configuration error");
                            return Err(err);
                        }
                        Err(err) => {
                            // Evaluation faults skip the grant but are
                            // not silent.
                            warn!(error = %err, "postponed condition evaluation failed");
                            continue;
                        }
                    }
                }
            }
        }
        Ok(None)
    }
}

/// Evaluates a grant's postponed conditions within the joint pass.
fn evaluate_postponed(
    conditions: &[Arc<dyn Condition>],
    state: &mut ConditionState,
) -> Result<bool, AuthError> {
    for condition in conditions {
        let class = condition.class_id();
        state.enter(class)?;
        let result = condition.check_postponed(state);
        state.exit(class);
        if !result? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedCondition;

    fn perm() -> Permission {
        Permission::new("module", "org.loam.a", "start")
    }

    fn allow_grant(conditions: Vec<Arc<dyn Condition>>) -> ConditionalGrant {
        ConditionalGrant::new(
            conditions,
            PermissionCollection::new(vec![Permission::new("module", "*", "start")]),
            Decision::Allow,
        )
    }

    #[test]
    fn empty_table_decides_nothing() {
        let table = ConditionalPermissions::new();
        assert_eq!(table.decide(&perm()).unwrap(), None);
    }

    #[test]
    fn unconditional_allow() {
        let mut table = ConditionalPermissions::new();
        table.push(allow_grant(vec![]));
        assert_eq!(table.decide(&perm()).unwrap(), Some(Decision::Allow));
    }

    #[test]
    fn first_applicable_grant_wins() {
        let mut table = ConditionalPermissions::new();
        table.push(ConditionalGrant::unconditional(
            PermissionCollection::new(vec![Permission::new("module", "*", "start")]),
            Decision::Deny,
        ));
        table.push(allow_grant(vec![]));
        // Deny comes first in admin order.
        assert_eq!(table.decide(&perm()).unwrap(), Some(Decision::Deny));
    }

    #[test]
    fn unrelated_grants_skipped() {
        let mut table = ConditionalPermissions::new();
        table.push(ConditionalGrant::unconditional(
            PermissionCollection::new(vec![Permission::new("service", "*", "get")]),
            Decision::Deny,
        ));
        assert_eq!(table.decide(&perm()).unwrap(), None);
    }

    #[test]
    fn failed_immutable_condition_disables_grant() {
        let mut table = ConditionalPermissions::new();
        table.push(allow_grant(vec![Arc::new(FixedCondition(false))]));

        assert_eq!(table.decide(&perm()).unwrap(), None);
        assert!(table.grants[0].is_disabled());

        // Disabled grants are not consulted again.
        assert_eq!(table.decide(&perm()).unwrap(), None);
    }

    /// A mutable condition backed by an external switch.
    struct SwitchCondition(Arc<AtomicBool>);

    impl Condition for SwitchCondition {
        fn class_id(&self) -> &'static str {
            "test.switch"
        }
        fn is_mutable(&self) -> bool {
            true
        }
        fn check_immediate(&self) -> Result<bool, AuthError> {
            Ok(self.0.load(Ordering::SeqCst))
        }
    }

    #[test]
    fn mutable_condition_failure_is_not_permanent() {
        let switch = Arc::new(AtomicBool::new(false));
        let mut table = ConditionalPermissions::new();
        table.push(allow_grant(vec![Arc::new(SwitchCondition(Arc::clone(
            &switch,
        )))]));

        assert_eq!(table.decide(&perm()).unwrap(), None);
        assert!(!table.grants[0].is_disabled());

        switch.store(true, Ordering::SeqCst);
        assert_eq!(table.decide(&perm()).unwrap(), Some(Decision::Allow));
    }

    /// Postponed condition that counts evaluations through the shared
    /// per-class dictionary slot.
    struct CountingPostponed;

    impl Condition for CountingPostponed {
        fn class_id(&self) -> &'static str {
            "test.counting"
        }
        fn is_postponed(&self) -> bool {
            true
        }
        fn check_immediate(&self) -> Result<bool, AuthError> {
            Ok(true)
        }
        fn check_postponed(&self, state: &mut ConditionState) -> Result<bool, AuthError> {
            let count = state
                .get(self.class_id())
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0);
            state.put(self.class_id(), serde_json::json!(count + 1));
            Ok(true)
        }
    }

    #[test]
    fn postponed_conditions_share_state_within_decision() {
        let mut table = ConditionalPermissions::new();
        // Two postponed conditions of the same class in one grant.
        table.push(allow_grant(vec![
            Arc::new(CountingPostponed),
            Arc::new(CountingPostponed),
        ]));

        assert_eq!(table.decide(&perm()).unwrap(), Some(Decision::Allow));
        // State is per decision; nothing to observe afterwards beyond
        // the decision having succeeded with both instances seeing the
        // same slot (covered by the count logic not panicking).
    }

    /// Pathological condition that re-enters its own class.
    struct RecursiveCondition;

    impl Condition for RecursiveCondition {
        fn class_id(&self) -> &'static str {
            "test.recursive"
        }
        fn is_postponed(&self) -> bool {
            true
        }
        fn check_immediate(&self) -> Result<bool, AuthError> {
            Ok(true)
        }
        fn check_postponed(&self, state: &mut ConditionState) -> Result<bool, AuthError> {
            // Simulates an implementation that triggers another
            // evaluation of its own class mid-pass.
            state.enter(self.class_id())?;
            state.exit(self.class_id());
            Ok(true)
        }
    }

    #[test]
    fn recursive_postponed_condition_is_fatal() {
        let mut table = ConditionalPermissions::new();
        table.push(allow_grant(vec![Arc::new(RecursiveCondition)]));

        let err = table.decide(&perm()).unwrap_err();
        assert!(matches!(err, AuthError::RecursiveCondition(_)));
    }

    #[test]
    fn deny_grant_with_true_condition() {
        let mut table = ConditionalPermissions::new();
        table.push(ConditionalGrant::new(
            vec![Arc::new(FixedCondition(true))],
            PermissionCollection::new(vec![Permission::new("module", "*", "start")]),
            Decision::Deny,
        ));
        assert_eq!(table.decide(&perm()).unwrap(), Some(Decision::Deny));
    }
}
