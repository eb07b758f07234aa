//! The module resolver.
//!
//! Resolution is a pure computation over an immutable
//! [`ResolverSnapshot`]: the framework takes its short global lock
//! only to build the snapshot and to publish the outcome, the
//! matching and backtracking below run lock-free.
//!
//! # Algorithm
//!
//! For each unresolved candidate module, every requirement collects
//! its candidate capabilities from *eligible* providers (already
//! resolved, or co-resolving in the same batch and not failed),
//! ordered by:
//!
//! 1. capabilities of already-RESOLVED providers first
//! 2. higher provider module version
//! 3. lower numeric module id (deterministic tie-break)
//!
//! A mandatory requirement with an empty pool fails the module —
//! locally: every unmet mandatory requirement is collected into one
//! [`ResolveError::Unresolved`] and sibling modules still resolve.
//! Optional requirements simply stay unwired.
//!
//! After tentative selection, the uses-constraint check walks each
//! chosen provider's transitive `uses` closure; a candidate that
//! would let the module see two different providers of the same
//! namespace is removed from its pool and selection retries
//! (per-module backtracking). An exhausted pool fails the module.
//!
//! Co-resolution is optimistic: batch members may wire to each other
//! before either is resolved; a validation fixpoint afterwards fails
//! modules whose chosen provider itself failed, and re-resolves them
//! against the shrunken provider set when an alternative exists.

use crate::{ResolveError, Wire, Wiring};
use loam_module::{ModuleDescriptor, Requirement};
use loam_types::ModuleId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// One module as the resolver sees it.
#[derive(Debug, Clone)]
pub struct SnapshotModule {
    /// Module identity (numeric id, name, version).
    pub id: ModuleId,
    /// Whether the module already has a published wiring.
    pub resolved: bool,
    /// Its declared contracts.
    pub descriptor: Arc<ModuleDescriptor>,
}

/// Immutable input to one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct ResolverSnapshot {
    /// Every installed module.
    pub modules: Vec<SnapshotModule>,
    /// Wires of the already-resolved modules (for the uses closure).
    pub existing_wires: Vec<Wire>,
}

impl ResolverSnapshot {
    fn module(&self, id: u64) -> Option<&SnapshotModule> {
        self.modules.iter().find(|m| m.id.id == id)
    }
}

/// Output of one resolution pass.
#[derive(Debug, Default)]
pub struct ResolutionOutcome {
    /// Newly computed wirings, keyed by numeric module id. Modules
    /// with no requirements get an empty wiring.
    pub wirings: BTreeMap<u64, Wiring>,
    /// Per-module failures; never aborts siblings.
    pub failures: BTreeMap<u64, ResolveError>,
}

impl ResolutionOutcome {
    /// Total number of new wires across all resolved modules.
    #[must_use]
    pub fn wire_count(&self) -> usize {
        self.wirings.values().map(Wiring::len).sum()
    }
}

/// The resolver. Stateless apart from tuning.
#[derive(Debug, Clone)]
pub struct Resolver {
    max_backtracks: usize,
}

impl Resolver {
    /// Creates a resolver with the given backtracking limit.
    #[must_use]
    pub fn new(max_backtracks: usize) -> Self {
        Self { max_backtracks }
    }

    /// Resolves `candidates` against the snapshot.
    ///
    /// Resolving an already-resolved set is a no-op producing no new
    /// wires.
    #[must_use]
    pub fn resolve(
        &self,
        snapshot: &ResolverSnapshot,
        candidates: &BTreeSet<u64>,
    ) -> ResolutionOutcome {
        let mut outcome = ResolutionOutcome::default();

        // Idempotence: already-resolved candidates produce nothing.
        let pending: Vec<u64> = candidates
            .iter()
            .copied()
            .filter(|id| snapshot.module(*id).is_some_and(|m| !m.resolved))
            .collect();
        if pending.is_empty() {
            return outcome;
        }

        let batch: BTreeSet<u64> = pending.iter().copied().collect();

        // First pass: optimistic per-module resolution.
        for &id in &pending {
            match self.resolve_module(id, snapshot, &batch, &outcome) {
                Ok(wiring) => {
                    trace!(module = id, wires = wiring.len(), "tentatively resolved");
                    outcome.wirings.insert(id, wiring);
                }
                Err(err) => {
                    debug!(module = id, error = %err, "resolution failed");
                    outcome.failures.insert(id, err);
                }
            }
        }

        // Validation fixpoint: a wire into a failed batch member
        // invalidates its requirer, which then retries against the
        // shrunken provider set. Failures only grow, so this
        // terminates.
        loop {
            let invalid: Vec<u64> = outcome
                .wirings
                .iter()
                .filter(|(_, wiring)| {
                    wiring
                        .wires
                        .iter()
                        .any(|w| outcome.failures.contains_key(&w.provider.id))
                })
                .map(|(id, _)| *id)
                .collect();
            if invalid.is_empty() {
                break;
            }
            for id in invalid {
                outcome.wirings.remove(&id);
                match self.resolve_module(id, snapshot, &batch, &outcome) {
                    Ok(wiring) => {
                        outcome.wirings.insert(id, wiring);
                    }
                    Err(err) => {
                        debug!(module = id, error = %err, "resolution failed after provider loss");
                        outcome.failures.insert(id, err);
                    }
                }
            }
        }

        outcome
    }

    /// Resolves one module: pool construction, ordered selection,
    /// uses check with backtracking.
    fn resolve_module(
        &self,
        id: u64,
        snapshot: &ResolverSnapshot,
        batch: &BTreeSet<u64>,
        outcome: &ResolutionOutcome,
    ) -> Result<Wiring, ResolveError> {
        let module = snapshot.module(id).expect("candidate in snapshot");
        let descriptor = &module.descriptor;

        // Candidate pools per requirement, mandatory gaps collected.
        let mut pools: Vec<(usize, Vec<Wire>)> = Vec::new();
        let mut unmet: Vec<Requirement> = Vec::new();

        for (req_idx, req) in descriptor.requirements.iter().enumerate() {
            let mut pool: Vec<(bool, &SnapshotModule, Wire)> = Vec::new();
            for provider in &snapshot.modules {
                if !eligible(provider, batch, outcome) {
                    continue;
                }
                for cap in &provider.descriptor.capabilities {
                    if req.matches(cap) {
                        pool.push((
                            provider.resolved,
                            provider,
                            Wire {
                                requirer: module.id.clone(),
                                provider: provider.id.clone(),
                                requirement: req.clone(),
                                capability: cap.clone(),
                            },
                        ));
                    }
                }
            }

            // Resolved first, higher version, lower numeric id.
            pool.sort_by(|(a_res, a_mod, _), (b_res, b_mod, _)| {
                b_res
                    .cmp(a_res)
                    .then(b_mod.id.version.cmp(&a_mod.id.version))
                    .then(a_mod.id.id.cmp(&b_mod.id.id))
            });

            if pool.is_empty() {
                if req.is_mandatory() {
                    unmet.push(req.clone());
                }
                continue;
            }
            pools.push((req_idx, pool.into_iter().map(|(_, _, w)| w).collect()));
        }

        if !unmet.is_empty() {
            return Err(ResolveError::Unresolved {
                module: module.id.clone(),
                unmet,
            });
        }

        // Selection with per-module backtracking over the uses check.
        let mut choice = vec![0usize; pools.len()];
        let mut backtracks = 0usize;
        loop {
            let wires: Vec<Wire> = pools
                .iter()
                .zip(&choice)
                .map(|((_, pool), &pick)| pool[pick].clone())
                .collect();

            match find_uses_conflict(module, &wires, snapshot, outcome) {
                None => return Ok(Wiring::new(wires)),
                Some(offending) => {
                    backtracks += 1;
                    let namespace = pools[offending].1[choice[offending]]
                        .capability
                        .namespace
                        .clone();
                    trace!(
                        module = id,
                        namespace,
                        backtracks,
                        "uses conflict, trying next candidate"
                    );
                    choice[offending] += 1;
                    if backtracks > self.max_backtracks
                        || choice[offending] >= pools[offending].1.len()
                    {
                        return Err(ResolveError::UsesConflict {
                            module: module.id.clone(),
                            namespace,
                        });
                    }
                }
            }
        }
    }
}

/// A provider is eligible if it is already resolved, or co-resolving
/// in this batch and not (yet) failed.
fn eligible(provider: &SnapshotModule, batch: &BTreeSet<u64>, outcome: &ResolutionOutcome) -> bool {
    provider.resolved
        || (batch.contains(&provider.id.id) && !outcome.failures.contains_key(&provider.id.id))
}

/// Walks the transitive uses closure of the chosen wires. Returns the
/// pool index of an offending wire when the module would see two
/// different providers of one namespace, `None` when consistent.
fn find_uses_conflict(
    module: &SnapshotModule,
    wires: &[Wire],
    snapshot: &ResolverSnapshot,
    outcome: &ResolutionOutcome,
) -> Option<usize> {
    // Wiring view per module: tentative for batch members, published
    // for resolved ones.
    let mut existing: HashMap<u64, Vec<&Wire>> = HashMap::new();
    for wire in &snapshot.existing_wires {
        existing.entry(wire.requirer.id).or_default().push(wire);
    }

    let wires_of = |holder: u64| -> Vec<&Wire> {
        if let Some(wiring) = outcome.wirings.get(&holder) {
            wiring.wires.iter().collect()
        } else {
            existing.get(&holder).cloned().unwrap_or_default()
        }
    };

    // Direct visibility: own exports bind first, then each wire.
    // `direct` remembers which wire made a namespace visible, so a
    // transitive clash re-picks the direct wire for that namespace.
    let mut visible: BTreeMap<String, u64> = BTreeMap::new();
    let mut direct: HashMap<String, usize> = HashMap::new();
    for cap in &module.descriptor.capabilities {
        visible.insert(cap.namespace.clone(), module.id.id);
    }
    for (idx, wire) in wires.iter().enumerate() {
        if let Some(&prev) = visible.get(&wire.capability.namespace) {
            if prev != wire.provider.id {
                return Some(idx);
            }
        }
        visible.insert(wire.capability.namespace.clone(), wire.provider.id);
        direct.insert(wire.capability.namespace.clone(), idx);
    }

    // Transitive closure over uses directives.
    let mut work: Vec<(u64, String, usize)> = Vec::new();
    for (idx, wire) in wires.iter().enumerate() {
        for used in wire.capability.uses() {
            work.push((wire.provider.id, used.to_string(), idx));
        }
    }

    let mut seen: HashSet<(u64, String)> = HashSet::new();
    while let Some((holder, namespace, origin)) = work.pop() {
        if !seen.insert((holder, namespace.clone())) {
            continue;
        }

        // What does `holder` see for `namespace`? Its own wiring
        // first, then its own exports. Never a parent/sibling search.
        let via_wire = wires_of(holder)
            .into_iter()
            .find(|w| w.capability.namespace == namespace)
            .map(|w| (w.provider.id, w.capability.clone()));
        let resolved_view = via_wire.or_else(|| {
            snapshot.module(holder).and_then(|m| {
                m.descriptor
                    .capabilities
                    .iter()
                    .find(|c| c.namespace == namespace)
                    .map(|c| (holder, c.clone()))
            })
        });

        let Some((provider, capability)) = resolved_view else {
            continue;
        };

        if let Some(&prev) = visible.get(&namespace) {
            if prev != provider {
                // Prefer re-picking the wire that imports the
                // namespace directly; only its candidates can change
                // which generation the module sees.
                return Some(direct.get(&namespace).copied().unwrap_or(origin));
            }
        } else {
            visible.insert(namespace.clone(), provider);
        }

        for next in capability.uses() {
            work.push((provider, next.to_string(), origin));
        }
    }

    None
}
