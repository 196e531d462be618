use std::collections::{HashMap, HashSet};

use shared::domain::{Step, StepId};

use crate::ordering::{LocalOrderingState, StepPatch};

/// What local state currently claims over an incoming server snapshot:
/// everything touched by an operation still in flight, or issued after the
/// snapshot was requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalClaims {
    /// Steps whose local title/status win over the server's.
    pub fields: HashSet<StepId>,
    /// Steps deleted locally; the server may still list them.
    pub tombstones: HashSet<StepId>,
    /// Local-only steps (unconfirmed or freshly confirmed creates) to keep.
    pub unconfirmed: HashSet<StepId>,
    /// A reorder, delete or create is newer than the snapshot.
    pub order_locked: bool,
}

/// Diff produced by folding one server snapshot into local state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub inserted: Vec<StepId>,
    pub removed: Vec<StepId>,
    pub updated: Vec<StepId>,
    pub kept_local: Vec<StepId>,
    pub order_changed: bool,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.inserted.is_empty()
            && self.removed.is_empty()
            && self.updated.is_empty()
            && !self.order_changed
    }
}

#[derive(Debug, Default)]
pub struct ReconciliationEngine {
    awaiting_confirmation: HashSet<StepId>,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps whose local fields were kept over a server snapshot and still
    /// wait for a fetch that agrees with (or overrides) them.
    pub fn awaiting_confirmation(&self) -> &HashSet<StepId> {
        &self.awaiting_confirmation
    }

    pub fn reset(&mut self) {
        self.awaiting_confirmation.clear();
    }

    /// Folds the server's full step list into `local`.
    ///
    /// Order follows the server unless `claims.order_locked`; then the local
    /// order is kept and server-only steps are slotted in at their server
    /// index.
    pub fn apply(
        &mut self,
        local: &mut LocalOrderingState,
        mut server: Vec<Step>,
        claims: &LocalClaims,
    ) -> ReconcileReport {
        server.sort_by_key(|step| step.step_order);
        let mut seen = HashSet::new();
        server.retain(|step| seen.insert(step.id.clone()));

        let mut report = ReconcileReport::default();
        let before = local.ids();

        let mut merged: HashMap<StepId, Step> = HashMap::new();
        let mut server_order: Vec<StepId> = Vec::new();
        for remote in server {
            if claims.tombstones.contains(&remote.id) {
                continue;
            }
            let resolved = match local.get(&remote.id) {
                Some(current) if claims.fields.contains(&remote.id) => {
                    self.awaiting_confirmation.insert(remote.id.clone());
                    report.kept_local.push(remote.id.clone());
                    current.clone()
                }
                Some(current) => {
                    self.awaiting_confirmation.remove(&remote.id);
                    if current.title != remote.title || current.status != remote.status {
                        report.updated.push(remote.id.clone());
                    }
                    remote
                }
                None => {
                    report.inserted.push(remote.id.clone());
                    remote
                }
            };
            server_order.push(resolved.id.clone());
            merged.insert(resolved.id.clone(), resolved);
        }

        let mut local_only: Vec<(usize, Step)> = Vec::new();
        for (index, current) in local.current().iter().enumerate() {
            if merged.contains_key(&current.id) {
                continue;
            }
            if claims.unconfirmed.contains(&current.id) {
                local_only.push((index, current.clone()));
            } else {
                self.awaiting_confirmation.remove(&current.id);
                report.removed.push(current.id.clone());
            }
        }

        let next = if claims.order_locked {
            let mut next: Vec<Step> = Vec::with_capacity(merged.len() + local_only.len());
            let kept: HashSet<&StepId> = local_only.iter().map(|(_, step)| &step.id).collect();
            for current in local.current() {
                if let Some(step) = merged.remove(&current.id) {
                    next.push(step);
                } else if kept.contains(&current.id) {
                    next.push(current.clone());
                }
            }
            for (server_index, id) in server_order.iter().enumerate() {
                if let Some(step) = merged.remove(id) {
                    let at = server_index.min(next.len());
                    next.insert(at, step);
                }
            }
            next
        } else {
            let mut next: Vec<Step> = server_order
                .iter()
                .filter_map(|id| merged.remove(id))
                .collect();
            for (index, step) in local_only {
                let at = index.min(next.len());
                next.insert(at, step);
            }
            next
        };

        local.replace_all(next);
        let after = local.ids();
        report.order_changed = {
            let common_before: Vec<&StepId> =
                before.iter().filter(|id| after.contains(id)).collect();
            let common_after: Vec<&StepId> =
                after.iter().filter(|id| before.contains(id)).collect();
            common_before != common_after
        };
        report
    }

    /// Merges one authoritative step returned by a committed call. Skipped
    /// when a newer local operation still claims the step.
    pub fn merge_step(
        &mut self,
        local: &mut LocalOrderingState,
        step: &Step,
        claims: &LocalClaims,
    ) -> bool {
        if claims.fields.contains(&step.id) || !local.contains(&step.id) {
            return false;
        }
        self.awaiting_confirmation.remove(&step.id);
        local.patch_one(
            &step.id,
            &StepPatch {
                title: Some(step.title.clone()),
                status: Some(step.status),
            },
        );
        true
    }
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
