use std::collections::{HashMap, HashSet};

use shared::domain::{Step, StepId, StepStatus};

/// Immutable copy of the rendered list taken before a mutation, used only to
/// roll that mutation back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingSnapshot {
    steps: Vec<Step>,
}

impl OrderingSnapshot {
    pub fn ids(&self) -> Vec<StepId> {
        self.steps.iter().map(|step| step.id.clone()).collect()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn index_of(&self, step_id: &StepId) -> Option<usize> {
        self.steps.iter().position(|step| &step.id == step_id)
    }

    pub fn get(&self, step_id: &StepId) -> Option<&Step> {
        self.steps.iter().find(|step| &step.id == step_id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Partial field update for a single step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepPatch {
    pub title: Option<String>,
    pub status: Option<StepStatus>,
}

impl StepPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            status: None,
        }
    }

    pub fn status(status: StepStatus) -> Self {
        Self {
            title: None,
            status: Some(status),
        }
    }

    /// The patch that undoes `self` when applied to `step`.
    pub fn inverse_for(&self, step: &Step) -> Self {
        Self {
            title: self.title.as_ref().map(|_| step.title.clone()),
            status: self.status.map(|_| step.status),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.status.is_none()
    }
}

/// The list the user sees, in render order.
///
/// Every mutation is total: unknown ids are ignored and indexes are clamped,
/// so a rollback racing a real change can never fail. After each mutation
/// positions are renumbered `1..=n` and the id -> index map is rebuilt.
#[derive(Debug, Default, Clone)]
pub struct LocalOrderingState {
    steps: Vec<Step>,
    positions: HashMap<StepId, usize>,
    revision: u64,
}

impl LocalOrderingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the state from a server listing, ordered by `step_order`.
    pub fn from_server(mut steps: Vec<Step>) -> Self {
        steps.sort_by_key(|step| step.step_order);
        let mut state = Self::new();
        state.replace_all(steps);
        state
    }

    pub fn current(&self) -> &[Step] {
        &self.steps
    }

    pub fn ids(&self) -> Vec<StepId> {
        self.steps.iter().map(|step| step.id.clone()).collect()
    }

    pub fn get(&self, step_id: &StepId) -> Option<&Step> {
        self.positions
            .get(step_id)
            .and_then(|index| self.steps.get(*index))
    }

    /// Zero-based index of the step in render order.
    pub fn position_of(&self, step_id: &StepId) -> Option<usize> {
        self.positions.get(step_id).copied()
    }

    pub fn contains(&self, step_id: &StepId) -> bool {
        self.positions.contains_key(step_id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Bumped on every mutation that changed something.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replaces the list with `steps` in the given order. Later duplicates of
    /// an id are dropped.
    pub fn replace_all(&mut self, steps: Vec<Step>) {
        let mut seen = HashSet::new();
        let mut next: Vec<Step> = steps
            .into_iter()
            .filter(|step| seen.insert(step.id.clone()))
            .collect();
        renumber(&mut next);
        if next != self.steps {
            self.steps = next;
            self.reindex();
        }
    }

    pub fn patch_one(&mut self, step_id: &StepId, patch: &StepPatch) -> bool {
        let Some(index) = self.position_of(step_id) else {
            return false;
        };
        let step = &mut self.steps[index];
        let mut changed = false;
        if let Some(title) = &patch.title {
            if &step.title != title {
                step.title = title.clone();
                changed = true;
            }
        }
        if let Some(status) = patch.status {
            if step.status != status {
                step.status = status;
                changed = true;
            }
        }
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Removes the step, returning it with the index it occupied.
    pub fn remove_one(&mut self, step_id: &StepId) -> Option<(usize, Step)> {
        let index = self.position_of(step_id)?;
        let step = self.steps.remove(index);
        renumber(&mut self.steps);
        self.reindex();
        Some((index, step))
    }

    /// Inserts at `index` (clamped to the end). An id that is already present
    /// is left where it is.
    pub fn insert_one(&mut self, step: Step, index: usize) -> bool {
        if self.contains(&step.id) {
            return false;
        }
        let index = index.min(self.steps.len());
        self.steps.insert(index, step);
        renumber(&mut self.steps);
        self.reindex();
        true
    }

    /// Swaps the record at `step_id` for `replacement`, keeping its position.
    /// If `replacement`'s id is already listed elsewhere the old record is
    /// simply removed.
    pub fn replace_one(&mut self, step_id: &StepId, replacement: Step) -> bool {
        let Some(index) = self.position_of(step_id) else {
            return false;
        };
        if &replacement.id != step_id && self.contains(&replacement.id) {
            return self.remove_one(step_id).is_some();
        }
        self.steps[index] = replacement;
        renumber(&mut self.steps);
        self.reindex();
        true
    }

    pub fn move_one(&mut self, from: usize, to: usize) -> bool {
        if from >= self.steps.len() || to >= self.steps.len() || from == to {
            return false;
        }
        let step = self.steps.remove(from);
        self.steps.insert(to, step);
        renumber(&mut self.steps);
        self.reindex();
        true
    }

    pub fn snapshot(&self) -> OrderingSnapshot {
        OrderingSnapshot {
            steps: self.steps.clone(),
        }
    }

    /// Puts the list back exactly as captured.
    pub fn restore(&mut self, snapshot: &OrderingSnapshot) {
        self.replace_all(snapshot.steps.clone());
    }

    /// Re-sorts the steps that are still present into the snapshot's relative
    /// order. Steps missing from the snapshot keep their relative order after
    /// the snapshotted ones; nothing is added or dropped and fields are left
    /// untouched.
    pub fn restore_order(&mut self, snapshot: &OrderingSnapshot) {
        let rank: HashMap<&StepId, usize> = snapshot
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| (&step.id, index))
            .collect();
        let mut next = self.steps.clone();
        next.sort_by_key(|step| rank.get(&step.id).copied().unwrap_or(usize::MAX));
        self.replace_all(next);
    }

    fn reindex(&mut self) {
        self.positions = self
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| (step.id.clone(), index))
            .collect();
        self.revision += 1;
    }
}

fn renumber(steps: &mut [Step]) {
    for (index, step) in steps.iter_mut().enumerate() {
        step.step_order = index as i64 + 1;
    }
}

#[cfg(test)]
#[path = "tests/ordering_tests.rs"]
mod tests;
