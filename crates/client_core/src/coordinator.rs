use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    future::Future,
    sync::Arc,
    time::Duration,
};

use shared::{
    domain::{Goal, GoalId, Step, StepId, StepStatus},
    protocol::ActiveGoalResponse,
};
use tokio::sync::{broadcast, Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{OperationError, StoreError},
    ordering::{LocalOrderingState, OrderingSnapshot, StepPatch},
    reconcile::{LocalClaims, ReconcileReport, ReconciliationEngine},
    remote::{MissingGoalStore, RemoteGoalStore, RemoteStepStore},
    RoadmapEvent,
};

/// Prefix of ids synthesized for steps that the server has not created yet.
pub const PLACEHOLDER_PREFIX: &str = "tmp-";

pub fn is_placeholder(step_id: &StepId) -> bool {
    step_id.as_str().starts_with(PLACEHOLDER_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Reorder,
    StatusChange,
    Edit,
    Delete,
    Create,
}

impl OperationKind {
    /// User-facing text for a failed operation of this kind.
    pub fn notice(self) -> &'static str {
        match self {
            Self::Reorder => "order not saved",
            Self::StatusChange => "status not saved",
            Self::Edit => "step not saved",
            Self::Delete => "step not deleted",
            Self::Create => "step not added",
        }
    }

    fn is_structural(self) -> bool {
        matches!(self, Self::Reorder | Self::Delete | Self::Create)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Reorder => "reorder",
            Self::StatusChange => "status_change",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Create => "create",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one operation. `Committed` and `RolledBack` are terminal;
/// `Idle` follows the terminal phase once nothing else is queued on the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    Idle,
    OptimisticallyApplied,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Committed,
    /// A create committed; carries the server's step.
    Created(Step),
    /// Nothing to do (same index, same title, same status).
    Unchanged,
    /// Delete of a step the server no longer has.
    AlreadyApplied,
    /// Committed, but a newer local state superseded the server response.
    Superseded,
}

#[derive(Debug, Clone)]
enum Rollback {
    Order(OrderingSnapshot),
    Field { step_id: StepId, previous: StepPatch },
}

/// Bookkeeping for one in-flight mutation.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub seq: u64,
    pub kind: OperationKind,
    pub target: StepId,
    rollback: Rollback,
    applied_revision: u64,
}

impl PendingOperation {
    pub fn snapshot(&self) -> Option<&OrderingSnapshot> {
        match &self.rollback {
            Rollback::Order(snapshot) => Some(snapshot),
            Rollback::Field { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    /// Upper bound on a single backend call; `None` waits indefinitely.
    pub commit_timeout: Option<Duration>,
}

enum Failure {
    Store(StoreError),
    TimedOut(Duration),
}

enum StatusTarget {
    Exact(StepStatus),
    Toggle,
}

#[derive(Default)]
struct CoordinatorState {
    goal: Option<Goal>,
    local: LocalOrderingState,
    engine: ReconciliationEngine,
    pending: BTreeMap<u64, PendingOperation>,
    next_seq: u64,
    /// Last operation issued per step, for claims against older fetches.
    touched: HashMap<StepId, (u64, OperationKind)>,
    last_structural: u64,
    last_applied_fetch: u64,
}

impl CoordinatorState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn begin(&mut self, kind: OperationKind, target: StepId, rollback: Rollback) -> u64 {
        let seq = self.next_seq();
        self.touched.insert(target.clone(), (seq, kind));
        if kind.is_structural() {
            self.last_structural = seq;
        }
        let applied_revision = self.local.revision();
        self.pending.insert(
            seq,
            PendingOperation {
                seq,
                kind,
                target,
                rollback,
                applied_revision,
            },
        );
        seq
    }

    /// Claims of every operation still in flight, plus those issued after
    /// `since`.
    fn claims_since(&self, since: u64) -> LocalClaims {
        let mut claims = LocalClaims::default();
        let pending = self
            .pending
            .values()
            .map(|op| (&op.target, op.seq, op.kind));
        let recent = self
            .touched
            .iter()
            .filter(|(_, (seq, _))| *seq > since)
            .map(|(target, (seq, kind))| (target, *seq, *kind));

        for (target, _, kind) in pending.chain(recent) {
            match kind {
                OperationKind::Edit | OperationKind::StatusChange => {
                    claims.fields.insert(target.clone());
                }
                OperationKind::Delete => {
                    claims.tombstones.insert(target.clone());
                }
                OperationKind::Create => {
                    claims.unconfirmed.insert(target.clone());
                    claims.fields.insert(target.clone());
                }
                OperationKind::Reorder => {}
            }
            if kind.is_structural() {
                claims.order_locked = true;
            }
        }
        if self.last_structural > since {
            claims.order_locked = true;
        }
        claims
    }

    fn pending_claims(&self) -> LocalClaims {
        self.claims_since(u64::MAX)
    }
}

/// Runs every roadmap mutation through optimistic apply, server commit and
/// rollback on failure.
///
/// Mutations on the same step id are serialized in issue order; mutations on
/// different steps run concurrently, except that reorders, deletes and
/// creates also take the list lock, since a reorder commits the whole id list.
/// The shared state lock is never held across a backend call.
pub struct OperationCoordinator {
    store: Arc<dyn RemoteStepStore>,
    goals: Arc<dyn RemoteGoalStore>,
    config: CoordinatorConfig,
    inner: Mutex<CoordinatorState>,
    step_locks: Mutex<HashMap<StepId, Arc<Mutex<()>>>>,
    order_lock: Mutex<()>,
    events: broadcast::Sender<RoadmapEvent>,
}

impl OperationCoordinator {
    pub fn new(store: Arc<dyn RemoteStepStore>) -> Arc<Self> {
        Self::new_with_dependencies(
            store,
            Arc::new(MissingGoalStore),
            CoordinatorConfig::default(),
        )
    }

    pub fn new_with_dependencies(
        store: Arc<dyn RemoteStepStore>,
        goals: Arc<dyn RemoteGoalStore>,
        config: CoordinatorConfig,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            store,
            goals,
            config,
            inner: Mutex::new(CoordinatorState::default()),
            step_locks: Mutex::new(HashMap::new()),
            order_lock: Mutex::new(()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoadmapEvent> {
        self.events.subscribe()
    }

    pub async fn steps(&self) -> Vec<Step> {
        self.inner.lock().await.local.current().to_vec()
    }

    pub async fn goal(&self) -> Option<Goal> {
        self.inner.lock().await.goal.clone()
    }

    pub async fn position_of(&self, step_id: &StepId) -> Option<usize> {
        self.inner.lock().await.local.position_of(step_id)
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    /// Operations applied locally and still waiting for the server, oldest
    /// first.
    pub async fn pending_operations(&self) -> Vec<PendingOperation> {
        self.inner.lock().await.pending.values().cloned().collect()
    }

    /// True while an operation on the step is in flight or queued; the UI
    /// disables that step's affordances only.
    pub async fn is_busy(&self, step_id: &StepId) -> bool {
        self.step_locks
            .lock()
            .await
            .get(step_id)
            .is_some_and(|lock| Arc::strong_count(lock) > 1)
    }

    /// Fetches the active goal and folds it into local state.
    pub async fn refresh(&self) -> Result<ReconcileReport, OperationError> {
        let fetch_seq = self.inner.lock().await.next_seq();
        let response = self
            .store
            .fetch_active_goal()
            .await
            .map_err(|err| self.remote_error(err))?;
        Ok(self.apply_snapshot(fetch_seq, response).await)
    }

    pub async fn create_goal(&self, description: &str) -> Result<ReconcileReport, OperationError> {
        let description = required("goal description", description)?;
        let fetch_seq = self.begin_goal_write().await?;
        let response = self
            .goals
            .create_goal(description)
            .await
            .map_err(|err| self.remote_error(err))?;
        info!(fetch_seq, "roadmap: goal created");
        Ok(self.apply_snapshot(fetch_seq, response).await)
    }

    /// Rewrites the active goal; the backend regenerates its roadmap, which
    /// replaces the local list.
    pub async fn update_goal(&self, description: &str) -> Result<ReconcileReport, OperationError> {
        let description = required("goal description", description)?;
        let goal_id = self
            .inner
            .lock()
            .await
            .goal
            .as_ref()
            .map(|goal| goal.id.clone())
            .ok_or(OperationError::NoActiveGoal)?;
        let fetch_seq = self.begin_goal_write().await?;
        let response = self
            .goals
            .update_goal(&goal_id, description)
            .await
            .map_err(|err| self.remote_error(err))?;
        info!(goal_id = %goal_id, fetch_seq, "roadmap: goal updated");
        Ok(self.apply_snapshot(fetch_seq, response).await)
    }

    /// Moves the step at `from` to `to` (zero-based render indexes).
    pub async fn reorder(&self, from: usize, to: usize) -> Result<OperationOutcome, OperationError> {
        let step_id = {
            let state = self.inner.lock().await;
            let len = state.local.len();
            if from >= len || to >= len {
                return Err(OperationError::Validation(format!(
                    "cannot move position {from} to {to} in a list of {len}"
                )));
            }
            state.local.current()[from].id.clone()
        };
        self.move_step(&step_id, to).await
    }

    pub async fn move_step(
        &self,
        step_id: &StepId,
        to: usize,
    ) -> Result<OperationOutcome, OperationError> {
        let _guard = self.lock_step(step_id).await;
        let _order = self.lock_order(step_id).await;
        let (seq, ordered) = {
            let mut state = self.inner.lock().await;
            let from = state
                .local
                .position_of(step_id)
                .ok_or_else(|| OperationError::UnknownStep(step_id.clone()))?;
            let len = state.local.len();
            if to >= len {
                return Err(OperationError::Validation(format!(
                    "cannot move to position {to} in a list of {len}"
                )));
            }
            if from == to {
                return Ok(OperationOutcome::Unchanged);
            }
            let snapshot = state.local.snapshot();
            state.local.move_one(from, to);
            let ordered: Vec<StepId> = state
                .local
                .ids()
                .into_iter()
                .filter(|id| !is_placeholder(id))
                .collect();
            let seq = state.begin(
                OperationKind::Reorder,
                step_id.clone(),
                Rollback::Order(snapshot),
            );
            self.emit_applied(&state, seq);
            debug!(step_id = %step_id, seq, from, to, "roadmap: reorder applied optimistically");
            (seq, ordered)
        };

        match self.commit(self.store.reorder(&ordered)).await {
            Ok(()) => Ok(self.settle_committed(seq, None).await),
            Err(failure) => Err(self
                .settle_rolled_back(seq, OperationKind::Reorder, step_id, failure)
                .await),
        }
    }

    pub async fn set_status(
        &self,
        step_id: &StepId,
        status: StepStatus,
    ) -> Result<OperationOutcome, OperationError> {
        self.change_status(step_id, StatusTarget::Exact(status)).await
    }

    /// Flips pending <-> completed, reading the status after any queued
    /// operation on the same step has settled.
    pub async fn toggle_status(&self, step_id: &StepId) -> Result<OperationOutcome, OperationError> {
        self.change_status(step_id, StatusTarget::Toggle).await
    }

    async fn change_status(
        &self,
        step_id: &StepId,
        target: StatusTarget,
    ) -> Result<OperationOutcome, OperationError> {
        let _guard = self.lock_step(step_id).await;
        let (seq, status) = {
            let mut state = self.inner.lock().await;
            let current = state
                .local
                .get(step_id)
                .ok_or_else(|| OperationError::UnknownStep(step_id.clone()))?
                .clone();
            let status = match target {
                StatusTarget::Exact(status) => status,
                StatusTarget::Toggle => current.status.toggled(),
            };
            if current.status == status {
                return Ok(OperationOutcome::Unchanged);
            }
            let patch = StepPatch::status(status);
            let previous = patch.inverse_for(&current);
            state.local.patch_one(step_id, &patch);
            let seq = state.begin(
                OperationKind::StatusChange,
                step_id.clone(),
                Rollback::Field {
                    step_id: step_id.clone(),
                    previous,
                },
            );
            self.emit_applied(&state, seq);
            (seq, status)
        };

        match self.commit(self.store.set_status(step_id, status)).await {
            Ok(step) => Ok(self.settle_committed(seq, Some(step)).await),
            Err(failure) => Err(self
                .settle_rolled_back(seq, OperationKind::StatusChange, step_id, failure)
                .await),
        }
    }

    pub async fn edit_step(
        &self,
        step_id: &StepId,
        title: &str,
    ) -> Result<OperationOutcome, OperationError> {
        let title = required("step title", title)?;
        let _guard = self.lock_step(step_id).await;
        let seq = {
            let mut state = self.inner.lock().await;
            let current = state
                .local
                .get(step_id)
                .ok_or_else(|| OperationError::UnknownStep(step_id.clone()))?
                .clone();
            if current.title == title {
                return Ok(OperationOutcome::Unchanged);
            }
            let patch = StepPatch::title(title);
            let previous = patch.inverse_for(&current);
            state.local.patch_one(step_id, &patch);
            let seq = state.begin(
                OperationKind::Edit,
                step_id.clone(),
                Rollback::Field {
                    step_id: step_id.clone(),
                    previous,
                },
            );
            self.emit_applied(&state, seq);
            seq
        };

        match self.commit(self.store.edit_step(step_id, title)).await {
            Ok(step) => Ok(self.settle_committed(seq, Some(step)).await),
            Err(failure) => Err(self
                .settle_rolled_back(seq, OperationKind::Edit, step_id, failure)
                .await),
        }
    }

    pub async fn delete_step(&self, step_id: &StepId) -> Result<OperationOutcome, OperationError> {
        let _guard = self.lock_step(step_id).await;
        let _order = self.lock_order(step_id).await;
        let seq = {
            let mut state = self.inner.lock().await;
            if !state.local.contains(step_id) {
                return Err(OperationError::UnknownStep(step_id.clone()));
            }
            let snapshot = state.local.snapshot();
            state.local.remove_one(step_id);
            let seq = state.begin(
                OperationKind::Delete,
                step_id.clone(),
                Rollback::Order(snapshot),
            );
            self.emit_applied(&state, seq);
            seq
        };

        match self.commit(self.store.delete_step(step_id)).await {
            Ok(()) => Ok(self.settle_committed(seq, None).await),
            Err(Failure::Store(StoreError::NotFound)) => {
                info!(step_id = %step_id, seq, "roadmap: step was already deleted on the server");
                self.settle_committed(seq, None).await;
                Ok(OperationOutcome::AlreadyApplied)
            }
            Err(failure) => Err(self
                .settle_rolled_back(seq, OperationKind::Delete, step_id, failure)
                .await),
        }
    }

    /// Appends a placeholder step right away and swaps in the server's step
    /// once the create commits.
    pub async fn create_step(
        &self,
        goal_id: &GoalId,
        title: &str,
    ) -> Result<OperationOutcome, OperationError> {
        let title = required("step title", title)?;
        let placeholder_id = StepId::new(format!("{PLACEHOLDER_PREFIX}{}", Uuid::new_v4()));
        let _guard = self.lock_step(&placeholder_id).await;
        let _order = self.lock_order(&placeholder_id).await;
        let seq = {
            let mut state = self.inner.lock().await;
            match &state.goal {
                None => return Err(OperationError::NoActiveGoal),
                Some(goal) if &goal.id != goal_id => {
                    return Err(OperationError::Validation(format!(
                        "goal {goal_id} is not the active goal"
                    )));
                }
                Some(_) => {}
            }
            let snapshot = state.local.snapshot();
            let end = state.local.len();
            state.local.insert_one(
                Step {
                    id: placeholder_id.clone(),
                    goal_id: goal_id.clone(),
                    step_order: end as i64 + 1,
                    title: title.to_string(),
                    status: StepStatus::Pending,
                },
                end,
            );
            let seq = state.begin(
                OperationKind::Create,
                placeholder_id.clone(),
                Rollback::Order(snapshot),
            );
            self.emit_applied(&state, seq);
            seq
        };

        match self.commit(self.store.create_step(goal_id, title)).await {
            Ok(step) => Ok(self.settle_created(seq, &placeholder_id, step).await),
            Err(failure) => Err(self
                .settle_rolled_back(seq, OperationKind::Create, &placeholder_id, failure)
                .await),
        }
    }

    async fn lock_step(&self, step_id: &StepId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.step_locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(step_id.clone()).or_default())
        };
        if lock.try_lock().is_err() {
            debug!(step_id = %step_id, "roadmap: queued behind in-flight operation");
        }
        lock.lock_owned().await
    }

    /// Taken after the step lock, by structural operations only.
    async fn lock_order(&self, step_id: &StepId) -> MutexGuard<'_, ()> {
        if let Ok(guard) = self.order_lock.try_lock() {
            return guard;
        }
        debug!(step_id = %step_id, "roadmap: queued behind in-flight list change");
        self.order_lock.lock().await
    }

    /// Whether another operation waits on the step lock the caller holds.
    async fn has_queued(&self, step_id: &StepId) -> bool {
        // The map entry and the caller's own guard account for two references.
        self.step_locks
            .lock()
            .await
            .get(step_id)
            .is_some_and(|lock| Arc::strong_count(lock) > 2)
    }

    async fn commit<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, Failure> {
        match self.config.commit_timeout {
            Some(after) => match tokio::time::timeout(after, call).await {
                Ok(result) => result.map_err(Failure::Store),
                Err(_) => Err(Failure::TimedOut(after)),
            },
            None => call.await.map_err(Failure::Store),
        }
    }

    async fn settle_committed(&self, seq: u64, authoritative: Option<Step>) -> OperationOutcome {
        let mut state = self.inner.lock().await;
        let Some(op) = state.pending.remove(&seq) else {
            debug!(seq, "roadmap: response for a discarded operation ignored");
            return OperationOutcome::Superseded;
        };

        let mut outcome = OperationOutcome::Committed;
        if let Some(step) = authoritative {
            let claims = state.pending_claims();
            let state = &mut *state;
            if !state.engine.merge_step(&mut state.local, &step, &claims) {
                debug!(step_id = %step.id, seq, "roadmap: stale response discarded");
                outcome = OperationOutcome::Superseded;
            }
        }
        info!(step_id = %op.target, seq, kind = %op.kind, "roadmap: operation committed");
        self.emit_steps(&state);
        self.emit_settled(&op, OperationPhase::Committed).await;
        outcome
    }

    async fn settle_created(&self, seq: u64, placeholder_id: &StepId, step: Step) -> OperationOutcome {
        let mut state = self.inner.lock().await;
        let Some(op) = state.pending.remove(&seq) else {
            debug!(seq, "roadmap: create response for a discarded operation ignored");
            return OperationOutcome::Superseded;
        };

        state.local.replace_one(placeholder_id, step.clone());
        state
            .touched
            .insert(step.id.clone(), (seq, OperationKind::Create));
        state.touched.remove(placeholder_id);
        info!(
            step_id = %step.id,
            placeholder_id = %placeholder_id,
            seq,
            "roadmap: step created"
        );
        self.emit_steps(&state);
        self.emit_settled(&op, OperationPhase::Committed).await;
        OperationOutcome::Created(step)
    }

    async fn settle_rolled_back(
        &self,
        seq: u64,
        kind: OperationKind,
        step_id: &StepId,
        failure: Failure,
    ) -> OperationError {
        let mut state = self.inner.lock().await;
        let Some(op) = state.pending.remove(&seq) else {
            debug!(step_id = %step_id, seq, "roadmap: failure for a discarded operation ignored");
            return to_operation_error(kind, step_id.clone(), failure);
        };

        let untouched = state.local.revision() == op.applied_revision;
        match &op.rollback {
            Rollback::Order(snapshot) if untouched => state.local.restore(snapshot),
            Rollback::Order(snapshot) => match op.kind {
                OperationKind::Delete => {
                    if let (Some(index), Some(step)) =
                        (snapshot.index_of(&op.target), snapshot.get(&op.target))
                    {
                        state.local.insert_one(step.clone(), index);
                    }
                }
                OperationKind::Create => {
                    state.local.remove_one(&op.target);
                }
                _ => state.local.restore_order(snapshot),
            },
            Rollback::Field { step_id, previous } => {
                state.local.patch_one(step_id, previous);
            }
        }

        let err = to_operation_error(op.kind, op.target.clone(), failure);
        warn!(
            step_id = %op.target,
            seq,
            kind = %op.kind,
            exact = untouched,
            error = %err,
            "roadmap: operation rolled back"
        );
        self.emit_steps(&state);
        self.emit_settled(&op, OperationPhase::RolledBack).await;
        if err.requires_reauth() {
            let _ = self.events.send(RoadmapEvent::SessionExpired);
        }
        let _ = self.events.send(RoadmapEvent::OperationFailed {
            kind: op.kind,
            step_id: op.target.clone(),
            notice: op.kind.notice(),
            message: err.to_string(),
        });
        err
    }

    async fn begin_goal_write(&self) -> Result<u64, OperationError> {
        let mut state = self.inner.lock().await;
        if !state.pending.is_empty() {
            return Err(OperationError::Busy);
        }
        Ok(state.next_seq())
    }

    async fn apply_snapshot(&self, fetch_seq: u64, response: ActiveGoalResponse) -> ReconcileReport {
        let mut state = self.inner.lock().await;
        if fetch_seq < state.last_applied_fetch {
            debug!(
                fetch_seq,
                last_applied = state.last_applied_fetch,
                "roadmap: older snapshot discarded"
            );
            return ReconcileReport::default();
        }
        state.last_applied_fetch = fetch_seq;

        let same_goal = match (&state.goal, &response.goal) {
            (Some(current), Some(incoming)) => current.id == incoming.id,
            _ => false,
        };
        let goal_changed = state.goal != response.goal;

        let report = if same_goal {
            let claims = state.claims_since(fetch_seq);
            let state = &mut *state;
            state.engine.apply(&mut state.local, response.steps, &claims)
        } else {
            if !state.pending.is_empty() {
                warn!(
                    pending = state.pending.len(),
                    "roadmap: active goal replaced; in-flight operations discarded"
                );
            }
            state.pending.clear();
            state.touched.clear();
            state.engine.reset();
            let before = state.local.ids();
            let fresh = LocalOrderingState::from_server(response.steps);
            let report = ReconcileReport {
                inserted: fresh.ids(),
                removed: before,
                order_changed: false,
                ..ReconcileReport::default()
            };
            state.local.replace_all(fresh.current().to_vec());
            report
        };

        state.touched.retain(|_, (seq, _)| *seq > fetch_seq);
        state.goal = response.goal;
        info!(
            fetch_seq,
            steps = state.local.len(),
            inserted = report.inserted.len(),
            removed = report.removed.len(),
            updated = report.updated.len(),
            kept_local = report.kept_local.len(),
            "roadmap: snapshot reconciled"
        );
        if goal_changed {
            let _ = self
                .events
                .send(RoadmapEvent::GoalChanged(state.goal.clone()));
        }
        self.emit_steps(&state);
        report
    }

    fn remote_error(&self, err: StoreError) -> OperationError {
        if err.is_unauthorized() {
            let _ = self.events.send(RoadmapEvent::SessionExpired);
        }
        OperationError::Remote(err)
    }

    fn emit_applied(&self, state: &CoordinatorState, seq: u64) {
        if let Some(op) = state.pending.get(&seq) {
            self.emit_phase(op, OperationPhase::OptimisticallyApplied);
        }
        self.emit_steps(state);
    }

    fn emit_steps(&self, state: &CoordinatorState) {
        let _ = self
            .events
            .send(RoadmapEvent::StepsChanged(state.local.current().to_vec()));
    }

    async fn emit_settled(&self, op: &PendingOperation, phase: OperationPhase) {
        self.emit_phase(op, phase);
        if !self.has_queued(&op.target).await {
            self.emit_phase(op, OperationPhase::Idle);
        }
    }

    fn emit_phase(&self, op: &PendingOperation, phase: OperationPhase) {
        let _ = self.events.send(RoadmapEvent::OperationPhaseChanged {
            seq: op.seq,
            kind: op.kind,
            step_id: op.target.clone(),
            phase,
        });
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, OperationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(OperationError::Validation(format!("{field} is required")));
    }
    Ok(trimmed)
}

fn to_operation_error(kind: OperationKind, step_id: StepId, failure: Failure) -> OperationError {
    match failure {
        Failure::Store(source) => OperationError::Rejected {
            kind,
            step_id,
            notice: kind.notice(),
            source,
        },
        Failure::TimedOut(after) => OperationError::TimedOut {
            kind,
            step_id,
            notice: kind.notice(),
            after,
        },
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
