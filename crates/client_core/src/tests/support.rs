//! In-memory backend with scripted failures and gated responses.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{Goal, GoalId, Step, StepId, StepStatus},
    protocol::ActiveGoalResponse,
};
use tokio::sync::{oneshot, Mutex, Notify};

use crate::{
    error::StoreError,
    remote::{RemoteGoalStore, RemoteStepStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Call {
    Fetch,
    Create,
    Edit,
    Delete,
    Status,
    Reorder,
    Goal,
}

#[derive(Default)]
struct ServerModel {
    goal: Option<Goal>,
    steps: Vec<Step>,
    next_id: u64,
}

impl ServerModel {
    fn snapshot(&self) -> ActiveGoalResponse {
        match &self.goal {
            Some(goal) => ActiveGoalResponse {
                goal: Some(goal.clone()),
                steps: self.steps.clone(),
            },
            None => ActiveGoalResponse::none(),
        }
    }

    fn renumber(&mut self) {
        for (index, step) in self.steps.iter_mut().enumerate() {
            step.step_order = index as i64 + 1;
        }
    }

    fn step_mut(&mut self, step_id: &StepId) -> Result<&mut Step, StoreError> {
        self.steps
            .iter_mut()
            .find(|step| &step.id == step_id)
            .ok_or(StoreError::NotFound)
    }

    fn regenerate(&mut self, goal_id: GoalId, description: &str) {
        self.goal = Some(Goal {
            id: goal_id.clone(),
            user_id: None,
            description: description.to_string(),
            is_active: true,
        });
        self.steps.clear();
        for verb in ["research", "plan", "practice"] {
            self.next_id += 1;
            self.steps.push(Step {
                id: StepId::new(format!("s{}", self.next_id)),
                goal_id: goal_id.clone(),
                step_order: 0,
                title: format!("{verb} {description}"),
                status: StepStatus::Pending,
            });
        }
        self.renumber();
    }
}

pub(crate) struct ScriptedStepStore {
    model: Mutex<ServerModel>,
    failures: Mutex<HashMap<Call, VecDeque<StoreError>>>,
    gates: Mutex<HashMap<Call, VecDeque<oneshot::Receiver<()>>>>,
    log: Mutex<Vec<Call>>,
    reorders: Mutex<Vec<Vec<StepId>>>,
    called: Notify,
}

impl ScriptedStepStore {
    /// Active goal `g1` with steps `s1..sN` carrying `titles`.
    pub(crate) fn with_steps(titles: &[&str]) -> Arc<Self> {
        let goal_id = GoalId::from("g1");
        let steps = titles
            .iter()
            .enumerate()
            .map(|(index, title)| Step {
                id: StepId::new(format!("s{}", index + 1)),
                goal_id: goal_id.clone(),
                step_order: index as i64 + 1,
                title: title.to_string(),
                status: StepStatus::Pending,
            })
            .collect();
        Self::from_model(ServerModel {
            goal: Some(Goal {
                id: goal_id,
                user_id: None,
                description: "learn rust".to_string(),
                is_active: true,
            }),
            steps,
            next_id: titles.len() as u64,
        })
    }

    pub(crate) fn without_goal() -> Arc<Self> {
        Self::from_model(ServerModel::default())
    }

    fn from_model(model: ServerModel) -> Arc<Self> {
        Arc::new(Self {
            model: Mutex::new(model),
            failures: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
            reorders: Mutex::new(Vec::new()),
            called: Notify::new(),
        })
    }

    /// The next `call` fails with `err` (after any gate is released).
    pub(crate) async fn fail_next(&self, call: Call, err: StoreError) {
        self.failures
            .lock()
            .await
            .entry(call)
            .or_default()
            .push_back(err);
    }

    /// The next `call` waits until the returned sender fires or is dropped.
    pub(crate) async fn hold_next(&self, call: Call) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().await.entry(call).or_default().push_back(rx);
        tx
    }

    pub(crate) async fn count(&self, call: Call) -> usize {
        self.log
            .lock()
            .await
            .iter()
            .filter(|logged| **logged == call)
            .count()
    }

    /// Resolves once `call` has been issued at least `times` times.
    pub(crate) async fn wait_for(&self, call: Call, times: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.called.notified();
                if self.count(call).await >= times {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("backend call was never issued");
    }

    pub(crate) async fn server_steps(&self) -> Vec<Step> {
        self.model.lock().await.steps.clone()
    }

    pub(crate) async fn reorder_payloads(&self) -> Vec<Vec<StepId>> {
        self.reorders.lock().await.clone()
    }

    /// Changes a title behind the client's back, as another device would.
    pub(crate) async fn rename_on_server(&self, step_id: &StepId, title: &str) {
        if let Ok(step) = self.model.lock().await.step_mut(step_id) {
            step.title = title.to_string();
        }
    }

    async fn enter(&self, call: Call) {
        self.log.lock().await.push(call);
        self.called.notify_waiters();
    }

    async fn gate(&self, call: Call) -> Result<(), StoreError> {
        let gate = self
            .gates
            .lock()
            .await
            .get_mut(&call)
            .and_then(VecDeque::pop_front);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match self
            .failures
            .lock()
            .await
            .get_mut(&call)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStepStore for ScriptedStepStore {
    async fn fetch_active_goal(&self) -> Result<ActiveGoalResponse, StoreError> {
        let snapshot = self.model.lock().await.snapshot();
        self.enter(Call::Fetch).await;
        self.gate(Call::Fetch).await?;
        Ok(snapshot)
    }

    async fn create_step(&self, goal_id: &GoalId, title: &str) -> Result<Step, StoreError> {
        self.enter(Call::Create).await;
        self.gate(Call::Create).await?;
        let mut model = self.model.lock().await;
        model.next_id += 1;
        let step = Step {
            id: StepId::new(format!("s{}", model.next_id)),
            goal_id: goal_id.clone(),
            step_order: model.steps.len() as i64 + 1,
            title: title.to_string(),
            status: StepStatus::Pending,
        };
        model.steps.push(step.clone());
        Ok(step)
    }

    async fn edit_step(&self, step_id: &StepId, title: &str) -> Result<Step, StoreError> {
        self.enter(Call::Edit).await;
        self.gate(Call::Edit).await?;
        let mut model = self.model.lock().await;
        let step = model.step_mut(step_id)?;
        step.title = title.to_string();
        Ok(step.clone())
    }

    async fn delete_step(&self, step_id: &StepId) -> Result<(), StoreError> {
        self.enter(Call::Delete).await;
        self.gate(Call::Delete).await?;
        let mut model = self.model.lock().await;
        let before = model.steps.len();
        model.steps.retain(|step| &step.id != step_id);
        if model.steps.len() == before {
            return Err(StoreError::NotFound);
        }
        model.renumber();
        Ok(())
    }

    async fn set_status(&self, step_id: &StepId, status: StepStatus) -> Result<Step, StoreError> {
        self.enter(Call::Status).await;
        self.gate(Call::Status).await?;
        let mut model = self.model.lock().await;
        let step = model.step_mut(step_id)?;
        step.status = status;
        Ok(step.clone())
    }

    async fn reorder(&self, ordered: &[StepId]) -> Result<(), StoreError> {
        self.enter(Call::Reorder).await;
        self.reorders.lock().await.push(ordered.to_vec());
        self.gate(Call::Reorder).await?;
        let mut model = self.model.lock().await;
        let mut listed = ordered.to_vec();
        listed.sort();
        let mut known: Vec<StepId> = model.steps.iter().map(|step| step.id.clone()).collect();
        known.sort();
        if listed != known {
            return Err(StoreError::Server {
                status: 400,
                message: "step_ids must list every step of the goal once".to_string(),
            });
        }
        let mut steps = std::mem::take(&mut model.steps);
        steps.sort_by_key(|step| ordered.iter().position(|id| id == &step.id));
        model.steps = steps;
        model.renumber();
        Ok(())
    }
}

#[async_trait]
impl RemoteGoalStore for ScriptedStepStore {
    async fn create_goal(&self, description: &str) -> Result<ActiveGoalResponse, StoreError> {
        self.enter(Call::Goal).await;
        self.gate(Call::Goal).await?;
        let mut model = self.model.lock().await;
        let goal_id = GoalId::new(format!("g-{}", model.next_id + 1));
        model.regenerate(goal_id, description);
        Ok(model.snapshot())
    }

    async fn update_goal(
        &self,
        goal_id: &GoalId,
        description: &str,
    ) -> Result<ActiveGoalResponse, StoreError> {
        self.enter(Call::Goal).await;
        self.gate(Call::Goal).await?;
        let mut model = self.model.lock().await;
        if model.goal.as_ref().map(|goal| &goal.id) != Some(goal_id) {
            return Err(StoreError::NotFound);
        }
        model.regenerate(goal_id.clone(), description);
        Ok(model.snapshot())
    }
}
