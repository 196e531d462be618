use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method};
use shared::{
    domain::{GoalId, Step, StepId, StepStatus},
    protocol::{
        active_goal_route, goal_route, goal_steps_route, goals_route, reorder_route,
        step_route, step_status_route, ActiveGoalResponse, GoalDescriptionRequest,
        ReorderRequest, StepStatusRequest, StepTitleRequest,
    },
};

use crate::{error::StoreError, session::Session, transport::ApiTransport};

/// Stateless request layer for roadmap steps. Each method is exactly one
/// backend call.
#[async_trait]
pub trait RemoteStepStore: Send + Sync {
    /// A missing active goal is `Ok` with `goal: None`, never `NotFound`.
    async fn fetch_active_goal(&self) -> Result<ActiveGoalResponse, StoreError>;
    async fn create_step(&self, goal_id: &GoalId, title: &str) -> Result<Step, StoreError>;
    async fn edit_step(&self, step_id: &StepId, title: &str) -> Result<Step, StoreError>;
    /// `NotFound` means the step is already gone.
    async fn delete_step(&self, step_id: &StepId) -> Result<(), StoreError>;
    async fn set_status(&self, step_id: &StepId, status: StepStatus) -> Result<Step, StoreError>;
    /// `ordered` holds every step id of the goal exactly once.
    async fn reorder(&self, ordered: &[StepId]) -> Result<(), StoreError>;
}

/// Goal writes. The backend regenerates the roadmap on every call, so both
/// return the complete new `{goal, steps}` snapshot.
#[async_trait]
pub trait RemoteGoalStore: Send + Sync {
    async fn create_goal(&self, description: &str) -> Result<ActiveGoalResponse, StoreError>;
    async fn update_goal(
        &self,
        goal_id: &GoalId,
        description: &str,
    ) -> Result<ActiveGoalResponse, StoreError>;
}

pub struct MissingGoalStore;

#[async_trait]
impl RemoteGoalStore for MissingGoalStore {
    async fn create_goal(&self, _description: &str) -> Result<ActiveGoalResponse, StoreError> {
        Err(StoreError::Network("goal store is unavailable".to_string()))
    }

    async fn update_goal(
        &self,
        _goal_id: &GoalId,
        _description: &str,
    ) -> Result<ActiveGoalResponse, StoreError> {
        Err(StoreError::Network("goal store is unavailable".to_string()))
    }
}

pub struct HttpStepStore {
    transport: ApiTransport,
}

impl HttpStepStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            transport: ApiTransport::new(session),
        }
    }

    pub fn with_client(http: Client, session: Arc<Session>) -> Self {
        Self {
            transport: ApiTransport::with_client(http, session),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        self.transport.session()
    }
}

#[async_trait]
impl RemoteStepStore for HttpStepStore {
    async fn fetch_active_goal(&self) -> Result<ActiveGoalResponse, StoreError> {
        let request = self
            .transport
            .request(Method::GET, active_goal_route())
            .await?;
        match self.transport.send_json(request).await {
            Err(StoreError::NotFound) => Ok(ActiveGoalResponse::none()),
            other => other,
        }
    }

    async fn create_step(&self, goal_id: &GoalId, title: &str) -> Result<Step, StoreError> {
        let request = self
            .transport
            .request(Method::POST, &goal_steps_route(goal_id))
            .await?
            .json(&StepTitleRequest {
                title: title.to_string(),
            });
        self.transport.send_json(request).await
    }

    async fn edit_step(&self, step_id: &StepId, title: &str) -> Result<Step, StoreError> {
        let request = self
            .transport
            .request(Method::PUT, &step_route(step_id))
            .await?
            .json(&StepTitleRequest {
                title: title.to_string(),
            });
        self.transport.send_json(request).await
    }

    async fn delete_step(&self, step_id: &StepId) -> Result<(), StoreError> {
        let request = self
            .transport
            .request(Method::DELETE, &step_route(step_id))
            .await?;
        self.transport.send_ack(request).await
    }

    async fn set_status(&self, step_id: &StepId, status: StepStatus) -> Result<Step, StoreError> {
        let request = self
            .transport
            .request(Method::PUT, &step_status_route(step_id))
            .await?
            .json(&StepStatusRequest { status });
        self.transport.send_json(request).await
    }

    async fn reorder(&self, ordered: &[StepId]) -> Result<(), StoreError> {
        let request = self
            .transport
            .request(Method::PUT, reorder_route())
            .await?
            .json(&ReorderRequest {
                step_ids: ordered.to_vec(),
            });
        self.transport.send_ack(request).await
    }
}

#[async_trait]
impl RemoteGoalStore for HttpStepStore {
    async fn create_goal(&self, description: &str) -> Result<ActiveGoalResponse, StoreError> {
        let request = self
            .transport
            .request(Method::POST, goals_route())
            .await?
            .json(&GoalDescriptionRequest {
                description: description.to_string(),
            });
        self.transport.send_json(request).await
    }

    async fn update_goal(
        &self,
        goal_id: &GoalId,
        description: &str,
    ) -> Result<ActiveGoalResponse, StoreError> {
        let request = self
            .transport
            .request(Method::PUT, &goal_route(goal_id))
            .await?
            .json(&GoalDescriptionRequest {
                description: description.to_string(),
            });
        self.transport.send_json(request).await
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
