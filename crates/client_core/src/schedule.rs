use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, Method};
use shared::{
    domain::{Task, TaskId, TaskStatus},
    protocol::{
        history_route, review_route, start_day_route, task_route, task_status_route,
        tasks_route, today_schedule_route, CreateTaskRequest, ReviewResponse, TaskStatusRequest,
    },
};
use tracing::info;

use crate::{error::StoreError, session::Session, transport::ApiTransport};

/// Daily task list. Plain request/response; nothing here is optimistic.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn today(&self) -> Result<Vec<Task>, StoreError>;
    async fn create_task(
        &self,
        title: &str,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Task, StoreError>;
    async fn set_task_status(&self, task_id: &TaskId, status: TaskStatus)
        -> Result<Task, StoreError>;
    /// Succeeds when the task is already gone.
    async fn delete_task(&self, task_id: &TaskId) -> Result<(), StoreError>;
    /// Closes today and asks the backend for a review of it.
    async fn review_day(&self) -> Result<ReviewResponse, StoreError>;
    /// `None` when that day was never reviewed.
    async fn review_for(&self, date: NaiveDate) -> Result<Option<ReviewResponse>, StoreError>;
    /// Lets the backend schedule today's tasks from the active roadmap.
    async fn start_day(&self) -> Result<Vec<Task>, StoreError>;
}

pub struct HttpTaskStore {
    transport: ApiTransport,
}

impl HttpTaskStore {
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
}

#[async_trait]
impl TaskStore for HttpTaskStore {
    async fn today(&self) -> Result<Vec<Task>, StoreError> {
        let request = self
            .transport
            .request(Method::GET, today_schedule_route())
            .await?;
        self.transport.send_json(request).await
    }

    async fn create_task(
        &self,
        title: &str,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Task, StoreError> {
        let request = self
            .transport
            .request(Method::POST, tasks_route())
            .await?
            .json(&CreateTaskRequest {
                title: title.to_string(),
                deadline,
            });
        self.transport.send_json(request).await
    }

    async fn set_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, StoreError> {
        let request = self
            .transport
            .request(Method::PUT, &task_status_route(task_id))
            .await?
            .json(&TaskStatusRequest { status });
        self.transport.send_json(request).await
    }

    async fn delete_task(&self, task_id: &TaskId) -> Result<(), StoreError> {
        let request = self
            .transport
            .request(Method::DELETE, &task_route(task_id))
            .await?;
        match self.transport.send_ack(request).await {
            Err(StoreError::NotFound) => {
                info!(task_id = %task_id, "schedule: task was already deleted");
                Ok(())
            }
            other => other,
        }
    }

    async fn review_day(&self) -> Result<ReviewResponse, StoreError> {
        let request = self.transport.request(Method::POST, review_route()).await?;
        self.transport.send_json(request).await
    }

    async fn review_for(&self, date: NaiveDate) -> Result<Option<ReviewResponse>, StoreError> {
        let day = date.format("%Y-%m-%d").to_string();
        let request = self
            .transport
            .request(Method::GET, &history_route(&day))
            .await?;
        match self.transport.send_json(request).await {
            Ok(review) => Ok(Some(review)),
            Err(StoreError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn start_day(&self) -> Result<Vec<Task>, StoreError> {
        let request = self
            .transport
            .request(Method::POST, start_day_route())
            .await?;
        self.transport.send_json(request).await
    }
}

#[cfg(test)]
#[path = "tests/schedule_tests.rs"]
mod tests;
