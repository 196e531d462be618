use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Goal, GoalId, Step, StepId, StepStatus, TaskId, TaskStatus};

pub fn active_goal_route() -> &'static str {
    "/api/goals/active"
}

pub fn goals_route() -> &'static str {
    "/api/goals"
}

pub fn goal_route(goal_id: &GoalId) -> String {
    format!("/api/goals/{goal_id}")
}

pub fn goal_steps_route(goal_id: &GoalId) -> String {
    format!("/api/goals/{goal_id}/steps")
}

pub fn step_route(step_id: &StepId) -> String {
    format!("/api/roadmap-steps/{step_id}")
}

pub fn step_status_route(step_id: &StepId) -> String {
    format!("/api/roadmap-steps/{step_id}/status")
}

pub fn reorder_route() -> &'static str {
    "/api/roadmap/reorder"
}

pub fn today_schedule_route() -> &'static str {
    "/api/schedule/today"
}

pub fn tasks_route() -> &'static str {
    "/api/tasks"
}

pub fn task_route(task_id: &TaskId) -> String {
    format!("/api/tasks/{task_id}")
}

pub fn task_status_route(task_id: &TaskId) -> String {
    format!("/api/tasks/{task_id}/status")
}

pub fn review_route() -> &'static str {
    "/api/schedule/review"
}

pub fn history_route(date: &str) -> String {
    format!("/api/schedule/history/{date}")
}

pub fn start_day_route() -> &'static str {
    "/api/schedule/start-day"
}

/// Response of `GET /api/goals/active` and of goal create/update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveGoalResponse {
    pub goal: Option<Goal>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl ActiveGoalResponse {
    pub fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalDescriptionRequest {
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTitleRequest {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStatusRequest {
    pub status: StepStatus,
}

/// Full ordering of a goal's steps; every step id appears exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderRequest {
    pub step_ids: Vec<StepId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub status: String,
    pub count: i64,
}

/// Day review. Older backends sent `aiFeedback`; `ai_feedback` is canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResponse {
    #[serde(default)]
    pub summary: Vec<TaskSummary>,
    #[serde(default, alias = "aiFeedback")]
    pub ai_feedback: String,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
