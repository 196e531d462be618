use std::time::Duration;

use shared::{
    domain::StepId,
    error::{ApiException, ErrorCode},
};
use thiserror::Error;

use crate::coordinator::OperationKind;

/// Typed failure of a single backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("unauthorized: session is no longer valid")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
}

impl StoreError {
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let exception = ApiException::from_status(status, message);
        match exception.code {
            ErrorCode::Unauthorized => Self::Unauthorized,
            ErrorCode::NotFound => Self::NotFound,
            ErrorCode::Conflict => Self::Conflict(exception.message),
            ErrorCode::Forbidden | ErrorCode::Validation | ErrorCode::Internal => Self::Server {
                status,
                message: exception.message,
            },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Server {
                status: err.status().map(|s| s.as_u16()).unwrap_or(200),
                message: format!("malformed response body: {err}"),
            };
        }
        match err.status() {
            Some(status) => Self::from_status(status.as_u16(), err.to_string()),
            None => Self::Network(err.to_string()),
        }
    }
}

/// Failure of a coordinated roadmap operation. Optimistic state has already
/// been rolled back by the time one of these is returned.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("{notice}: {source}")]
    Rejected {
        kind: OperationKind,
        step_id: StepId,
        notice: &'static str,
        source: StoreError,
    },
    #[error("{notice}: no response after {after:?}")]
    TimedOut {
        kind: OperationKind,
        step_id: StepId,
        notice: &'static str,
        after: Duration,
    },
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("unknown step {0}")]
    UnknownStep(StepId),
    #[error("no active goal")]
    NoActiveGoal,
    #[error("roadmap steps are still being saved")]
    Busy,
    #[error(transparent)]
    Remote(#[from] StoreError),
}

impl OperationError {
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Rejected { source, .. } | Self::Remote(source) => Some(source),
            _ => None,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.store_error().is_some_and(StoreError::is_unauthorized)
    }
}
