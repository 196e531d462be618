use shared::domain::{Goal, Step, StepId};

pub mod coordinator;
pub mod drag;
pub mod error;
pub mod ordering;
pub mod reconcile;
pub mod remote;
pub mod schedule;
pub mod session;
pub mod transport;

pub use coordinator::{
    CoordinatorConfig, OperationCoordinator, OperationKind, OperationOutcome, OperationPhase,
};
pub use drag::{DragGestureTranslator, DragPreview, DropTarget, Point, Rect};
pub use error::{OperationError, StoreError};
pub use ordering::{LocalOrderingState, OrderingSnapshot, StepPatch};
pub use reconcile::{LocalClaims, ReconcileReport, ReconciliationEngine};
pub use remote::{HttpStepStore, MissingGoalStore, RemoteGoalStore, RemoteStepStore};
pub use schedule::{HttpTaskStore, TaskStore};
pub use session::Session;

/// Notifications published by the coordinator for whatever renders the
/// roadmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoadmapEvent {
    /// The rendered list changed; carries it in render order.
    StepsChanged(Vec<Step>),
    GoalChanged(Option<Goal>),
    OperationPhaseChanged {
        seq: u64,
        kind: OperationKind,
        step_id: StepId,
        phase: OperationPhase,
    },
    /// Exactly one per failed operation.
    OperationFailed {
        kind: OperationKind,
        step_id: StepId,
        notice: &'static str,
        message: String,
    },
    /// The backend rejected the bearer token; the user has to log in again.
    SessionExpired,
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
