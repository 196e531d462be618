use shared::domain::StepId;
use tracing::debug;

use crate::{
    coordinator::{is_placeholder, OperationCoordinator, OperationOutcome},
    error::OperationError,
};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance_squared(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Point::new(x, y),
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x + self.width / 2.0,
            self.origin.y + self.height / 2.0,
        )
    }

    fn translated(&self, offset: Point) -> Rect {
        Rect {
            origin: Point::new(self.origin.x + offset.x, self.origin.y + offset.y),
            ..*self
        }
    }
}

/// Where a step is currently rendered, keyed by id.
#[derive(Debug, Clone, PartialEq)]
pub struct DropTarget {
    pub step_id: StepId,
    pub rect: Rect,
}

/// Transient visual state of a drag in progress. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DragPreview {
    pub active: StepId,
    pub offset: Point,
    pub over: Option<StepId>,
}

/// The target whose center lies closest to the center of `dragged`.
pub fn closest_center<'a>(dragged: &Rect, targets: &'a [DropTarget]) -> Option<&'a DropTarget> {
    let center = dragged.center();
    targets.iter().min_by(|a, b| {
        let da = a.rect.center().distance_squared(center);
        let db = b.rect.center().distance_squared(center);
        da.total_cmp(&db)
    })
}

/// Turns pointer movement into at most one `move_step` call, issued on drop.
#[derive(Debug, Default)]
pub struct DragGestureTranslator {
    targets: Vec<DropTarget>,
    grab: Option<(Point, Rect)>,
    preview: Option<DragPreview>,
}

impl DragGestureTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the droppable layout, typically after every render.
    pub fn set_targets(&mut self, targets: Vec<DropTarget>) {
        self.targets = targets;
    }

    /// Starts dragging `step_id` from `pointer`. Returns false for steps that
    /// are not laid out or not yet saved.
    pub fn begin(&mut self, step_id: &StepId, pointer: Point) -> bool {
        if is_placeholder(step_id) {
            return false;
        }
        let Some(target) = self.targets.iter().find(|target| &target.step_id == step_id) else {
            return false;
        };
        self.grab = Some((pointer, target.rect));
        self.preview = Some(DragPreview {
            active: step_id.clone(),
            offset: Point::default(),
            over: Some(step_id.clone()),
        });
        true
    }

    pub fn update(&mut self, pointer: Point) -> Option<&DragPreview> {
        let (start, rect) = self.grab?;
        let offset = Point::new(pointer.x - start.x, pointer.y - start.y);
        let over = closest_center(&rect.translated(offset), &self.targets)
            .map(|target| target.step_id.clone());
        let preview = self.preview.as_mut()?;
        preview.offset = offset;
        preview.over = over;
        Some(&*preview)
    }

    pub fn preview(&self) -> Option<&DragPreview> {
        self.preview.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.preview.is_some()
    }

    pub fn cancel(&mut self) {
        self.grab = None;
        self.preview = None;
    }

    /// Ends the gesture and commits it as a single reorder. Dropping a step
    /// onto itself, or onto a target that no longer exists, issues nothing.
    pub async fn drop_on(
        &mut self,
        coordinator: &OperationCoordinator,
    ) -> Result<Option<OperationOutcome>, OperationError> {
        self.grab = None;
        let Some(preview) = self.preview.take() else {
            return Ok(None);
        };
        let Some(over) = preview.over else {
            return Ok(None);
        };
        if over == preview.active {
            return Ok(None);
        }
        let Some(to) = coordinator.position_of(&over).await else {
            debug!(step_id = %over, "drag: drop target vanished before drop");
            return Ok(None);
        };
        debug!(step_id = %preview.active, over = %over, to, "drag: dropped");
        coordinator.move_step(&preview.active, to).await.map(Some)
    }
}

#[cfg(test)]
#[path = "tests/drag_tests.rs"]
mod tests;
