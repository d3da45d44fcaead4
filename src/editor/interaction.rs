//! Pointer-driven interaction state machine.
//!
//! ```text
//!            down(empty)                      down(element)
//!   ┌──────────────────────── Idle ───────────────────────────┐
//!   │                                                          ▼
//!   │        down(empty)                            Dragging(id, mode)
//!   Idle ◄──────────────── Selected(id) ◄──── up / leave ─────┘
//!                                │ ▲
//!                                └─┘ down(element): new drag supersedes
//! ```
//!
//! Pointer positions arrive in client coordinates together with the
//! on-screen canvas rectangle and are converted to percent space here.
//! A move drag carries the grab offset so the element does not jump to
//! center itself under the cursor. A resize drag is symmetric about the
//! element's unchanged center.

use serde::{Deserialize, Serialize};

use super::element::{ElementId, ElementPatch};
use super::store::ElementStore;

/// Minimum element width (percent) reachable through a resize drag.
pub const MIN_WIDTH: f64 = 5.0;

/// Minimum element height (percent) reachable through a resize drag.
pub const MIN_HEIGHT: f64 = 2.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// On-screen rectangle of the canvas, in the same coordinates as pointer events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl CanvasRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Convert a client position to canvas percent space.
    ///
    /// Returns `None` for a collapsed (zero or negative sized) canvas.
    pub fn to_percent(&self, client: Point) -> Option<Point> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        Some(Point {
            x: (client.x - self.left) / self.width * 100.0,
            y: (client.y - self.top) / self.height * 100.0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragMode {
    /// Grabbed by the body.
    Move,
    /// Grabbed by the resize handle.
    Resize,
}

/// What a pointer-down landed on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PointerTarget {
    Element { id: ElementId, mode: DragMode },
    Empty,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum InteractionState {
    #[default]
    Idle,
    Selected {
        id: ElementId,
    },
    Dragging {
        id: ElementId,
        mode: DragMode,
        /// Pointer minus element center at drag start (zero for resize).
        offset: Point,
    },
}

/// Owns the interaction state of one editor. Single pointer only.
#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    state: InteractionState,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    /// Currently selected element (also while it is being dragged).
    pub fn selected(&self) -> Option<&ElementId> {
        match &self.state {
            InteractionState::Idle => None,
            InteractionState::Selected { id } | InteractionState::Dragging { id, .. } => Some(id),
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, InteractionState::Dragging { .. })
    }

    /// Select without starting a drag (e.g. from the layer list).
    pub fn select(&mut self, id: ElementId) {
        self.state = InteractionState::Selected { id };
    }

    pub fn clear(&mut self) {
        self.state = InteractionState::Idle;
    }

    /// Drop the selection if it refers to `id` (the element went away).
    pub fn forget(&mut self, id: &ElementId) {
        if self.selected() == Some(id) {
            self.state = InteractionState::Idle;
        }
    }

    /// Pointer pressed. Selects and starts a drag on an element, or clears on empty canvas.
    pub fn pointer_down(
        &mut self,
        store: &ElementStore,
        target: &PointerTarget,
        pointer: Point,
        canvas: &CanvasRect,
    ) {
        let (id, mode) = match target {
            PointerTarget::Empty => {
                self.clear();
                return;
            }
            PointerTarget::Element { id, mode } => (id, *mode),
        };
        let Some(element) = store.get(id) else {
            return;
        };

        self.select(id.clone());
        let Some(p) = canvas.to_percent(pointer) else {
            return;
        };

        let offset = match mode {
            DragMode::Move => Point::new(p.x - element.x, p.y - element.y),
            DragMode::Resize => Point::default(),
        };
        self.state = InteractionState::Dragging {
            id: id.clone(),
            mode,
            offset,
        };
    }

    /// Pointer moved. Applies the active drag to the store; returns true if an element changed.
    pub fn pointer_move(&mut self, store: &mut ElementStore, pointer: Point, canvas: &CanvasRect) -> bool {
        let InteractionState::Dragging { id, mode, offset } = &self.state else {
            return false;
        };
        let Some(p) = canvas.to_percent(pointer) else {
            return false;
        };
        let Some(element) = store.get(id) else {
            return false;
        };

        let patch = match mode {
            DragMode::Move => ElementPatch::position(p.x - offset.x, p.y - offset.y),
            DragMode::Resize => {
                let dx = p.x - element.x;
                let dy = p.y - element.y;
                ElementPatch::size(
                    (dx.abs() * 2.0).max(MIN_WIDTH),
                    (dy.abs() * 2.0).max(MIN_HEIGHT),
                )
            }
        };
        store.update(id, &patch)
    }

    /// Pointer released, left the canvas, or the gesture was cancelled.
    pub fn end_gesture(&mut self) {
        if let InteractionState::Dragging { id, .. } = &self.state {
            self.state = InteractionState::Selected { id: id.clone() };
        }
    }
}
