//! Pointer event handler.
//!
//! Hosts forward raw pointer events with the canvas rectangle as it is laid
//! out on screen; positions are converted to percent space here.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::editor::element::CanvasElement;
use crate::editor::interaction::{CanvasRect, InteractionState, Point, PointerTarget};

use super::super::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum PointerEvent {
    Down {
        target: PointerTarget,
        x: f64,
        y: f64,
        canvas: CanvasRect,
    },
    Move {
        x: f64,
        y: f64,
        canvas: CanvasRect,
    },
    Up,
    Leave,
}

#[derive(Debug, Serialize)]
pub struct PointerResponse {
    pub changed: bool,
    pub interaction: InteractionState,
    /// The selected element after the event, if any.
    pub element: Option<CanvasElement>,
}

/// POST /api/sessions/:id/pointer
pub async fn event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(event): Json<PointerEvent>,
) -> Result<Json<PointerResponse>, (StatusCode, String)> {
    let shared = state.session(&id).await?;
    let mut session = shared.lock().await;

    let changed = match event {
        PointerEvent::Down { target, x, y, canvas } => {
            session.pointer_down(&target, Point::new(x, y), &canvas);
            false
        }
        PointerEvent::Move { x, y, canvas } => session.pointer_move(Point::new(x, y), &canvas),
        PointerEvent::Up => {
            session.pointer_up();
            false
        }
        PointerEvent::Leave => {
            session.pointer_leave();
            false
        }
    };

    Ok(Json(PointerResponse {
        changed,
        interaction: session.interaction().clone(),
        element: session.selected_element().cloned(),
    }))
}
