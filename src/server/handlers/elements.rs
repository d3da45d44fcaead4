//! Element, layer and selection handlers.
//!
//! Operations on unknown element ids succeed without changing anything, the
//! same as in the editor itself. Only an unknown session is an error.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::editor::element::{ElementId, ElementKind, ElementPatch};
use crate::editor::layering::LayerDirection;
use crate::editor::{LayerEntry, SessionSnapshot};

use super::super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddElementRequest {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddElementResponse {
    pub id: ElementId,
    pub session: SessionSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub direction: LayerDirection,
}

/// `{"id": null}` clears the selection.
#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub id: Option<ElementId>,
}

/// POST /api/sessions/:id/elements
pub async fn add(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddElementRequest>,
) -> Result<Json<AddElementResponse>, (StatusCode, String)> {
    let shared = state.session(&id).await?;
    let mut session = shared.lock().await;
    let content = req.content.as_deref().filter(|c| !c.is_empty());
    let element_id = session.add(req.kind, content);
    Ok(Json(AddElementResponse {
        id: element_id,
        session: session.snapshot(),
    }))
}

/// PATCH /api/sessions/:id/elements/:element_id
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path((id, element_id)): Path<(String, String)>,
    Json(patch): Json<ElementPatch>,
) -> Result<Json<SessionSnapshot>, (StatusCode, String)> {
    let shared = state.session(&id).await?;
    let mut session = shared.lock().await;
    session.update(&ElementId::from(element_id), &patch);
    Ok(Json(session.snapshot()))
}

/// DELETE /api/sessions/:id/elements/:element_id
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path((id, element_id)): Path<(String, String)>,
) -> Result<Json<SessionSnapshot>, (StatusCode, String)> {
    let shared = state.session(&id).await?;
    let mut session = shared.lock().await;
    session.remove(&ElementId::from(element_id));
    Ok(Json(session.snapshot()))
}

/// POST /api/sessions/:id/elements/:element_id/reorder
pub async fn reorder(
    State(state): State<Arc<AppState>>,
    Path((id, element_id)): Path<(String, String)>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<SessionSnapshot>, (StatusCode, String)> {
    let shared = state.session(&id).await?;
    let mut session = shared.lock().await;
    session.reorder(&ElementId::from(element_id), req.direction);
    Ok(Json(session.snapshot()))
}

/// PUT /api/sessions/:id/selection
pub async fn select(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SelectRequest>,
) -> Result<Json<SessionSnapshot>, (StatusCode, String)> {
    let shared = state.session(&id).await?;
    let mut session = shared.lock().await;
    match req.id {
        Some(element_id) => session.select(&element_id),
        None => session.clear_selection(),
    }
    Ok(Json(session.snapshot()))
}

/// GET /api/sessions/:id/layers - Topmost first, with safe-zone warnings.
pub async fn layers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LayerEntry>>, (StatusCode, String)> {
    let shared = state.session(&id).await?;
    let session = shared.lock().await;
    Ok(Json(session.layer_list()))
}
