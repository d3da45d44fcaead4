//! Session lifecycle and editor context handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::customization::{Customization, Tone};
use crate::editor::{EditorSession, PanelTab, ProductRef, SessionSnapshot};

use super::super::state::AppState;

fn default_true() -> bool {
    true
}

/// Request body for session creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub product: ProductRef,
    /// Previously saved design to reopen.
    #[serde(default)]
    pub customization: Option<Customization>,
    /// Start safe-zone detection in the background right away.
    #[serde(default = "default_true")]
    pub analyze: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub id: String,
    pub created_at: String,
    pub session: SessionSnapshot,
}

/// Partial update of the creative context.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextUpdate {
    pub recipient_name: Option<String>,
    pub occasion: Option<String>,
    pub tone: Option<Tone>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PanelUpdate {
    pub tab: Option<PanelTab>,
    pub collapsed: Option<bool>,
}

/// POST /api/sessions - Open an editor for a product.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, (StatusCode, String)> {
    if req.product.image_url.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Product image URL is required".to_string()));
    }

    let mut session = match req.customization {
        Some(saved) => EditorSession::seeded(req.product, saved),
        None => EditorSession::new(req.product),
    };
    let image = req.analyze.then(|| session.begin_analysis());
    let snapshot = session.snapshot();

    let (id, created_at) = state.insert_session(session).await;
    tracing::info!(session = %id, product = %snapshot.product.name, "Editor session opened");

    if let Some(image) = image {
        let state = state.clone();
        tokio::spawn(async move {
            let zone = state.gateway.detect_safe_zone(&image).await;
            if let Ok(shared) = state.session(&id.to_string()).await {
                shared.lock().await.finish_analysis(zone);
            }
        });
    }

    Ok(Json(CreateSessionResponse {
        id: id.to_string(),
        created_at: created_at.to_rfc3339(),
        session: snapshot,
    }))
}

/// GET /api/sessions/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, (StatusCode, String)> {
    let shared = state.session(&id).await?;
    let session = shared.lock().await;
    Ok(Json(session.snapshot()))
}

/// DELETE /api/sessions/:id - Close the editor without saving.
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.take_session(&id).await?.cancel();
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/sessions/:id/context - Recipient, occasion, tone.
pub async fn update_context(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<ContextUpdate>,
) -> Result<Json<SessionSnapshot>, (StatusCode, String)> {
    let shared = state.session(&id).await?;
    let mut session = shared.lock().await;
    if let Some(name) = update.recipient_name {
        session.set_recipient(name);
    }
    if let Some(occasion) = update.occasion {
        session.set_occasion(occasion);
    }
    if let Some(tone) = update.tone {
        session.set_tone(tone);
    }
    Ok(Json(session.snapshot()))
}

/// PUT /api/sessions/:id/panel - Active tab and collapsed flag.
pub async fn update_panel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<PanelUpdate>,
) -> Result<Json<SessionSnapshot>, (StatusCode, String)> {
    let shared = state.session(&id).await?;
    let mut session = shared.lock().await;
    if let Some(tab) = update.tab {
        session.set_panel_tab(tab);
    }
    if let Some(collapsed) = update.collapsed
        && collapsed != session.panel().collapsed
    {
        session.toggle_panel();
    }
    Ok(Json(session.snapshot()))
}
