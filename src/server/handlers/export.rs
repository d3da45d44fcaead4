//! Preview and save handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Serialize;
use std::sync::Arc;

use crate::customization::Customization;

use super::super::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub customization: Customization,
    pub saved_at: String,
}

/// GET /api/sessions/:id/preview - Current design composited onto the product as PNG.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let shared = state.session(&id).await?;

    // Copy what the export needs so pointer events are not blocked while rendering
    let (image_url, elements) = {
        let session = shared.lock().await;
        (session.product().image_url.clone(), session.elements().to_vec())
    };

    let png = state
        .exporter
        .export(&image_url, &elements)
        .await
        .into_png()
        .ok_or((
            StatusCode::BAD_GATEWAY,
            "Product image could not be loaded".to_string(),
        ))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

/// POST /api/sessions/:id/save - Render, hand over the design and close the session.
pub async fn save(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SaveResponse>, (StatusCode, String)> {
    let session = state.take_session(&id).await?;
    let product = session.product().name.clone();
    let customization = session.save(&state.exporter).await;
    tracing::info!(
        session = %id,
        product = %product,
        elements = customization.elements.len(),
        preview = customization.preview_image.is_some(),
        "Customization saved"
    );
    Ok(Json(SaveResponse {
        customization,
        saved_at: chrono::Utc::now().to_rfc3339(),
    }))
}
