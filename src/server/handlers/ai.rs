//! AI gateway handlers: surface analysis, creative sync, receipt verification.
//!
//! Gateway calls run without holding the session lock, so the editor stays
//! usable (and reports `analyzing`) while a model call is in flight.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use crate::editor::SessionSnapshot;
use crate::gateway::{ReceiptExpectation, ReceiptVerdict};

use super::super::state::AppState;

/// POST /api/sessions/:id/analyze - Detect the safe zone of the product image.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, (StatusCode, String)> {
    let shared = state.session(&id).await?;
    let image = shared.lock().await.begin_analysis();

    let zone = state.gateway.detect_safe_zone(&image).await;

    let mut session = shared.lock().await;
    session.finish_analysis(zone);
    Ok(Json(session.snapshot()))
}

/// POST /api/sessions/:id/creative - Generate a note and design advice.
pub async fn creative(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, (StatusCode, String)> {
    let shared = state.session(&id).await?;
    let request = shared.lock().await.creative_request();

    let content = state.gateway.generate_creative_content(&request).await;

    let mut session = shared.lock().await;
    session.apply_creative(content);
    Ok(Json(session.snapshot()))
}

/// POST /api/receipts/verify - Multipart: `receipt` (image), `amount`, `reference`, `accountName`.
pub async fn verify_receipt(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ReceiptVerdict>, (StatusCode, String)> {
    let mut receipt: Option<Vec<u8>> = None;
    let mut amount: Option<f64> = None;
    let mut reference: Option<String> = None;
    let mut account_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "receipt" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read receipt: {}", e)))?;
                receipt = Some(bytes.to_vec());
            }
            "amount" | "reference" | "accountName" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read {}: {}", name, e)))?;
                match name.as_str() {
                    "amount" => {
                        amount = Some(value.trim().parse().map_err(|_| {
                            (StatusCode::BAD_REQUEST, format!("Invalid amount: {}", value))
                        })?)
                    }
                    "reference" => reference = Some(value),
                    _ => account_name = Some(value),
                }
            }
            _ => {}
        }
    }

    let missing = |field: &str| (StatusCode::BAD_REQUEST, format!("Missing field: {}", field));
    let receipt = receipt.ok_or_else(|| missing("receipt"))?;
    let expected = ReceiptExpectation {
        amount: amount.ok_or_else(|| missing("amount"))?,
        reference: reference.ok_or_else(|| missing("reference"))?,
        account_name: account_name.ok_or_else(|| missing("accountName"))?,
    };

    let verdict = state.gateway.verify_receipt(&receipt, &expected).await;
    tracing::info!(reference = %expected.reference, verified = verdict.verified, "Receipt checked");
    Ok(Json(verdict))
}
