//! # HTTP Server for Hosted Editor Sessions
//!
//! Exposes editor sessions to a browser host: the page forwards pointer
//! events and panel actions, and pulls previews and the saved design back.
//!
//! ## Usage
//!
//! ```bash
//! souvy serve --listen 0.0.0.0:8080 --asset-proxy 'https://proxy.example/?'
//! ```
//!
//! ## Routes
//!
//! | Method | Path | Action |
//! |--------|------|--------|
//! | POST | `/api/sessions` | open an editor (optionally seeded) |
//! | GET / DELETE | `/api/sessions/:id` | snapshot / cancel |
//! | POST | `/api/sessions/:id/elements` | add element |
//! | PATCH / DELETE | `/api/sessions/:id/elements/:element_id` | update / remove |
//! | POST | `/api/sessions/:id/elements/:element_id/reorder` | layer up/down/top/bottom |
//! | PUT | `/api/sessions/:id/selection` | select or clear |
//! | GET | `/api/sessions/:id/layers` | layer panel rows |
//! | POST | `/api/sessions/:id/pointer` | pointer down/move/up/leave |
//! | PUT | `/api/sessions/:id/context` | recipient, occasion, tone |
//! | PUT | `/api/sessions/:id/panel` | tab, collapsed |
//! | POST | `/api/sessions/:id/analyze` | safe-zone detection |
//! | POST | `/api/sessions/:id/creative` | note and design advice |
//! | GET | `/api/sessions/:id/preview` | PNG composite |
//! | POST | `/api/sessions/:id/save` | finalize and close |
//! | POST | `/api/receipts/verify` | receipt check (multipart) |

mod handlers;
mod state;

pub use state::{AppState, SESSION_EXPIRATION_SECS, ServerConfig};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::error::SouvyError;

/// Build the application router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/sessions", post(handlers::sessions::create))
        .route(
            "/api/sessions/:id",
            get(handlers::sessions::get).delete(handlers::sessions::cancel),
        )
        .route("/api/sessions/:id/elements", post(handlers::elements::add))
        .route(
            "/api/sessions/:id/elements/:element_id",
            axum::routing::patch(handlers::elements::update).delete(handlers::elements::remove),
        )
        .route(
            "/api/sessions/:id/elements/:element_id/reorder",
            post(handlers::elements::reorder),
        )
        .route("/api/sessions/:id/selection", put(handlers::elements::select))
        .route("/api/sessions/:id/layers", get(handlers::elements::layers))
        .route("/api/sessions/:id/pointer", post(handlers::pointer::event))
        .route("/api/sessions/:id/context", put(handlers::sessions::update_context))
        .route("/api/sessions/:id/panel", put(handlers::sessions::update_panel))
        .route("/api/sessions/:id/analyze", post(handlers::ai::analyze))
        .route("/api/sessions/:id/creative", post(handlers::ai::creative))
        .route("/api/sessions/:id/preview", get(handlers::export::preview))
        .route("/api/sessions/:id/save", post(handlers::export::save))
        // Receipt photos (20MB limit for uploads)
        .route(
            "/api/receipts/verify",
            post(handlers::ai::verify_receipt).layer(DefaultBodyLimit::max(20 * 1024 * 1024)),
        )
        // Seeded sessions may carry inline image elements
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// ## Example
///
/// ```no_run
/// use souvy::server::{serve, ServerConfig};
///
/// # async fn example() -> Result<(), souvy::error::SouvyError> {
/// let config = ServerConfig {
///     listen_addr: "127.0.0.1:8080".to_string(),
///     ..Default::default()
/// };
///
/// serve(config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(config: ServerConfig) -> Result<(), SouvyError> {
    let app_state = Arc::new(AppState::new(config.clone())?);

    // Spawn background session and image cache cleanup
    tokio::spawn(cleanup_sessions(app_state.clone()));

    let app = router(app_state);

    tracing::info!(
        listen = %config.listen_addr,
        proxy = config.asset_proxy.as_deref().unwrap_or("none"),
        gateway = if config.gemini_api_key.is_some() { "gemini" } else { "offline" },
        "Souvy editor server starting"
    );

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| SouvyError::Transport(format!("Failed to bind to {}: {}", config.listen_addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| SouvyError::Transport(format!("Server error: {}", e)))?;

    Ok(())
}

/// Background task to drop idle sessions and stale cached images.
async fn cleanup_sessions(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    let expiration = Duration::from_secs(state.config.session_expiration_secs);

    loop {
        interval.tick().await;

        let removed = state.evict_expired_sessions().await;
        if removed > 0 {
            let remaining = state.sessions.read().await.len();
            tracing::info!(removed, remaining, "Cleaned up expired editor sessions");
        }

        let evicted = state.exporter.context().evict_stale(expiration).await;
        if evicted > 0 {
            tracing::info!(evicted, "Cleaned up cached images");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::AiGateway;
    use crate::render::context::RenderContext;
    use crate::render::fetch::StaticFetcher;
    use crate::render::text::FontRegistry;
    use crate::render::{Exporter, encode_png};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use image::{Rgba, RgbaImage};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const MUG: &str = "https://shop.test/mug.png";

    fn state() -> Arc<AppState> {
        let png = encode_png(&RgbaImage::from_pixel(100, 50, Rgba([255, 255, 255, 255]))).unwrap();
        let fetcher = Arc::new(StaticFetcher::new().with(MUG, png));
        let exporter = Exporter::new(RenderContext::new(fetcher.clone(), FontRegistry::new()));
        Arc::new(AppState::with_parts(
            ServerConfig::default(),
            exporter,
            AiGateway::offline(fetcher),
        ))
    }

    async fn call(state: &Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = router(state.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn call_json(state: &Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = call(state, method, uri, body).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn open(state: &Arc<AppState>) -> String {
        let (status, body) = call_json(
            state,
            "POST",
            "/api/sessions",
            Some(json!({
                "product": {"name": "Ceramic Mug", "imageUrl": MUG},
                "analyze": false
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let state = state();
        let id = open(&state).await;
        let (status, body) = call_json(&state, "GET", &format!("/api/sessions/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["creative"]["recipientName"], "Alexandra");
        assert_eq!(body["creative"]["tone"], "Minimalist");
        assert_eq!(body["interaction"], json!({"state": "idle"}));
        assert_eq!(body["panel"], json!({"tab": "design", "collapsed": false}));
    }

    #[tokio::test]
    async fn test_unknown_and_invalid_sessions() {
        let state = state();
        let (status, _) = call(&state, "GET", "/api/sessions/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let missing = uuid::Uuid::new_v4();
        let (status, _) = call(&state, "GET", &format!("/api/sessions/{}", missing), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_element_lifecycle_over_http() {
        let state = state();
        let id = open(&state).await;
        let base = format!("/api/sessions/{}", id);

        let (_, added) = call_json(&state, "POST", &format!("{}/elements", base), Some(json!({"type": "text"}))).await;
        let text_id = added["id"].as_str().unwrap().to_string();
        assert_eq!(added["session"]["elements"][0]["content"], "New Message");
        assert_eq!(added["session"]["interaction"], json!({"state": "selected", "id": text_id}));

        let (_, added) = call_json(
            &state,
            "POST",
            &format!("{}/elements", base),
            Some(json!({"type": "image", "content": "https://shop.test/logo.png"})),
        )
        .await;
        let image_id = added["id"].as_str().unwrap().to_string();

        let (_, patched) = call_json(
            &state,
            "PATCH",
            &format!("{}/elements/{}", base, text_id),
            Some(json!({"content": "Happy Retirement", "x": 40.0})),
        )
        .await;
        assert_eq!(patched["elements"][0]["content"], "Happy Retirement");
        assert_eq!(patched["elements"][0]["x"], 40.0);

        call_json(
            &state,
            "POST",
            &format!("{}/elements/{}/reorder", base, text_id),
            Some(json!({"direction": "top"})),
        )
        .await;
        let (_, layers) = call_json(&state, "GET", &format!("{}/layers", base), None).await;
        assert_eq!(layers[0]["id"], text_id.as_str());
        assert_eq!(layers[1]["id"], image_id.as_str());

        let (_, removed) = call_json(&state, "DELETE", &format!("{}/elements/{}", base, image_id), None).await;
        assert_eq!(removed["elements"].as_array().unwrap().len(), 1);

        // Unknown element ids are silently ignored
        let (status, _) = call_json(
            &state,
            "PATCH",
            &format!("{}/elements/ghost", base),
            Some(json!({"x": 1.0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_pointer_drag_over_http() {
        let state = state();
        let id = open(&state).await;
        let base = format!("/api/sessions/{}", id);
        let (_, added) = call_json(&state, "POST", &format!("{}/elements", base), Some(json!({"type": "text"}))).await;
        let el = added["id"].as_str().unwrap().to_string();
        let canvas = json!({"left": 0.0, "top": 0.0, "width": 200.0, "height": 200.0});

        let (_, down) = call_json(
            &state,
            "POST",
            &format!("{}/pointer", base),
            Some(json!({
                "event": "down",
                "target": {"kind": "element", "id": el, "mode": "move"},
                "x": 100.0, "y": 100.0, "canvas": canvas
            })),
        )
        .await;
        assert_eq!(down["interaction"]["state"], "dragging");

        let (_, moved) = call_json(
            &state,
            "POST",
            &format!("{}/pointer", base),
            Some(json!({"event": "move", "x": 120.0, "y": 100.0, "canvas": canvas})),
        )
        .await;
        assert_eq!(moved["changed"], true);
        assert_eq!(moved["element"]["x"], 60.0);

        let (_, up) = call_json(&state, "POST", &format!("{}/pointer", base), Some(json!({"event": "up"}))).await;
        assert_eq!(up["interaction"]["state"], "selected");

        let (_, cleared) = call_json(
            &state,
            "POST",
            &format!("{}/pointer", base),
            Some(json!({"event": "down", "target": {"kind": "empty"}, "x": 1.0, "y": 1.0, "canvas": canvas})),
        )
        .await;
        assert_eq!(cleared["interaction"], json!({"state": "idle"}));
        assert_eq!(cleared["element"], Value::Null);
    }

    #[tokio::test]
    async fn test_analyze_uses_fallback_zone_offline() {
        let state = state();
        let id = open(&state).await;
        let (status, body) = call_json(&state, "POST", &format!("/api/sessions/{}/analyze", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["analyzing"], false);
        assert_eq!(body["safeZone"], json!({"ymin": 300.0, "xmin": 300.0, "ymax": 700.0, "xmax": 700.0}));
    }

    #[tokio::test]
    async fn test_preview_and_save() {
        let state = state();
        let id = open(&state).await;
        let base = format!("/api/sessions/{}", id);
        call_json(&state, "POST", &format!("{}/elements", base), Some(json!({"type": "text"}))).await;

        let (status, png) = call(&state, "GET", &format!("{}/preview", base), None).await;
        assert_eq!(status, StatusCode::OK);
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (100, 50));

        let (status, saved) = call_json(&state, "POST", &format!("{}/save", base), None).await;
        assert_eq!(status, StatusCode::OK);
        let customization = &saved["customization"];
        assert_eq!(customization["elements"].as_array().unwrap().len(), 1);
        assert!(customization["previewImage"].as_str().unwrap().starts_with("data:image/png;base64,"));

        // Saving ends the session
        let (status, _) = call(&state, "GET", &base, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_discards_session() {
        let state = state();
        let id = open(&state).await;
        let (status, _) = call(&state, "DELETE", &format!("/api/sessions/{}", id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_evicted() {
        let png = encode_png(&RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]))).unwrap();
        let fetcher = Arc::new(StaticFetcher::new().with(MUG, png));
        let state = Arc::new(AppState::with_parts(
            ServerConfig {
                session_expiration_secs: 0,
                ..Default::default()
            },
            Exporter::new(RenderContext::new(fetcher.clone(), FontRegistry::new())),
            AiGateway::offline(fetcher),
        ));
        open(&state).await;
        assert_eq!(state.evict_expired_sessions().await, 1);
        assert!(state.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_take_session_snapshots_a_session_still_in_use() {
        let state = state();
        let id = open(&state).await;

        let in_flight = state.session(&id).await.unwrap();
        in_flight
            .lock()
            .await
            .add(crate::editor::element::ElementKind::Text, Some("Kept"));

        let taken = state.take_session(&id).await.unwrap();
        assert_eq!(taken.elements().len(), 1);
        assert!(state.sessions.read().await.is_empty());

        // The request that outlived the session edits a copy nobody reads
        in_flight.lock().await.add(crate::editor::element::ElementKind::Text, Some("Late"));
        assert_eq!(taken.elements().len(), 1);
        let (status, _) = call(&state, "GET", &format!("/api/sessions/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
