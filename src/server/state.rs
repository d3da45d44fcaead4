//! Server state and configuration.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::editor::EditorSession;
use crate::error::SouvyError;
use crate::gateway::{AiGateway, GeminiBackend, ModelNames};
use crate::render::Exporter;
use crate::render::context::RenderContext;
use crate::render::fetch::HttpFetcher;
use crate::render::text::FontRegistry;

/// Idle time after which an editor session is discarded.
pub const SESSION_EXPIRATION_SECS: u64 = 3600;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8080")
    pub listen_addr: String,
    /// Prefix that remote asset URLs are appended to, percent-encoded
    pub asset_proxy: Option<String>,
    /// Directory of `.ttf`/`.otf` files named `Family-Style`
    pub fonts_dir: Option<PathBuf>,
    /// Gemini API key; without one the gateway runs offline
    pub gemini_api_key: Option<String>,
    pub models: ModelNames,
    pub session_expiration_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            asset_proxy: None,
            fonts_dir: None,
            gemini_api_key: None,
            models: ModelNames::default(),
            session_expiration_secs: SESSION_EXPIRATION_SECS,
        }
    }
}

/// An open editor and its bookkeeping.
pub struct SessionEntry {
    pub session: Arc<Mutex<EditorSession>>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: Instant,
}

impl SessionEntry {
    pub fn new(session: EditorSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            created_at: Utc::now(),
            last_accessed: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

/// Application state shared across handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub sessions: RwLock<HashMap<Uuid, SessionEntry>>,
    pub exporter: Exporter,
    pub gateway: AiGateway,
}

impl AppState {
    /// Build fetcher, fonts, exporter and gateway from `config`.
    pub fn new(config: ServerConfig) -> Result<Self, SouvyError> {
        let fetcher = Arc::new(HttpFetcher::new(config.asset_proxy.clone())?);

        let fonts = match &config.fonts_dir {
            Some(dir) => FontRegistry::load_dir(dir)?,
            None => FontRegistry::new(),
        };
        let exporter = Exporter::new(RenderContext::new(fetcher.clone(), fonts));

        let gateway = match config.gemini_api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => AiGateway::with_models(
                Arc::new(GeminiBackend::new(key)?),
                fetcher,
                config.models.clone(),
            ),
            None => {
                tracing::warn!("No Gemini API key configured, AI features will use their fallbacks");
                AiGateway::offline(fetcher)
            }
        };

        Ok(Self::with_parts(config, exporter, gateway))
    }

    pub fn with_parts(config: ServerConfig, exporter: Exporter, gateway: AiGateway) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            exporter,
            gateway,
        }
    }

    pub async fn insert_session(&self, session: EditorSession) -> (Uuid, DateTime<Utc>) {
        let id = Uuid::new_v4();
        let entry = SessionEntry::new(session);
        let created_at = entry.created_at;
        self.sessions.write().await.insert(id, entry);
        (id, created_at)
    }

    /// Look up a session by its path id and keep it alive.
    pub async fn session(&self, id: &str) -> Result<Arc<Mutex<EditorSession>>, (StatusCode, String)> {
        let session_id = parse_session_id(id)?;
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&session_id)
            .ok_or((StatusCode::NOT_FOUND, "Session not found or expired".to_string()))?;
        entry.touch();
        Ok(entry.session.clone())
    }

    /// Remove a session and take ownership of it.
    pub async fn take_session(&self, id: &str) -> Result<EditorSession, (StatusCode, String)> {
        let session_id = parse_session_id(id)?;
        let entry = self
            .sessions
            .write()
            .await
            .remove(&session_id)
            .ok_or((StatusCode::NOT_FOUND, "Session not found or expired".to_string()))?;

        // A request still holding the session gets to finish; we keep a copy.
        Ok(match Arc::try_unwrap(entry.session) {
            Ok(mutex) => mutex.into_inner(),
            Err(shared) => {
                let snapshot = shared.lock().await.clone();
                tracing::debug!(
                    session = %session_id,
                    in_flight = Arc::strong_count(&shared) - 1,
                    "Session closed while still in use, later changes from those requests are dropped"
                );
                snapshot
            }
        })
    }

    /// Drop sessions idle longer than the configured expiration. Returns how many were removed.
    pub async fn evict_expired_sessions(&self) -> usize {
        let expiration = Duration::from_secs(self.config.session_expiration_secs);
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_accessed) < expiration);
        before - sessions.len()
    }
}

fn parse_session_id(id: &str) -> Result<Uuid, (StatusCode, String)> {
    Uuid::parse_str(id).map_err(|_| (StatusCode::BAD_REQUEST, "Invalid session ID".to_string()))
}
