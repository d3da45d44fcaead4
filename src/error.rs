//! # Error Types
//!
//! This module defines error types used throughout the souvy library.
//!
//! Most of these never reach the host: the editor core turns them into the
//! degraded behaviors it promises (skipped elements, empty exports, gateway
//! fallbacks). They surface from the collaborators and from the CLI.

use thiserror::Error;

/// Main error type for souvy operations
#[derive(Debug, Error)]
pub enum SouvyError {
    /// Asset download failed (network, HTTP status, unreadable body)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Image decoding or processing error
    #[error("Image error: {0}")]
    Image(String),

    /// Font loading error
    #[error("Font error: {0}")]
    Font(String),

    /// AI gateway request or response error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Output encoding error
    #[error("Encode error: {0}")]
    Encode(String),

    /// Server transport errors (bind, serve)
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
