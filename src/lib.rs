//! # Souvy - Design Editor Core for Personalised Gifts
//!
//! Souvy is the engine behind a product customization editor. It provides:
//!
//! - **Element store**: text and image elements placed in percent space
//! - **Layering**: paint order by sortable keys, with up/down/top/bottom moves
//! - **Safe-zone validation**: advisory check against the printable surface
//! - **Pointer interaction**: a move/resize drag state machine
//! - **Export**: deterministic compositing of the design onto the product photo
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use souvy::{
//!     editor::{EditorSession, ProductRef, element::ElementKind},
//!     render::{Exporter, context::RenderContext, fetch::HttpFetcher, text::FontRegistry},
//! };
//!
//! # async fn example() -> Result<(), souvy::SouvyError> {
//! let fetcher = HttpFetcher::new(None)?;
//! let exporter = Exporter::new(RenderContext::new(Arc::new(fetcher), FontRegistry::new()));
//!
//! let mut session = EditorSession::new(ProductRef {
//!     name: "Ceramic Mug".to_string(),
//!     image_url: "https://shop.example/mug.jpg".to_string(),
//! });
//! session.add(ElementKind::Text, Some("Happy Birthday"));
//!
//! let customization = session.save(&exporter).await;
//! assert!(customization.preview_image.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`editor`] | Session, element store, layering, bounds, pointer interaction |
//! | [`render`] | Asset fetching, text rasterization, compositing, PNG export |
//! | [`gateway`] | Safe-zone detection, creative text, receipt verification |
//! | [`customization`] | The saved design handed to the host |
//! | [`server`] | HTTP surface for browser hosts |
//! | [`error`] | Error types |

pub mod customization;
pub mod editor;
pub mod error;
pub mod gateway;
pub mod render;
pub mod server;

// Re-exports for convenience
pub use customization::{Customization, Tone};
pub use editor::EditorSession;
pub use error::SouvyError;
