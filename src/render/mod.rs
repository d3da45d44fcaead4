//! # Rasterizer / Exporter
//!
//! Composites a base image and the design elements into one PNG.
//!
//! ## Pipeline
//!
//! 1. Load the base image (fetcher + cache). Failure yields [`RasterResult::Empty`].
//! 2. Allocate an RGBA surface at the base image's native size and copy it in.
//! 3. Walk elements in paint order (ascending `z_index`, ties by insertion),
//!    one at a time. Each image element's load completes (or fails and is
//!    skipped) before the next element's assets are requested.
//! 4. On the blocking pool, paint the layers in that order, clipped to the
//!    surface, and encode the surface as PNG.
//!
//! Exports through one [`Exporter`] are serialized: a second call waits for
//! the first to finish.

pub mod composite;
pub mod context;
pub mod fetch;
pub mod text;

use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{DynamicImage, ImageEncoder, Rgba, RgbaImage};
use std::time::Instant;
use tokio::sync::Mutex;

use crate::editor::element::{CanvasElement, ElementKind};
use crate::editor::store::paint_order;
use crate::error::SouvyError;
use composite::PixelBox;
use context::RenderContext;
use text::{FontFace, MaskWindow};

/// Design width that element font sizes are expressed against.
pub const REFERENCE_WIDTH: f64 = 600.0;

/// Font size used when a text element has none.
pub const FALLBACK_FONT_SIZE: f64 = 20.0;

/// Font family used when a text element has none.
pub const FALLBACK_FONT_FAMILY: &str = "serif";

/// Text is never rasterized taller than this multiple of the surface's longer side.
pub const MAX_TEXT_HEIGHT_FACTOR: f64 = 2.0;

/// Export tuning.
#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    /// Width at which `font_size` is taken literally; text scales by `surface_width / reference_width`.
    pub reference_width: f64,
    /// Favor smaller output over encode speed.
    pub best_compression: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            reference_width: REFERENCE_WIDTH,
            best_compression: false,
        }
    }
}

/// Outcome of an export.
#[derive(Debug, Clone, PartialEq)]
pub enum RasterResult {
    /// PNG composite at the base image's pixel size.
    Rendered { width: u32, height: u32, png: Vec<u8> },
    /// The base image could not be loaded (or the output not encoded). Treat as failure.
    Empty,
}

impl RasterResult {
    pub fn is_empty(&self) -> bool {
        matches!(self, RasterResult::Empty)
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            RasterResult::Rendered { width, height, .. } => Some((*width, *height)),
            RasterResult::Empty => None,
        }
    }

    pub fn into_png(self) -> Option<Vec<u8>> {
        match self {
            RasterResult::Rendered { png, .. } => Some(png),
            RasterResult::Empty => None,
        }
    }
}

/// Encode an RGBA surface as PNG with default settings.
pub fn encode_png(surface: &RgbaImage) -> Result<Vec<u8>, SouvyError> {
    encode_png_with(surface, CompressionType::Default)
}

fn encode_png_with(surface: &RgbaImage, compression: CompressionType) -> Result<Vec<u8>, SouvyError> {
    let mut png_bytes = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut png_bytes, compression, PngFilter::Adaptive);
    encoder
        .write_image(
            surface.as_raw(),
            surface.width(),
            surface.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| SouvyError::Encode(format!("PNG encode failed: {}", e)))?;
    Ok(png_bytes)
}

/// Runs exports against a shared [`RenderContext`], one at a time.
pub struct Exporter {
    ctx: RenderContext,
    options: ExportOptions,
    busy: Mutex<()>,
}

/// One element, with its assets loaded, ready to paint.
enum Layer {
    Image {
        image: DynamicImage,
        target: PixelBox,
    },
    Text {
        content: String,
        face: Option<FontFace>,
        pixel_height: f64,
        color: Rgba<u8>,
        target: PixelBox,
    },
}

impl Exporter {
    pub fn new(ctx: RenderContext) -> Self {
        Self::with_options(ctx, ExportOptions::default())
    }

    pub fn with_options(ctx: RenderContext, options: ExportOptions) -> Self {
        Self {
            ctx,
            options,
            busy: Mutex::new(()),
        }
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    /// Composite `elements` over `base_image` and encode the result.
    pub async fn export(&self, base_image: &str, elements: &[CanvasElement]) -> RasterResult {
        let _exclusive = self.busy.lock().await;
        let started = Instant::now();

        let base = match self.ctx.load_image(base_image).await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(base_image, "Export aborted, base image unavailable: {}", e);
                return RasterResult::Empty;
            }
        };
        let (width, height) = (base.width(), base.height());

        let mut layers = Vec::with_capacity(elements.len());
        for element in paint_order(elements) {
            if let Some(layer) = self.prepare(element, width, height).await {
                layers.push(layer);
            }
        }

        let compression = if self.options.best_compression {
            CompressionType::Best
        } else {
            CompressionType::Default
        };

        // Move CPU-intensive work to blocking thread pool
        let painted = tokio::task::spawn_blocking(move || {
            let mut surface = base.to_rgba8();
            for layer in &layers {
                paint(&mut surface, layer);
            }
            encode_png_with(&surface, compression)
        })
        .await;

        match painted {
            Ok(Ok(png)) => {
                tracing::debug!(
                    width,
                    height,
                    elements = elements.len(),
                    bytes = png.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Export complete"
                );
                RasterResult::Rendered { width, height, png }
            }
            Ok(Err(e)) => {
                tracing::warn!("Export failed: {}", e);
                RasterResult::Empty
            }
            Err(e) => {
                tracing::warn!("Export task failed: {}", e);
                RasterResult::Empty
            }
        }
    }

    /// Resolve an element's assets. `None` skips the element.
    async fn prepare(&self, element: &CanvasElement, width: u32, height: u32) -> Option<Layer> {
        let target = PixelBox::from_percent(element.x, element.y, element.width, element.height, width, height);

        match element.kind {
            ElementKind::Image => match self.ctx.load_image(&element.content).await {
                Ok(image) => Some(Layer::Image { image, target }),
                Err(e) => {
                    tracing::warn!(element = %element.id, "Skipping image element: {}", e);
                    None
                }
            },
            ElementKind::Text => {
                let color = element
                    .color
                    .as_deref()
                    .and_then(composite::parse_color)
                    .unwrap_or(Rgba([0, 0, 0, 255]));
                let font_size = element.font_size.unwrap_or(FALLBACK_FONT_SIZE);
                let family = element.font_family.as_deref().unwrap_or(FALLBACK_FONT_FAMILY);
                let face = self.ctx.fonts.resolve(family).cloned();
                if face.is_none() && !self.ctx.fonts.is_empty() {
                    tracing::debug!(family, "No font registered for family, using bitmap fallback");
                }

                let mut pixel_height = font_size * (width as f64 / self.options.reference_width);
                let ceiling = MAX_TEXT_HEIGHT_FACTOR * width.max(height) as f64;
                if pixel_height > ceiling {
                    tracing::debug!(element = %element.id, font_size, "Text taller than the surface, capping height");
                    pixel_height = ceiling;
                }

                Some(Layer::Text {
                    content: element.content.clone(),
                    face,
                    pixel_height,
                    color,
                    target,
                })
            }
        }
    }
}

fn paint(surface: &mut RgbaImage, layer: &Layer) {
    match layer {
        Layer::Image { image, target } => composite::draw_image(surface, image, target),
        Layer::Text {
            content,
            face,
            pixel_height,
            color,
            target,
        } => {
            let (surface_width, surface_height) = surface.dimensions();
            let mask = text::render_text_within(content, face.as_ref(), *pixel_height as f32, |width, height| {
                let (width, height) = (width as f64, height as f64);
                MaskWindow {
                    columns: composite::visible_span(
                        composite::centered_origin(target.center_x, width),
                        width,
                        surface_width,
                    ),
                    rows: composite::visible_span(
                        composite::centered_origin(target.center_y, height),
                        height,
                        surface_height,
                    ),
                }
            });
            composite::fill_mask(surface, &mask, target.center_x, target.center_y, *color);
        }
    }
}
