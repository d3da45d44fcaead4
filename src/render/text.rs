//! Text rasterization for export.
//!
//! Renders a single line of text to an anti-aliased coverage mask
//! (0.0 = empty, 1.0 = fully inked). TTF/OTF fonts registered per family
//! are drawn with ab_glyph; families with no registered font fall back to
//! the built-in Spleen 12x24 bitmap font, scaled. Export text is always
//! bold italic: faces that are not natively bold or italic get a synthetic
//! stroke and slant.

use ab_glyph::{Font, FontArc, GlyphId, PxScale, ScaleFont};
use spleen_font::{FONT_12X24, PSF2Font};
use std::collections::{HashMap, VecDeque};
use std::ops::Range;
use std::path::Path;

use crate::error::SouvyError;

/// Horizontal slant per pixel of height for synthetic italics.
const ITALIC_SHEAR: f32 = 0.2;

/// Spleen cell size.
const BITMAP_CELL_W: usize = 12;
const BITMAP_CELL_H: usize = 24;

/// Samples per axis when scaling bitmap glyphs.
const SUPERSAMPLE: usize = 3;

/// One loaded font file and the style it natively provides.
#[derive(Clone)]
pub struct FontFace {
    pub font: FontArc,
    pub bold: bool,
    pub italic: bool,
}

/// Fonts available to text elements, looked up by family name.
///
/// Family names are matched case-insensitively, ignoring spaces, dashes and
/// underscores, so `"Playfair Display"` finds `PlayfairDisplay-BoldItalic.ttf`.
#[derive(Clone, Default)]
pub struct FontRegistry {
    faces: HashMap<String, Vec<FontFace>>,
}

fn family_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.ttf`/`.otf` in `dir`.
    ///
    /// File stems are read as `Family-Style`: the part before the first dash
    /// names the family, the rest is scanned for "bold" and "italic"/"oblique".
    pub fn load_dir(dir: &Path) -> Result<Self, SouvyError> {
        let mut registry = Self::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_font = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"));
            if !is_font {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let (family, style) = stem.split_once('-').unwrap_or((stem, ""));
            let style = style.to_lowercase();
            let bold = style.contains("bold");
            let italic = style.contains("italic") || style.contains("oblique");

            match registry.register(family, std::fs::read(&path)?, bold, italic) {
                Ok(()) => tracing::debug!(font = %path.display(), family, bold, italic, "Loaded font"),
                Err(e) => tracing::warn!(font = %path.display(), "Skipping font: {}", e),
            }
        }
        Ok(registry)
    }

    /// Register a font under `family`.
    pub fn register(&mut self, family: &str, bytes: Vec<u8>, bold: bool, italic: bool) -> Result<(), SouvyError> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| SouvyError::Font(format!("Failed to parse font for '{}': {}", family, e)))?;
        self.faces
            .entry(family_key(family))
            .or_default()
            .push(FontFace { font, bold, italic });
        Ok(())
    }

    /// Best face for bold-italic rendering of `family`, if any is registered.
    pub fn resolve(&self, family: &str) -> Option<&FontFace> {
        self.faces
            .get(&family_key(family))?
            .iter()
            .max_by_key(|face| (face.bold as u8) * 2 + face.italic as u8)
    }

    pub fn len(&self) -> usize {
        self.faces.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Columns and rows of a text line that are kept when it is rasterized.
///
/// Ranges are in line coordinates, `0..width` and `0..height` of the full line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskWindow {
    pub columns: Range<usize>,
    pub rows: Range<usize>,
}

impl MaskWindow {
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            columns: 0..width,
            rows: 0..height,
        }
    }

    fn clamped(self, width: usize, height: usize) -> Self {
        let clamp = |r: Range<usize>, limit: usize| {
            let end = r.end.min(limit);
            r.start.min(end)..end
        };
        Self {
            columns: clamp(self.columns, width),
            rows: clamp(self.rows, height),
        }
    }

    fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }
}

/// Rendered text coverage.
///
/// `width` and `height` are the extent of the whole line. Only the pixels
/// inside the mask's window are stored; everything else reads as empty.
#[derive(Debug, Clone)]
pub struct TextMask {
    pub width: usize,
    pub height: usize,
    window: MaskWindow,
    data: Vec<f32>,
}

impl TextMask {
    fn blank(width: usize, height: usize) -> Self {
        Self::windowed(width, height, MaskWindow::full(width, height))
    }

    fn windowed(width: usize, height: usize, window: MaskWindow) -> Self {
        let window = window.clamped(width, height);
        let data = vec![0.0; window.columns.len() * window.rows.len()];
        Self {
            width,
            height,
            window,
            data,
        }
    }

    /// Mask covering its whole extent, `data` given row by row.
    pub fn from_coverage(width: usize, height: usize, data: Vec<f32>) -> Self {
        let mut mask = Self::blank(width, height);
        for (dst, src) in mask.data.iter_mut().zip(data) {
            *dst = src;
        }
        mask
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Stored part of the line.
    pub fn window(&self) -> &MaskWindow {
        &self.window
    }

    pub fn is_inked(&self) -> bool {
        self.data.iter().any(|&c| c > 0.0)
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if !self.window.columns.contains(&x) || !self.window.rows.contains(&y) {
            return None;
        }
        let stride = self.window.columns.len();
        Some((y - self.window.rows.start) * stride + (x - self.window.columns.start))
    }

    pub fn coverage(&self, x: usize, y: usize) -> f32 {
        match self.index(x as i64, y as i64) {
            Some(idx) => self.data[idx],
            None => 0.0,
        }
    }

    fn accumulate(&mut self, x: i64, y: i64, coverage: f32) {
        if let Some(idx) = self.index(x, y) {
            self.data[idx] = (self.data[idx] + coverage).min(1.0);
        }
    }

    fn raise(&mut self, x: i64, y: i64, coverage: f32) {
        if let Some(idx) = self.index(x, y) {
            self.data[idx] = self.data[idx].max(coverage);
        }
    }
}

/// Extra horizontal pixels used to embolden text of this size.
fn stroke_width(pixel_height: f32) -> usize {
    ((pixel_height / 24.0).round() as usize).max(1)
}

/// Render `text` in bold italic at `pixel_height`.
///
/// Uses `face` when given, the bitmap fallback otherwise.
pub fn render_text(text: &str, face: Option<&FontFace>, pixel_height: f32) -> TextMask {
    render_text_within(text, face, pixel_height, MaskWindow::full)
}

/// Like [`render_text`], but only rasterizes the part of the line that
/// `visible` selects. `visible` is given the full line's width and height.
pub fn render_text_within(
    text: &str,
    face: Option<&FontFace>,
    pixel_height: f32,
    visible: impl FnOnce(usize, usize) -> MaskWindow,
) -> TextMask {
    let text: String = text.chars().filter(|c| !c.is_control()).collect();
    if text.is_empty() || !pixel_height.is_finite() || pixel_height < 1.0 {
        return TextMask::blank(0, 0);
    }

    let (line, native_bold, native_italic) = match face {
        Some(face) => (Line::outline(&text, &face.font, pixel_height), face.bold, face.italic),
        None => (Line::bitmap(&text, pixel_height), false, false),
    };

    let shear = if native_italic { 0.0 } else { ITALIC_SHEAR };
    let embolden = if native_bold { 0 } else { stroke_width(pixel_height) };

    let (base_width, height) = line.extent();
    let slant = (height as f32 * shear).ceil() as usize;
    let width = base_width + slant + embolden;
    let window = visible(width, height).clamped(width, height);
    if window.is_empty() {
        return TextMask::windowed(width, height, window);
    }

    // Upright columns that can reach the window once slanted and stroked
    let upright_window = MaskWindow {
        columns: window.columns.start.saturating_sub(slant + embolden)..window.columns.end,
        rows: window.rows.clone(),
    };
    let upright = line.rasterize(upright_window);
    stylize(&upright, shear, embolden, window)
}

/// A laid-out line, ready to rasterize.
enum Line<'a> {
    Outline {
        font: &'a FontArc,
        scale: PxScale,
        ascent: f32,
        glyphs: Vec<(GlyphId, f32)>,
        width: usize,
        height: usize,
    },
    Bitmap {
        chars: Vec<char>,
        scale: f32,
        cell_w: usize,
        cell_h: usize,
    },
}

impl<'a> Line<'a> {
    fn outline(text: &str, font: &'a FontArc, pixel_height: f32) -> Self {
        let scale = PxScale::from(pixel_height);
        let scaled = font.as_scaled(scale);

        let mut glyphs = Vec::new();
        let mut caret_x = 0.0f32;
        let mut previous = None;
        for ch in text.chars() {
            let glyph_id = font.glyph_id(ch);
            if let Some(prev) = previous {
                caret_x += scaled.kern(prev, glyph_id);
            }
            glyphs.push((glyph_id, caret_x));
            caret_x += scaled.h_advance(glyph_id);
            previous = Some(glyph_id);
        }

        let ascent = scaled.ascent();
        Line::Outline {
            font,
            scale,
            ascent,
            glyphs,
            width: (caret_x.ceil() as usize).max(1),
            height: ((ascent - scaled.descent()).ceil() as usize).max(1),
        }
    }

    fn bitmap(text: &str, pixel_height: f32) -> Self {
        let scale = pixel_height / BITMAP_CELL_H as f32;
        Line::Bitmap {
            chars: text.chars().collect(),
            scale,
            cell_w: ((BITMAP_CELL_W as f32 * scale).round() as usize).max(1),
            cell_h: ((BITMAP_CELL_H as f32 * scale).round() as usize).max(1),
        }
    }

    fn extent(&self) -> (usize, usize) {
        match self {
            Line::Outline { width, height, .. } => (*width, *height),
            Line::Bitmap { chars, cell_w, cell_h, .. } => (cell_w * chars.len(), *cell_h),
        }
    }

    fn rasterize(&self, window: MaskWindow) -> TextMask {
        let (width, height) = self.extent();
        let mut mask = TextMask::windowed(width, height, window);
        if mask.window.is_empty() {
            return mask;
        }
        match self {
            Line::Outline {
                font,
                scale,
                ascent,
                glyphs,
                ..
            } => draw_outline(&mut mask, font, *scale, *ascent, glyphs),
            Line::Bitmap {
                chars,
                scale,
                cell_w,
                cell_h,
            } => draw_bitmap(&mut mask, chars, *scale, *cell_w, *cell_h),
        }
        mask
    }
}

fn overlaps(range: &Range<usize>, min: f32, max: f32) -> bool {
    max > range.start as f32 && min < range.end as f32
}

fn draw_outline(mask: &mut TextMask, font: &FontArc, scale: PxScale, ascent: f32, glyphs: &[(GlyphId, f32)]) {
    for &(glyph_id, glyph_x) in glyphs {
        let glyph = glyph_id.with_scale_and_position(scale, ab_glyph::point(glyph_x, ascent));
        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        if !overlaps(&mask.window.columns, bounds.min.x, bounds.max.x)
            || !overlaps(&mask.window.rows, bounds.min.y, bounds.max.y)
        {
            continue;
        }
        outlined.draw(|px, py, coverage| {
            let x = px as i64 + bounds.min.x as i64;
            let y = py as i64 + bounds.min.y as i64;
            mask.accumulate(x, y, coverage);
        });
    }
}

fn draw_bitmap(mask: &mut TextMask, chars: &[char], scale: f32, cell_w: usize, cell_h: usize) {
    let Ok(mut spleen) = PSF2Font::new(FONT_12X24) else {
        return;
    };
    let columns = mask.window.columns.clone();
    let rows = mask.window.rows.start..mask.window.rows.end.min(cell_h);

    let first = columns.start / cell_w;
    let last = columns.end.div_ceil(cell_w).min(chars.len());
    for (i, ch) in chars.iter().enumerate().take(last).skip(first) {
        let utf8_bytes = ch.to_string();
        let Some(spleen_glyph) = spleen.glyph_for_utf8(utf8_bytes.as_bytes()) else {
            continue;
        };

        let mut cell = [false; BITMAP_CELL_W * BITMAP_CELL_H];
        for (row_y, row) in spleen_glyph.enumerate() {
            for (col_x, on) in row.enumerate() {
                if row_y < BITMAP_CELL_H && col_x < BITMAP_CELL_W {
                    cell[row_y * BITMAP_CELL_W + col_x] = on;
                }
            }
        }

        // Box-filter the cell into the target size by supersampling each target pixel
        let origin_x = i * cell_w;
        let cell_columns = columns.start.max(origin_x)..columns.end.min(origin_x + cell_w);
        for ty in rows.clone() {
            for x in cell_columns.clone() {
                let tx = x - origin_x;
                let mut hits = 0usize;
                for sy in 0..SUPERSAMPLE {
                    for sx in 0..SUPERSAMPLE {
                        let fx = (tx as f32 + (sx as f32 + 0.5) / SUPERSAMPLE as f32) / scale;
                        let fy = (ty as f32 + (sy as f32 + 0.5) / SUPERSAMPLE as f32) / scale;
                        let cx = (fx as usize).min(BITMAP_CELL_W - 1);
                        let cy = (fy as usize).min(BITMAP_CELL_H - 1);
                        if cell[cy * BITMAP_CELL_W + cx] {
                            hits += 1;
                        }
                    }
                }
                if hits > 0 {
                    let coverage = hits as f32 / (SUPERSAMPLE * SUPERSAMPLE) as f32;
                    mask.accumulate(x as i64, ty as i64, coverage);
                }
            }
        }
    }
}

/// Apply a slant (rows shifted right in proportion to their height above the
/// bottom) and a horizontal stroke of `embolden` extra pixels, keeping only
/// the output pixels inside `window`.
fn stylize(mask: &TextMask, shear: f32, embolden: usize, window: MaskWindow) -> TextMask {
    if mask.is_empty() {
        return mask.clone();
    }
    let slant = (mask.height as f32 * shear).ceil() as usize;
    let mut out = TextMask::windowed(mask.width + slant + embolden, mask.height, window);
    let columns = out.window.columns.clone();
    let stroke = embolden as i64;

    for y in out.window.rows.clone() {
        let shift = ((mask.height - 1 - y) as f32 * shear).round() as i64;

        // Running maximum of the upright row over the last `embolden + 1` columns
        let mut run: VecDeque<(i64, f32)> = VecDeque::new();
        let mut next = columns.start as i64 - shift - stroke;
        for x in columns.clone() {
            let newest = x as i64 - shift;
            while next <= newest {
                let coverage = if next >= 0 { mask.coverage(next as usize, y) } else { 0.0 };
                while run.back().is_some_and(|&(_, c)| c <= coverage) {
                    run.pop_back();
                }
                run.push_back((next, coverage));
                next += 1;
            }
            while run.front().is_some_and(|&(j, _)| j < newest - stroke) {
                run.pop_front();
            }
            if let Some(&(_, coverage)) = run.front() {
                out.raise(x as i64, y as i64, coverage);
            }
        }
    }

    out
}
