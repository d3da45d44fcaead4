//! Pixel compositing onto the RGBA export surface.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use std::ops::Range;

use super::text::TextMask;

/// Element box in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBox {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelBox {
    /// Scale percent geometry to a surface of `surface_width` x `surface_height`.
    pub fn from_percent(x: f64, y: f64, width: f64, height: f64, surface_width: u32, surface_height: u32) -> Self {
        let sw = surface_width as f64;
        let sh = surface_height as f64;
        Self {
            center_x: x / 100.0 * sw,
            center_y: y / 100.0 * sh,
            width: width / 100.0 * sw,
            height: height / 100.0 * sh,
        }
    }

    pub fn left(&self) -> f64 {
        self.center_x - self.width / 2.0
    }

    pub fn top(&self) -> f64 {
        self.center_y - self.height / 2.0
    }
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_color(s: &str) -> Option<Rgba<u8>> {
    let hex = s.trim().strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgb[i] = v * 17;
            }
            Some(Rgba([rgb[0], rgb[1], rgb[2], 255]))
        }
        6 => Some(Rgba([channel(0)?, channel(2)?, channel(4)?, 255])),
        8 => Some(Rgba([channel(0)?, channel(2)?, channel(4)?, channel(6)?])),
        _ => None,
    }
}

/// Stretched boxes larger than this many pixels are sampled directly
/// instead of resized whole.
const MAX_RESIZE_PIXELS: f64 = (1u64 << 24) as f64;

/// Offsets within a span of `extent` pixels starting at `origin` that land
/// on a surface axis of `surface_extent` pixels.
pub fn visible_span(origin: f64, extent: f64, surface_extent: u32) -> Range<usize> {
    if !origin.is_finite() || !extent.is_finite() || extent <= 0.0 {
        return 0..0;
    }
    let start = (-origin).clamp(0.0, extent);
    let end = (surface_extent as f64 - origin).clamp(start, extent);
    start as usize..end as usize
}

/// Left/top pixel of a span of `extent` pixels centered on `center`.
pub fn centered_origin(center: f64, extent: f64) -> f64 {
    (center - extent / 2.0).round()
}

/// Draw `image` stretched to fill `target`, alpha-blended over the surface.
///
/// Boxes that round to zero pixels draw nothing. Parts outside the surface are clipped.
pub fn draw_image(surface: &mut RgbaImage, image: &DynamicImage, target: &PixelBox) {
    let width = target.width.round();
    let height = target.height.round();
    if !(width >= 1.0 && height >= 1.0) || image.width() == 0 || image.height() == 0 {
        return;
    }
    let left = target.left().round();
    let top = target.top().round();
    let columns = visible_span(left, width, surface.width());
    let rows = visible_span(top, height, surface.height());
    if columns.is_empty() || rows.is_empty() {
        return;
    }

    if width * height <= MAX_RESIZE_PIXELS {
        let resized = image.resize_exact(width as u32, height as u32, FilterType::Triangle).to_rgba8();
        imageops::overlay(surface, &resized, left as i64, top as i64);
    } else {
        let visible = sample_stretched(&image.to_rgba8(), width, height, &columns, &rows);
        imageops::overlay(
            surface,
            &visible,
            left as i64 + columns.start as i64,
            top as i64 + rows.start as i64,
        );
    }
}

/// Bilinear samples of `source` stretched to `width` x `height`, for only
/// the given columns and rows of the stretched box.
fn sample_stretched(
    source: &RgbaImage,
    width: f64,
    height: f64,
    columns: &Range<usize>,
    rows: &Range<usize>,
) -> RgbaImage {
    let step_x = source.width() as f64 / width;
    let step_y = source.height() as f64 / height;
    RgbaImage::from_fn(columns.len() as u32, rows.len() as u32, |x, y| {
        let u = ((columns.start + x as usize) as f64 + 0.5) * step_x - 0.5;
        let v = ((rows.start + y as usize) as f64 + 0.5) * step_y - 0.5;
        bilinear(source, u, v)
    })
}

fn bilinear(source: &RgbaImage, u: f64, v: f64) -> Rgba<u8> {
    let max_x = source.width() - 1;
    let max_y = source.height() - 1;
    let u = u.clamp(0.0, max_x as f64);
    let v = v.clamp(0.0, max_y as f64);
    let (x0, y0) = (u.floor() as u32, v.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(max_x), (y0 + 1).min(max_y));
    let (fx, fy) = (u - x0 as f64, v - y0 as f64);

    let (p00, p10) = (source.get_pixel(x0, y0), source.get_pixel(x1, y0));
    let (p01, p11) = (source.get_pixel(x0, y1), source.get_pixel(x1, y1));
    let mut out = [0u8; 4];
    for (c, value) in out.iter_mut().enumerate() {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        *value = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Fill `color` through `mask`, centered on `(center_x, center_y)`.
///
/// Only the mask's stored window is drawn.
pub fn fill_mask(surface: &mut RgbaImage, mask: &TextMask, center_x: f64, center_y: f64, color: Rgba<u8>) {
    if mask.is_empty() {
        return;
    }
    let left = centered_origin(center_x, mask.width as f64) as i64;
    let top = centered_origin(center_y, mask.height as f64) as i64;
    let (sw, sh) = (surface.width() as i64, surface.height() as i64);
    let window = mask.window();

    for my in window.rows.clone() {
        let y = top + my as i64;
        if y < 0 || y >= sh {
            continue;
        }
        for mx in window.columns.clone() {
            let x = left + mx as i64;
            if x < 0 || x >= sw {
                continue;
            }
            let coverage = mask.coverage(mx, my);
            if coverage <= 0.0 {
                continue;
            }
            let alpha = coverage * color[3] as f32 / 255.0;
            let dst = surface.get_pixel_mut(x as u32, y as u32);
            blend_over(dst, color, alpha);
        }
    }
}

/// Source-over blend of an opaque `color` at `alpha` onto `dst`.
fn blend_over(dst: &mut Rgba<u8>, color: Rgba<u8>, alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = alpha + dst_a * (1.0 - alpha);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let src = color[c] as f32;
        let base = dst[c] as f32;
        let v = (src * alpha + base * dst_a * (1.0 - alpha)) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round() as u8;
}
