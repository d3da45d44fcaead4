//! Canvas elements: the text and image objects placed on a product.
//!
//! Geometry is resolution-independent. `x`/`y` are the element's center and
//! `width`/`height` its size, all as percentages (0-100) of the canvas width
//! and height respectively.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Default text size in design pixels (relative to the 600px reference width).
pub const DEFAULT_FONT_SIZE: f64 = 24.0;

/// Default font family for new text elements.
pub const DEFAULT_FONT_FAMILY: &str = "Playfair Display";

/// Default ink color for new text elements.
pub const DEFAULT_TEXT_COLOR: &str = "#004D4D";

/// Content of a text element added without explicit content.
pub const DEFAULT_TEXT_CONTENT: &str = "New Message";

const ID_LEN: usize = 9;

/// Opaque element identifier, unique within one editor session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// Generate a fresh random identifier (9 base-36 characters).
    pub fn generate() -> Self {
        let mut n = Uuid::new_v4().as_u128();
        let mut id = String::with_capacity(ID_LEN);
        for _ in 0..ID_LEN {
            let digit = (n % 36) as u32;
            n /= 36;
            id.push(char::from_digit(digit, 36).unwrap_or('0'));
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ElementId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Element variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// `content` is the literal string to render.
    Text,
    /// `content` references image bytes (data URL or fetchable URL).
    Image,
}

/// One placed design element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasElement {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub content: String,
    /// Center X, percent of canvas width.
    pub x: f64,
    /// Center Y, percent of canvas height.
    pub y: f64,
    /// Width, percent of canvas width.
    pub width: f64,
    /// Height, percent of canvas height.
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Ordering key. Only the relative ascending order matters.
    pub z_index: i64,
    /// Reserved for UI gating; the core never enforces it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_locked: Option<bool>,
}

impl CanvasElement {
    /// Create an element with default placement and size for its kind.
    ///
    /// Text: centered 30x8 with the default typography. Image: centered 20x20.
    pub fn new(kind: ElementKind, content: Option<&str>, z_index: i64) -> Self {
        let content = match (kind, content) {
            (_, Some(c)) if !c.is_empty() => c.to_string(),
            (ElementKind::Text, _) => DEFAULT_TEXT_CONTENT.to_string(),
            (ElementKind::Image, _) => String::new(),
        };
        let is_text = kind == ElementKind::Text;

        Self {
            id: ElementId::generate(),
            kind,
            content,
            x: 50.0,
            y: 50.0,
            width: if is_text { 30.0 } else { 20.0 },
            height: if is_text { 8.0 } else { 20.0 },
            font_size: is_text.then_some(DEFAULT_FONT_SIZE),
            font_family: is_text.then(|| DEFAULT_FONT_FAMILY.to_string()),
            color: is_text.then(|| DEFAULT_TEXT_COLOR.to_string()),
            z_index,
            is_locked: None,
        }
    }

    /// Edges of the element box as `(left, top, right, bottom)` in percent space.
    pub fn edges(&self) -> (f64, f64, f64, f64) {
        (
            self.x - self.width / 2.0,
            self.y - self.height / 2.0,
            self.x + self.width / 2.0,
            self.y + self.height / 2.0,
        )
    }
}

/// Partial update merged into an element by `update`.
///
/// Absent fields are left untouched. The id is not patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementPatch {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub z_index: Option<i64>,
    #[serde(default)]
    pub is_locked: Option<bool>,
}

impl ElementPatch {
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    pub fn size(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }

    pub fn z_index(z_index: i64) -> Self {
        Self {
            z_index: Some(z_index),
            ..Default::default()
        }
    }

    /// Merge the present fields into `element`.
    pub fn apply(&self, element: &mut CanvasElement) {
        if let Some(content) = &self.content {
            element.content = content.clone();
        }
        if let Some(x) = self.x {
            element.x = x;
        }
        if let Some(y) = self.y {
            element.y = y;
        }
        if let Some(width) = self.width {
            element.width = width;
        }
        if let Some(height) = self.height {
            element.height = height;
        }
        if let Some(font_size) = self.font_size {
            element.font_size = Some(font_size);
        }
        if let Some(family) = &self.font_family {
            element.font_family = Some(family.clone());
        }
        if let Some(color) = &self.color {
            element.color = Some(color.clone());
        }
        if let Some(z) = self.z_index {
            element.z_index = z;
        }
        if let Some(locked) = self.is_locked {
            element.is_locked = Some(locked);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_base36() {
        let id = ElementId::generate();
        assert_eq!(id.as_str().len(), 9);
        assert!(id.as_str().chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(id, ElementId::generate());
    }

    #[test]
    fn test_text_defaults() {
        let el = CanvasElement::new(ElementKind::Text, None, 3);
        assert_eq!(el.content, "New Message");
        assert_eq!((el.x, el.y, el.width, el.height), (50.0, 50.0, 30.0, 8.0));
        assert_eq!(el.font_size, Some(24.0));
        assert_eq!(el.font_family.as_deref(), Some("Playfair Display"));
        assert_eq!(el.color.as_deref(), Some("#004D4D"));
        assert_eq!(el.z_index, 3);
    }

    #[test]
    fn test_image_defaults() {
        let el = CanvasElement::new(ElementKind::Image, Some("data:image/png;base64,AA=="), 0);
        assert_eq!((el.width, el.height), (20.0, 20.0));
        assert!(el.font_size.is_none());
        assert!(el.font_family.is_none());
        assert!(el.color.is_none());
        assert_eq!(el.content, "data:image/png;base64,AA==");
    }

    #[test]
    fn test_patch_merges_only_present_fields() {
        let mut el = CanvasElement::new(ElementKind::Text, Some("Hi"), 0);
        ElementPatch {
            content: Some("Hello".into()),
            width: Some(40.0),
            ..Default::default()
        }
        .apply(&mut el);
        assert_eq!(el.content, "Hello");
        assert_eq!(el.width, 40.0);
        assert_eq!(el.height, 8.0);
        assert_eq!(el.x, 50.0);
    }

    #[test]
    fn test_serde_uses_camel_case_and_type_tag() {
        let el = CanvasElement::new(ElementKind::Text, Some("Hi"), 2);
        let json = serde_json::to_value(&el).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["zIndex"], 2);
        assert_eq!(json["fontFamily"], "Playfair Display");
        assert!(json.get("isLocked").is_none());
    }

    #[test]
    fn test_edges() {
        let mut el = CanvasElement::new(ElementKind::Image, None, 0);
        el.x = 95.0;
        el.width = 20.0;
        el.height = 10.0;
        assert_eq!(el.edges(), (85.0, 45.0, 105.0, 55.0));
    }
}
