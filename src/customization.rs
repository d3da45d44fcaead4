//! The saved customization aggregate and its creative context.
//!
//! A `Customization` is what an editor session hands to the host at save
//! time. The core defines no storage format for it; serde derives are
//! provided so hosts can pick one. The preview bitmap serializes as a PNG
//! data URL.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::editor::element::CanvasElement;

pub const DEFAULT_RECIPIENT: &str = "Alexandra";
pub const DEFAULT_OCCASION: &str = "Special Day";

/// Voice of the generated note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tone {
    Romantic,
    Professional,
    Humorous,
    #[default]
    Minimalist,
}

impl Tone {
    pub const ALL: [Tone; 4] = [
        Tone::Romantic,
        Tone::Professional,
        Tone::Humorous,
        Tone::Minimalist,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Romantic => "Romantic",
            Tone::Professional => "Professional",
            Tone::Humorous => "Humorous",
            Tone::Minimalist => "Minimalist",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tone::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown tone '{}'", s))
    }
}

/// Recipient details and generated copy edited alongside the design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeContext {
    pub recipient_name: String,
    pub occasion: String,
    pub tone: Tone,
    pub note: String,
    pub design_advice: String,
}

impl Default for CreativeContext {
    fn default() -> Self {
        Self {
            recipient_name: DEFAULT_RECIPIENT.to_string(),
            occasion: DEFAULT_OCCASION.to_string(),
            tone: Tone::default(),
            note: String::new(),
            design_advice: String::new(),
        }
    }
}

/// Snapshot of one finished design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customization {
    pub elements: Vec<CanvasElement>,
    pub generated_note: String,
    pub design_advice: String,
    pub recipient_name: String,
    pub occasion: String,
    pub tone: Tone,
    /// Rendered composite (PNG bytes).
    #[serde(default, skip_serializing_if = "Option::is_none", with = "png_data_url")]
    pub preview_image: Option<Vec<u8>>,
}

impl Customization {
    pub fn creative_context(&self) -> CreativeContext {
        CreativeContext {
            recipient_name: self.recipient_name.clone(),
            occasion: self.occasion.clone(),
            tone: self.tone,
            note: self.generated_note.clone(),
            design_advice: self.design_advice.clone(),
        }
    }
}

/// Serde adapter: `Option<Vec<u8>>` PNG bytes <-> `data:image/png;base64,...`.
mod png_data_url {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const PREFIX: &str = "data:image/png;base64,";

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&format!("{}{}", PREFIX, STANDARD.encode(bytes))),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let Some(s) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if s.is_empty() {
            return Ok(None);
        }
        let payload = s.strip_prefix(PREFIX).ok_or_else(|| D::Error::custom("expected a PNG data URL"))?;
        STANDARD.decode(payload).map(Some).map_err(D::Error::custom)
    }
}
