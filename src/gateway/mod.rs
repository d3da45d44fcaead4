//! # AI Gateway
//!
//! Three independent model-backed operations used by the editor and checkout:
//!
//! | Operation | Output | On any failure |
//! |-----------|--------|----------------|
//! | [`AiGateway::detect_safe_zone`] | [`SafeZone`] (0-1000 space) | [`SafeZone::FALLBACK`] |
//! | [`AiGateway::generate_creative_content`] | [`CreativeContent`] | `None` |
//! | [`AiGateway::verify_receipt`] | [`ReceiptVerdict`] | `verified: false` with the error as reason |
//!
//! Failures are logged and never returned as errors. The model call itself
//! sits behind [`GenerativeBackend`] so the fallback contract is testable
//! without a network.

pub mod gemini;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::customization::Tone;
use crate::editor::bounds::SafeZone;
use crate::error::SouvyError;
use crate::render::fetch::{self, AssetFetcher};

pub use gemini::GeminiBackend;

pub const DEFAULT_SPATIAL_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_CREATIVE_MODEL: &str = "gemini-3-flash-preview";

/// Image attached to a generation request.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl InlineImage {
    /// Wrap `bytes`, sniffing the mime type (JPEG when unrecognized).
    pub fn sniff(bytes: Vec<u8>) -> Self {
        let mime = image::guess_format(&bytes)
            .map(|f| f.to_mime_type())
            .unwrap_or("image/jpeg")
            .to_string();
        Self { mime, bytes }
    }
}

/// One structured-output model call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub image: Option<InlineImage>,
    /// Response schema the model output must follow.
    pub schema: serde_json::Value,
}

/// A model that answers prompts with JSON text.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, SouvyError>;
}

/// Backend used when no API key is configured. Every call fails, so every
/// gateway operation takes its fallback.
pub struct OfflineBackend;

#[async_trait]
impl GenerativeBackend for OfflineBackend {
    async fn generate(&self, _request: GenerationRequest) -> Result<String, SouvyError> {
        Err(SouvyError::Gateway("no API key configured".to_string()))
    }
}

/// Model names per task.
#[derive(Debug, Clone)]
pub struct ModelNames {
    /// Spatial reasoning (safe-zone detection).
    pub spatial: String,
    /// Text generation and receipt reading.
    pub creative: String,
}

impl Default for ModelNames {
    fn default() -> Self {
        Self {
            spatial: DEFAULT_SPATIAL_MODEL.to_string(),
            creative: DEFAULT_CREATIVE_MODEL.to_string(),
        }
    }
}

/// Inputs for creative content generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeRequest {
    pub product_name: String,
    pub recipient_name: String,
    pub occasion: String,
    pub tone: Tone,
    pub logo_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeContent {
    pub note: String,
    pub design_advice: String,
    /// Summary of the design for the production team.
    pub final_specs: String,
}

/// What the receipt must show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptExpectation {
    pub amount: f64,
    pub reference: String,
    pub account_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptVerdict {
    pub verified: bool,
    pub reason: String,
}

impl ReceiptVerdict {
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            verified: false,
            reason: reason.into(),
        }
    }
}

pub struct AiGateway {
    backend: Arc<dyn GenerativeBackend>,
    fetcher: Arc<dyn AssetFetcher>,
    models: ModelNames,
}

impl AiGateway {
    pub fn new(backend: Arc<dyn GenerativeBackend>, fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self::with_models(backend, fetcher, ModelNames::default())
    }

    pub fn with_models(
        backend: Arc<dyn GenerativeBackend>,
        fetcher: Arc<dyn AssetFetcher>,
        models: ModelNames,
    ) -> Self {
        Self {
            backend,
            fetcher,
            models,
        }
    }

    /// Gateway that always falls back.
    pub fn offline(fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self::new(Arc::new(OfflineBackend), fetcher)
    }

    /// Locate the printable surface on a product image.
    pub async fn detect_safe_zone(&self, image_ref: &str) -> SafeZone {
        match self.try_detect_safe_zone(image_ref).await {
            Ok(zone) if zone.is_well_formed() => zone,
            Ok(zone) => {
                tracing::warn!(image_ref, ?zone, "Model returned an unusable safe zone, using fallback");
                SafeZone::FALLBACK
            }
            Err(e) => {
                tracing::warn!(image_ref, "Safe zone detection failed, using fallback: {}", e);
                SafeZone::FALLBACK
            }
        }
    }

    async fn try_detect_safe_zone(&self, image_ref: &str) -> Result<SafeZone, SouvyError> {
        let bytes = fetch::load_bytes(image_ref, self.fetcher.as_ref()).await?;
        let request = GenerationRequest {
            model: self.models.spatial.clone(),
            prompt: SAFE_ZONE_PROMPT.to_string(),
            image: Some(InlineImage::sniff(bytes)),
            schema: object_schema(&[
                ("ymin", "NUMBER", "Top edge, 0-1000."),
                ("xmin", "NUMBER", "Left edge, 0-1000."),
                ("ymax", "NUMBER", "Bottom edge, 0-1000."),
                ("xmax", "NUMBER", "Right edge, 0-1000."),
            ]),
        };
        self.generate_json(request).await
    }

    /// Write a gift note and design advice. `None` means keep what you had.
    pub async fn generate_creative_content(&self, request: &CreativeRequest) -> Option<CreativeContent> {
        let generation = GenerationRequest {
            model: self.models.creative.clone(),
            prompt: creative_prompt(request),
            image: None,
            schema: object_schema(&[
                ("note", "STRING", "Gift note, two or three sentences."),
                ("designAdvice", "STRING", "Engraving and placement advice."),
                ("finalSpecs", "STRING", "Design summary for production."),
            ]),
        };
        match self.generate_json(generation).await {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!(product = %request.product_name, "Creative generation failed: {}", e);
                None
            }
        }
    }

    /// Check a bank transfer receipt image against the expected payment.
    pub async fn verify_receipt(&self, receipt: &[u8], expected: &ReceiptExpectation) -> ReceiptVerdict {
        let request = GenerationRequest {
            model: self.models.creative.clone(),
            prompt: receipt_prompt(expected),
            image: Some(InlineImage::sniff(receipt.to_vec())),
            schema: json!({
                "type": "OBJECT",
                "properties": {
                    "verified": {"type": "BOOLEAN"},
                    "reason": {"type": "STRING"}
                },
                "required": ["verified", "reason"]
            }),
        };
        let text = match self.backend.generate(request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(reference = %expected.reference, "Receipt verification failed: {}", e);
                return ReceiptVerdict::rejected(format!("Error processing the receipt: {}", e));
            }
        };
        if text.trim().is_empty() {
            return ReceiptVerdict::rejected("No response");
        }
        serde_json::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!(reference = %expected.reference, "Receipt verdict unreadable: {}", e);
            ReceiptVerdict::rejected(format!("Error processing the receipt: {}", e))
        })
    }

    async fn generate_json<T: DeserializeOwned>(&self, request: GenerationRequest) -> Result<T, SouvyError> {
        let model = request.model.clone();
        let text = self.backend.generate(request).await?;
        if text.trim().is_empty() {
            return Err(SouvyError::Gateway(format!("{} returned no content", model)));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

const SAFE_ZONE_PROMPT: &str = "Look at this product photo and find the main flat surface \
where a logo or text could be engraved or printed. Answer with one bounding box for that \
surface as ymin, xmin, ymax, xmax, normalized so 0-1000 spans the whole image. JSON only.";

fn creative_prompt(r: &CreativeRequest) -> String {
    format!(
        "You write copy for a premium personalized gift shop.\n\
         \n\
         1. Write a note of two or three sentences to go with the gift.\n\
         Gift: {product}\nOccasion: {occasion}\nRecipient: {recipient}\nTone: {tone}\n\
         Mention the item or the spirit of the gift. Avoid cliches.\n\
         \n\
         2. Give short, practical advice on placing and styling the engraving.\n\
         Design so far: {logo}\nProduct: {product}\n\
         \n\
         3. Summarize the final design for the production team.\n\
         \n\
         Answer in JSON.",
        product = r.product_name,
        occasion = r.occasion,
        recipient = r.recipient_name,
        tone = r.tone,
        logo = r.logo_description,
    )
}

fn receipt_prompt(e: &ReceiptExpectation) -> String {
    format!(
        "This is a bank transfer receipt. Check it against the expected payment:\n\
         1. Amount: {amount} (the total on the receipt must match).\n\
         2. Reference: \"{reference}\" (look for this exact text in the remark or reference field).\n\
         3. Recipient account name: \"{account}\".\n\
         \n\
         Set verified to true only if all three match. Put a short explanation of what \
         matched or did not in reason.",
        amount = e.amount,
        reference = e.reference,
        account = e.account_name,
    )
}

/// Object schema with required fields `(name, type, description)`.
fn object_schema(fields: &[(&str, &str, &str)]) -> serde_json::Value {
    let properties: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|(name, ty, description)| {
            (
                name.to_string(),
                json!({"type": ty, "description": description}),
            )
        })
        .collect();
    let required: Vec<&str> = fields.iter().map(|(name, _, _)| *name).collect();
    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::render::fetch::StaticFetcher;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Replays canned responses in order and records the requests it saw.
    #[derive(Default)]
    pub(crate) struct ScriptedBackend {
        responses: Mutex<Vec<Result<String, String>>>,
        pub seen: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedBackend {
        pub(crate) fn replying(responses: Vec<Result<&str, &str>>) -> Self {
            let mut responses: Vec<Result<String, String>> = responses
                .into_iter()
                .map(|r| r.map(str::to_string).map_err(str::to_string))
                .collect();
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerativeBackend for ScriptedBackend {
        async fn generate(&self, request: GenerationRequest) -> Result<String, SouvyError> {
            self.seen.lock().unwrap().push(request);
            match self.responses.lock().unwrap().pop() {
                Some(Ok(text)) => Ok(text),
                Some(Err(e)) => Err(SouvyError::Gateway(e)),
                None => Err(SouvyError::Gateway("script exhausted".to_string())),
            }
        }
    }

    const PHOTO: &str = "https://shop.test/mug.jpg";

    fn gateway(backend: Arc<ScriptedBackend>) -> AiGateway {
        let fetcher = StaticFetcher::new().with(PHOTO, vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0]);
        AiGateway::new(backend, Arc::new(fetcher))
    }

    fn creative_request() -> CreativeRequest {
        CreativeRequest {
            product_name: "Walnut Pen".into(),
            recipient_name: "Alexandra".into(),
            occasion: "Graduation".into(),
            tone: Tone::Professional,
            logo_description: "Text only engraving".into(),
        }
    }

    #[tokio::test]
    async fn test_detect_safe_zone_parses_model_output() {
        let backend = Arc::new(ScriptedBackend::replying(vec![Ok(
            r#"{"ymin": 120, "xmin": 250, "ymax": 640, "xmax": 760}"#,
        )]));
        let zone = gateway(backend.clone()).detect_safe_zone(PHOTO).await;
        assert_eq!(
            zone,
            SafeZone { ymin: 120.0, xmin: 250.0, ymax: 640.0, xmax: 760.0 }
        );

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].model, DEFAULT_SPATIAL_MODEL);
        let image = seen[0].image.as_ref().unwrap();
        assert_eq!(image.mime, "image/jpeg");
        assert_eq!(seen[0].schema["required"], json!(["ymin", "xmin", "ymax", "xmax"]));
    }

    #[tokio::test]
    async fn test_detect_safe_zone_falls_back() {
        let backend = Arc::new(ScriptedBackend::replying(vec![
            Err("quota exceeded"),
            Ok(""),
            Ok("not json"),
            Ok(r#"{"ymin": 800, "xmin": 300, "ymax": 200, "xmax": 700}"#),
        ]));
        let gw = gateway(backend.clone());
        for _ in 0..4 {
            assert_eq!(gw.detect_safe_zone(PHOTO).await, SafeZone::FALLBACK);
        }
        // Fetch failure never reaches the model
        assert_eq!(gw.detect_safe_zone("https://shop.test/missing.jpg").await, SafeZone::FALLBACK);
        assert_eq!(backend.seen.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_offline_gateway_falls_back() {
        let gw = AiGateway::offline(Arc::new(StaticFetcher::new().with(PHOTO, vec![1, 2, 3])));
        assert_eq!(gw.detect_safe_zone(PHOTO).await, SafeZone::FALLBACK);
        assert_eq!(gw.generate_creative_content(&creative_request()).await, None);
        assert!(!gw.verify_receipt(b"img", &ReceiptExpectation {
            amount: 10.0,
            reference: "SV-1".into(),
            account_name: "Souvy".into(),
        }).await.verified);
    }

    #[tokio::test]
    async fn test_creative_content() {
        let backend = Arc::new(ScriptedBackend::replying(vec![
            Ok(r#"{"note": "Congratulations.", "designAdvice": "Center it.", "finalSpecs": "One line."}"#),
            Err("timeout"),
            Ok(r#"{"note": "missing fields"}"#),
        ]));
        let gw = gateway(backend.clone());
        let request = creative_request();

        assert_eq!(
            gw.generate_creative_content(&request).await,
            Some(CreativeContent {
                note: "Congratulations.".into(),
                design_advice: "Center it.".into(),
                final_specs: "One line.".into(),
            })
        );
        assert_eq!(gw.generate_creative_content(&request).await, None);
        assert_eq!(gw.generate_creative_content(&request).await, None);

        let seen = backend.seen.lock().unwrap();
        assert!(seen[0].image.is_none());
        assert!(seen[0].prompt.contains("Walnut Pen"));
        assert!(seen[0].prompt.contains("Professional"));
        assert!(seen[0].prompt.contains("Text only engraving"));
    }

    #[tokio::test]
    async fn test_verify_receipt() {
        let backend = Arc::new(ScriptedBackend::replying(vec![
            Ok(r#"{"verified": true, "reason": "All three match."}"#),
            Ok("  "),
            Err("503 Service Unavailable"),
        ]));
        let gw = gateway(backend.clone());
        let expected = ReceiptExpectation {
            amount: 45.5,
            reference: "SOUVY-7F3K".into(),
            account_name: "Souvy Gifts Ltd".into(),
        };

        let ok = gw.verify_receipt(b"\x89PNG\r\n\x1a\n", &expected).await;
        assert_eq!(ok, ReceiptVerdict { verified: true, reason: "All three match.".into() });

        let empty = gw.verify_receipt(b"x", &expected).await;
        assert_eq!(empty, ReceiptVerdict { verified: false, reason: "No response".into() });

        let failed = gw.verify_receipt(b"x", &expected).await;
        assert!(!failed.verified);
        assert!(failed.reason.contains("503"), "reason = {}", failed.reason);

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].image.as_ref().unwrap().mime, "image/png");
        assert!(seen[0].prompt.contains("45.5"));
        assert!(seen[0].prompt.contains("SOUVY-7F3K"));
        assert!(seen[0].prompt.contains("Souvy Gifts Ltd"));
    }
}
