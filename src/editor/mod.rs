//! # Editor
//!
//! One [`EditorSession`] per open editor. It owns everything the editor
//! mutates: the element store, the pointer state machine, the detected safe
//! zone, the creative context and panel state. Nothing here is shared
//! between sessions.
//!
//! ## Lifecycle
//!
//! ```text
//! new / seeded ──► add / update / remove / reorder / pointer_* ──► save ──► Customization
//!                                                             └──► cancel
//! ```
//!
//! All mutations are synchronous. The only awaits are surface analysis,
//! creative sync and export, which hand off to the gateway or the exporter.

pub mod bounds;
pub mod element;
pub mod interaction;
pub mod layering;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::customization::{CreativeContext, Customization, Tone};
use crate::gateway::{AiGateway, CreativeContent, CreativeRequest};
use crate::render::{Exporter, RasterResult};
use bounds::SafeZone;
use element::{CanvasElement, ElementId, ElementKind, ElementPatch};
use interaction::{CanvasRect, InteractionController, InteractionState, Point, PointerTarget};
use layering::LayerDirection;
use store::ElementStore;

const LOGO_DESCRIPTION: &str = "Includes custom logo branding";
const TEXT_ONLY_DESCRIPTION: &str = "Text only engraving";

/// Characters of content shown in a layer row.
const LAYER_LABEL_CHARS: usize = 15;

/// The catalog item being customized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub name: String,
    /// Base image the design is composited onto.
    pub image_url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelTab {
    #[default]
    Design,
    Layers,
    Branding,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelState {
    pub tab: PanelTab,
    pub collapsed: bool,
}

/// One row of the layer panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerEntry {
    pub id: ElementId,
    pub kind: ElementKind,
    pub label: String,
    pub z_index: i64,
    pub selected: bool,
    pub out_of_bound: bool,
}

/// Serializable view of a session for hosts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub product: ProductRef,
    pub elements: Vec<CanvasElement>,
    pub interaction: InteractionState,
    pub safe_zone: Option<SafeZone>,
    pub analyzing: bool,
    pub creative: CreativeContext,
    pub panel: PanelState,
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    product: ProductRef,
    store: ElementStore,
    interaction: InteractionController,
    safe_zone: Option<SafeZone>,
    analyzing: bool,
    creative: CreativeContext,
    panel: PanelState,
}

impl EditorSession {
    /// Blank session with default recipient, occasion and tone.
    pub fn new(product: ProductRef) -> Self {
        Self {
            product,
            store: ElementStore::new(),
            interaction: InteractionController::new(),
            safe_zone: None,
            analyzing: false,
            creative: CreativeContext::default(),
            panel: PanelState::default(),
        }
    }

    /// Reopen a previously saved design.
    pub fn seeded(product: ProductRef, saved: Customization) -> Self {
        let creative = saved.creative_context();
        Self {
            store: ElementStore::from_elements(saved.elements),
            creative,
            ..Self::new(product)
        }
    }

    pub fn product(&self) -> &ProductRef {
        &self.product
    }

    pub fn store(&self) -> &ElementStore {
        &self.store
    }

    pub fn elements(&self) -> &[CanvasElement] {
        self.store.elements()
    }

    pub fn interaction(&self) -> &InteractionState {
        self.interaction.state()
    }

    pub fn safe_zone(&self) -> Option<&SafeZone> {
        self.safe_zone.as_ref()
    }

    pub fn set_safe_zone(&mut self, zone: Option<SafeZone>) {
        self.safe_zone = zone;
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing
    }

    pub fn creative(&self) -> &CreativeContext {
        &self.creative
    }

    pub fn panel(&self) -> PanelState {
        self.panel
    }

    pub fn set_panel_tab(&mut self, tab: PanelTab) {
        self.panel.tab = tab;
    }

    pub fn toggle_panel(&mut self) {
        self.panel.collapsed = !self.panel.collapsed;
    }

    pub fn set_recipient(&mut self, name: impl Into<String>) {
        self.creative.recipient_name = name.into();
    }

    pub fn set_occasion(&mut self, occasion: impl Into<String>) {
        self.creative.occasion = occasion.into();
    }

    pub fn set_tone(&mut self, tone: Tone) {
        self.creative.tone = tone;
    }

    // ----- element operations -----

    /// Add an element at the default placement above everything else and select it.
    pub fn add(&mut self, kind: ElementKind, content: Option<&str>) -> ElementId {
        let id = self.store.add(kind, content);
        self.interaction.select(id.clone());
        id
    }

    /// Merge `patch` into an element. Unknown ids are ignored.
    pub fn update(&mut self, id: &ElementId, patch: &ElementPatch) {
        self.store.update(id, patch);
    }

    /// Delete an element, clearing the selection if it pointed there. Unknown ids are ignored.
    pub fn remove(&mut self, id: &ElementId) {
        if self.store.remove(id).is_some() {
            self.interaction.forget(id);
        }
    }

    pub fn reorder(&mut self, id: &ElementId, direction: LayerDirection) {
        self.store.reorder(id, direction);
    }

    /// Select an element without starting a drag. Unknown ids are ignored.
    pub fn select(&mut self, id: &ElementId) {
        if self.store.contains(id) {
            self.interaction.select(id.clone());
        }
    }

    pub fn clear_selection(&mut self) {
        self.interaction.clear();
    }

    pub fn selected(&self) -> Option<&ElementId> {
        self.interaction.selected()
    }

    pub fn selected_element(&self) -> Option<&CanvasElement> {
        self.selected().and_then(|id| self.store.get(id))
    }

    // ----- pointer -----

    pub fn pointer_down(&mut self, target: &PointerTarget, pointer: Point, canvas: &CanvasRect) {
        self.interaction.pointer_down(&self.store, target, pointer, canvas);
    }

    /// Returns true if an element moved or resized.
    pub fn pointer_move(&mut self, pointer: Point, canvas: &CanvasRect) -> bool {
        self.interaction.pointer_move(&mut self.store, pointer, canvas)
    }

    pub fn pointer_up(&mut self) {
        self.interaction.end_gesture();
    }

    pub fn pointer_leave(&mut self) {
        self.interaction.end_gesture();
    }

    // ----- validation -----

    /// Advisory check against the detected zone. In-bound when no zone is known.
    pub fn is_out_of_bound(&self, id: &ElementId) -> bool {
        self.store
            .get(id)
            .is_some_and(|el| bounds::is_out_of_bound(el, self.safe_zone.as_ref()))
    }

    /// Layer panel rows, topmost first.
    pub fn layer_list(&self) -> Vec<LayerEntry> {
        let selected = self.selected();
        self.store
            .paint_order()
            .into_iter()
            .rev()
            .map(|el| LayerEntry {
                id: el.id.clone(),
                kind: el.kind,
                label: el.content.chars().take(LAYER_LABEL_CHARS).collect(),
                z_index: el.z_index,
                selected: selected == Some(&el.id),
                out_of_bound: bounds::is_out_of_bound(el, self.safe_zone.as_ref()),
            })
            .collect()
    }

    // ----- gateway -----

    /// Mark analysis as pending and return the image to analyze.
    pub fn begin_analysis(&mut self) -> String {
        self.analyzing = true;
        self.product.image_url.clone()
    }

    pub fn finish_analysis(&mut self, zone: SafeZone) {
        self.safe_zone = Some(zone);
        self.analyzing = false;
    }

    /// Detect the safe zone of the product image.
    pub async fn analyze_surface(&mut self, gateway: &AiGateway) {
        let image = self.begin_analysis();
        let zone = gateway.detect_safe_zone(&image).await;
        self.finish_analysis(zone);
    }

    /// Creative request built from the current context and design.
    pub fn creative_request(&self) -> CreativeRequest {
        let has_image = self
            .store
            .elements()
            .iter()
            .any(|el| el.kind == ElementKind::Image);
        let logo_description = if has_image {
            LOGO_DESCRIPTION
        } else {
            TEXT_ONLY_DESCRIPTION
        };
        CreativeRequest {
            product_name: self.product.name.clone(),
            recipient_name: self.creative.recipient_name.clone(),
            occasion: self.creative.occasion.clone(),
            tone: self.creative.tone,
            logo_description: logo_description.to_string(),
        }
    }

    /// Take generated content. `None` keeps the current note and advice.
    pub fn apply_creative(&mut self, content: Option<CreativeContent>) {
        if let Some(content) = content {
            self.creative.note = content.note;
            self.creative.design_advice = content.design_advice;
        }
    }

    pub async fn sync_creative(&mut self, gateway: &AiGateway) {
        let content = gateway.generate_creative_content(&self.creative_request()).await;
        self.apply_creative(content);
    }

    // ----- output -----

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            product: self.product.clone(),
            elements: self.store.elements().to_vec(),
            interaction: self.interaction.state().clone(),
            safe_zone: self.safe_zone,
            analyzing: self.analyzing,
            creative: self.creative.clone(),
            panel: self.panel,
        }
    }

    /// Render the current design over the product image.
    pub async fn export(&self, exporter: &Exporter) -> RasterResult {
        exporter.export(&self.product.image_url, self.store.elements()).await
    }

    /// Finalize into a [`Customization`] without rendering.
    pub fn into_customization(self, preview_image: Option<Vec<u8>>) -> Customization {
        Customization {
            elements: self.store.into_elements(),
            generated_note: self.creative.note,
            design_advice: self.creative.design_advice,
            recipient_name: self.creative.recipient_name,
            occasion: self.creative.occasion,
            tone: self.creative.tone,
            preview_image,
        }
    }

    /// Render and hand the design over. An empty export leaves `preview_image` unset.
    pub async fn save(self, exporter: &Exporter) -> Customization {
        let preview = self.export(exporter).await.into_png();
        if preview.is_none() {
            tracing::warn!(product = %self.product.name, "Saving without a preview, export failed");
        }
        self.into_customization(preview)
    }

    /// Close without producing anything.
    pub fn cancel(self) {
        tracing::debug!(product = %self.product.name, elements = self.store.len(), "Editor session discarded");
    }
}
