//! Element store: the mutable set of design elements.
//!
//! Elements are kept in insertion order. Paint order is derived on demand by
//! a stable ascending sort on `z_index`, so equal keys fall back to insertion
//! order and repeated sorts always agree.

use super::element::{CanvasElement, ElementId, ElementKind, ElementPatch};

/// Sort elements into paint order (ascending `z_index`, ties by position in `elements`).
pub fn paint_order(elements: &[CanvasElement]) -> Vec<&CanvasElement> {
    let mut sorted: Vec<&CanvasElement> = elements.iter().collect();
    // sort_by_key is stable
    sorted.sort_by_key(|el| el.z_index);
    sorted
}

/// Owns the elements of one editor session.
#[derive(Debug, Clone, Default)]
pub struct ElementStore {
    elements: Vec<CanvasElement>,
}

impl ElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from previously saved elements, keeping their order and keys.
    pub fn from_elements(elements: Vec<CanvasElement>) -> Self {
        Self { elements }
    }

    /// Create an element with default placement and return its id.
    ///
    /// The new key equals the element count before insertion, so without any
    /// reordering the new element paints above everything already present.
    pub fn add(&mut self, kind: ElementKind, content: Option<&str>) -> ElementId {
        let element = CanvasElement::new(kind, content, self.elements.len() as i64);
        let id = element.id.clone();
        self.elements.push(element);
        id
    }

    /// Merge `patch` into the element with `id`. Unknown ids are ignored.
    pub fn update(&mut self, id: &ElementId, patch: &ElementPatch) -> bool {
        match self.get_mut(id) {
            Some(element) => {
                patch.apply(element);
                true
            }
            None => false,
        }
    }

    /// Delete the element with `id`. Unknown ids are ignored.
    pub fn remove(&mut self, id: &ElementId) -> Option<CanvasElement> {
        let idx = self.elements.iter().position(|el| &el.id == id)?;
        Some(self.elements.remove(idx))
    }

    pub fn get(&self, id: &ElementId) -> Option<&CanvasElement> {
        self.elements.iter().find(|el| &el.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &ElementId) -> Option<&mut CanvasElement> {
        self.elements.iter_mut().find(|el| &el.id == id)
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in insertion order.
    pub fn elements(&self) -> &[CanvasElement] {
        &self.elements
    }

    /// Elements in paint order (bottom first).
    pub fn paint_order(&self) -> Vec<&CanvasElement> {
        paint_order(&self.elements)
    }

    pub fn into_elements(self) -> Vec<CanvasElement> {
        self.elements
    }

    pub(crate) fn set_z_index(&mut self, id: &ElementId, z_index: i64) {
        if let Some(element) = self.get_mut(id) {
            element.z_index = z_index;
        }
    }
}
