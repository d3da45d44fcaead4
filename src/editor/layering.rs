//! Layer reordering.
//!
//! `up`/`down` swap keys with the adjacent element in paint order, leaving
//! every other element's key untouched. `top`/`bottom` move past the current
//! extremes (always at least one step away from zero).

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::element::ElementId;
use super::store::ElementStore;

/// Direction for [`ElementStore::reorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerDirection {
    Up,
    Down,
    Top,
    Bottom,
}

impl FromStr for LayerDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            other => Err(format!("Unknown layer direction '{}'", other)),
        }
    }
}

impl ElementStore {
    /// Change the paint position of `id`. Unknown ids are ignored.
    pub fn reorder(&mut self, id: &ElementId, direction: LayerDirection) {
        let Some(idx) = self.paint_order().iter().position(|el| &el.id == id) else {
            return;
        };
        match direction {
            LayerDirection::Top => {
                let max = self.elements().iter().map(|el| el.z_index).max().unwrap_or(0).max(0);
                self.set_z_index(id, max + 1);
            }
            LayerDirection::Bottom => {
                let min = self.elements().iter().map(|el| el.z_index).min().unwrap_or(0).min(0);
                self.set_z_index(id, min - 1);
            }
            LayerDirection::Up => {
                if idx + 1 < self.len() {
                    self.swap_with(idx, idx + 1);
                }
            }
            LayerDirection::Down => {
                if idx > 0 {
                    self.swap_with(idx, idx - 1);
                }
            }
        }
    }

    /// Swap the keys of the elements at paint positions `a` and `b`.
    fn swap_with(&mut self, a: usize, b: usize) {
        let (id_a, z_a, id_b, z_b) = {
            let order = self.paint_order();
            (
                order[a].id.clone(),
                order[a].z_index,
                order[b].id.clone(),
                order[b].z_index,
            )
        };

        if z_a == z_b {
            // Equal keys cannot be swapped. Every element's key is rewritten
            // to its paint position (0..n) first, then the pair is swapped.
            self.renormalize();
            let (za, zb) = (a as i64, b as i64);
            self.set_z_index(&id_a, zb);
            self.set_z_index(&id_b, za);
            return;
        }

        self.set_z_index(&id_a, z_b);
        self.set_z_index(&id_b, z_a);
    }

    /// Rewrite keys densely (0..n) in current paint order.
    ///
    /// Observable ordering is unchanged.
    pub fn renormalize(&mut self) {
        let order: Vec<ElementId> = self.paint_order().iter().map(|el| el.id.clone()).collect();
        for (z, id) in order.iter().enumerate() {
            self.set_z_index(id, z as i64);
        }
    }
}
