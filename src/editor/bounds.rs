//! Safe-zone constraint checking.
//!
//! The safe zone comes from surface analysis in a normalized 0-1000 space.
//! Elements live in 0-100 percent space, so zone bounds are divided by 10
//! before comparing. The check is advisory: it only drives a warning.

use serde::{Deserialize, Serialize};

use super::element::CanvasElement;

/// Axis-aligned printable area in normalized 0-1000 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafeZone {
    pub ymin: f64,
    pub xmin: f64,
    pub ymax: f64,
    pub xmax: f64,
}

impl SafeZone {
    /// Generic centered zone used when surface analysis fails.
    pub const FALLBACK: SafeZone = SafeZone {
        ymin: 300.0,
        xmin: 300.0,
        ymax: 700.0,
        xmax: 700.0,
    };

    /// Zone bounds in percent space as `(xmin, ymin, xmax, ymax)`.
    pub fn to_percent(&self) -> (f64, f64, f64, f64) {
        (
            self.xmin / 10.0,
            self.ymin / 10.0,
            self.xmax / 10.0,
            self.ymax / 10.0,
        )
    }

    /// True when all bounds are finite and each min does not exceed its max.
    pub fn is_well_formed(&self) -> bool {
        [self.ymin, self.xmin, self.ymax, self.xmax]
            .iter()
            .all(|v| v.is_finite())
            && self.xmin <= self.xmax
            && self.ymin <= self.ymax
    }

    /// Does any edge of `element` cross outside this zone?
    pub fn is_out_of_bound(&self, element: &CanvasElement) -> bool {
        let (zone_left, zone_top, zone_right, zone_bottom) = self.to_percent();
        let (left, top, right, bottom) = element.edges();

        top < zone_top || bottom > zone_bottom || left < zone_left || right > zone_right
    }
}

/// Out-of-bound check that fails open: without a zone every element is in-bound.
pub fn is_out_of_bound(element: &CanvasElement, zone: Option<&SafeZone>) -> bool {
    zone.is_some_and(|z| z.is_out_of_bound(element))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::element::ElementKind;

    fn element(x: f64, y: f64, width: f64, height: f64) -> CanvasElement {
        let mut el = CanvasElement::new(ElementKind::Image, None, 0);
        el.x = x;
        el.y = y;
        el.width = width;
        el.height = height;
        el
    }

    #[test]
    fn test_centered_element_is_inside() {
        let zone = SafeZone::FALLBACK;
        assert!(!zone.is_out_of_bound(&element(50.0, 50.0, 10.0, 10.0)));
    }

    #[test]
    fn test_element_past_right_edge_is_outside() {
        let zone = SafeZone::FALLBACK;
        assert!(zone.is_out_of_bound(&element(95.0, 50.0, 20.0, 10.0)));
    }

    #[test]
    fn test_each_edge_is_checked() {
        let zone = SafeZone::FALLBACK;
        assert!(zone.is_out_of_bound(&element(50.0, 32.0, 10.0, 10.0))); // top
        assert!(zone.is_out_of_bound(&element(50.0, 68.0, 10.0, 10.0))); // bottom
        assert!(zone.is_out_of_bound(&element(32.0, 50.0, 10.0, 10.0))); // left
        assert!(zone.is_out_of_bound(&element(68.0, 50.0, 10.0, 10.0))); // right
    }

    #[test]
    fn test_touching_edges_is_inside() {
        let zone = SafeZone::FALLBACK;
        assert!(!zone.is_out_of_bound(&element(50.0, 50.0, 40.0, 40.0)));
    }

    #[test]
    fn test_missing_zone_fails_open() {
        assert!(!is_out_of_bound(&element(150.0, -20.0, 90.0, 90.0), None));
        assert!(is_out_of_bound(
            &element(150.0, -20.0, 90.0, 90.0),
            Some(&SafeZone::FALLBACK)
        ));
    }

    #[test]
    fn test_well_formed() {
        assert!(SafeZone::FALLBACK.is_well_formed());
        let inverted = SafeZone {
            ymin: 700.0,
            xmin: 300.0,
            ymax: 300.0,
            xmax: 700.0,
        };
        assert!(!inverted.is_well_formed());
        let nan = SafeZone {
            ymin: f64::NAN,
            ..SafeZone::FALLBACK
        };
        assert!(!nan.is_well_formed());
    }
}
