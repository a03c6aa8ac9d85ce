/*!
 * The part of the world currently shown by the map widget.
 */
use crate::geo::BoundingBox;
use serde::{Deserialize, Serialize};

/// The map's current bounds and zoom level.
///
/// Zoom levels follow the slippy map convention, at zoom `z` the world is `256 * 2^z` pixels wide.
/// Fractional zoom levels are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub bounds: BoundingBox,
    pub zoom: f64,
}

impl Viewport {
    pub fn new(bounds: BoundingBox, zoom: f64) -> Self {
        Viewport { bounds, zoom }
    }

    /// The whole world at the given zoom.
    pub fn world(zoom: f64) -> Self {
        Viewport {
            bounds: BoundingBox::WORLD,
            zoom,
        }
    }

    /// The area worth drawing, the bounds grown by `ratio` on every side so markers just off
    /// screen are ready when the user pans.
    pub fn draw_area(&self, ratio: f64) -> BoundingBox {
        self.bounds.pad(ratio)
    }
}
