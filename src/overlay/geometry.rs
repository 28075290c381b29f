//! Pure constraint functions over overlay rectangles.
//!
//! None of these call each other; the controller decides the order in which
//! they are composed (size first, then position, since the position limits
//! depend on the current size).

use serde::{Deserialize, Serialize};

/// Fraction of the screen the overlay may cover along each axis.
const MAX_SIZE_FRACTION: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Insets {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Insets {
    pub const NONE: Insets = Insets::new(0, 0, 0, 0);

    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// Screen size plus the margins an overlay must not cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenBounds {
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub insets: Insets,
}

impl ScreenBounds {
    pub const fn new(width: i32, height: i32, insets: Insets) -> Self {
        Self {
            width,
            height,
            insets,
        }
    }
}

/// Overlay rectangle in pixels, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayGeometry {
    pub width: i32,
    pub height: i32,
    pub x: i32,
    pub y: i32,
}

impl OverlayGeometry {
    pub const fn new(width: i32, height: i32, x: i32, y: i32) -> Self {
        Self {
            width,
            height,
            x,
            y,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

fn clamp(value: i32, min: i32, max: i32) -> i32 {
    value.min(max).max(min)
}

/// Keeps the rectangle inside the safe area. A window wider (or taller) than
/// the safe area is pinned to the left (top) inset.
pub fn clamp_position(geom: OverlayGeometry, bounds: &ScreenBounds) -> OverlayGeometry {
    let insets = bounds.insets;
    let min_x = insets.left;
    let min_y = insets.top;
    let max_x = bounds.width - insets.right - geom.width;
    let max_y = bounds.height - insets.bottom - geom.height;
    OverlayGeometry {
        x: clamp(geom.x, min_x, min_x.max(max_x)),
        y: clamp(geom.y, min_y, min_y.max(max_y)),
        ..geom
    }
}

/// Limits the size to `[min, max(min, 0.8 * screen)]` on each axis.
pub fn clamp_size(
    geom: OverlayGeometry,
    bounds: &ScreenBounds,
    min_width: i32,
    min_height: i32,
) -> OverlayGeometry {
    let max_width = (bounds.width as f32 * MAX_SIZE_FRACTION) as i32;
    let max_height = (bounds.height as f32 * MAX_SIZE_FRACTION) as i32;
    OverlayGeometry {
        width: clamp(geom.width, min_width, min_width.max(max_width)),
        height: clamp(geom.height, min_height, min_height.max(max_height)),
        ..geom
    }
}

/// Snaps `x` to the nearer horizontal edge when within `threshold_px` of
/// either. Ties go to the left edge. `y` is never touched.
pub fn snap_to_edge_if_needed(
    geom: OverlayGeometry,
    bounds: &ScreenBounds,
    threshold_px: i32,
) -> OverlayGeometry {
    let left_edge = bounds.insets.left;
    let right_edge = bounds.width - bounds.insets.right - geom.width;
    let distance_left = (geom.x - left_edge).abs();
    let distance_right = (geom.x - right_edge).abs();
    if distance_left.min(distance_right) > threshold_px {
        return geom;
    }
    let x = if distance_left <= distance_right {
        left_edge
    } else {
        right_edge
    };
    OverlayGeometry { x, ..geom }
}
