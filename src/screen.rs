use crate::overlay::geometry::ScreenBounds;
use std::sync::{Mutex, PoisonError};

/// Live screen metrics. Implementations must answer from the current display
/// configuration on every call; callers never cache the result.
pub trait ScreenInfoProvider: Send + Sync {
    fn current_bounds(&self) -> ScreenBounds;

    /// Converts density-independent units to whole pixels, rounding to nearest.
    fn to_pixels(&self, dp: f32) -> i32;
}

/// Provider with host-supplied metrics. `set_bounds` stands in for a
/// rotation or display change.
#[derive(Debug)]
pub struct FixedScreen {
    metrics: Mutex<ScreenMetrics>,
}

#[derive(Debug, Clone, Copy)]
struct ScreenMetrics {
    bounds: ScreenBounds,
    density: f32,
}

impl FixedScreen {
    pub fn new(bounds: ScreenBounds, density: f32) -> Self {
        Self {
            metrics: Mutex::new(ScreenMetrics {
                bounds,
                density: sanitize_density(density),
            }),
        }
    }

    pub fn set_bounds(&self, bounds: ScreenBounds) {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .bounds = bounds;
    }

    pub fn density(&self) -> f32 {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .density
    }
}

fn sanitize_density(density: f32) -> f32 {
    if density.is_finite() && density > 0.0 {
        density
    } else {
        tracing::warn!(density, "invalid screen density; using 1.0");
        1.0
    }
}

impl ScreenInfoProvider for FixedScreen {
    fn current_bounds(&self) -> ScreenBounds {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .bounds
    }

    fn to_pixels(&self, dp: f32) -> i32 {
        (dp * self.density()).round() as i32
    }
}
