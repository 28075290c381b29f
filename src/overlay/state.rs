use crate::overlay::geometry::OverlayGeometry;
use crate::settings::{CloseButtonSide, Settings};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    Move,
    Resize,
    Fade,
}

/// How the runtime should animate towards the state it was delivered with.
/// Absence means "apply immediately".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnimationSpec {
    pub duration_ms: u64,
    pub kind: AnimationKind,
}

impl AnimationSpec {
    pub const fn new(duration_ms: u64, kind: AnimationKind) -> Self {
        Self { duration_ms, kind }
    }
}

/// Snapshot of everything the runtime needs to draw the overlay.
///
/// Values are never mutated in place by the controller; each transition
/// builds a new one with struct-update syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverlayState {
    #[serde(flatten)]
    pub geometry: OverlayGeometry,
    pub visible: bool,
    pub close_button_side: CloseButtonSide,
    pub sound_enabled: bool,
    pub keep_alive_enabled: bool,
    pub transparency_toggle_enabled: bool,
    pub transparent_mode: bool,
    pub is_dragging: bool,
    pub is_resizing: bool,
}

impl OverlayState {
    /// Hidden, idle state at `geometry` carrying the per-window mirrors of
    /// `settings`.
    pub fn hidden(geometry: OverlayGeometry, settings: &Settings) -> Self {
        Self {
            geometry,
            visible: false,
            close_button_side: settings.close_button_side,
            sound_enabled: settings.sound_enabled,
            keep_alive_enabled: settings.keep_alive_enabled,
            transparency_toggle_enabled: settings.transparency_toggle_enabled,
            transparent_mode: false,
            is_dragging: false,
            is_resizing: false,
        }
    }

    /// Same state with the settings mirrors replaced from `settings`.
    pub fn with_settings(self, settings: &Settings) -> Self {
        Self {
            close_button_side: settings.close_button_side,
            sound_enabled: settings.sound_enabled,
            keep_alive_enabled: settings.keep_alive_enabled,
            transparency_toggle_enabled: settings.transparency_toggle_enabled,
            ..self
        }
    }

    pub fn with_geometry(self, geometry: OverlayGeometry) -> Self {
        Self { geometry, ..self }
    }
}
