pub mod controller;
pub mod effect;
pub mod geometry;
pub mod runtime;
pub mod state;

pub use controller::{OverlayController, OverlayUpdate, SubscriberId, Subscription};
pub use effect::{EffectChannel, EffectKind, OneShotEffect};
pub use geometry::{Insets, OverlayGeometry, ScreenBounds};
pub use runtime::{
    OverlayRuntime, OverlaySurface, PermissionNavigator, SoundPlayer, StartOutcome, StopCallback,
};
pub use state::{AnimationKind, AnimationSpec, OverlayState};
