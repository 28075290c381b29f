//! The overlay interaction state machine.
//!
//! One [`OverlayController`] is shared (behind an `Arc`) by every host that
//! shows the overlay. All entry points and effect acknowledgements run inside
//! a single mutex, and every transition is broadcast to subscribers while
//! that mutex is held, so each subscriber observes transitions in order.

use crate::overlay::effect::{EffectChannel, EffectKind, OneShotEffect};
use crate::overlay::geometry::{
    clamp_position, clamp_size, snap_to_edge_if_needed, OverlayGeometry, ScreenBounds,
};
use crate::overlay::state::{AnimationKind, AnimationSpec, OverlayState};
use crate::screen::ScreenInfoProvider;
use crate::settings::{clamp_auto_restore_seconds, CloseButtonSide, Settings};
use crate::settings_store::SettingsStore;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const MOVE_ANIM_MS: u64 = 150;
pub const RESIZE_ANIM_MS: u64 = 200;
pub const FADE_ANIM_MS: u64 = 300;

const SNAP_THRESHOLD_DP: f32 = 15.0;
const MIN_WIDTH_DP: f32 = 100.0;
const MIN_HEIGHT_DP: f32 = 40.0;
const DEFAULT_WIDTH_DP: f32 = 220.0;
const DEFAULT_HEIGHT_DP: f32 = 80.0;
const DEFAULT_Y_FRACTION: f32 = 0.65;

/// One transition as seen by a subscriber.
#[derive(Debug, Clone)]
pub struct OverlayUpdate {
    pub state: OverlayState,
    pub animation: Option<AnimationSpec>,
    /// Effect published by this transition. For the snapshot sent on
    /// subscribe this is whatever effect is still pending.
    pub effect: Option<Arc<OneShotEffect>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Receiving end of a controller subscription. Dropping it detaches the
/// subscriber on the next transition.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: Receiver<OverlayUpdate>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn try_next(&self) -> Option<OverlayUpdate> {
        match self.receiver.try_recv() {
            Ok(update) => Some(update),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Every update delivered since the last call, oldest first.
    pub fn drain(&self) -> Vec<OverlayUpdate> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

struct ControllerInner {
    state: OverlayState,
    animation: Option<AnimationSpec>,
    effects: EffectChannel,
    subscribers: Vec<(SubscriberId, Sender<OverlayUpdate>)>,
    next_subscriber_id: u64,
    /// Set between a staged fade-out and either its completion or a re-show.
    fade_pending: bool,
}

impl ControllerInner {
    fn broadcast(&mut self, effect: Option<Arc<OneShotEffect>>) {
        let update = OverlayUpdate {
            state: self.state,
            animation: self.animation,
            effect,
        };
        self.subscribers.retain(|(id, tx)| {
            let alive = tx.send(update.clone()).is_ok();
            if !alive {
                tracing::debug!(subscriber = id.0, "dropping detached overlay subscriber");
            }
            alive
        });
    }

    /// Replaces state and animation, optionally publishes an effect, and
    /// notifies subscribers once.
    fn apply(
        &mut self,
        state: OverlayState,
        animation: Option<AnimationSpec>,
        effect: Option<EffectKind>,
    ) {
        self.state = state;
        self.animation = animation;
        let published = effect.map(|kind| self.effects.publish(kind));
        self.broadcast(published);
    }

    /// Publishes an effect without touching the state.
    fn emit(&mut self, kind: EffectKind) {
        let state = self.state;
        self.apply(state, None, Some(kind));
    }

    /// The window stays visible through the fade; the runtime reports back
    /// through [`OverlayController::on_overlay_hidden`].
    fn stage_fade_out(&mut self) {
        if self.state.sound_enabled {
            self.emit(EffectKind::PlaySound);
        }
        let state = OverlayState {
            visible: true,
            ..self.state
        };
        self.apply(
            state,
            Some(AnimationSpec::new(FADE_ANIM_MS, AnimationKind::Fade)),
            Some(EffectKind::RequestHideAfterFade),
        );
        self.fade_pending = true;
        tracing::info!("overlay fade-out requested");
    }
}

pub struct OverlayController {
    store: Arc<dyn SettingsStore>,
    screen: Arc<dyn ScreenInfoProvider>,
    inner: Mutex<ControllerInner>,
}

impl std::fmt::Debug for OverlayController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayController")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl OverlayController {
    pub fn new(store: Arc<dyn SettingsStore>, screen: Arc<dyn ScreenInfoProvider>) -> Self {
        let settings = store.load_settings();
        let geometry = default_geometry(screen.as_ref());
        let state = OverlayState::hidden(geometry, &settings);
        tracing::debug!(?state, "overlay controller created");
        Self {
            store,
            screen,
            inner: Mutex::new(ControllerInner {
                state,
                animation: None,
                effects: EffectChannel::new(),
                subscribers: Vec::new(),
                next_subscriber_id: 1,
                fade_pending: false,
            }),
        }
    }

    /// Builds the controller behind the shared handle every host receives.
    pub fn shared(
        store: Arc<dyn SettingsStore>,
        screen: Arc<dyn ScreenInfoProvider>,
    ) -> Arc<Self> {
        Arc::new(Self::new(store, screen))
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> OverlayState {
        self.lock().state
    }

    pub fn animation(&self) -> Option<AnimationSpec> {
        self.lock().animation
    }

    /// Returns the pending animation and resets it to "none".
    pub fn take_animation(&self) -> Option<AnimationSpec> {
        self.lock().animation.take()
    }

    pub fn effect(&self) -> Option<Arc<OneShotEffect>> {
        self.lock().effects.current()
    }

    /// Called by a consumer once it has actioned `effect`. The slot is only
    /// cleared if it still holds that effect, so a newer effect survives.
    pub fn acknowledge_effect(&self, effect: &Arc<OneShotEffect>) {
        if self.lock().effects.clear_if_current(effect) {
            tracing::trace!(id = effect.id(), "effect slot cleared");
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let mut inner = self.lock();
        let id = SubscriberId(inner.next_subscriber_id);
        inner.next_subscriber_id += 1;
        let snapshot = OverlayUpdate {
            state: inner.state,
            animation: inner.animation,
            effect: inner.effects.current(),
        };
        // The receiver is still in scope, the send cannot fail.
        let _ = tx.send(snapshot);
        inner.subscribers.push((id, tx));
        tracing::debug!(subscriber = id.0, "overlay subscriber attached");
        Subscription { id, receiver: rx }
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut inner = self.lock();
        inner.subscribers.retain(|(existing, _)| *existing != id);
        tracing::debug!(subscriber = id.0, "overlay subscriber detached");
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Whether a fade-out is still waiting for [`Self::on_overlay_hidden`].
    /// A show issued during the fade withdraws it, so a runtime holding a
    /// hide timer checks this before removing the window.
    pub fn is_fading(&self) -> bool {
        self.lock().fade_pending
    }

    pub fn request_show(&self, has_permission: bool) {
        let mut inner = self.lock();
        if !has_permission {
            tracing::info!("overlay permission missing; requesting navigation");
            inner.emit(EffectKind::NavigateToPermission);
            return;
        }
        let settings = self.store.load_settings();
        let geometry = self
            .store
            .load_last_geometry()
            .unwrap_or_else(|| default_geometry(self.screen.as_ref()));
        let bounds = self.screen.current_bounds();
        let geometry = clamp_position(self.clamp_to_min_size(geometry, &bounds), &bounds);
        let state = OverlayState {
            visible: true,
            ..OverlayState::hidden(geometry, &settings)
        };
        inner.effects.clear();
        inner.fade_pending = false;
        inner.apply(state, None, None);
        tracing::info!(?geometry, "overlay shown");
    }

    /// With sound enabled, `PlaySound` is broadcast first and then replaced
    /// in the effect slot by `RequestHideAfterFade`, so only runtimes
    /// subscribed at this moment get the click.
    pub fn request_hide(&self) {
        self.lock().stage_fade_out();
    }

    pub fn on_close_click(&self) {
        tracing::debug!("close control tapped");
        self.lock().stage_fade_out();
    }

    pub fn on_overlay_hidden(&self) {
        let mut inner = self.lock();
        inner.fade_pending = false;
        let state = OverlayState {
            visible: false,
            ..inner.state
        };
        inner.apply(state, None, None);
        tracing::info!("overlay hidden");
    }

    pub fn on_drag_start(&self) {
        let mut inner = self.lock();
        let state = OverlayState {
            is_dragging: true,
            ..inner.state
        };
        inner.apply(state, None, None);
    }

    pub fn on_drag_move(&self, dx: i32, dy: i32) {
        let mut inner = self.lock();
        let current = inner.state.geometry;
        let moved = OverlayGeometry {
            x: current.x.saturating_add(dx),
            y: current.y.saturating_add(dy),
            ..current
        };
        let bounds = self.screen.current_bounds();
        let state = OverlayState {
            geometry: clamp_position(moved, &bounds),
            is_dragging: true,
            ..inner.state
        };
        inner.apply(state, None, None);
    }

    pub fn on_drag_end(&self) {
        let mut inner = self.lock();
        let bounds = self.screen.current_bounds();
        let threshold = self.screen.to_pixels(SNAP_THRESHOLD_DP);
        let snapped = snap_to_edge_if_needed(inner.state.geometry, &bounds, threshold);
        let geometry = clamp_position(snapped, &bounds);
        let state = OverlayState {
            geometry,
            is_dragging: false,
            ..inner.state
        };
        self.persist_geometry(&geometry);
        inner.apply(
            state,
            Some(AnimationSpec::new(MOVE_ANIM_MS, AnimationKind::Move)),
            None,
        );
        tracing::debug!(x = geometry.x, y = geometry.y, "drag finished");
    }

    pub fn on_resize_start(&self) {
        let mut inner = self.lock();
        let state = OverlayState {
            is_resizing: true,
            ..inner.state
        };
        inner.apply(state, None, None);
    }

    pub fn on_resize_move(&self, dw: i32, dh: i32) {
        let mut inner = self.lock();
        let current = inner.state.geometry;
        let resized = OverlayGeometry {
            width: current.width.saturating_add(dw),
            height: current.height.saturating_add(dh),
            ..current
        };
        let bounds = self.screen.current_bounds();
        let geometry = clamp_position(self.clamp_to_min_size(resized, &bounds), &bounds);
        let state = OverlayState {
            geometry,
            is_resizing: true,
            ..inner.state
        };
        inner.apply(state, None, None);
    }

    pub fn on_resize_end(&self) {
        let mut inner = self.lock();
        let state = OverlayState {
            is_resizing: false,
            ..inner.state
        };
        self.persist_geometry(&state.geometry);
        inner.apply(
            state,
            Some(AnimationSpec::new(RESIZE_ANIM_MS, AnimationKind::Resize)),
            None,
        );
        tracing::debug!(
            width = state.geometry.width,
            height = state.geometry.height,
            "resize finished"
        );
    }

    pub fn on_bounds_changed(&self) {
        let mut inner = self.lock();
        let bounds = self.screen.current_bounds();
        let geometry = clamp_position(self.clamp_to_min_size(inner.state.geometry, &bounds), &bounds);
        let state = inner.state.with_geometry(geometry);
        inner.apply(
            state,
            Some(AnimationSpec::new(MOVE_ANIM_MS, AnimationKind::Move)),
            None,
        );
        tracing::debug!(?bounds, ?geometry, "screen bounds changed");
    }

    pub fn on_close_button_position_changed(&self, side: CloseButtonSide) {
        let mut inner = self.lock();
        self.update_settings(|settings| settings.close_button_side = side);
        let state = OverlayState {
            close_button_side: side,
            ..inner.state
        };
        inner.apply(state, None, None);
    }

    pub fn on_sound_enabled_changed(&self, enabled: bool) {
        let mut inner = self.lock();
        self.update_settings(|settings| settings.sound_enabled = enabled);
        let state = OverlayState {
            sound_enabled: enabled,
            ..inner.state
        };
        inner.apply(state, None, None);
    }

    pub fn on_keep_alive_changed(&self, enabled: bool) {
        let mut inner = self.lock();
        self.update_settings(|settings| settings.keep_alive_enabled = enabled);
        let state = OverlayState {
            keep_alive_enabled: enabled,
            ..inner.state
        };
        inner.apply(state, None, None);
    }

    pub fn on_transparency_toggle_enabled_changed(&self, enabled: bool) {
        let mut inner = self.lock();
        self.update_settings(|settings| settings.transparency_toggle_enabled = enabled);
        let forced_off = !enabled && inner.state.transparent_mode;
        let state = OverlayState {
            transparency_toggle_enabled: enabled,
            transparent_mode: inner.state.transparent_mode && !forced_off,
            ..inner.state
        };
        let effect = forced_off.then_some(EffectKind::CancelRestoreDelay);
        inner.apply(state, None, effect);
    }

    pub fn on_transparency_auto_restore_enabled_changed(&self, enabled: bool) {
        let mut inner = self.lock();
        self.update_settings(|settings| settings.transparency_auto_restore_enabled = enabled);
        if !enabled {
            inner.emit(EffectKind::CancelRestoreDelay);
        }
    }

    pub fn on_transparency_auto_restore_seconds_changed(&self, seconds: i32) {
        let mut inner = self.lock();
        let normalized = clamp_auto_restore_seconds(i64::from(seconds));
        let settings =
            self.update_settings(|settings| settings.transparency_auto_restore_seconds = normalized);
        if inner.state.transparent_mode && settings.transparency_auto_restore_enabled {
            inner.emit(EffectKind::RequestRestoreAfterDelay {
                delay_ms: u64::from(normalized) * 1000,
            });
        }
    }

    pub fn on_transparency_toggle_requested(&self) {
        let mut inner = self.lock();
        let settings = self.store.load_settings();
        if !settings.transparency_toggle_enabled {
            tracing::debug!("transparency toggle ignored; feature disabled");
            return;
        }
        let entering = !inner.state.transparent_mode;
        let state = OverlayState {
            transparent_mode: entering,
            ..inner.state
        };
        let effect = if entering {
            settings
                .transparency_auto_restore_enabled
                .then(|| EffectKind::RequestRestoreAfterDelay {
                    delay_ms: settings.auto_restore_delay_ms(),
                })
        } else {
            Some(EffectKind::CancelRestoreDelay)
        };
        inner.apply(state, None, effect);
        tracing::debug!(transparent = entering, "transparency toggled");
    }

    pub fn on_transparency_auto_restore_timeout(&self) {
        let mut inner = self.lock();
        if !inner.state.transparent_mode {
            return;
        }
        let state = OverlayState {
            transparent_mode: false,
            ..inner.state
        };
        inner.apply(state, None, None);
        tracing::debug!("transparency restored after timeout");
    }

    /// Adopts geometry and settings from an external import. Visibility and
    /// in-flight gesture flags are kept.
    pub fn apply_imported_state(&self, geometry: OverlayGeometry, settings: Settings) {
        let mut inner = self.lock();
        let settings = Settings {
            transparency_auto_restore_seconds: clamp_auto_restore_seconds(i64::from(
                settings.transparency_auto_restore_seconds,
            )),
            ..settings
        };
        let bounds = self.screen.current_bounds();
        let geometry = clamp_position(self.clamp_to_min_size(geometry, &bounds), &bounds);
        if let Err(err) = self.store.save_settings(&settings) {
            tracing::warn!(?err, "failed to persist imported settings");
        }
        self.persist_geometry(&geometry);
        let state = OverlayState {
            transparent_mode: false,
            ..inner.state.with_geometry(geometry).with_settings(&settings)
        };
        inner.apply(state, None, None);
        tracing::info!(?geometry, "imported overlay state applied");
    }

    fn clamp_to_min_size(&self, geometry: OverlayGeometry, bounds: &ScreenBounds) -> OverlayGeometry {
        clamp_size(
            geometry,
            bounds,
            self.screen.to_pixels(MIN_WIDTH_DP),
            self.screen.to_pixels(MIN_HEIGHT_DP),
        )
    }

    /// Re-reads the stored settings, applies `change` and writes them back.
    fn update_settings(&self, change: impl FnOnce(&mut Settings)) -> Settings {
        let mut settings = self.store.load_settings();
        change(&mut settings);
        if let Err(err) = self.store.save_settings(&settings) {
            tracing::warn!(?err, "failed to persist settings");
        }
        settings
    }

    fn persist_geometry(&self, geometry: &OverlayGeometry) {
        if let Err(err) = self.store.save_last_geometry(geometry) {
            tracing::warn!(?err, "failed to persist overlay geometry");
        }
    }
}

fn default_geometry(screen: &dyn ScreenInfoProvider) -> OverlayGeometry {
    let bounds = screen.current_bounds();
    let width = screen.to_pixels(DEFAULT_WIDTH_DP);
    let height = screen.to_pixels(DEFAULT_HEIGHT_DP);
    let x = bounds.insets.left.max((bounds.width - width) / 2);
    let y = bounds
        .insets
        .top
        .max((bounds.height as f32 * DEFAULT_Y_FRACTION) as i32);
    OverlayGeometry::new(width, height, x, y)
}
