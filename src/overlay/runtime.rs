//! Host-side runtime that turns controller updates into platform calls.
//!
//! Timers live here, not in the controller: effects only *request* a delayed
//! hide or restore, and [`OverlayRuntime::tick`] fires whichever deadlines
//! have passed. Several runtimes may observe one controller; each effect is
//! actioned by whichever runtime wins [`OneShotEffect::consume`].
//!
//! Timer requests and cancellations are the exception: every runtime drops
//! its own pending timer of that kind on sight, and only the winner re-arms.
//! Otherwise a cancel won by one runtime would leave the timer another
//! runtime armed earlier.

use crate::overlay::controller::{OverlayController, OverlayUpdate, Subscription, FADE_ANIM_MS};
use crate::overlay::effect::{EffectKind, OneShotEffect};
use crate::overlay::state::{AnimationSpec, OverlayState};
use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Extra time after the fade before the window is actually removed.
const HIDE_SLACK_MS: u64 = 20;
pub const HIDE_AFTER_FADE_DELAY: Duration = Duration::from_millis(FADE_ANIM_MS + HIDE_SLACK_MS);

/// The native window the overlay is drawn into.
pub trait OverlaySurface: Send {
    fn render(&mut self, state: &OverlayState, animation: Option<AnimationSpec>);
    fn hide(&mut self);
}

pub trait SoundPlayer: Send {
    fn set_enabled(&mut self, enabled: bool);
    fn play_click(&mut self);
}

pub trait PermissionNavigator: Send {
    fn open_overlay_permission_settings(&mut self);
}

pub type StopCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyActive,
}

struct Platform {
    surface: Box<dyn OverlaySurface>,
    sound: Box<dyn SoundPlayer>,
    navigator: Option<Box<dyn PermissionNavigator>>,
}

struct Session {
    controller: Arc<OverlayController>,
    subscription: Subscription,
    hide_deadline: Option<Instant>,
    restore_deadline: Option<Instant>,
    stop_callback: Option<StopCallback>,
}

struct RuntimeState {
    platform: Platform,
    session: Option<Session>,
}

pub struct OverlayRuntime {
    label: String,
    state: Mutex<RuntimeState>,
}

impl OverlayRuntime {
    /// A runtime without a navigator never claims `NavigateToPermission`,
    /// leaving it for a host that can act on it.
    pub fn new(
        label: impl Into<String>,
        surface: Box<dyn OverlaySurface>,
        sound: Box<dyn SoundPlayer>,
        navigator: Option<Box<dyn PermissionNavigator>>,
    ) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new(RuntimeState {
                platform: Platform {
                    surface,
                    sound,
                    navigator,
                },
                session: None,
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn lock(&self) -> Result<MutexGuard<'_, RuntimeState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("overlay runtime '{}' lock poisoned", self.label))
    }

    pub fn is_started(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.session.is_some())
            .unwrap_or(false)
    }

    pub fn start(&self, controller: Arc<OverlayController>) -> Result<StartOutcome> {
        self.start_with_stop_callback(controller, None)
    }

    /// Attaches to `controller`. Starting an already started runtime only
    /// replaces the stop callback (when one is given).
    pub fn start_with_stop_callback(
        &self,
        controller: Arc<OverlayController>,
        on_stopped: Option<StopCallback>,
    ) -> Result<StartOutcome> {
        let mut state = self.lock()?;
        if let Some(session) = state.session.as_mut() {
            if on_stopped.is_some() {
                session.stop_callback = on_stopped;
            }
            tracing::debug!(runtime = %self.label, "overlay runtime already started");
            return Ok(StartOutcome::AlreadyActive);
        }

        let subscription = controller.subscribe();
        state.session = Some(Session {
            controller,
            subscription,
            hide_deadline: None,
            restore_deadline: None,
            stop_callback: on_stopped,
        });
        tracing::info!(runtime = %self.label, "overlay runtime started");
        Ok(StartOutcome::Started)
    }

    /// Detaches from the controller, drops pending timers and hides the
    /// surface. A no-op when not started.
    pub fn stop(&self) -> Result<()> {
        let mut state = self.lock()?;
        let Some(session) = state.session.take() else {
            return Ok(());
        };
        session.controller.unsubscribe(session.subscription.id());
        state.platform.surface.hide();
        tracing::info!(runtime = %self.label, "overlay runtime stopped");
        Ok(())
    }

    pub fn pending_hide_deadline(&self) -> Option<Instant> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.session.as_ref().and_then(|session| session.hide_deadline))
    }

    pub fn pending_restore_deadline(&self) -> Option<Instant> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.session.as_ref().and_then(|session| session.restore_deadline))
    }

    /// Applies every update delivered since the last tick, then fires the
    /// timers that are due at `now`.
    pub fn tick(&self, now: Instant) -> Result<()> {
        let stop_callback = {
            let mut guard = self.lock()?;
            let RuntimeState { platform, session } = &mut *guard;
            let Some(session) = session.as_mut() else {
                return Ok(());
            };

            self.drain_updates(platform, session, now);
            let hidden = self.fire_due_timers(platform, session, now);
            // Render whatever the timer callbacks changed.
            self.drain_updates(platform, session, now);

            if hidden {
                session.stop_callback.clone()
            } else {
                None
            }
        };

        if let Some(callback) = stop_callback {
            callback();
        }
        Ok(())
    }

    fn drain_updates(&self, platform: &mut Platform, session: &mut Session, now: Instant) {
        for update in session.subscription.drain() {
            self.apply_update(platform, session, update, now);
        }
    }

    fn apply_update(
        &self,
        platform: &mut Platform,
        session: &mut Session,
        update: OverlayUpdate,
        now: Instant,
    ) {
        platform.sound.set_enabled(update.state.sound_enabled);
        platform.surface.render(&update.state, update.animation);
        if let Some(effect) = update.effect {
            self.handle_effect(platform, session, &effect, now);
        }
    }

    fn handle_effect(
        &self,
        platform: &mut Platform,
        session: &mut Session,
        effect: &Arc<OneShotEffect>,
        now: Instant,
    ) {
        let kind = effect.kind();
        match kind {
            EffectKind::NavigateToPermission if platform.navigator.is_none() => return,
            EffectKind::CancelRestoreDelay => {
                session.restore_deadline = None;
                // Idempotent, so every runtime acts on it.
                effect.consume();
                session.controller.acknowledge_effect(effect);
                tracing::debug!(runtime = %self.label, id = effect.id(), "restore timer cancelled");
                return;
            }
            EffectKind::RequestRestoreAfterDelay { .. } => session.restore_deadline = None,
            EffectKind::RequestHideAfterFade => session.hide_deadline = None,
            _ => {}
        }
        if !effect.consume() {
            tracing::trace!(runtime = %self.label, id = effect.id(), ?kind, "effect handled elsewhere");
            return;
        }
        tracing::debug!(runtime = %self.label, id = effect.id(), ?kind, "handling effect");

        match kind {
            EffectKind::PlaySound => platform.sound.play_click(),
            EffectKind::RequestHideAfterFade => {
                session.hide_deadline = Some(now + HIDE_AFTER_FADE_DELAY);
            }
            EffectKind::NavigateToPermission => {
                if let Some(navigator) = platform.navigator.as_mut() {
                    navigator.open_overlay_permission_settings();
                }
            }
            EffectKind::RequestRestoreAfterDelay { delay_ms } => {
                session.restore_deadline = Some(now + Duration::from_millis(delay_ms));
            }
            EffectKind::CancelRestoreDelay => {}
        }
        session.controller.acknowledge_effect(effect);
    }

    /// Returns whether the fade-hide timer fired.
    fn fire_due_timers(&self, platform: &mut Platform, session: &mut Session, now: Instant) -> bool {
        let mut hidden = false;
        if session.hide_deadline.is_some_and(|deadline| now >= deadline) {
            session.hide_deadline = None;
            if session.controller.is_fading() {
                platform.surface.hide();
                session.controller.on_overlay_hidden();
                tracing::debug!(runtime = %self.label, "fade-out finished");
                hidden = true;
            } else {
                tracing::debug!(runtime = %self.label, "fade withdrawn by a later show");
            }
        }
        if session.restore_deadline.is_some_and(|deadline| now >= deadline) {
            session.restore_deadline = None;
            session.controller.on_transparency_auto_restore_timeout();
        }
        hidden
    }
}

impl Drop for OverlayRuntime {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            if let Some(session) = state.session.take() {
                session.controller.unsubscribe(session.subscription.id());
            }
        }
    }
}
