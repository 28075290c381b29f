use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use subtitle_blocker::overlay::runtime::HIDE_AFTER_FADE_DELAY;
use subtitle_blocker::overlay::{
    AnimationKind, AnimationSpec, Insets, OverlayController, OverlayRuntime, OverlayState,
    OverlaySurface, PermissionNavigator, ScreenBounds, SoundPlayer, StartOutcome,
};
use subtitle_blocker::settings::Settings;
use subtitle_blocker::{FixedScreen, MemorySettingsStore};

#[derive(Default)]
struct Recorder {
    renders: Vec<(OverlayState, Option<AnimationSpec>)>,
    hides: usize,
    clicks: usize,
    navigations: usize,
    sound_enabled: bool,
}

type Shared = Arc<Mutex<Recorder>>;

struct FakeSurface(Shared);

impl OverlaySurface for FakeSurface {
    fn render(&mut self, state: &OverlayState, animation: Option<AnimationSpec>) {
        self.0.lock().unwrap().renders.push((*state, animation));
    }

    fn hide(&mut self) {
        self.0.lock().unwrap().hides += 1;
    }
}

struct FakeSound(Shared);

impl SoundPlayer for FakeSound {
    fn set_enabled(&mut self, enabled: bool) {
        self.0.lock().unwrap().sound_enabled = enabled;
    }

    fn play_click(&mut self) {
        let mut recorder = self.0.lock().unwrap();
        if recorder.sound_enabled {
            recorder.clicks += 1;
        }
    }
}

struct FakeNavigator(Shared);

impl PermissionNavigator for FakeNavigator {
    fn open_overlay_permission_settings(&mut self) {
        self.0.lock().unwrap().navigations += 1;
    }
}

fn controller_with(settings: Settings) -> Arc<OverlayController> {
    let store = Arc::new(MemorySettingsStore::with_settings(&settings));
    let screen = Arc::new(FixedScreen::new(
        ScreenBounds::new(1080, 1920, Insets::new(0, 24, 0, 0)),
        3.0,
    ));
    OverlayController::shared(store, screen)
}

fn runtime(label: &str, with_navigator: bool) -> (OverlayRuntime, Shared) {
    let recorder: Shared = Arc::new(Mutex::new(Recorder::default()));
    let navigator: Option<Box<dyn PermissionNavigator>> = if with_navigator {
        Some(Box::new(FakeNavigator(recorder.clone())))
    } else {
        None
    };
    let runtime = OverlayRuntime::new(
        label,
        Box::new(FakeSurface(recorder.clone())),
        Box::new(FakeSound(recorder.clone())),
        navigator,
    );
    (runtime, recorder)
}

#[test]
fn repeated_start_does_not_subscribe_twice() {
    let controller = controller_with(Settings::default());
    let (runtime, _) = runtime("ui", true);

    assert_eq!(runtime.start(controller.clone()).unwrap(), StartOutcome::Started);
    assert_eq!(
        runtime.start(controller.clone()).unwrap(),
        StartOutcome::AlreadyActive
    );
    assert!(runtime.is_started());
    assert_eq!(controller.subscriber_count(), 1);
}

#[test]
fn first_tick_renders_current_snapshot() {
    let controller = controller_with(Settings::default());
    controller.request_show(true);
    let (runtime, recorder) = runtime("ui", true);
    runtime.start(controller.clone()).unwrap();
    runtime.tick(Instant::now()).unwrap();

    let recorder = recorder.lock().unwrap();
    let (state, animation) = recorder.renders.last().expect("rendered");
    assert!(state.visible);
    assert_eq!(*animation, None);
}

#[test]
fn close_hides_only_after_fade_delay() {
    let controller = controller_with(Settings::default());
    let (runtime, recorder) = runtime("ui", true);
    let stopped = Arc::new(AtomicUsize::new(0));
    let stopped_clone = stopped.clone();
    runtime
        .start_with_stop_callback(
            controller.clone(),
            Some(Arc::new(move || {
                stopped_clone.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();
    controller.request_show(true);

    let t0 = Instant::now();
    controller.on_close_click();
    runtime.tick(t0).unwrap();
    assert_eq!(runtime.pending_hide_deadline(), Some(t0 + HIDE_AFTER_FADE_DELAY));
    assert!(controller.effect().is_none(), "handled effect is acknowledged");
    {
        let recorder = recorder.lock().unwrap();
        let (state, animation) = recorder.renders.last().expect("fade render");
        assert!(state.visible);
        assert_eq!(
            *animation,
            Some(AnimationSpec::new(300, AnimationKind::Fade))
        );
    }

    runtime.tick(t0 + Duration::from_millis(319)).unwrap();
    assert!(controller.state().visible);
    assert_eq!(recorder.lock().unwrap().hides, 0);

    runtime.tick(t0 + HIDE_AFTER_FADE_DELAY).unwrap();
    assert!(!controller.state().visible);
    assert_eq!(recorder.lock().unwrap().hides, 1);
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
    assert_eq!(runtime.pending_hide_deadline(), None);
    let last_render = recorder.lock().unwrap().renders.last().map(|(s, _)| s.visible);
    assert_eq!(last_render, Some(false));
}

#[test]
fn effects_are_actioned_once_across_two_runtimes() {
    let controller = controller_with(Settings {
        sound_enabled: true,
        ..Settings::default()
    });
    let (ui, ui_recorder) = runtime("ui", true);
    let (service, service_recorder) = runtime("service", false);
    ui.start(controller.clone()).unwrap();
    service.start(controller.clone()).unwrap();
    controller.request_show(true);

    let t0 = Instant::now();
    controller.request_hide();
    service.tick(t0).unwrap();
    ui.tick(t0).unwrap();

    let clicks = ui_recorder.lock().unwrap().clicks + service_recorder.lock().unwrap().clicks;
    assert_eq!(clicks, 1);
    let scheduled = [ui.pending_hide_deadline(), service.pending_hide_deadline()]
        .iter()
        .filter(|deadline| deadline.is_some())
        .count();
    assert_eq!(scheduled, 1);
    assert!(service.pending_hide_deadline().is_some(), "first to tick wins");
}

#[test]
fn permission_navigation_waits_for_a_capable_runtime() {
    let controller = controller_with(Settings::default());
    let (service, service_recorder) = runtime("service", false);
    let (ui, ui_recorder) = runtime("ui", true);
    service.start(controller.clone()).unwrap();
    ui.start(controller.clone()).unwrap();

    controller.request_show(false);
    service.tick(Instant::now()).unwrap();
    assert_eq!(service_recorder.lock().unwrap().navigations, 0);
    assert!(controller.effect().is_some());

    ui.tick(Instant::now()).unwrap();
    assert_eq!(ui_recorder.lock().unwrap().navigations, 1);
    assert!(controller.effect().is_none());
}

#[test]
fn late_subscriber_does_not_repeat_consumed_effect() {
    let controller = controller_with(Settings::default());
    let (first, first_recorder) = runtime("first", true);
    first.start(controller.clone()).unwrap();
    controller.request_show(false);
    let stale = controller.effect().expect("pending navigation");

    first.tick(Instant::now()).unwrap();
    assert!(stale.is_consumed());

    let (late, late_recorder) = runtime("late", true);
    late.start(controller.clone()).unwrap();
    late.tick(Instant::now()).unwrap();
    assert_eq!(first_recorder.lock().unwrap().navigations, 1);
    assert_eq!(late_recorder.lock().unwrap().navigations, 0);
}

#[test]
fn restore_timer_returns_overlay_to_opaque() {
    let controller = controller_with(Settings {
        transparency_toggle_enabled: true,
        transparency_auto_restore_enabled: true,
        transparency_auto_restore_seconds: 2,
        ..Settings::default()
    });
    let (runtime, _) = runtime("ui", true);
    runtime.start(controller.clone()).unwrap();
    controller.request_show(true);

    let t0 = Instant::now();
    controller.on_transparency_toggle_requested();
    runtime.tick(t0).unwrap();
    assert_eq!(runtime.pending_restore_deadline(), Some(t0 + Duration::from_secs(2)));

    runtime.tick(t0 + Duration::from_millis(1999)).unwrap();
    assert!(controller.state().transparent_mode);

    runtime.tick(t0 + Duration::from_secs(2)).unwrap();
    assert!(!controller.state().transparent_mode);
    assert_eq!(runtime.pending_restore_deadline(), None);
}

#[test]
fn leaving_transparency_cancels_restore_timer() {
    let controller = controller_with(Settings {
        transparency_toggle_enabled: true,
        transparency_auto_restore_enabled: true,
        ..Settings::default()
    });
    let (runtime, _) = runtime("ui", true);
    runtime.start(controller.clone()).unwrap();
    controller.request_show(true);

    let t0 = Instant::now();
    controller.on_transparency_toggle_requested();
    runtime.tick(t0).unwrap();
    assert!(runtime.pending_restore_deadline().is_some());

    controller.on_transparency_toggle_requested();
    runtime.tick(t0).unwrap();
    assert_eq!(runtime.pending_restore_deadline(), None);
}

#[test]
fn disabling_auto_restore_cancels_timer_armed_by_other_runtime() {
    let controller = controller_with(Settings {
        transparency_toggle_enabled: true,
        transparency_auto_restore_enabled: true,
        ..Settings::default()
    });
    let (ui, _) = runtime("ui", true);
    let (service, _) = runtime("service", false);
    ui.start(controller.clone()).unwrap();
    service.start(controller.clone()).unwrap();
    controller.request_show(true);

    let t0 = Instant::now();
    controller.on_transparency_toggle_requested();
    ui.tick(t0).unwrap();
    service.tick(t0).unwrap();
    assert_eq!(ui.pending_restore_deadline(), Some(t0 + Duration::from_secs(5)));
    assert_eq!(service.pending_restore_deadline(), None);

    controller.on_transparency_auto_restore_enabled_changed(false);
    service.tick(t0).unwrap();
    ui.tick(t0).unwrap();
    assert_eq!(ui.pending_restore_deadline(), None);
    assert!(controller.effect().is_none());

    ui.tick(t0 + Duration::from_secs(6)).unwrap();
    service.tick(t0 + Duration::from_secs(6)).unwrap();
    assert!(controller.state().transparent_mode);
}

#[test]
fn newer_restore_request_replaces_timer_held_by_other_runtime() {
    let controller = controller_with(Settings {
        transparency_toggle_enabled: true,
        transparency_auto_restore_enabled: true,
        ..Settings::default()
    });
    let (ui, _) = runtime("ui", true);
    let (service, _) = runtime("service", false);
    ui.start(controller.clone()).unwrap();
    service.start(controller.clone()).unwrap();
    controller.request_show(true);

    let t0 = Instant::now();
    controller.on_transparency_toggle_requested();
    ui.tick(t0).unwrap();
    service.tick(t0).unwrap();

    controller.on_transparency_auto_restore_seconds_changed(10);
    service.tick(t0).unwrap();
    ui.tick(t0).unwrap();
    assert_eq!(ui.pending_restore_deadline(), None);
    assert_eq!(
        service.pending_restore_deadline(),
        Some(t0 + Duration::from_secs(10))
    );

    ui.tick(t0 + Duration::from_secs(6)).unwrap();
    assert!(controller.state().transparent_mode);

    service.tick(t0 + Duration::from_secs(10)).unwrap();
    assert!(!controller.state().transparent_mode);
}

#[test]
fn show_during_fade_keeps_overlay_visible() {
    let controller = controller_with(Settings::default());
    let (runtime, recorder) = runtime("ui", true);
    let stopped = Arc::new(AtomicUsize::new(0));
    let stopped_clone = stopped.clone();
    runtime
        .start_with_stop_callback(
            controller.clone(),
            Some(Arc::new(move || {
                stopped_clone.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();
    controller.request_show(true);

    let t0 = Instant::now();
    controller.request_hide();
    runtime.tick(t0).unwrap();
    assert!(controller.is_fading());

    controller.request_show(true);
    assert!(!controller.is_fading());
    runtime.tick(t0).unwrap();
    runtime.tick(t0 + HIDE_AFTER_FADE_DELAY).unwrap();

    assert!(controller.state().visible);
    assert_eq!(recorder.lock().unwrap().hides, 0);
    assert_eq!(stopped.load(Ordering::SeqCst), 0);
    assert_eq!(runtime.pending_hide_deadline(), None);

    let t1 = t0 + Duration::from_secs(1);
    controller.request_hide();
    runtime.tick(t1).unwrap();
    runtime.tick(t1 + HIDE_AFTER_FADE_DELAY).unwrap();
    assert!(!controller.state().visible);
    assert_eq!(recorder.lock().unwrap().hides, 1);
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
}

#[test]
fn stop_detaches_and_drops_pending_timers() {
    let controller = controller_with(Settings::default());
    let (runtime, recorder) = runtime("ui", true);
    runtime.start(controller.clone()).unwrap();
    controller.request_show(true);
    let t0 = Instant::now();
    controller.on_close_click();
    runtime.tick(t0).unwrap();

    runtime.stop().unwrap();
    assert!(!runtime.is_started());
    assert_eq!(controller.subscriber_count(), 0);
    assert_eq!(recorder.lock().unwrap().hides, 1);
    assert_eq!(runtime.pending_hide_deadline(), None);

    runtime.tick(t0 + Duration::from_secs(5)).unwrap();
    assert!(controller.state().visible, "stopped runtime never reports hidden");
    runtime.stop().unwrap();
    assert_eq!(recorder.lock().unwrap().hides, 1);
}

#[test]
fn stop_callback_may_stop_the_runtime() {
    let controller = controller_with(Settings::default());
    let (runtime, _) = runtime("ui", true);
    let runtime = Arc::new(runtime);
    let weak = Arc::downgrade(&runtime);
    runtime
        .start_with_stop_callback(
            controller.clone(),
            Some(Arc::new(move || {
                if let Some(runtime) = weak.upgrade() {
                    runtime.stop().unwrap();
                }
            })),
        )
        .unwrap();
    controller.request_show(true);

    let t0 = Instant::now();
    controller.request_hide();
    runtime.tick(t0).unwrap();
    runtime.tick(t0 + HIDE_AFTER_FADE_DELAY).unwrap();

    assert!(!runtime.is_started());
    assert_eq!(controller.subscriber_count(), 0);
}

#[test]
fn restart_after_stop_subscribes_again() {
    let controller = controller_with(Settings::default());
    let (runtime, _) = runtime("ui", true);
    runtime.start(controller.clone()).unwrap();
    runtime.stop().unwrap();
    assert_eq!(runtime.start(controller.clone()).unwrap(), StartOutcome::Started);
    assert_eq!(controller.subscriber_count(), 1);
}

#[test]
fn dropping_runtime_detaches_from_controller() {
    let controller = controller_with(Settings::default());
    {
        let (runtime, _) = runtime("ui", true);
        runtime.start(controller.clone()).unwrap();
        assert_eq!(controller.subscriber_count(), 1);
    }
    assert_eq!(controller.subscriber_count(), 0);
}
