//! Headless host: drives the overlay controller from line commands on stdin
//! and prints the resulting state as JSON.

use anyhow::{anyhow, bail, Context, Result};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use subtitle_blocker::config::HostConfig;
use subtitle_blocker::overlay::{
    AnimationSpec, OverlayController, OverlayRuntime, OverlayState, OverlaySurface,
    PermissionNavigator, SoundPlayer,
};
use subtitle_blocker::settings::CloseButtonSide;
use subtitle_blocker::settings_store::{resolve_prefs_path, JsonFileSettingsStore};
use subtitle_blocker::{logging, FixedScreen, ScreenInfoProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Show,
    Hide,
    Close,
    DragStart,
    Drag(i32, i32),
    DragEnd,
    ResizeStart,
    Resize(i32, i32),
    ResizeEnd,
    Bounds(i32, i32),
    Side(CloseButtonSide),
    Sound(bool),
    KeepAlive(bool),
    TransparencyToggle(bool),
    AutoRestore(bool),
    AutoRestoreSeconds(i32),
    Toggle,
    Wait(u64),
    State,
    Quit,
}

fn parse_switch(arg: Option<&str>) -> Result<bool> {
    match arg {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        other => bail!("expected on|off, got {other:?}"),
    }
}

fn parse_num<T: std::str::FromStr>(arg: Option<&str>) -> Result<T> {
    let raw = arg.ok_or_else(|| anyhow!("missing number"))?;
    raw.parse()
        .map_err(|_| anyhow!("'{raw}' is not a valid number"))
}

impl Command {
    fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let name = parts.next().ok_or_else(|| anyhow!("empty command"))?;
        let command = match name {
            "show" => Self::Show,
            "hide" => Self::Hide,
            "close" => Self::Close,
            "drag-start" => Self::DragStart,
            "drag" => Self::Drag(parse_num(parts.next())?, parse_num(parts.next())?),
            "drag-end" => Self::DragEnd,
            "resize-start" => Self::ResizeStart,
            "resize" => Self::Resize(parse_num(parts.next())?, parse_num(parts.next())?),
            "resize-end" => Self::ResizeEnd,
            "bounds" => Self::Bounds(parse_num(parts.next())?, parse_num(parts.next())?),
            "side" => match parts.next() {
                Some("leading") => Self::Side(CloseButtonSide::Leading),
                Some("trailing") => Self::Side(CloseButtonSide::Trailing),
                other => bail!("expected leading|trailing, got {other:?}"),
            },
            "sound" => Self::Sound(parse_switch(parts.next())?),
            "keep-alive" => Self::KeepAlive(parse_switch(parts.next())?),
            "transparency-toggle" => Self::TransparencyToggle(parse_switch(parts.next())?),
            "auto-restore" => Self::AutoRestore(parse_switch(parts.next())?),
            "auto-restore-seconds" => Self::AutoRestoreSeconds(parse_num(parts.next())?),
            "toggle" => Self::Toggle,
            "wait" => Self::Wait(parse_num(parts.next())?),
            "state" => Self::State,
            "quit" | "exit" => Self::Quit,
            other => bail!("unknown command '{other}'"),
        };
        Ok(command)
    }
}

struct ConsoleSurface;

impl OverlaySurface for ConsoleSurface {
    fn render(&mut self, state: &OverlayState, animation: Option<AnimationSpec>) {
        tracing::debug!(?state, ?animation, "render overlay");
    }

    fn hide(&mut self) {
        tracing::debug!("surface hidden");
    }
}

#[derive(Default)]
struct ConsoleSound {
    enabled: bool,
}

impl SoundPlayer for ConsoleSound {
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn play_click(&mut self) {
        if self.enabled {
            tracing::info!("click");
        }
    }
}

struct ConsoleNavigator;

impl PermissionNavigator for ConsoleNavigator {
    fn open_overlay_permission_settings(&mut self) {
        eprintln!("overlay permission required; grant it and run `show` again");
    }
}

fn execute(
    command: &Command,
    controller: &OverlayController,
    screen: &FixedScreen,
    config: &HostConfig,
) {
    match *command {
        Command::Show => controller.request_show(config.has_overlay_permission),
        Command::Hide => controller.request_hide(),
        Command::Close => controller.on_close_click(),
        Command::DragStart => controller.on_drag_start(),
        Command::Drag(dx, dy) => controller.on_drag_move(dx, dy),
        Command::DragEnd => controller.on_drag_end(),
        Command::ResizeStart => controller.on_resize_start(),
        Command::Resize(dw, dh) => controller.on_resize_move(dw, dh),
        Command::ResizeEnd => controller.on_resize_end(),
        Command::Bounds(width, height) => {
            let mut bounds = screen.current_bounds();
            bounds.width = width;
            bounds.height = height;
            screen.set_bounds(bounds);
            controller.on_bounds_changed();
        }
        Command::Side(side) => controller.on_close_button_position_changed(side),
        Command::Sound(on) => controller.on_sound_enabled_changed(on),
        Command::KeepAlive(on) => controller.on_keep_alive_changed(on),
        Command::TransparencyToggle(on) => controller.on_transparency_toggle_enabled_changed(on),
        Command::AutoRestore(on) => controller.on_transparency_auto_restore_enabled_changed(on),
        Command::AutoRestoreSeconds(seconds) => {
            controller.on_transparency_auto_restore_seconds_changed(seconds)
        }
        Command::Toggle => controller.on_transparency_toggle_requested(),
        Command::Wait(ms) => std::thread::sleep(Duration::from_millis(ms)),
        Command::State | Command::Quit => {}
    }
}

fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = match config_path.as_deref() {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };
    logging::init(config.debug_logging, config.log_file.clone());

    let prefs_path = match config.prefs_path.clone() {
        Some(path) => path,
        None => resolve_prefs_path()?,
    };
    tracing::info!(prefs = %prefs_path.display(), "starting headless overlay host");

    let store = Arc::new(JsonFileSettingsStore::new(prefs_path));
    let screen = Arc::new(FixedScreen::new(
        config.screen.bounds(),
        config.screen.density,
    ));
    let controller = OverlayController::shared(store, screen.clone());
    let runtime = OverlayRuntime::new(
        "console",
        Box::new(ConsoleSurface),
        Box::new(ConsoleSound::default()),
        Some(Box::new(ConsoleNavigator)),
    );
    runtime.start(controller.clone())?;

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("read command")?;
        if line.trim().is_empty() {
            continue;
        }
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        execute(&command, &controller, &screen, &config);
        runtime.tick(Instant::now())?;
        let state = serde_json::to_string(&controller.state()).context("serialize state")?;
        writeln!(stdout, "{state}")?;
    }

    runtime.stop()?;
    Ok(())
}
