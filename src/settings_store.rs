//! Persistence for [`Settings`] and the last overlay geometry.
//!
//! Both stores keep the same flat key/value layout so a preferences file can
//! be inspected or edited by hand. Loading never fails: missing or corrupt
//! data yields defaults.

use crate::overlay::geometry::OverlayGeometry;
use crate::settings::{AppLanguage, CloseButtonSide, Settings, DEFAULT_AUTO_RESTORE_SECONDS};
use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub const PREFS_FILE_NAME: &str = "subtitle_blocker_prefs.json";

const KEY_CLOSE_POSITION: &str = "close_button_position";
const KEY_SOUND_ENABLED: &str = "sound_enabled";
const KEY_KEEP_ALIVE: &str = "keep_alive_enabled";
const KEY_LANGUAGE: &str = "app_language";
const KEY_TRANSPARENCY_TOGGLE_ENABLED: &str = "transparency_toggle_enabled";
const KEY_TRANSPARENCY_AUTO_RESTORE_ENABLED: &str = "transparency_auto_restore_enabled";
const KEY_TRANSPARENCY_AUTO_RESTORE_SECONDS: &str = "transparency_auto_restore_seconds";
const KEY_LAST_WIDTH: &str = "last_width_px";
const KEY_LAST_HEIGHT: &str = "last_height_px";
const KEY_LAST_X: &str = "last_x_px";
const KEY_LAST_Y: &str = "last_y_px";

pub type PrefsMap = Map<String, Value>;

pub trait SettingsStore: Send + Sync {
    fn load_settings(&self) -> Settings;
    fn save_settings(&self, settings: &Settings) -> Result<()>;
    /// `None` when no geometry was ever saved.
    fn load_last_geometry(&self) -> Option<OverlayGeometry>;
    fn save_last_geometry(&self, geometry: &OverlayGeometry) -> Result<()>;
}

fn read_bool(map: &PrefsMap, key: &str, default: bool) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn read_i32(map: &PrefsMap, key: &str, default: i32) -> i32 {
    map.get(key)
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or(default)
}

fn read_str<'a>(map: &'a PrefsMap, key: &str, default: &'a str) -> &'a str {
    map.get(key).and_then(Value::as_str).unwrap_or(default)
}

pub fn settings_from_map(map: &PrefsMap) -> Settings {
    let seconds = read_i32(
        map,
        KEY_TRANSPARENCY_AUTO_RESTORE_SECONDS,
        DEFAULT_AUTO_RESTORE_SECONDS as i32,
    );
    Settings {
        close_button_side: CloseButtonSide::from_stored(read_str(
            map,
            KEY_CLOSE_POSITION,
            CloseButtonSide::default().as_stored(),
        )),
        sound_enabled: read_bool(map, KEY_SOUND_ENABLED, false),
        keep_alive_enabled: read_bool(map, KEY_KEEP_ALIVE, false),
        app_language: AppLanguage::from_value(read_str(
            map,
            KEY_LANGUAGE,
            AppLanguage::System.as_str(),
        )),
        transparency_toggle_enabled: read_bool(map, KEY_TRANSPARENCY_TOGGLE_ENABLED, false),
        transparency_auto_restore_enabled: read_bool(
            map,
            KEY_TRANSPARENCY_AUTO_RESTORE_ENABLED,
            false,
        ),
        transparency_auto_restore_seconds: crate::settings::clamp_auto_restore_seconds(i64::from(
            seconds,
        )),
    }
}

pub fn write_settings(map: &mut PrefsMap, settings: &Settings) {
    map.insert(
        KEY_CLOSE_POSITION.into(),
        settings.close_button_side.as_stored().into(),
    );
    map.insert(KEY_SOUND_ENABLED.into(), settings.sound_enabled.into());
    map.insert(KEY_KEEP_ALIVE.into(), settings.keep_alive_enabled.into());
    map.insert(KEY_LANGUAGE.into(), settings.app_language.as_str().into());
    map.insert(
        KEY_TRANSPARENCY_TOGGLE_ENABLED.into(),
        settings.transparency_toggle_enabled.into(),
    );
    map.insert(
        KEY_TRANSPARENCY_AUTO_RESTORE_ENABLED.into(),
        settings.transparency_auto_restore_enabled.into(),
    );
    map.insert(
        KEY_TRANSPARENCY_AUTO_RESTORE_SECONDS.into(),
        settings.transparency_auto_restore_seconds.into(),
    );
}

pub fn geometry_from_map(map: &PrefsMap) -> Option<OverlayGeometry> {
    if !map.contains_key(KEY_LAST_WIDTH) {
        return None;
    }
    Some(OverlayGeometry::new(
        read_i32(map, KEY_LAST_WIDTH, 0),
        read_i32(map, KEY_LAST_HEIGHT, 0),
        read_i32(map, KEY_LAST_X, 0),
        read_i32(map, KEY_LAST_Y, 0),
    ))
}

pub fn write_geometry(map: &mut PrefsMap, geometry: &OverlayGeometry) {
    map.insert(KEY_LAST_WIDTH.into(), geometry.width.into());
    map.insert(KEY_LAST_HEIGHT.into(), geometry.height.into());
    map.insert(KEY_LAST_X.into(), geometry.x.into());
    map.insert(KEY_LAST_Y.into(), geometry.y.into());
}

pub fn prefs_path_from_exe_path(exe_path: &Path) -> Result<PathBuf> {
    let parent = exe_path
        .parent()
        .ok_or_else(|| anyhow!("executable path has no parent: {}", exe_path.display()))?;
    Ok(parent.join(PREFS_FILE_NAME))
}

pub fn resolve_prefs_path() -> Result<PathBuf> {
    let exe_path = std::env::current_exe().context("resolve current executable")?;
    prefs_path_from_exe_path(&exe_path)
}

/// Preferences kept in a JSON file. Every load re-reads the file so edits
/// made by another process are picked up.
#[derive(Debug)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_map(&self) -> PrefsMap {
        match read_map(&self.path) {
            Ok(map) => map,
            Err(err) => {
                tracing::warn!(?err, path = %self.path.display(), "unreadable preferences; using defaults");
                PrefsMap::new()
            }
        }
    }

    fn update(&self, apply: impl FnOnce(&mut PrefsMap)) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.load_map();
        apply(&mut map);
        write_map(&self.path, &map)
    }
}

fn read_map(path: &Path) -> Result<PrefsMap> {
    if !path.exists() {
        return Ok(PrefsMap::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read preferences file {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(PrefsMap::new());
    }
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("deserialize preferences file {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!(
            "preferences file {} holds {} instead of an object",
            path.display(),
            json_type_name(&other)
        )),
    }
}

fn write_map(path: &Path, map: &PrefsMap) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create preferences folder {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(map).context("serialize preferences")?;
    std::fs::write(path, json)
        .with_context(|| format!("write preferences file {}", path.display()))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl SettingsStore for JsonFileSettingsStore {
    fn load_settings(&self) -> Settings {
        settings_from_map(&self.load_map())
    }

    fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.update(|map| write_settings(map, settings))
    }

    fn load_last_geometry(&self) -> Option<OverlayGeometry> {
        geometry_from_map(&self.load_map())
    }

    fn save_last_geometry(&self, geometry: &OverlayGeometry) -> Result<()> {
        self.update(|map| write_geometry(map, geometry))
    }
}

/// In-process store with the same layout as the file store.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    map: Mutex<PrefsMap>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: PrefsMap) -> Self {
        Self {
            map: Mutex::new(map),
        }
    }

    pub fn with_settings(settings: &Settings) -> Self {
        let mut map = PrefsMap::new();
        write_settings(&mut map, settings);
        Self::from_map(map)
    }

    pub fn snapshot(&self) -> PrefsMap {
        self.map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces one raw entry, as an external editor would.
    pub fn set_raw(&self, key: &str, value: Value) {
        self.map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load_settings(&self) -> Settings {
        settings_from_map(&self.snapshot())
    }

    fn save_settings(&self, settings: &Settings) -> Result<()> {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        write_settings(&mut map, settings);
        Ok(())
    }

    fn load_last_geometry(&self) -> Option<OverlayGeometry> {
        geometry_from_map(&self.snapshot())
    }

    fn save_last_geometry(&self, geometry: &OverlayGeometry) -> Result<()> {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        write_geometry(&mut map, geometry);
        Ok(())
    }
}
