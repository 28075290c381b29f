use crate::overlay::geometry::{Insets, ScreenBounds};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenConfig {
    #[serde(default = "default_screen_width")]
    pub width_px: i32,
    #[serde(default = "default_screen_height")]
    pub height_px: i32,
    /// Pixels per density-independent unit.
    #[serde(default = "default_density")]
    pub density: f32,
    #[serde(default)]
    pub insets: Insets,
}

fn default_screen_width() -> i32 {
    1080
}

fn default_screen_height() -> i32 {
    1920
}

fn default_density() -> f32 {
    3.0
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width_px: default_screen_width(),
            height_px: default_screen_height(),
            density: default_density(),
            insets: Insets::default(),
        }
    }
}

impl ScreenConfig {
    pub fn bounds(&self) -> ScreenBounds {
        ScreenBounds::new(self.width_px, self.height_px, self.insets)
    }
}

/// Configuration of the process hosting the overlay, as opposed to the
/// user's persisted [`crate::settings::Settings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// When enabled the logger is initialised at debug level.
    #[serde(default)]
    pub debug_logging: bool,
    /// Log to this file instead of stderr.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Preferences file. Defaults to a file next to the executable.
    #[serde(default)]
    pub prefs_path: Option<PathBuf>,
    #[serde(default)]
    pub screen: ScreenConfig,
    #[serde(default = "default_has_permission")]
    pub has_overlay_permission: bool,
}

fn default_has_permission() -> bool {
    true
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            debug_logging: false,
            log_file: None,
            prefs_path: None,
            screen: ScreenConfig::default(),
            has_overlay_permission: default_has_permission(),
        }
    }
}

impl HostConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content).with_context(|| format!("parse host config {path}"))
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("write host config {path}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("host.json");
        let config = HostConfig::load(&path.to_string_lossy()).expect("load");
        assert_eq!(config, HostConfig::default());
        assert!(config.has_overlay_permission);
    }

    #[test]
    fn partial_screen_section_keeps_other_defaults() {
        let config: HostConfig = serde_json::from_value(serde_json::json!({
            "debug_logging": true,
            "screen": { "width_px": 1920, "insets": { "left": 0, "top": 0, "right": 48, "bottom": 0 } }
        }))
        .expect("deserialize config");
        assert!(config.debug_logging);
        assert_eq!(config.screen.width_px, 1920);
        assert_eq!(config.screen.height_px, 1920);
        assert_eq!(config.screen.bounds().insets.right, 48);
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("host.json");
        let path = path.to_string_lossy();
        let config = HostConfig {
            has_overlay_permission: false,
            prefs_path: Some(PathBuf::from("/tmp/prefs.json")),
            ..HostConfig::default()
        };
        config.save(&path).expect("save");
        assert_eq!(HostConfig::load(&path).expect("load"), config);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("host.json");
        std::fs::write(&path, "{ debug_logging: yes").expect("write");
        assert!(HostConfig::load(&path.to_string_lossy()).is_err());
    }
}
