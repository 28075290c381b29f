use serde::{Deserialize, Serialize};

pub const MIN_AUTO_RESTORE_SECONDS: u32 = 1;
pub const MAX_AUTO_RESTORE_SECONDS: u32 = 60;
pub const DEFAULT_AUTO_RESTORE_SECONDS: u32 = 5;

/// Which top corner of the overlay carries the close control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseButtonSide {
    Leading,
    #[default]
    Trailing,
}

impl CloseButtonSide {
    const LEADING_KEY: &'static str = "LEFT_TOP";
    const TRAILING_KEY: &'static str = "RIGHT_TOP";

    /// Parses the persisted representation. Unknown or legacy values fall
    /// back to the default side.
    pub fn from_stored(raw: &str) -> Self {
        match raw {
            Self::LEADING_KEY => Self::Leading,
            Self::TRAILING_KEY => Self::Trailing,
            other => {
                tracing::warn!(value = other, "unknown close button position; using default");
                Self::default()
            }
        }
    }

    pub fn as_stored(self) -> &'static str {
        match self {
            Self::Leading => Self::LEADING_KEY,
            Self::Trailing => Self::TRAILING_KEY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AppLanguage {
    #[default]
    #[serde(rename = "system")]
    System,
    #[serde(rename = "zh-CN")]
    SimplifiedChinese,
    #[serde(rename = "en")]
    English,
}

impl AppLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::SimplifiedChinese => "zh-CN",
            Self::English => "en",
        }
    }

    /// Unknown values map to [`AppLanguage::System`].
    pub fn from_value(raw: &str) -> Self {
        match raw {
            "zh-CN" => Self::SimplifiedChinese,
            "en" => Self::English,
            "system" => Self::System,
            other => {
                tracing::warn!(value = other, "unknown app language; following system");
                Self::System
            }
        }
    }
}

impl std::fmt::Display for AppLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted user configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub close_button_side: CloseButtonSide,
    #[serde(default)]
    pub sound_enabled: bool,
    /// Keep a background host alive while the overlay is shown.
    #[serde(default)]
    pub keep_alive_enabled: bool,
    #[serde(default)]
    pub app_language: AppLanguage,
    /// Whether tapping the overlay may switch it to transparent mode.
    #[serde(default)]
    pub transparency_toggle_enabled: bool,
    #[serde(default)]
    pub transparency_auto_restore_enabled: bool,
    /// Always within `[MIN_AUTO_RESTORE_SECONDS, MAX_AUTO_RESTORE_SECONDS]`
    /// once it has gone through [`clamp_auto_restore_seconds`].
    #[serde(default = "default_auto_restore_seconds")]
    pub transparency_auto_restore_seconds: u32,
}

fn default_auto_restore_seconds() -> u32 {
    DEFAULT_AUTO_RESTORE_SECONDS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            close_button_side: CloseButtonSide::default(),
            sound_enabled: false,
            keep_alive_enabled: false,
            app_language: AppLanguage::default(),
            transparency_toggle_enabled: false,
            transparency_auto_restore_enabled: false,
            transparency_auto_restore_seconds: DEFAULT_AUTO_RESTORE_SECONDS,
        }
    }
}

impl Settings {
    /// Delay before transparent mode is restored, in milliseconds.
    pub fn auto_restore_delay_ms(&self) -> u64 {
        u64::from(clamp_auto_restore_seconds(i64::from(
            self.transparency_auto_restore_seconds,
        ))) * 1000
    }
}

pub fn clamp_auto_restore_seconds(seconds: i64) -> u32 {
    seconds.clamp(
        i64::from(MIN_AUTO_RESTORE_SECONDS),
        i64::from(MAX_AUTO_RESTORE_SECONDS),
    ) as u32
}
