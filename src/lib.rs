pub mod config;
pub mod logging;
pub mod overlay;
pub mod screen;
pub mod settings;
pub mod settings_store;

pub use overlay::{OverlayController, OverlayRuntime};
pub use screen::{FixedScreen, ScreenInfoProvider};
pub use settings::Settings;
pub use settings_store::{JsonFileSettingsStore, MemorySettingsStore, SettingsStore};
