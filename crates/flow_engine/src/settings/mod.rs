mod handle;
mod store;
mod types;

pub use handle::{SettingsHandle, VersionedSettings};
pub use store::{SettingsError, SettingsStore, SETTINGS_STORAGE_KEY};
pub use types::{
    FlowSettings, MessageStyle, Rgb, DEFAULT_DISPLAY_AREA, DEFAULT_DISPLAY_TIME_SECONDS,
    DEFAULT_FONT_SIZE_PX, DEFAULT_MAX_MESSAGES, DEFAULT_MIN_VERTICAL_GAP_PX, DEFAULT_OPACITY,
    MAX_DISPLAY_TIME_SECONDS,
};
