use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod intake;
pub mod measure;
pub mod overlay;
pub mod settings;

pub use intake::{
    derive_message_id, normalize_event, ChatMessage, Fragment, InboundEvent, InboundFragment,
    Rank, RecentIds, StreamId,
};
pub use measure::{ContentMeasurer, ContentSize, EstimatingMeasurer, RenderContent};
pub use overlay::{
    plan_placement, uniform_speed, ActiveSlot, Admission, ContainerSize, FlowEngine,
    FlowMetricsSnapshot, IngestOutcome, MetricsAccumulator, MetricsHandle, MotionScheduler,
    PlacementParams, PlacementPlan, Rejection, RetireReason, RetiredSlot, Slot, SlotId,
    SlotPosition, Stream, StreamRegistry, TickReport, MAX_CANDIDATE_BANDS,
};
pub use settings::{
    FlowSettings, MessageStyle, Rgb, SettingsError, SettingsHandle, SettingsStore,
    VersionedSettings, SETTINGS_STORAGE_KEY,
};

pub const SETTINGS_ENV_VAR: &str = "FLOWCHAT_SETTINGS";
pub const DEFAULT_SETTINGS_FILE: &str = "flowchat.settings.json";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current working directory: {0}")]
    CurrentDir(#[source] std::io::Error),
}

/// Settings file location: `FLOWCHAT_SETTINGS` when set, otherwise
/// `flowchat.settings.json` in the working directory.
pub fn resolve_settings_path() -> Result<PathBuf, StartupError> {
    match env::var(SETTINGS_ENV_VAR) {
        Ok(value) => {
            let cwd = env::current_dir().map_err(StartupError::CurrentDir)?;
            Ok(settings_path_from(Some(&value), &cwd))
        }
        Err(env::VarError::NotPresent) => {
            let cwd = env::current_dir().map_err(StartupError::CurrentDir)?;
            Ok(settings_path_from(None, &cwd))
        }
        Err(source) => Err(StartupError::EnvVar {
            var: SETTINGS_ENV_VAR,
            source,
        }),
    }
}

fn settings_path_from(env_value: Option<&str>, cwd: &Path) -> PathBuf {
    match env_value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => cwd.join(value),
        None => cwd.join(DEFAULT_SETTINGS_FILE),
    }
}
