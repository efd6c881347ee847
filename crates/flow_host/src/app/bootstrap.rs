use flow_engine::{
    resolve_settings_path, EstimatingMeasurer, FlowEngine, FlowSettings, SettingsHandle,
    SettingsStore, StartupError,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::cli::CliOptions;
use super::loop_runner::HostConfig;
use super::script::{load_script, ScriptError, ScriptLine};

#[derive(Debug, Error)]
pub(crate) enum HostError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Script(#[from] ScriptError),
}

pub(crate) struct AppWiring {
    pub(crate) config: HostConfig,
    pub(crate) engine: FlowEngine,
    pub(crate) settings: SettingsHandle,
    pub(crate) script: Vec<ScriptLine>,
}

pub(crate) fn build_app(options: CliOptions) -> Result<AppWiring, HostError> {
    init_tracing();
    info!("=== Flow Chat Host Startup ===");

    let store = SettingsStore::new(resolve_settings_path()?);
    let settings = load_settings_or_default(&store);
    let script = load_script(&options.script_path)?;
    info!(
        path = %options.script_path.display(),
        lines = script.len(),
        "script_loaded"
    );

    let config = HostConfig {
        fps: options.fps,
        realtime: options.realtime,
        ..HostConfig::default()
    };
    Ok(AppWiring {
        config,
        engine: FlowEngine::new(settings.clone(), EstimatingMeasurer::default()),
        settings: SettingsHandle::new(settings),
        script,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn load_settings_or_default(store: &SettingsStore) -> FlowSettings {
    match store.load() {
        Ok(settings) => {
            info!(path = %store.path().display(), "settings_loaded");
            settings
        }
        Err(err) => {
            warn!(
                error = %err,
                "settings file unreadable; falling back to defaults"
            );
            FlowSettings::default()
        }
    }
}
