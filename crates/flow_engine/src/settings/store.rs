use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::FlowSettings;

pub const SETTINGS_STORAGE_KEY: &str = "flowChatSettings";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings in {path} at `{json_path}`: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode settings for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// On-disk key-value document. Keys other than ours are carried through
/// untouched on save.
#[derive(Debug, Default, Deserialize, Serialize)]
struct SettingsDocument {
    #[serde(
        rename = "flowChatSettings",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    flow_chat_settings: Option<FlowSettings>,
    #[serde(flatten)]
    other_keys: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file, blank file, or missing key all mean "defaults".
    pub fn load(&self) -> Result<FlowSettings, SettingsError> {
        let document = self.read_document()?;
        Ok(document
            .flow_chat_settings
            .unwrap_or_default()
            .normalized())
    }

    pub fn save(&self, settings: &FlowSettings) -> Result<(), SettingsError> {
        let mut document = self.read_document()?;
        document.flow_chat_settings = Some(settings.clone());
        let text =
            serde_json::to_string_pretty(&document).map_err(|source| SettingsError::Encode {
                path: self.path.clone(),
                source,
            })?;
        write_text_replacing(&self.path, &text).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn reset(&self) -> Result<FlowSettings, SettingsError> {
        let defaults = FlowSettings::default();
        self.save(&defaults)?;
        Ok(defaults)
    }

    fn read_document(&self) -> Result<SettingsDocument, SettingsError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(SettingsDocument::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(SettingsDocument::default());
        }

        let mut deserializer = serde_json::Deserializer::from_str(&raw);
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            let json_path = error.path().to_string();
            SettingsError::Parse {
                path: self.path.clone(),
                json_path,
                source: error.into_inner(),
            }
        })
    }
}

/// Writes through a sibling temp file so readers never see a torn document.
fn write_text_replacing(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path_for(path);
    fs::write(&staging, text.as_bytes())?;
    if let Err(error) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(error);
    }
    Ok(())
}

fn staging_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("settings.json");
    path.with_file_name(format!("{file_name}.tmp"))
}
