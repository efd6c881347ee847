use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flow_engine::InboundEvent;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid script line {line} at `{json_path}`: {source}")]
    Parse {
        line: usize,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One timed host event, `at_ms` relative to the start of playback.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct ScriptLine {
    pub(crate) at_ms: u64,
    #[serde(flatten)]
    pub(crate) action: ScriptAction,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum ScriptAction {
    StreamCreated {
        stream_id: String,
        width: f32,
        height: f32,
    },
    StreamResized {
        stream_id: String,
        width: f32,
        height: f32,
    },
    StreamRemoved {
        stream_id: String,
    },
    StreamToggled {
        stream_id: String,
        enabled: bool,
    },
    Message(InboundEvent),
    Hidden,
    Visible,
    /// Partial settings document; present keys replace the current values.
    Settings(Map<String, Value>),
}

pub(crate) fn load_script(path: &Path) -> Result<Vec<ScriptLine>, ScriptError> {
    let raw = fs::read_to_string(path).map_err(|source| ScriptError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(&raw)
}

/// Parses JSON lines, skipping blanks and `#` comments. Lines are ordered by
/// `at_ms`; equal times keep file order.
pub(crate) fn parse_script(raw: &str) -> Result<Vec<ScriptLine>, ScriptError> {
    let mut lines = Vec::new();
    for (index, text) in raw.lines().enumerate() {
        let text = text.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let mut deserializer = serde_json::Deserializer::from_str(text);
        let line = serde_path_to_error::deserialize::<_, ScriptLine>(&mut deserializer).map_err(
            |error| ScriptError::Parse {
                line: index + 1,
                json_path: error.path().to_string(),
                source: error.into_inner(),
            },
        )?;
        lines.push(line);
    }
    lines.sort_by_key(|line| line.at_ms);
    Ok(lines)
}
