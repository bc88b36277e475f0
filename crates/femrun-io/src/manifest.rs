//! Per-run manifest persisted as `run_manifest.json`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use femrun_model::Backend;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Status,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMessage {
    pub level: MessageLevel,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub analysis: String,
    pub solver: String,
    pub backend: Backend,
    /// Final machine state.
    pub state: String,
    /// Every state the machine went through, in order.
    pub history: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<ManifestMessage>,
    #[serde(default)]
    pub result_file: Option<PathBuf>,
}

impl RunManifest {
    pub fn new(
        analysis: impl Into<String>,
        solver: impl Into<String>,
        backend: Backend,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: 1,
            analysis: analysis.into(),
            solver: solver.into(),
            backend,
            state: String::new(),
            history: Vec::new(),
            started_at,
            finished_at: started_at,
            messages: Vec::new(),
            result_file: None,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.messages
            .iter()
            .filter(|m| m.level == MessageLevel::Error)
            .map(|m| m.text.as_str())
    }
}

pub fn save_manifest(path: impl AsRef<Path>, manifest: &RunManifest) -> io::Result<()> {
    let path = path.as_ref();
    crate::ensure_parent_dir(path)?;
    let bytes = serde_json::to_vec_pretty(manifest)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    fs::write(path, bytes)
}

pub fn load_manifest(path: impl AsRef<Path>) -> io::Result<RunManifest> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}
