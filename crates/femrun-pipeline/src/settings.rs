//! Pipeline settings and their TOML loader.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Config file (`femrun.toml` or an explicit path)
//! 3. Environment variables (`FEMRUN_BIN_<KEY>`, `FEMRUN_PURGE_STALE`)
//!
//! Each layer overrides the previous.
//!
//! ```toml
//! [binaries.mofem_elasticity]
//! standard = false
//! path = "/opt/mofem/bin/elasticity"
//!
//! [mesh]
//! higher_order = "reject"
//!
//! [run]
//! purge_stale_outputs = false
//! ```

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "femrun.toml";

/// External executables the pipeline may launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryKey {
    Gmsh,
    ElmerSolver,
    ElmerGrid,
    MofemReadMed,
    MofemElasticity,
    MofemBone,
    Mbconvert,
}

impl BinaryKey {
    pub const ALL: [BinaryKey; 7] = [
        BinaryKey::Gmsh,
        BinaryKey::ElmerSolver,
        BinaryKey::ElmerGrid,
        BinaryKey::MofemReadMed,
        BinaryKey::MofemElasticity,
        BinaryKey::MofemBone,
        BinaryKey::Mbconvert,
    ];

    /// Key in the `[binaries]` table.
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryKey::Gmsh => "gmsh",
            BinaryKey::ElmerSolver => "elmer_solver",
            BinaryKey::ElmerGrid => "elmer_grid",
            BinaryKey::MofemReadMed => "mofem_read_med",
            BinaryKey::MofemElasticity => "mofem_elasticity",
            BinaryKey::MofemBone => "mofem_bone",
            BinaryKey::Mbconvert => "mbconvert",
        }
    }

    /// Executable name searched on `PATH` for a standard installation.
    pub fn executable(self) -> &'static str {
        match self {
            BinaryKey::Gmsh => "gmsh",
            BinaryKey::ElmerSolver => "ElmerSolver",
            BinaryKey::ElmerGrid => "ElmerGrid",
            BinaryKey::MofemReadMed => "read_med",
            BinaryKey::MofemElasticity => "elasticity",
            BinaryKey::MofemBone => "bone_remodelling",
            BinaryKey::Mbconvert => "mbconvert",
        }
    }

    /// Name used in "executable not found" messages.
    pub fn display_name(self) -> &'static str {
        match self {
            BinaryKey::Gmsh => "Gmsh",
            BinaryKey::ElmerSolver => "ElmerSolver",
            BinaryKey::ElmerGrid => "ElmerGrid",
            BinaryKey::MofemReadMed => "MoFEM read_med",
            BinaryKey::MofemElasticity | BinaryKey::MofemBone => "MoFEM",
            BinaryKey::Mbconvert => "mbconvert",
        }
    }

    pub fn env_var(self) -> String {
        format!("FEMRUN_BIN_{}", self.as_str().to_ascii_uppercase())
    }
}

impl fmt::Display for BinaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Either the standard installation (found on `PATH`) or a custom path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarySetting {
    pub standard: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for BinarySetting {
    fn default() -> Self {
        Self {
            standard: true,
            path: None,
        }
    }
}

impl BinarySetting {
    pub fn custom(path: impl Into<PathBuf>) -> Self {
        Self {
            standard: false,
            path: Some(path.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Binaries {
    pub gmsh: BinarySetting,
    pub elmer_solver: BinarySetting,
    pub elmer_grid: BinarySetting,
    pub mofem_read_med: BinarySetting,
    pub mofem_elasticity: BinarySetting,
    pub mofem_bone: BinarySetting,
    pub mbconvert: BinarySetting,
}

impl Binaries {
    pub fn get(&self, key: BinaryKey) -> &BinarySetting {
        match key {
            BinaryKey::Gmsh => &self.gmsh,
            BinaryKey::ElmerSolver => &self.elmer_solver,
            BinaryKey::ElmerGrid => &self.elmer_grid,
            BinaryKey::MofemReadMed => &self.mofem_read_med,
            BinaryKey::MofemElasticity => &self.mofem_elasticity,
            BinaryKey::MofemBone => &self.mofem_bone,
            BinaryKey::Mbconvert => &self.mbconvert,
        }
    }

    pub fn get_mut(&mut self, key: BinaryKey) -> &mut BinarySetting {
        match key {
            BinaryKey::Gmsh => &mut self.gmsh,
            BinaryKey::ElmerSolver => &mut self.elmer_solver,
            BinaryKey::ElmerGrid => &mut self.elmer_grid,
            BinaryKey::MofemReadMed => &mut self.mofem_read_med,
            BinaryKey::MofemElasticity => &mut self.mofem_elasticity,
            BinaryKey::MofemBone => &mut self.mofem_bone,
            BinaryKey::Mbconvert => &mut self.mbconvert,
        }
    }
}

/// What Prepare does with a second order mesh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HigherOrderPolicy {
    /// Warn and write a first order mesh.
    #[default]
    Downgrade,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    pub higher_order: HigherOrderPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Delete outputs of earlier runs before Solve.
    pub purge_stale_outputs: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            purge_stale_outputs: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessSettings {
    pub poll_interval_ms: u64,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub binaries: Binaries,
    pub mesh: MeshSettings,
    pub run: RunSettings,
    pub process: ProcessSettings,
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn binary(&self, key: BinaryKey) -> &BinarySetting {
        self.binaries.get(key)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.process.poll_interval_ms.max(1))
    }

    /// Resolves the executable for `key`: a standard setting searches
    /// `PATH`, a custom one must point at an existing file.
    pub fn resolve_binary(&self, key: BinaryKey) -> Option<PathBuf> {
        self.resolve_binary_in(key, env::var_os("PATH"))
    }

    pub fn resolve_binary_in(&self, key: BinaryKey, search_path: Option<OsString>) -> Option<PathBuf> {
        let setting = self.binary(key);
        if setting.standard {
            let found = find_in_path(key.executable(), search_path.as_deref());
            debug!(binary = %key, found = ?found, "standard binary lookup");
            found
        } else {
            setting.path.clone().filter(|p| p.is_file())
        }
    }
}

fn find_in_path(name: &str, search_path: Option<&std::ffi::OsStr>) -> Option<PathBuf> {
    let search_path = search_path?;
    env::split_paths(search_path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for environment variable '{name}': {message}")]
    InvalidEnvVar { name: String, message: String },
}

impl ConfigError {
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String>>;

/// Settings loader with builder pattern.
///
/// ```ignore
/// let settings = ConfigLoader::new()
///     .with_config_file("femrun.toml")
///     .skip_env_vars()
///     .load()?;
/// ```
pub struct ConfigLoader {
    config_file: Option<PathBuf>,
    skip_env: bool,
    env: EnvLookup,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_file: None,
            skip_env: false,
            env: Box::new(|name| env::var(name).ok()),
        }
    }

    /// Config file to layer over the defaults. A missing file is ignored.
    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Replaces the process environment as the source of overrides.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String> + 'static) -> Self {
        self.env = Box::new(lookup);
        self
    }

    pub fn load(&self) -> Result<Settings, ConfigError> {
        let mut settings = match &self.config_file {
            Some(path) => match load_file(path)? {
                Some(loaded) => {
                    debug!(path = %path.display(), "Loaded config file");
                    loaded
                }
                None => Settings::default(),
            },
            None => Settings::default(),
        };

        if !self.skip_env {
            self.apply_env_vars(&mut settings)?;
        }
        Ok(settings)
    }

    fn apply_env_vars(&self, settings: &mut Settings) -> Result<(), ConfigError> {
        for key in BinaryKey::ALL {
            let name = key.env_var();
            if let Some(value) = (self.env)(&name) {
                debug!(binary = %key, path = %value, "binary overridden from environment");
                *settings.binaries.get_mut(key) = BinarySetting::custom(value);
            }
        }
        if let Some(value) = (self.env)("FEMRUN_PURGE_STALE") {
            settings.run.purge_stale_outputs = parse_bool(&value)
                .ok_or_else(|| ConfigError::invalid_env_var("FEMRUN_PURGE_STALE", "expected bool"))?;
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("config_file", &self.config_file)
            .field("skip_env", &self.skip_env)
            .finish_non_exhaustive()
    }
}

fn load_file(path: &Path) -> Result<Option<Settings>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    let settings = Settings::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;
    Ok(Some(settings))
}

/// Accepts "true", "false", "1", "0", "yes", "no", "on", "off" (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
