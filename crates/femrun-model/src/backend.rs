use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::quantity::UnitSystem;

/// External solver family a run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Elmer,
    Mofem,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::Elmer, Backend::Mofem];

    pub fn name(self) -> &'static str {
        match self {
            Backend::Elmer => "elmer",
            Backend::Mofem => "mofem",
        }
    }

    /// Display name used in host object labels, e.g. `MoFEMResult`.
    pub fn display_name(self) -> &'static str {
        match self {
            Backend::Elmer => "Elmer",
            Backend::Mofem => "MoFEM",
        }
    }

    /// Unit system the backend's input decks are written in.
    pub fn unit_system(self) -> UnitSystem {
        match self {
            Backend::Elmer => UnitSystem::Si,
            Backend::Mofem => UnitSystem::MmNewtonMpa,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "elmer" => Ok(Backend::Elmer),
            "mofem" => Ok(Backend::Mofem),
            other => Err(format!("unknown backend '{other}' (expected elmer or mofem)")),
        }
    }
}
