//! Solver input writers and result readers.
//!
//! This crate provides:
//! - **Group assembly**: ordered, numbered groups from an analysis
//! - **gmsh `.geo`** scripts that tag one physical group per block
//! - **MoFEM meshset config** (`[block_N]` sections) writer
//! - **Elmer `case.sif`** writer
//! - **Universal condition templates** (JSON)
//! - **VTU / legacy VTK** result readers producing a [`ResultSet`]
//! - **JSON run manifest** and analysis description persistence

mod analysis_file;
pub mod elmer_sif;
pub mod error;
pub mod geo;
pub mod groups;
mod manifest;
pub mod mofem_config;
pub mod paths;
pub mod results;
pub mod universal;
mod values;

use std::fs;
use std::io;
use std::path::Path;

pub use analysis_file::{load_analysis, save_analysis};
pub use elmer_sif::{ElasticityOptions, SifDeck, SifOutput, write_sif};
pub use error::{ResultReadError, Result, WriterError};
pub use geo::GeoScript;
pub use groups::{AssembledGroup, BLOCK_ID_BASE, assemble_condition_groups};
pub use manifest::{ManifestMessage, MessageLevel, RunManifest, load_manifest, save_manifest};
pub use mofem_config::{render_mofem_config, write_mofem_config};
pub use paths::ArtifactPaths;
pub use results::{FieldLocation, ResultField, ResultFormat, ResultSet};
pub use universal::UniversalTemplate;
pub use values::format_number;

pub(crate) fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
