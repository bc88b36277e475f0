use std::fs;
use std::io;
use std::path::Path;

use femrun_model::Analysis;

/// Reads an analysis description exported by the host as JSON.
pub fn load_analysis(path: impl AsRef<Path>) -> io::Result<Analysis> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

pub fn save_analysis(path: impl AsRef<Path>, analysis: &Analysis) -> io::Result<()> {
    let path = path.as_ref();
    crate::ensure_parent_dir(path)?;
    let bytes = serde_json::to_vec_pretty(analysis)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    fs::write(path, bytes)
}
