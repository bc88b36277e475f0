use std::path::{Path, PathBuf};

use femrun_model::Backend;

pub const RESULTS_DIR: &str = "results_vtk";
pub const GROUP_SCRIPT: &str = "group_mesh.geo";
pub const MANIFEST_FILE: &str = "run_manifest.json";
pub const ELMER_CASE: &str = "case.sif";
pub const ELMER_STARTINFO: &str = "ELMERSOLVER_STARTINFO";

/// Locations of every artifact a run writes into its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub directory: PathBuf,
    pub mesh_name: String,
    /// Exchange mesh written by gmsh (`.med` for MoFEM, `.unv` for Elmer).
    pub mesh_file: PathBuf,
    /// Solver input deck (`.config` block file or `case.sif`).
    pub input_file: PathBuf,
    /// Mesh in the solver's native form (`.h5m` file or ElmerGrid directory).
    pub solver_mesh: PathBuf,
    pub output_dir: PathBuf,
    pub results_dir: PathBuf,
    pub group_script: PathBuf,
}

impl ArtifactPaths {
    pub fn for_backend(backend: Backend, dir: impl AsRef<Path>, mesh_name: &str) -> Self {
        let dir = dir.as_ref();
        let (mesh_file, input_file, solver_mesh) = match backend {
            Backend::Mofem => (
                dir.join(format!("{mesh_name}.med")),
                dir.join(format!("{mesh_name}.config")),
                dir.join(format!("{mesh_name}.h5m")),
            ),
            Backend::Elmer => (
                dir.join(format!("{mesh_name}.unv")),
                dir.join(ELMER_CASE),
                dir.join(mesh_name),
            ),
        };
        Self {
            directory: dir.to_path_buf(),
            mesh_name: mesh_name.to_string(),
            mesh_file,
            input_file,
            solver_mesh,
            output_dir: dir.join(format!("output_{}", backend.name())),
            results_dir: dir.join(RESULTS_DIR),
            group_script: dir.join(GROUP_SCRIPT),
        }
    }
}

/// `{dir}/{stage}_log.txt`
pub fn log_path(dir: &Path, stage: &str) -> PathBuf {
    dir.join(format!("{stage}_log.txt"))
}

/// `{dir}/run_manifest.json`, independent of the mesh.
pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mofem_layout_uses_mesh_basename() {
        let paths = ArtifactPaths::for_backend(Backend::Mofem, "/run", "BoxMesh");
        assert_eq!(paths.mesh_file, PathBuf::from("/run/BoxMesh.med"));
        assert_eq!(paths.input_file, PathBuf::from("/run/BoxMesh.config"));
        assert_eq!(paths.solver_mesh, PathBuf::from("/run/BoxMesh.h5m"));
        assert_eq!(paths.output_dir, PathBuf::from("/run/output_mofem"));
        assert_eq!(log_path(&paths.directory, "solve"), PathBuf::from("/run/solve_log.txt"));
        assert_eq!(manifest_path(&paths.directory), PathBuf::from("/run/run_manifest.json"));
    }

    #[test]
    fn elmer_layout_uses_case_file() {
        let paths = ArtifactPaths::for_backend(Backend::Elmer, "/run", "BoxMesh");
        assert_eq!(paths.mesh_file, PathBuf::from("/run/BoxMesh.unv"));
        assert_eq!(paths.input_file, PathBuf::from("/run/case.sif"));
        assert_eq!(paths.solver_mesh, PathBuf::from("/run/BoxMesh"));
    }
}
