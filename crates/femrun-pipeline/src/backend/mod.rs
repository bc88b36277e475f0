//! Stage tasks bound to each solver backend.

mod common;
pub mod elmer;
pub mod mofem;

use std::path::PathBuf;

use femrun_model::Backend;

pub use common::{CheckTask, ResultCandidates, ResultsTask};
pub use elmer::{ElmerPrepare, ElmerSolve};
pub use mofem::{MofemPrepare, MofemSolve};

use crate::machine::Machine;
use crate::solver::SolverObject;

/// Builds the machine that runs `solver`'s backend in `directory`.
pub fn create_machine(solver: &SolverObject, directory: impl Into<PathBuf>, test_mode: bool) -> Machine {
    match solver.backend {
        Backend::Elmer => Machine::new(
            directory,
            Box::new(CheckTask),
            Box::new(ElmerPrepare),
            Box::new(ElmerSolve),
            Box::new(ResultsTask::new(elmer::result_candidates)),
            test_mode,
        ),
        Backend::Mofem => Machine::new(
            directory,
            Box::new(CheckTask),
            Box::new(MofemPrepare),
            Box::new(MofemSolve),
            Box::new(ResultsTask::new(mofem::result_candidates)),
            test_mode,
        ),
    }
}

/// Result files a run of `backend` would load, most preferred first.
pub fn result_candidates(backend: Backend, paths: &femrun_io::ArtifactPaths) -> Vec<PathBuf> {
    match backend {
        Backend::Elmer => elmer::result_candidates(paths),
        Backend::Mofem => mofem::result_candidates(paths),
    }
}
