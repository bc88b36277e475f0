//! Stage tasks and the context they share during one run.

use std::fmt;
use std::path::{Path, PathBuf};

use femrun_io::ArtifactPaths;
use femrun_io::paths::log_path;
use femrun_model::{Analysis, MeshObject};
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::error::{PipelineError, Result};
use crate::host::{GeometryExporter, HostDocument};
use crate::process::{CommandSpec, ProcessOutcome, Supervisor};
use crate::report::ReportSink;
use crate::settings::{BinaryKey, Settings};
use crate::solver::SolverObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Check,
    Prepare,
    Solve,
    Results,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Check => "check",
            StageKind::Prepare => "prepare",
            StageKind::Solve => "solve",
            StageKind::Results => "results",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stateless strategy bound to one stage.
///
/// Returning an error fails the stage; the machine reports it. A task may
/// also call [`RunContext::fail`] itself to report several problems and keep
/// going.
pub trait Task {
    fn stage(&self) -> StageKind;
    fn run(&self, ctx: &mut RunContext<'_>) -> Result<()>;
}

/// Shared state handed to each stage.
pub struct RunContext<'a> {
    pub solver: &'a mut SolverObject,
    pub analysis: &'a Analysis,
    pub directory: &'a Path,
    pub token: &'a CancellationToken,
    pub report: &'a dyn ReportSink,
    pub settings: &'a Settings,
    pub document: &'a mut dyn HostDocument,
    pub geometry: &'a dyn GeometryExporter,
    pub supervisor: &'a Supervisor,
    pub test_mode: bool,
    /// Result file loaded by the Results stage.
    pub result_file: Option<PathBuf>,
    failures: usize,
}

impl<'a> RunContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        solver: &'a mut SolverObject,
        analysis: &'a Analysis,
        directory: &'a Path,
        token: &'a CancellationToken,
        report: &'a dyn ReportSink,
        settings: &'a Settings,
        document: &'a mut dyn HostDocument,
        geometry: &'a dyn GeometryExporter,
        supervisor: &'a Supervisor,
        test_mode: bool,
    ) -> Self {
        Self {
            solver,
            analysis,
            directory,
            token,
            report,
            settings,
            document,
            geometry,
            supervisor,
            test_mode,
            result_file: None,
            failures: 0,
        }
    }

    /// Reports `err` and marks the current stage as failed.
    pub fn fail(&mut self, err: &PipelineError) {
        self.failures += 1;
        match err {
            PipelineError::Aborted => self.report.status("Run aborted."),
            other => self.report.error(&other.to_string()),
        }
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn push_status(&self, message: &str) {
        self.report.status(message);
    }

    pub fn mesh(&self) -> Result<&'a MeshObject> {
        self.analysis
            .single_mesh()
            .ok_or_else(|| PipelineError::Validation("Analysis must contain exactly one mesh.".to_string()))
    }

    pub fn paths(&self) -> Result<ArtifactPaths> {
        let mesh = self.mesh()?;
        Ok(ArtifactPaths::for_backend(
            self.solver.backend,
            self.directory,
            &mesh.name,
        ))
    }

    /// Resolves an executable. In test mode an unresolved binary falls back
    /// to its bare name since nothing is spawned.
    pub fn binary(&self, key: BinaryKey) -> Result<PathBuf> {
        match self.settings.resolve_binary(key) {
            Some(path) => Ok(path),
            None if self.test_mode => {
                debug!(binary = %key, "unresolved binary in test mode");
                Ok(PathBuf::from(key.executable()))
            }
            None => Err(PipelineError::ExecutableNotFound(
                key.display_name().to_string(),
            )),
        }
    }

    /// Runs one supervised process in the run directory.
    pub fn run_process(&self, spec: &CommandSpec) -> Result<ProcessOutcome> {
        self.supervisor.run(spec, self.token)
    }

    /// A command running in the run directory with its log at
    /// `{dir}/{log}_log.txt`.
    pub fn command(&self, program: PathBuf, log: &str) -> CommandSpec {
        CommandSpec::new(program, self.directory, log_path(self.directory, log))
    }
}
