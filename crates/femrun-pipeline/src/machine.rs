//! The run state machine.
//!
//! A [`Machine`] owns the four stage tasks of one backend and drives them in
//! order against a [`RunContext`]. The first failing stage ends the run.
//! Cancellation is observed between stages and by the process supervisor
//! while a process runs.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use femrun_io::paths::manifest_path;
use femrun_io::{RunManifest, save_manifest};
use femrun_model::Analysis;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::PipelineError;
use crate::host::{GeometryExporter, HostDocument};
use crate::process::{NoopSpawner, Spawner, Supervisor, SystemSpawner};
use crate::report::{ReportSink, TeeReport};
use crate::settings::Settings;
use crate::solver::SolverObject;
use crate::task::{RunContext, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Checking,
    Preparing,
    Solving,
    CollectingResults,
    Succeeded,
    Failed,
    Aborted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed | RunState::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Checking => "checking",
            RunState::Preparing => "preparing",
            RunState::Solving => "solving",
            RunState::CollectingResults => "collecting_results",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
            RunState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a run borrows from its caller.
pub struct RunEnv<'a> {
    pub analysis: &'a Analysis,
    pub settings: &'a Settings,
    pub document: &'a mut dyn HostDocument,
    pub geometry: &'a dyn GeometryExporter,
    pub report: &'a dyn ReportSink,
    pub token: &'a CancellationToken,
}

pub struct Machine {
    directory: PathBuf,
    check: Box<dyn Task>,
    prepare: Box<dyn Task>,
    solve: Box<dyn Task>,
    results: Box<dyn Task>,
    test_mode: bool,
    spawner: Option<Arc<dyn Spawner>>,
    history: Vec<RunState>,
    result_file: Option<PathBuf>,
}

impl Machine {
    pub fn new(
        directory: impl Into<PathBuf>,
        check: Box<dyn Task>,
        prepare: Box<dyn Task>,
        solve: Box<dyn Task>,
        results: Box<dyn Task>,
        test_mode: bool,
    ) -> Self {
        Self {
            directory: directory.into(),
            check,
            prepare,
            solve,
            results,
            test_mode,
            spawner: None,
            history: vec![RunState::Pending],
            result_file: None,
        }
    }

    /// Replaces the spawner chosen from `test_mode`.
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    pub fn state(&self) -> RunState {
        self.history.last().copied().unwrap_or(RunState::Pending)
    }

    /// Every state visited so far, starting with `Pending`.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Result file loaded by the last successful Results stage.
    pub fn result_file(&self) -> Option<&Path> {
        self.result_file.as_deref()
    }

    /// Runs every stage and returns the terminal state.
    ///
    /// A machine runs once; calling `run` again returns the terminal state
    /// with a warning.
    pub fn run(&mut self, solver: &mut SolverObject, env: RunEnv<'_>) -> RunState {
        let current = self.state();
        if current.is_terminal() {
            env.report
                .warning(&format!("Run already finished with state {current}."));
            return current;
        }

        let started_at = Utc::now();
        let report = TeeReport::new(env.report);
        let spawner = self.spawner.clone().unwrap_or_else(|| -> Arc<dyn Spawner> {
            if self.test_mode {
                Arc::new(NoopSpawner)
            } else {
                Arc::new(SystemSpawner)
            }
        });
        let supervisor = Supervisor::new(spawner, env.settings.poll_interval());
        let directory = self.directory.clone();
        info!(
            solver = %solver.name,
            backend = %solver.backend,
            directory = %directory.display(),
            test_mode = self.test_mode,
            "starting run"
        );

        let (terminal, result_file) = {
            let mut ctx = RunContext::new(
                solver,
                env.analysis,
                &directory,
                env.token,
                &report,
                env.settings,
                env.document,
                env.geometry,
                &supervisor,
                self.test_mode,
            );
            let terminal = self.run_stages(&mut ctx);
            (terminal, ctx.result_file.take())
        };
        self.history.push(terminal);
        self.result_file = result_file;
        info!(state = %terminal, "run finished");

        self.write_manifest(env.analysis, solver, &report, started_at);
        terminal
    }

    fn run_stages(&mut self, ctx: &mut RunContext<'_>) -> RunState {
        let Machine {
            directory,
            check,
            prepare,
            solve,
            results,
            history,
            ..
        } = self;
        let stages: [(RunState, &dyn Task); 4] = [
            (RunState::Checking, check.as_ref()),
            (RunState::Preparing, prepare.as_ref()),
            (RunState::Solving, solve.as_ref()),
            (RunState::CollectingResults, results.as_ref()),
        ];

        for (state, task) in stages {
            if ctx.token.is_cancelled() {
                ctx.fail(&PipelineError::Aborted);
                return RunState::Aborted;
            }
            history.push(state);
            debug!(stage = %task.stage(), "entering stage");

            if state == RunState::Preparing
                && let Err(err) = fs::create_dir_all(&*directory)
            {
                ctx.fail(&PipelineError::working_directory(err));
                return RunState::Failed;
            }

            let failures = ctx.failures();
            match task.run(ctx) {
                Ok(()) => {}
                Err(PipelineError::Aborted) => {
                    ctx.fail(&PipelineError::Aborted);
                    return RunState::Aborted;
                }
                Err(err) => {
                    ctx.fail(&err);
                    return RunState::Failed;
                }
            }
            if ctx.failures() > failures {
                debug!(stage = %task.stage(), "stage reported failures");
                return RunState::Failed;
            }
        }
        RunState::Succeeded
    }

    fn write_manifest(
        &self,
        analysis: &Analysis,
        solver: &SolverObject,
        report: &TeeReport<'_>,
        started_at: chrono::DateTime<Utc>,
    ) {
        if !self.directory.is_dir() {
            return;
        }
        let mut manifest = RunManifest::new(&analysis.name, &solver.name, solver.backend, started_at);
        manifest.state = self.state().to_string();
        manifest.history = self.history.iter().map(|s| s.to_string()).collect();
        manifest.finished_at = Utc::now();
        manifest.messages = report.record.messages();
        manifest.result_file = self.result_file.clone();

        let path = manifest_path(&self.directory);
        if let Err(err) = save_manifest(&path, &manifest) {
            warn!(path = %path.display(), error = %err, "failed to write run manifest");
        }
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("directory", &self.directory)
            .field("test_mode", &self.test_mode)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}
