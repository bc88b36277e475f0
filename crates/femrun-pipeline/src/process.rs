//! External process launch and supervision.
//!
//! A [`Supervisor`] starts one process through a [`Spawner`], registers its
//! termination with the run's [`CancellationToken`] for as long as it waits,
//! and polls for completion. Output goes to a per-stage log file.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::{PipelineError, Result};

/// One external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Receives stdout and stderr.
    pub log_path: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>, log_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            log_path: log_path.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// File name of the program, used in messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Exit state of a finished process. `code` is `None` when it was killed by
/// a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(self) -> bool {
        self.code == Some(0)
    }
}

pub trait ProcessHandle: Send {
    fn id(&self) -> Option<u32>;
    /// Non-blocking completion check.
    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>>;
    fn terminate(&mut self) -> io::Result<()>;
}

pub trait Spawner: Send + Sync {
    fn spawn(&self, spec: &CommandSpec) -> io::Result<Box<dyn ProcessHandle>>;
}

/// Launches real OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpawner;

impl Spawner for SystemSpawner {
    fn spawn(&self, spec: &CommandSpec) -> io::Result<Box<dyn ProcessHandle>> {
        let log = File::create(&spec.log_path)?;
        let err_log = log.try_clone()?;
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(err_log))
            .spawn()?;
        Ok(Box::new(ChildHandle(child)))
    }
}

struct ChildHandle(Child);

impl ProcessHandle for ChildHandle {
    fn id(&self) -> Option<u32> {
        Some(self.0.id())
    }

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(self.0.try_wait()?.map(|status| ProcessExit {
            code: status.code(),
        }))
    }

    fn terminate(&mut self) -> io::Result<()> {
        match self.0.kill() {
            // already exited
            Err(err) if err.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }
}

/// Spawner used in test mode: writes the command line to the log and
/// reports immediate success without running anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSpawner;

impl Spawner for NoopSpawner {
    fn spawn(&self, spec: &CommandSpec) -> io::Result<Box<dyn ProcessHandle>> {
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&spec.log_path)?;
        writeln!(log, "test mode, not executed: {spec}")?;
        Ok(Box::new(FinishedHandle))
    }
}

struct FinishedHandle;

impl ProcessHandle for FinishedHandle {
    fn id(&self) -> Option<u32> {
        None
    }

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(Some(ProcessExit { code: Some(0) }))
    }

    fn terminate(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Successful completion of a supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub exit: ProcessExit,
    pub log_path: PathBuf,
}

#[derive(Clone)]
pub struct Supervisor {
    spawner: Arc<dyn Spawner>,
    poll_interval: Duration,
}

impl Supervisor {
    pub fn new(spawner: Arc<dyn Spawner>, poll_interval: Duration) -> Self {
        Self {
            spawner,
            poll_interval,
        }
    }

    /// Runs `spec` to completion.
    ///
    /// Cancellation terminates the process and yields
    /// [`PipelineError::Aborted`]; a non-zero exit yields
    /// [`PipelineError::ProcessFailure`] naming the log file.
    pub fn run(&self, spec: &CommandSpec, token: &CancellationToken) -> Result<ProcessOutcome> {
        if token.is_cancelled() {
            return Err(PipelineError::Aborted);
        }
        ensure_parent_dir(&spec.log_path)?;

        info!(command = %spec, cwd = %spec.cwd.display(), "launching process");
        let handle = match self.spawner.spawn(spec) {
            Ok(handle) => Arc::new(Mutex::new(handle)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(PipelineError::ExecutableNotFound(spec.program_name()));
            }
            Err(err) => return Err(err.into()),
        };
        let pid = handle.lock().id();

        let registration = {
            let handle = Arc::clone(&handle);
            token.register(move || {
                if let Err(err) = handle.lock().terminate() {
                    warn!(error = %err, "failed to terminate process");
                }
            })
        };

        let exit = loop {
            let polled = handle.lock().try_wait();
            match polled {
                Ok(Some(exit)) => break exit,
                Ok(None) => thread::sleep(self.poll_interval),
                Err(err) => {
                    drop(registration);
                    return Err(err.into());
                }
            }
        };
        drop(registration);

        debug!(?pid, code = ?exit.code, "process finished");
        if token.is_cancelled() {
            info!(command = %spec, "process terminated by cancellation");
            return Err(PipelineError::Aborted);
        }
        if !exit.success() {
            return Err(PipelineError::ProcessFailure {
                program: spec.program_name(),
                code: exit
                    .code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none (signal)".to_string()),
                log: spec.log_path.clone(),
            });
        }
        Ok(ProcessOutcome {
            exit,
            log_path: spec.log_path.clone(),
        })
    }
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Never finishes until terminated.
    struct Hanging {
        terminated: Arc<AtomicBool>,
    }

    impl ProcessHandle for Hanging {
        fn id(&self) -> Option<u32> {
            Some(4242)
        }

        fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
            if self.terminated.load(Ordering::SeqCst) {
                Ok(Some(ProcessExit { code: None }))
            } else {
                Ok(None)
            }
        }

        fn terminate(&mut self) -> io::Result<()> {
            self.terminated.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct HangingSpawner {
        terminated: Arc<AtomicBool>,
    }

    impl Spawner for HangingSpawner {
        fn spawn(&self, _spec: &CommandSpec) -> io::Result<Box<dyn ProcessHandle>> {
            Ok(Box::new(Hanging {
                terminated: Arc::clone(&self.terminated),
            }))
        }
    }

    struct ExitWith(i32);

    impl Spawner for ExitWith {
        fn spawn(&self, _spec: &CommandSpec) -> io::Result<Box<dyn ProcessHandle>> {
            struct Done(i32);
            impl ProcessHandle for Done {
                fn id(&self) -> Option<u32> {
                    None
                }
                fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
                    Ok(Some(ProcessExit { code: Some(self.0) }))
                }
                fn terminate(&mut self) -> io::Result<()> {
                    Ok(())
                }
            }
            Ok(Box::new(Done(self.0)))
        }
    }

    fn spec(dir: &Path) -> CommandSpec {
        CommandSpec::new("/opt/solver/bin/ElmerSolver", dir, dir.join("solve_log.txt")).arg("case.sif")
    }

    #[test]
    fn cancellation_terminates_waiting_process() {
        let dir = tempfile::tempdir().expect("temp dir");
        let terminated = Arc::new(AtomicBool::new(false));
        let supervisor = Supervisor::new(
            Arc::new(HangingSpawner {
                terminated: Arc::clone(&terminated),
            }),
            Duration::from_millis(5),
        );
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                token.cancel();
            })
        };

        let err = supervisor
            .run(&spec(dir.path()), &token)
            .expect_err("cancelled run should fail");
        canceller.join().expect("canceller thread");

        assert!(matches!(err, PipelineError::Aborted));
        assert!(terminated.load(Ordering::SeqCst));
        assert_eq!(token.registered_count(), 0);
    }

    #[test]
    fn non_zero_exit_reports_log_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let supervisor = Supervisor::new(Arc::new(ExitWith(3)), Duration::from_millis(1));
        let err = supervisor
            .run(&spec(dir.path()), &CancellationToken::new())
            .expect_err("exit code 3 should fail");
        match err {
            PipelineError::ProcessFailure { program, code, log } => {
                assert_eq!(program, "ElmerSolver");
                assert_eq!(code, "3");
                assert_eq!(log, dir.path().join("solve_log.txt"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn noop_spawner_logs_command_line() {
        let dir = tempfile::tempdir().expect("temp dir");
        let supervisor = Supervisor::new(Arc::new(NoopSpawner), Duration::from_millis(1));
        let outcome = supervisor
            .run(&spec(dir.path()), &CancellationToken::new())
            .expect("noop run should succeed");
        assert!(outcome.exit.success());
        let log = fs::read_to_string(outcome.log_path).expect("log should exist");
        assert!(log.contains("/opt/solver/bin/ElmerSolver case.sif"));
    }

    #[test]
    fn missing_program_is_reported_as_not_found() {
        let dir = tempfile::tempdir().expect("temp dir");
        let supervisor = Supervisor::new(Arc::new(SystemSpawner), Duration::from_millis(1));
        let spec = CommandSpec::new(
            dir.path().join("no-such-solver"),
            dir.path(),
            dir.path().join("solve_log.txt"),
        );
        let err = supervisor
            .run(&spec, &CancellationToken::new())
            .expect_err("missing program should fail");
        assert!(matches!(err, PipelineError::ExecutableNotFound(ref name) if name == "no-such-solver"));
    }

    #[test]
    fn already_cancelled_token_prevents_spawn() {
        let dir = tempfile::tempdir().expect("temp dir");
        let supervisor = Supervisor::new(Arc::new(ExitWith(0)), Duration::from_millis(1));
        let token = CancellationToken::new();
        token.cancel();
        let err = supervisor
            .run(&spec(dir.path()), &token)
            .expect_err("cancelled token should abort");
        assert!(matches!(err, PipelineError::Aborted));
        assert!(!dir.path().join("solve_log.txt").exists());
    }
}
