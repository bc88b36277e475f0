//! Error types for femrun-pipeline

use std::path::PathBuf;

use femrun_io::{ResultReadError, WriterError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Everything that can end a stage. Each variant is reported once through
/// the report sink by the machine.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Writer(#[from] WriterError),

    #[error("{0}")]
    Resource(String),

    #[error("{0} executable not found.")]
    ExecutableNotFound(String),

    #[error("{program} failed with exit code {code}, see {}", log.display())]
    ProcessFailure {
        program: String,
        code: String,
        log: PathBuf,
    },

    #[error("{0}")]
    ResultNotFound(String),

    #[error("Run aborted")]
    Aborted,

    #[error("Result file could not be read: {0}")]
    ResultRead(#[from] ResultReadError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// The working directory could not be created or written.
    pub fn working_directory(err: std::io::Error) -> Self {
        tracing::debug!(error = %err, "working directory inaccessible");
        PipelineError::Resource("Can't access working directory.".to_string())
    }
}
