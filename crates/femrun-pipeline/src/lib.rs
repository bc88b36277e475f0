//! Staged run pipeline for external FEM solvers.
//!
//! This crate provides:
//! - **Machine**: Check → Prepare → Solve → Results with a visited-state history
//! - **Backends**: stage tasks for Elmer and MoFEM
//! - **Process supervision** with per-stage log files and cancellation
//! - **Host traits** for the document and geometry kernel, with in-memory versions
//! - **Solver property schemas** and layered TOML **settings**
//!
//! ```rust,no_run
//! use femrun_model::Backend;
//! use femrun_pipeline::{
//!     CancellationToken, EquationKind, FileGeometry, InMemoryDocument, RunEnv, Settings,
//!     SolverObject, TracingReport, create_machine,
//! };
//!
//! let analysis = femrun_io::load_analysis("analysis.json")?;
//! let mut solver = SolverObject::new("SolverElmer", Backend::Elmer, EquationKind::Elasticity);
//! let mut machine = create_machine(&solver, "run", false);
//! let mut document = InMemoryDocument::new();
//! let state = machine.run(
//!     &mut solver,
//!     RunEnv {
//!         analysis: &analysis,
//!         settings: &Settings::default(),
//!         document: &mut document,
//!         geometry: &FileGeometry::default(),
//!         report: &TracingReport,
//!         token: &CancellationToken::new(),
//!     },
//! );
//! println!("run finished: {state}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backend;
pub mod cancel;
pub mod error;
pub mod host;
pub mod machine;
pub mod meshing;
pub mod process;
pub mod report;
pub mod schema;
pub mod settings;
pub mod solver;
pub mod task;

pub use backend::{create_machine, result_candidates};
pub use cancel::{CancellationToken, Registration};
pub use error::{PipelineError, Result};
pub use host::{
    FileGeometry, GeometryExporter, HostDocument, HostObject, HostObjectKind, InMemoryDocument,
    ObjectId,
};
pub use machine::{Machine, RunEnv, RunState};
pub use process::{
    CommandSpec, NoopSpawner, ProcessExit, ProcessHandle, ProcessOutcome, Spawner, Supervisor,
    SystemSpawner,
};
pub use report::{RecordingReport, ReportSink, TracingReport};
pub use schema::{FieldKind, FieldSpec, FieldValue, PropertySchema, SchemaError, SolverRecord};
pub use settings::{
    BinaryKey, BinarySetting, ConfigError, ConfigLoader, DEFAULT_CONFIG_FILE, HigherOrderPolicy,
    Settings,
};
pub use solver::{EquationKind, SolverObject};
pub use task::{RunContext, StageKind, Task};
