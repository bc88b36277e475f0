//! Stages shared by both backends.

use std::fs;
use std::path::{Path, PathBuf};

use femrun_io::{ArtifactPaths, ResultSet};
use femrun_model::MeshGenerator;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::task::{RunContext, StageKind, Task};

/// Validates the analysis before anything is written.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckTask;

impl Task for CheckTask {
    fn stage(&self) -> StageKind {
        StageKind::Check
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> Result<()> {
        ctx.push_status("Checking analysis...");
        let analysis = ctx.analysis;

        match analysis.meshes.as_slice() {
            [] => ctx.fail(&PipelineError::Validation(
                "No mesh object defined in the analysis.".to_string(),
            )),
            [mesh] => {
                if mesh.generator != MeshGenerator::Gmsh {
                    debug!(mesh = %mesh.name, generator = %mesh.generator, "rejecting mesh");
                    ctx.fail(&PipelineError::Validation(
                        "Unsupported type of mesh. Mesh must be created with gmsh.".to_string(),
                    ));
                }
            }
            meshes => ctx.fail(&PipelineError::Validation(format!(
                "Exactly one mesh object is required, the analysis contains {}.",
                meshes.len()
            ))),
        }

        if analysis.materials.is_empty() {
            ctx.fail(&PipelineError::Validation(
                "No material object defined in the analysis.".to_string(),
            ));
        }

        let (equation, backend) = (ctx.solver.equation, ctx.solver.backend);
        if !equation.supported_by(backend) {
            ctx.fail(&PipelineError::Validation(format!(
                "The {equation} equation is not supported by {}.",
                backend.display_name()
            )));
        }
        Ok(())
    }
}

/// Where a backend leaves its result file, most preferred first.
pub type ResultCandidates = fn(&ArtifactPaths) -> Vec<PathBuf>;

/// Loads the first existing result candidate into the solver's result
/// container.
#[derive(Debug, Clone, Copy)]
pub struct ResultsTask {
    candidates: ResultCandidates,
}

impl ResultsTask {
    pub fn new(candidates: ResultCandidates) -> Self {
        Self { candidates }
    }
}

impl Task for ResultsTask {
    fn stage(&self) -> StageKind {
        StageKind::Results
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> Result<()> {
        ctx.push_status("Import new results...");
        let container = match ctx.solver.result {
            Some(id) if ctx.document.exists(id) => id,
            _ => {
                let id = ctx
                    .document
                    .create_result_container(&format!("{}Result", ctx.solver.name));
                ctx.solver.result = Some(id);
                id
            }
        };
        ctx.document.attach_to_analysis(&ctx.analysis.name, container);

        let paths = ctx.paths()?;
        let file = (self.candidates)(&paths)
            .into_iter()
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| PipelineError::ResultNotFound("Result file not found.".to_string()))?;

        let result = ResultSet::from_file(&file)?;
        info!(
            file = %file.display(),
            points = result.points.len(),
            cells = result.cell_count,
            fields = result.fields.len(),
            "loaded result"
        );
        ctx.document.load_result(container, result);
        ctx.document.touch_last_post_object(container);
        ctx.document.recompute();
        ctx.result_file = Some(file);
        Ok(())
    }
}

/// Pushes the solver log to the host as a text object, created on first use.
pub(crate) fn publish_log(ctx: &mut RunContext<'_>, log_path: &Path) -> Result<()> {
    let text = fs::read_to_string(log_path)?;
    let id = match ctx.solver.output {
        Some(id) if ctx.document.exists(id) => id,
        _ => {
            let id = ctx
                .document
                .create_text_object(&format!("{}Output", ctx.solver.name));
            ctx.solver.output = Some(id);
            id
        }
    };
    ctx.document.attach_to_analysis(&ctx.analysis.name, id);
    ctx.document.set_text(id, &text);
    Ok(())
}

/// Removes outputs of earlier runs so Results never loads a stale file.
pub(crate) fn purge_stale(ctx: &RunContext<'_>, stale: &[PathBuf]) -> Result<()> {
    if !ctx.settings.run.purge_stale_outputs {
        return Ok(());
    }
    for path in stale {
        let removed = if path.is_dir() {
            fs::remove_dir_all(path)
        } else if path.is_file() {
            fs::remove_file(path)
        } else {
            continue;
        };
        removed?;
        debug!(path = %path.display(), "removed stale output");
    }
    Ok(())
}

pub(crate) fn ignored_condition(ctx: &RunContext<'_>, label: &str) {
    ctx.report.warning(&format!("Ignored constraint {label}."));
}
