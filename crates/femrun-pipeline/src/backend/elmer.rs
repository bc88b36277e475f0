//! Elmer backend.
//!
//! Prepare meshes the analysis into `{mesh}.unv`, converts it with ElmerGrid
//! into the `{mesh}/` mesh database and writes `case.sif` plus the
//! `ELMERSOLVER_STARTINFO` file that points ElmerSolver at it.

use std::fs;
use std::path::PathBuf;

use femrun_io::elmer_sif::OUTPUT_STEM;
use femrun_io::paths::{ELMER_CASE, ELMER_STARTINFO};
use femrun_io::{ArtifactPaths, SifDeck, assemble_condition_groups, write_sif};
use tracing::info;

use crate::backend::common::{ignored_condition, publish_log, purge_stale};
use crate::error::Result;
use crate::meshing::{MeshFormat, effective_element_order, generate_group_mesh};
use crate::settings::BinaryKey;
use crate::task::{RunContext, StageKind, Task};

#[derive(Debug, Default, Clone, Copy)]
pub struct ElmerPrepare;

impl Task for ElmerPrepare {
    fn stage(&self) -> StageKind {
        StageKind::Prepare
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> Result<()> {
        ctx.push_status("Preparing files...");
        let mesh = ctx.mesh()?;
        let paths = ctx.paths()?;
        let groups = assemble_condition_groups(ctx.analysis)?;
        let order = effective_element_order(ctx, mesh)?;

        generate_group_mesh(ctx, mesh, &groups, &paths, MeshFormat::Unv, order)?;

        let grid = ctx.binary(BinaryKey::ElmerGrid)?;
        let spec = ctx.command(grid, "prepare").args([
            "8".to_string(),
            "2".to_string(),
            paths.mesh_file.display().to_string(),
            "-autoclean".to_string(),
            "-out".to_string(),
            paths.mesh_name.clone(),
        ]);
        ctx.run_process(&spec)?;

        let options = ctx.solver.elasticity_options();
        let deck = SifDeck {
            analysis: ctx.analysis,
            groups: &groups,
            mesh_db: &paths.mesh_name,
            options: &options,
        };
        let output = write_sif(&paths.input_file, &deck)?;
        for label in &output.ignored {
            ignored_condition(ctx, label);
        }
        fs::write(ctx.directory.join(ELMER_STARTINFO), format!("{ELMER_CASE}\n1\n"))?;
        info!(case = %paths.input_file.display(), ignored = output.ignored.len(), "Elmer case written");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ElmerSolve;

impl Task for ElmerSolve {
    fn stage(&self) -> StageKind {
        StageKind::Solve
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> Result<()> {
        ctx.push_status("Executing solver...");
        let binary = ctx.binary(BinaryKey::ElmerSolver)?;
        let paths = ctx.paths()?;
        purge_stale(ctx, &result_candidates(&paths))?;

        let spec = ctx.command(binary, "solve").arg(ELMER_CASE);
        let outcome = ctx.run_process(&spec)?;
        publish_log(ctx, &outcome.log_path)?;
        Ok(())
    }
}

/// Newer Elmer versions add a `_t` to the output name.
pub fn result_candidates(paths: &ArtifactPaths) -> Vec<PathBuf> {
    vec![
        paths.directory.join(format!("{OUTPUT_STEM}0001.vtu")),
        paths.directory.join(format!("{OUTPUT_STEM}_t0001.vtu")),
    ]
}
