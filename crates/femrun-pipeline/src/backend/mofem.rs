//! MoFEM backend.
//!
//! Prepare meshes the analysis into `{mesh}.med`, writes the meshset config
//! and lets `read_med` build the `{mesh}.h5m` solver mesh. Solve runs the
//! elasticity (or bone remodelling) binary, moves every `out*.h5m` into
//! `output_mofem/` and converts each one to legacy VTK under `results_vtk/`.

use std::fs;
use std::path::{Path, PathBuf};

use femrun_io::{ArtifactPaths, assemble_condition_groups, write_mofem_config};
use tracing::{debug, info};

use crate::backend::common::{publish_log, purge_stale};
use crate::error::{PipelineError, Result};
use crate::meshing::{MeshFormat, effective_element_order, generate_group_mesh};
use crate::settings::BinaryKey;
use crate::solver::EquationKind;
use crate::task::{RunContext, StageKind, Task};

const OUTPUT_PREFIX: &str = "out";
const OUTPUT_EXTENSION: &str = "h5m";

#[derive(Debug, Default, Clone, Copy)]
pub struct MofemPrepare;

impl Task for MofemPrepare {
    fn stage(&self) -> StageKind {
        StageKind::Prepare
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> Result<()> {
        ctx.push_status("Preparing files...");
        let mesh = ctx.mesh()?;
        let paths = ctx.paths()?;
        let groups = assemble_condition_groups(ctx.analysis)?;
        let order = effective_element_order(ctx, mesh)?;

        generate_group_mesh(ctx, mesh, &groups, &paths, MeshFormat::Med, order)?;
        write_mofem_config(
            &paths.input_file,
            ctx.analysis,
            &groups,
            ctx.solver.backend.unit_system(),
        )?;
        info!(config = %paths.input_file.display(), blocks = groups.len(), "meshset config written");

        let read_med = ctx.binary(BinaryKey::MofemReadMed)?;
        let med = path_arg(&paths.mesh_file);
        let list = ctx
            .command(read_med.clone(), "meshsets")
            .args(["-med_file", med.as_str()]);
        ctx.run_process(&list)?;

        let convert = ctx.command(read_med, "prepare").args([
            "-med_file",
            med.as_str(),
            "-meshsets_config",
            path_arg(&paths.input_file).as_str(),
            "-output_file",
            path_arg(&paths.solver_mesh).as_str(),
        ]);
        ctx.run_process(&convert)?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MofemSolve;

impl Task for MofemSolve {
    fn stage(&self) -> StageKind {
        StageKind::Solve
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> Result<()> {
        ctx.push_status("Executing solver...");
        let key = match ctx.solver.equation {
            EquationKind::Elasticity => BinaryKey::MofemElasticity,
            EquationKind::BoneRemodelling => BinaryKey::MofemBone,
        };
        let binary = ctx.binary(key)?;
        let paths = ctx.paths()?;

        let mut stale = vec![paths.output_dir.clone(), paths.results_dir.clone()];
        stale.extend(solver_outputs(ctx.directory)?);
        purge_stale(ctx, &stale)?;

        let order = ctx.solver.approximation_order().to_string();
        let spec = ctx.command(binary, "solve").args([
            "-my_file",
            path_arg(&paths.solver_mesh).as_str(),
            "-my_order",
            order.as_str(),
        ]);
        let outcome = ctx.run_process(&spec)?;
        publish_log(ctx, &outcome.log_path)?;

        let outputs = solver_outputs(ctx.directory)?;
        if outputs.is_empty() {
            if ctx.test_mode {
                ctx.report.warning("No results found");
                return Ok(());
            }
            return Err(PipelineError::ResultNotFound("No results found".to_string()));
        }
        convert_outputs(ctx, &paths, &outputs)
    }
}

/// Moves solver outputs into `output_mofem/` and converts each to VTK.
fn convert_outputs(ctx: &RunContext<'_>, paths: &ArtifactPaths, outputs: &[PathBuf]) -> Result<()> {
    fs::create_dir_all(&paths.output_dir)?;
    fs::create_dir_all(&paths.results_dir)?;
    let mbconvert = ctx.binary(BinaryKey::Mbconvert)?;

    for output in outputs {
        let Some(file_name) = output.file_name() else {
            continue;
        };
        let moved = paths.output_dir.join(file_name);
        fs::rename(output, &moved)?;

        let stem = moved
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| OUTPUT_PREFIX.to_string());
        let vtk = paths.results_dir.join(format!("{stem}.vtk"));
        let spec = ctx
            .command(mbconvert.clone(), &format!("convert_{stem}"))
            .args([path_arg(&moved), path_arg(&vtk)]);
        ctx.run_process(&spec)?;
        debug!(output = %moved.display(), vtk = %vtk.display(), "converted solver output");
    }
    info!(count = outputs.len(), "solver outputs converted");
    Ok(())
}

/// `out*.h5m` files in `directory`, sorted by name.
fn solver_outputs(directory: &Path) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Ok(Vec::new());
    }
    let mut outputs = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if is_solver_output(&path) {
            outputs.push(path);
        }
    }
    outputs.sort();
    Ok(outputs)
}

fn is_solver_output(path: &Path) -> bool {
    let named = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(OUTPUT_PREFIX));
    named
        && path.extension().and_then(|e| e.to_str()) == Some(OUTPUT_EXTENSION)
        && path.is_file()
}

/// Converted results, preferring `out.vtk` and `out_0.vtk`.
pub fn result_candidates(paths: &ArtifactPaths) -> Vec<PathBuf> {
    let mut candidates = vec![
        paths.results_dir.join("out.vtk"),
        paths.results_dir.join("out_0.vtk"),
    ];
    if let Ok(entries) = fs::read_dir(&paths.results_dir) {
        let mut rest: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("vtk"))
            .filter(|p| !candidates.contains(p))
            .collect();
        rest.sort();
        candidates.extend(rest);
    }
    candidates
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use femrun_model::Backend;

    #[test]
    fn solver_outputs_match_prefix_and_extension() {
        let dir = tempfile::tempdir().expect("temp dir");
        for name in ["out_1.h5m", "out_0.h5m", "BoxMesh.h5m", "out.vtk", "output.h5m"] {
            fs::write(dir.path().join(name), "").expect("write file");
        }
        fs::create_dir(dir.path().join("out_dir.h5m")).expect("create dir");

        let names: Vec<String> = solver_outputs(dir.path())
            .expect("list outputs")
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(names, vec!["out_0.h5m", "out_1.h5m", "output.h5m"]);
    }

    #[test]
    fn candidates_prefer_out_then_sorted_rest() {
        let dir = tempfile::tempdir().expect("temp dir");
        let paths = ArtifactPaths::for_backend(Backend::Mofem, dir.path(), "BoxMesh");
        fs::create_dir_all(&paths.results_dir).expect("results dir");
        for name in ["out_2.vtk", "out_0.vtk", "out_1.vtk", "notes.txt"] {
            fs::write(paths.results_dir.join(name), "").expect("write file");
        }

        let candidates = result_candidates(&paths);
        assert_eq!(
            candidates,
            vec![
                paths.results_dir.join("out.vtk"),
                paths.results_dir.join("out_0.vtk"),
                paths.results_dir.join("out_1.vtk"),
                paths.results_dir.join("out_2.vtk"),
            ]
        );
    }
}
