//! Group meshing through gmsh.
//!
//! The host geometry is exported to a temporary BREP, a `.geo` script tags
//! one physical group per assembled group, and gmsh meshes it into a raw
//! UNV file. The raw mesh is then converted into the backend's exchange
//! format. Intermediates live in a temporary directory that is removed on
//! every exit path.

use std::fs;

use femrun_io::paths::GROUP_SCRIPT;
use femrun_io::{ArtifactPaths, AssembledGroup, GeoScript, WriterError};
use femrun_model::MeshObject;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::report::ReportSink;
use crate::settings::{BinaryKey, HigherOrderPolicy};
use crate::task::RunContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Med,
    Unv,
}

impl MeshFormat {
    fn gmsh_name(self) -> &'static str {
        match self {
            MeshFormat::Med => "med",
            MeshFormat::Unv => "unv",
        }
    }
}

/// Element order to write after applying the configured higher-order policy.
pub fn effective_element_order(ctx: &RunContext<'_>, mesh: &MeshObject) -> Result<u8> {
    element_order_for(ctx.settings.mesh.higher_order, mesh, ctx.report)
}

/// Applies `policy` to the order requested by `mesh`.
pub fn element_order_for(
    policy: HigherOrderPolicy,
    mesh: &MeshObject,
    report: &dyn ReportSink,
) -> Result<u8> {
    if mesh.element_order <= 1 {
        return Ok(1);
    }
    match policy {
        HigherOrderPolicy::Reject => Err(WriterError::UnsupportedElementOrder(mesh.element_order).into()),
        HigherOrderPolicy::Downgrade => {
            report.warning(&format!(
                "Mesh {} requests element order {}, only first order is supported. Writing first order elements.",
                mesh.name, mesh.element_order
            ));
            Ok(1)
        }
    }
}

/// Meshes `mesh` with one physical group per entry of `groups` and writes
/// the result to `paths.mesh_file` in `format`.
pub fn generate_group_mesh(
    ctx: &RunContext<'_>,
    mesh: &MeshObject,
    groups: &[AssembledGroup],
    paths: &ArtifactPaths,
    format: MeshFormat,
    element_order: u8,
) -> Result<()> {
    let target = paths.mesh_file.as_path();
    let temp = tempfile::Builder::new()
        .prefix("femrun-mesh-")
        .tempdir()
        .map_err(PipelineError::working_directory)?;
    let geometry = temp.path().join("shape.brep");
    let raw_mesh = temp.path().join("raw.unv");
    let script_path = temp.path().join(GROUP_SCRIPT);

    ctx.geometry.export_brep(mesh, &geometry)?;
    let script = GeoScript {
        geometry: &geometry,
        raw_mesh: &raw_mesh,
        mesh,
        groups,
        element_order,
    }
    .render()?;
    fs::write(&script_path, &script)?;
    debug!(script = %script_path.display(), groups = groups.len(), "wrote gmsh script");

    if ctx.test_mode {
        fs::copy(&script_path, &paths.group_script)
            .map_err(PipelineError::working_directory)?;
    }

    let gmsh = ctx.binary(BinaryKey::Gmsh)?;
    let spec = ctx
        .command(gmsh.clone(), "mesh")
        .arg("-")
        .arg(script_path.display().to_string());
    let outcome = ctx.run_process(&spec)?;

    if !raw_mesh.is_file() {
        if ctx.test_mode {
            debug!("no raw mesh in test mode, skipping conversion");
            return Ok(());
        }
        return Err(PipelineError::Resource(format!(
            "gmsh produced no mesh, see {}",
            outcome.log_path.display()
        )));
    }

    match format {
        MeshFormat::Unv => {
            fs::copy(&raw_mesh, target)?;
        }
        MeshFormat::Med => {
            let spec = ctx
                .command(gmsh, "mesh_convert")
                .arg(raw_mesh.display().to_string())
                .arg("-save")
                .arg("-format")
                .arg(format.gmsh_name())
                .arg("-o")
                .arg(target.display().to_string());
            ctx.run_process(&spec)?;
        }
    }
    info!(mesh = %target.display(), "group mesh written");
    Ok(())
}
