//! femrun - run Elmer and MoFEM analyses described in a JSON file.
//!
//! # Configuration
//!
//! Settings are layered, lowest priority first:
//!
//! 1. Default values
//! 2. Config file (`--config`, or `femrun.toml` in the current directory)
//! 3. Environment variables (`FEMRUN_BIN_<KEY>`, `FEMRUN_PURGE_STALE`)
//!
//! Logging follows `RUST_LOG` and defaults to `info`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use femrun_io::{
    ArtifactPaths, ElasticityOptions, GeoScript, SifDeck, UniversalTemplate,
    assemble_condition_groups, load_analysis, load_manifest, write_mofem_config, write_sif,
};
use femrun_model::{Analysis, Backend};
use femrun_pipeline::backend::CheckTask;
use femrun_pipeline::meshing::element_order_for;
use femrun_pipeline::{
    BinaryKey, CancellationToken, ConfigLoader, DEFAULT_CONFIG_FILE, EquationKind, FieldValue,
    FileGeometry, InMemoryDocument, NoopSpawner, RunContext, RunEnv, RunState, Settings,
    SolverObject, Supervisor, Task, TracingReport, create_machine,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "femrun")]
#[command(version, about = "Run FEM analyses with Elmer or MoFEM", long_about = None)]
struct Cli {
    /// Settings file (default: femrun.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run Check, Prepare, Solve and Results for an analysis.
    Run {
        #[command(flatten)]
        target: Target,

        /// Run directory.
        #[arg(long, default_value = "femrun_out")]
        dir: PathBuf,

        /// Write inputs and logs without launching any process.
        #[arg(long)]
        test_mode: bool,

        /// Solver property override, e.g. `CalculateStresses=true`.
        #[arg(long = "set", value_name = "NAME=VALUE")]
        properties: Vec<String>,
    },

    /// Validate an analysis without writing anything.
    Check {
        #[command(flatten)]
        target: Target,
    },

    /// Write the solver input deck and gmsh script only.
    Write {
        #[command(flatten)]
        target: Target,

        #[arg(long, default_value = "femrun_out")]
        dir: PathBuf,
    },

    /// Show how every external binary resolves.
    Binaries,

    /// Print the manifest of a finished run.
    Status {
        /// Run directory.
        dir: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct Target {
    /// Analysis description (JSON).
    analysis: PathBuf,

    #[arg(long, value_enum, default_value_t = BackendArg::Elmer)]
    backend: BackendArg,

    #[arg(long, value_enum, default_value_t = EquationArg::Elasticity)]
    equation: EquationArg,

    /// JSON template filling the parameters of universal conditions.
    #[arg(long, value_name = "JSON")]
    bc_template: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendArg {
    Elmer,
    Mofem,
}

impl From<BackendArg> for Backend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Elmer => Backend::Elmer,
            BackendArg::Mofem => Backend::Mofem,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EquationArg {
    Elasticity,
    BoneRemodelling,
}

impl From<EquationArg> for EquationKind {
    fn from(value: EquationArg) -> Self {
        match value {
            EquationArg::Elasticity => EquationKind::Elasticity,
            EquationArg::BoneRemodelling => EquationKind::BoneRemodelling,
        }
    }
}

impl Target {
    fn load(&self) -> Result<(Analysis, SolverObject, FileGeometry)> {
        let mut analysis = load_analysis(&self.analysis)
            .with_context(|| format!("failed to read analysis {}", self.analysis.display()))?;
        if let Some(path) = &self.bc_template {
            let template = UniversalTemplate::from_file(path)
                .with_context(|| format!("failed to read template {}", path.display()))?;
            let filled = template.apply(&mut analysis)?;
            info!(template = %path.display(), filled, "applied universal condition template");
        }
        let backend = Backend::from(self.backend);
        let solver = SolverObject::new(
            format!("Solver{}", backend.display_name()),
            backend,
            self.equation.into(),
        );
        let base = self
            .analysis
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok((analysis, solver, FileGeometry::new(base)))
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    let settings = load_settings(cli.config.as_deref())?;
    match cli.command {
        Command::Run {
            target,
            dir,
            test_mode,
            properties,
        } => run(&target, &dir, test_mode, &properties, &settings),
        Command::Check { target } => check(&target, &settings),
        Command::Write { target, dir } => write(&target, &dir, &settings),
        Command::Binaries => {
            binaries(&settings);
            Ok(ExitCode::SUCCESS)
        }
        Command::Status { dir } => status(&dir),
    }
}

fn load_settings(config: Option<&Path>) -> Result<Settings> {
    let path = config.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    if config.is_some() && !path.exists() {
        bail!("config file {} does not exist", path.display());
    }
    let settings = ConfigLoader::new().with_config_file(path).load()?;
    Ok(settings)
}

fn run(
    target: &Target,
    dir: &Path,
    test_mode: bool,
    properties: &[String],
    settings: &Settings,
) -> Result<ExitCode> {
    let (analysis, mut solver, geometry) = target.load()?;
    for assignment in properties {
        let (name, value) = parse_property(assignment)?;
        solver
            .properties
            .set(name, value)
            .with_context(|| format!("invalid property '{assignment}'"))?;
    }

    let mut machine = create_machine(&solver, dir, test_mode);
    let mut document = InMemoryDocument::new();
    let token = CancellationToken::new();
    let state = machine.run(
        &mut solver,
        RunEnv {
            analysis: &analysis,
            settings,
            document: &mut document,
            geometry: &geometry,
            report: &TracingReport,
            token: &token,
        },
    );

    println!("state: {state}");
    if let Some(result) = solver.result.and_then(|id| document.latest_result(id)) {
        println!("result: {}", result.source.display());
        println!("points: {}", result.points.len());
        println!("cells: {}", result.cell_count);
        for field in &result.fields {
            println!("field: {} ({} components)", field.name, field.components);
        }
    }
    Ok(match state {
        RunState::Succeeded => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

/// `NAME=VALUE`, where VALUE is read as JSON when possible.
fn parse_property(assignment: &str) -> Result<(&str, FieldValue)> {
    let Some((name, raw)) = assignment.split_once('=') else {
        bail!("expected NAME=VALUE, got '{assignment}'");
    };
    let value = serde_json::from_str(raw).unwrap_or_else(|_| FieldValue::Text(raw.to_string()));
    Ok((name.trim(), value))
}

fn check(target: &Target, settings: &Settings) -> Result<ExitCode> {
    let (analysis, mut solver, geometry) = target.load()?;
    let mut document = InMemoryDocument::new();
    let token = CancellationToken::new();
    let supervisor = Supervisor::new(Arc::new(NoopSpawner), settings.poll_interval());
    let directory = PathBuf::new();
    let mut ctx = RunContext::new(
        &mut solver,
        &analysis,
        &directory,
        &token,
        &TracingReport,
        settings,
        &mut document,
        &geometry,
        &supervisor,
        true,
    );
    CheckTask.run(&mut ctx)?;
    if ctx.failures() > 0 {
        println!("check failed: {} problem(s)", ctx.failures());
        return Ok(ExitCode::FAILURE);
    }
    println!("check passed");
    Ok(ExitCode::SUCCESS)
}

fn write(target: &Target, dir: &Path, settings: &Settings) -> Result<ExitCode> {
    let (analysis, solver, geometry) = target.load()?;
    let Some(mesh) = analysis.single_mesh() else {
        bail!("analysis must contain exactly one mesh");
    };
    let paths = ArtifactPaths::for_backend(solver.backend, dir, &mesh.name);
    let groups = assemble_condition_groups(&analysis)?;
    let element_order = element_order_for(settings.mesh.higher_order, mesh, &TracingReport)?;
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let source = geometry.resolve(mesh);
    let raw_mesh = dir.join(format!("{}_raw.unv", mesh.name));
    let script = GeoScript {
        geometry: &source,
        raw_mesh: &raw_mesh,
        mesh,
        groups: &groups,
        element_order,
    }
    .render()?;
    std::fs::write(&paths.group_script, script)?;
    println!("wrote {}", paths.group_script.display());

    match solver.backend {
        Backend::Mofem => {
            write_mofem_config(&paths.input_file, &analysis, &groups, solver.backend.unit_system())?;
        }
        Backend::Elmer => {
            let options: ElasticityOptions = solver.elasticity_options();
            let output = write_sif(
                &paths.input_file,
                &SifDeck {
                    analysis: &analysis,
                    groups: &groups,
                    mesh_db: &paths.mesh_name,
                    options: &options,
                },
            )?;
            for label in &output.ignored {
                warn!("Ignored constraint {label}.");
            }
        }
    }
    println!("wrote {}", paths.input_file.display());
    info!(groups = groups.len(), "inputs written");
    Ok(ExitCode::SUCCESS)
}

fn binaries(settings: &Settings) {
    for key in BinaryKey::ALL {
        let setting = settings.binary(key);
        let source = if setting.standard { "PATH" } else { "custom" };
        match settings.resolve_binary(key) {
            Some(path) => println!("{:<17} {source:<6} {}", key.as_str(), path.display()),
            None => println!("{:<17} {source:<6} not found", key.as_str()),
        }
    }
}

fn status(dir: &Path) -> Result<ExitCode> {
    let path = femrun_io::paths::manifest_path(dir);
    let manifest =
        load_manifest(&path).with_context(|| format!("failed to read {}", path.display()))?;
    println!("analysis: {}", manifest.analysis);
    println!("solver: {} ({})", manifest.solver, manifest.backend);
    println!("state: {}", manifest.state);
    println!("history: {}", manifest.history.join(" -> "));
    println!("started: {}", manifest.started_at);
    println!("finished: {}", manifest.finished_at);
    if let Some(result) = &manifest.result_file {
        println!("result: {}", result.display());
    }
    for message in &manifest.messages {
        println!("{:?}: {}", message.level, message.text);
    }
    Ok(if manifest.state == "succeeded" {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use femrun_pipeline::HigherOrderPolicy;

    #[test]
    fn properties_parse_as_json_or_text() {
        let (name, value) = parse_property("CalculateStresses=true").expect("valid assignment");
        assert_eq!(name, "CalculateStresses");
        assert_eq!(value, FieldValue::Bool(true));

        let (_, value) = parse_property("EigenmodesCount=8").expect("valid assignment");
        assert_eq!(value, FieldValue::Integer(8));

        let (_, value) = parse_property("Linear=Umfpack").expect("valid assignment");
        assert_eq!(value, FieldValue::Text("Umfpack".to_string()));

        assert!(parse_property("CalculateStresses").is_err());
    }

    #[test]
    fn cli_parses_run_command() {
        let cli = Cli::try_parse_from([
            "femrun",
            "run",
            "analysis.json",
            "--backend",
            "mofem",
            "--test-mode",
            "--set",
            "ApproximationOrder=2",
        ])
        .expect("arguments should parse");
        match cli.command {
            Command::Run {
                target,
                test_mode,
                properties,
                ..
            } => {
                assert!(matches!(target.backend, BackendArg::Mofem));
                assert!(test_mode);
                assert_eq!(properties, vec!["ApproximationOrder=2".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    const ANALYSIS: &str = r#"{
        "name": "Analysis",
        "meshes": [{"name": "BoxMesh", "shape": "Box", "generator": "gmsh",
                    "geometry": "box.brep", "element_order": 2}],
        "materials": [{"label": "Steel",
                       "record": {"YoungsModulus": "210000 MPa", "PoissonRatio": "0.3"}}],
        "conditions": [
            {"label": "Support", "kind": "fixed",
             "references": [{"object": "Box", "element": "Face1"}]},
            {"label": "Springs", "kind": "universal", "blockset": "SPRING_BC",
             "set_type": "SIDESET",
             "references": [{"object": "Box", "element": "Face3"}]}
        ]
    }"#;

    fn target(dir: &Path, template: Option<PathBuf>) -> Target {
        let analysis = dir.join("analysis.json");
        std::fs::write(&analysis, ANALYSIS).expect("write analysis");
        Target {
            analysis,
            backend: BackendArg::Mofem,
            equation: EquationArg::Elasticity,
            bc_template: template,
        }
    }

    #[test]
    fn bc_template_fills_universal_parameters() {
        let dir = tempfile::tempdir().expect("temp dir");
        let template = dir.path().join("springs.json");
        std::fs::write(&template, r#"{"SPRING_BC": {"spring_stiffness_normal": 10}}"#)
            .expect("write template");

        let (analysis, _, _) = target(dir.path(), Some(template)).load().expect("analysis loads");
        let springs = analysis
            .conditions
            .iter()
            .find(|c| c.label == "Springs")
            .expect("springs condition");
        assert!(matches!(
            &springs.data,
            femrun_model::ConditionData::Universal { parameters, .. }
                if parameters.get("spring_stiffness_normal").map(String::as_str) == Some("10")
        ));
    }

    #[test]
    fn write_honours_higher_order_policy() {
        let dir = tempfile::tempdir().expect("temp dir");
        let out = dir.path().join("out");
        let target = target(dir.path(), None);

        let mut settings = Settings::default();
        settings.mesh.higher_order = HigherOrderPolicy::Reject;
        let err = write(&target, &out, &settings).expect_err("second order should be rejected");
        assert!(err.to_string().contains("Unsupported element order 2"));

        settings.mesh.higher_order = HigherOrderPolicy::Downgrade;
        write(&target, &out, &settings).expect("downgraded write succeeds");
        let script = std::fs::read_to_string(out.join("group_mesh.geo")).expect("script written");
        assert!(script.contains("Mesh.ElementOrder = 1;"));
        assert!(out.join("BoxMesh.config").is_file());
    }
}
