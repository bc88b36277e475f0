//! Elmer solver input file (`case.sif`) writer.
//!
//! ElmerGrid numbers bodies and boundaries in the order their physical groups
//! appear in the mesh. Groups are meshed in assembled order, so the n-th
//! material group is body n and the n-th boundary group is boundary n.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;

use femrun_model::{
    Analysis, ConditionData, ConditionKind, DENSITY, Dimension, GroupParams, POISSON_RATIO,
    UnitSystem, YOUNGS_MODULUS,
};
use tracing::{debug, warn};

use crate::error::Result;
use crate::groups::AssembledGroup;
use crate::values::{format_number, material_field, quantity, unit_direction};

/// Result file stem; ResultOutputSolver appends `0001.vtu` or `_t0001.vtu`.
pub const OUTPUT_STEM: &str = "case";

/// Stress solver switches of the elasticity equation.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticityOptions {
    pub eigen_analysis: bool,
    pub eigenmodes_count: u32,
    pub calculate_strains: bool,
    pub calculate_stresses: bool,
    pub calculate_principal: bool,
    pub calculate_pangle: bool,
    pub steady_state_max_iterations: u32,
    pub steady_state_min_iterations: u32,
}

impl Default for ElasticityOptions {
    fn default() -> Self {
        Self {
            eigen_analysis: false,
            eigenmodes_count: 5,
            calculate_strains: false,
            calculate_stresses: false,
            calculate_principal: false,
            calculate_pangle: false,
            steady_state_max_iterations: 1,
            steady_state_min_iterations: 0,
        }
    }
}

/// Rendered deck plus the labels of conditions Elmer cannot express.
#[derive(Debug, Clone, PartialEq)]
pub struct SifOutput {
    pub text: String,
    pub ignored: Vec<String>,
}

pub struct SifDeck<'a> {
    pub analysis: &'a Analysis,
    pub groups: &'a [AssembledGroup],
    /// ElmerGrid database directory name, relative to the run directory.
    pub mesh_db: &'a str,
    pub options: &'a ElasticityOptions,
}

impl SifDeck<'_> {
    pub fn render(&self) -> Result<SifOutput> {
        let system = UnitSystem::Si;
        let opts = self.options;
        let mut out = String::new();
        let mut ignored = Vec::new();

        section(&mut out, "Header", |s| {
            line(s, "CHECK KEYWORDS Warn")?;
            line(s, &format!("Mesh DB \".\" \"{}\"", self.mesh_db))?;
            line(s, "Include Path \"\"")?;
            line(s, "Results Directory \"\"")?;
            Ok(())
        })?;

        section(&mut out, "Simulation", |s| {
            line(s, "Coordinate System = String \"Cartesian 3D\"")?;
            line(s, "Simulation Type = String \"Steady state\"")?;
            line(
                s,
                &format!(
                    "Steady State Max Iterations = Integer {}",
                    opts.steady_state_max_iterations
                ),
            )?;
            line(
                s,
                &format!(
                    "Steady State Min Iterations = Integer {}",
                    opts.steady_state_min_iterations
                ),
            )?;
            line(s, "Output Intervals = Integer 1")?;
            line(s, "Max Output Level = Integer 5")?;
            Ok(())
        })?;

        section(&mut out, "Constants", |s| {
            line(s, "Stefan Boltzmann = Real 5.670374419e-08")?;
            Ok(())
        })?;

        section(&mut out, "Solver 1", |s| {
            line(s, "Equation = String \"Stress Solver\"")?;
            line(s, "Procedure = File \"StressSolve\" \"StressSolver\"")?;
            line(s, "Variable = String \"Displacement\"")?;
            line(s, "Variable DOFs = Integer 3")?;
            line(s, &logical("Eigen Analysis", opts.eigen_analysis))?;
            if opts.eigen_analysis {
                line(
                    s,
                    &format!("Eigen System Values = Integer {}", opts.eigenmodes_count),
                )?;
            }
            line(s, &logical("Calculate Strains", opts.calculate_strains))?;
            line(s, &logical("Calculate Stresses", opts.calculate_stresses))?;
            line(s, &logical("Calculate Principal", opts.calculate_principal))?;
            line(s, &logical("Calculate Pangle", opts.calculate_pangle))?;
            line(s, "Displace mesh = Logical False")?;
            line(s, "Linear System Solver = String \"Direct\"")?;
            line(s, "Linear System Direct Method = String \"Umfpack\"")?;
            line(s, "Steady State Convergence Tolerance = Real 1e-05")?;
            Ok(())
        })?;

        section(&mut out, "Solver 2", |s| {
            line(s, "Equation = String \"ResultOutput\"")?;
            line(s, "Procedure = File \"ResultOutputSolve\" \"ResultOutputSolver\"")?;
            line(s, &format!("Output File Name = String \"{OUTPUT_STEM}\""))?;
            line(s, "Vtu Format = Logical True")?;
            line(s, "Binary Output = Logical False")?;
            line(s, "Exec Solver = String \"After simulation\"")?;
            Ok(())
        })?;

        section(&mut out, "Equation 1", |s| {
            line(s, "Active Solvers(2) = Integer 1 2")?;
            Ok(())
        })?;

        let body_force = self.body_force_vector(system)?;

        let mut materials: BTreeMap<&str, usize> = BTreeMap::new();
        let mut body = 0usize;
        for group in self.groups {
            let GroupParams::Material(record) = &group.params else {
                continue;
            };
            let label = group.label.as_str();
            let next = materials.len() + 1;
            let material_id = *materials.entry(label).or_insert(next);
            if material_id == next {
                let young = material_field(label, record, YOUNGS_MODULUS, Dimension::Pressure, system)?;
                let poisson =
                    material_field(label, record, POISSON_RATIO, Dimension::Dimensionless, system)?;
                let density = record
                    .get(DENSITY)
                    .map(|raw| quantity(label, raw, Dimension::Density, system))
                    .transpose()?;
                section(&mut out, &format!("Material {material_id}"), |s| {
                    line(s, &format!("Name = String \"{label}\""))?;
                    line(s, &format!("Youngs Modulus = Real {}", format_number(young)))?;
                    line(s, &format!("Poisson Ratio = Real {}", format_number(poisson)))?;
                    if let Some(density) = density {
                        line(s, &format!("Density = Real {}", format_number(density)))?;
                    }
                    Ok(())
                })?;
            }

            body += 1;
            let force = match body_force {
                Some(acceleration) => {
                    let density =
                        material_field(label, record, DENSITY, Dimension::Density, system)?;
                    Some(acceleration.map(|a| a * density))
                }
                None => None,
            };
            section(&mut out, &format!("Body {body}"), |s| {
                line(s, &format!("Name = String \"{}\"", group.name))?;
                line(s, &format!("Target Bodies(1) = Integer {body}"))?;
                line(s, "Equation = Integer 1")?;
                line(s, &format!("Material = Integer {material_id}"))?;
                if force.is_some() {
                    line(s, &format!("Body Force = Integer {body}"))?;
                }
                Ok(())
            })?;
            if let Some(force) = force {
                section(&mut out, &format!("Body Force {body}"), |s| {
                    for (i, component) in force.iter().enumerate() {
                        line(
                            s,
                            &format!("Stress Bodyforce {} = Real {}", i + 1, format_number(*component)),
                        )?;
                    }
                    Ok(())
                })?;
            }
        }

        let mut boundary = 0usize;
        for group in self.groups {
            let GroupParams::Condition(data) = &group.params else {
                continue;
            };
            let label = group.label.as_str();
            let lines: Vec<String> = match data {
                ConditionData::Fixed => (1..=3)
                    .map(|i| format!("Displacement {i} = Real 0"))
                    .collect(),
                ConditionData::Displacement { x, y, z } => {
                    let mut lines = Vec::new();
                    for (i, value) in [x, y, z].into_iter().enumerate() {
                        if let Some(raw) = value {
                            let v = quantity(label, raw, Dimension::Length, system)?;
                            lines.push(format!("Displacement {} = Real {}", i + 1, format_number(v)));
                        }
                    }
                    lines
                }
                ConditionData::Pressure {
                    magnitude,
                    reversed,
                } => {
                    let p = quantity(label, magnitude, Dimension::Pressure, system)?;
                    // Normal Force acts along the outward normal
                    let signed = if *reversed { p } else { -p };
                    vec![format!("Normal Force = Real {}", format_number(signed))]
                }
                ConditionData::Force {
                    magnitude,
                    direction,
                    reversed,
                } => {
                    let f = quantity(label, magnitude, Dimension::Force, system)?;
                    let sign = if *reversed { -1.0 } else { 1.0 };
                    let unit = unit_direction(label, *direction)?;
                    let mut lines = Vec::new();
                    for (i, component) in unit.iter().enumerate() {
                        lines.push(format!(
                            "Force {} = Real {}",
                            i + 1,
                            format_number(sign * f * component)
                        ));
                        lines.push(format!("Force {} Normalize by Area = Logical True", i + 1));
                    }
                    lines
                }
                ConditionData::SelfWeight { .. } => continue,
                ConditionData::Universal { .. } => {
                    if !ignored.iter().any(|l| l == label) {
                        warn!(condition = label, "universal condition has no Elmer equivalent");
                        ignored.push(label.to_string());
                    }
                    continue;
                }
            };
            boundary += 1;
            section(&mut out, &format!("Boundary Condition {boundary}"), |s| {
                line(s, &format!("Name = String \"{}\"", group.name))?;
                line(s, &format!("Target Boundaries(1) = Integer {boundary}"))?;
                for l in &lines {
                    line(s, l)?;
                }
                Ok(())
            })?;
        }

        Ok(SifOutput { text: out, ignored })
    }

    /// Summed gravitational acceleration of all self-weight conditions.
    fn body_force_vector(&self, system: UnitSystem) -> Result<Option<[f64; 3]>> {
        let mut total: Option<[f64; 3]> = None;
        for condition in self.analysis.conditions_of(ConditionKind::SelfWeight) {
            let ConditionData::SelfWeight { gravity, direction } = &condition.data else {
                continue;
            };
            let g = quantity(&condition.label, gravity, Dimension::Acceleration, system)?;
            let unit = unit_direction(&condition.label, *direction)?;
            let acc = total.get_or_insert([0.0; 3]);
            for i in 0..3 {
                acc[i] += g * unit[i];
            }
        }
        Ok(total)
    }
}

pub fn write_sif(path: impl AsRef<Path>, deck: &SifDeck<'_>) -> Result<SifOutput> {
    let path = path.as_ref();
    let output = deck.render()?;
    crate::ensure_parent_dir(path)?;
    fs::write(path, &output.text)?;
    debug!(path = %path.display(), ignored = output.ignored.len(), "wrote Elmer case file");
    Ok(output)
}

fn section(
    out: &mut String,
    name: &str,
    body: impl FnOnce(&mut String) -> fmt::Result,
) -> fmt::Result {
    writeln!(out, "{name}")?;
    body(out)?;
    writeln!(out, "End")?;
    writeln!(out)
}

fn line(out: &mut String, text: &str) -> fmt::Result {
    writeln!(out, "  {text}")
}

fn logical(key: &str, value: bool) -> String {
    format!("{key} = Logical {}", if value { "True" } else { "False" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::assemble_condition_groups;
    use femrun_model::{Condition, GeoRef, MaterialAssignment, MeshGenerator, MeshObject, SetType};

    fn analysis() -> Analysis {
        let mut analysis = Analysis::new("Analysis");
        analysis.meshes.push(MeshObject::new(
            "BoxMesh",
            "Box",
            MeshGenerator::Gmsh,
            "box.brep",
        ));
        analysis.materials.push(
            MaterialAssignment::new("Steel", Vec::new())
                .with_property(YOUNGS_MODULUS, "210 GPa")
                .with_property(POISSON_RATIO, "0.3")
                .with_property(DENSITY, "7900 kg/m^3"),
        );
        analysis.conditions.push(Condition::new(
            "Support",
            vec![GeoRef::new("Box", "Face1")],
            ConditionData::Fixed,
        ));
        analysis.conditions.push(Condition::new(
            "Load",
            vec![GeoRef::new("Box", "Face6")],
            ConditionData::Pressure {
                magnitude: "5 MPa".to_string(),
                reversed: false,
            },
        ));
        analysis
    }

    fn render(analysis: &Analysis) -> SifOutput {
        let groups = assemble_condition_groups(analysis).expect("groups should assemble");
        SifDeck {
            analysis,
            groups: &groups,
            mesh_db: "BoxMesh",
            options: &ElasticityOptions::default(),
        }
        .render()
        .expect("deck should render")
    }

    #[test]
    fn writes_materials_bodies_and_boundaries() {
        let output = render(&analysis());
        let text = &output.text;
        assert!(text.contains("Mesh DB \".\" \"BoxMesh\""));
        assert!(text.contains("Youngs Modulus = Real 210000000000"));
        assert!(text.contains("Target Bodies(1) = Integer 1"));
        assert!(text.contains(
            "Boundary Condition 1\n  Name = String \"1FIX_ALL0\"\n  Target Boundaries(1) = Integer 1\n  \
             Displacement 1 = Real 0\n"
        ));
        assert!(text.contains("Boundary Condition 2\n  Name = String \"3PRESSURE0\""));
        assert!(text.contains("Normal Force = Real -5000000"));
        assert!(text.contains("Output File Name = String \"case\""));
        assert!(!text.contains("Body Force"));
        assert!(output.ignored.is_empty());
    }

    #[test]
    fn self_weight_adds_body_force() {
        let mut input = analysis();
        input.conditions.push(Condition::new(
            "Gravity",
            Vec::new(),
            ConditionData::SelfWeight {
                gravity: "10 m/s^2".to_string(),
                direction: [0.0, 0.0, -1.0],
            },
        ));
        let text = render(&input).text;
        assert!(text.contains("Body Force = Integer 1"));
        assert!(text.contains("Stress Bodyforce 3 = Real -79000"));
    }

    #[test]
    fn universal_conditions_are_reported_as_ignored() {
        let mut input = analysis();
        input.conditions.push(Condition::new(
            "Springs",
            vec![GeoRef::new("Box", "Face3")],
            ConditionData::Universal {
                blockset: "SPRING_BC".to_string(),
                set_type: SetType::Sideset,
                parameters: Default::default(),
            },
        ));
        let output = render(&input);
        assert_eq!(output.ignored, vec!["Springs".to_string()]);
        assert!(!output.text.contains("SPRING_BC"));
    }
}
