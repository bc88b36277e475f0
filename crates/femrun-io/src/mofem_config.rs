//! MoFEM meshset configuration writer.
//!
//! `read_med -meshsets_config` reads an INI-like file with one section per
//! meshset:
//!
//! ```text
//! [block_1]
//! id=100
//! add=BLOCKSET
//! name=MAT_ELASTIC
//! young=210000
//! poisson=0.3
//!
//! [block_2]
//! id=101
//! add=BLOCKSET
//! name=FIX_ALL
//! ```
//!
//! Blocks are written in assembled group order; ids are the group block ids,
//! which are also the physical tags of the gmsh script.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use femrun_model::{
    Analysis, ConditionData, DENSITY, Dimension, GroupParams, POISSON_RATIO, UnitSystem,
    YOUNGS_MODULUS,
};
use tracing::debug;

use crate::error::{Result, WriterError};
use crate::groups::AssembledGroup;
use crate::values::{format_number, material_field, quantity, unit_direction};

/// Renders the config text for `groups`.
///
/// `analysis` is consulted for the density that a self-weight block carries.
pub fn render_mofem_config(
    analysis: &Analysis,
    groups: &[AssembledGroup],
    system: UnitSystem,
) -> Result<String> {
    let mut out = String::new();
    for (position, group) in groups.iter().enumerate() {
        if position > 0 {
            out.push('\n');
        }
        writeln!(out, "[block_{}]", position + 1)?;
        writeln!(out, "id={}", group.block_id)?;
        writeln!(out, "add={}", group.set_type())?;
        writeln!(out, "name={}", group.block_name())?;
        for (key, value) in block_parameters(analysis, group, system)? {
            writeln!(out, "{key}={value}")?;
        }
    }
    Ok(out)
}

pub fn write_mofem_config(
    path: impl AsRef<Path>,
    analysis: &Analysis,
    groups: &[AssembledGroup],
    system: UnitSystem,
) -> Result<()> {
    let path = path.as_ref();
    let text = render_mofem_config(analysis, groups, system)?;
    crate::ensure_parent_dir(path)?;
    fs::write(path, text)?;
    debug!(path = %path.display(), blocks = groups.len(), "wrote MoFEM meshset config");
    Ok(())
}

fn block_parameters(
    analysis: &Analysis,
    group: &AssembledGroup,
    system: UnitSystem,
) -> Result<Vec<(String, String)>> {
    let label = group.label.as_str();
    let mut params = Vec::new();
    match &group.params {
        GroupParams::Material(record) => {
            let young = material_field(label, record, YOUNGS_MODULUS, Dimension::Pressure, system)?;
            let poisson =
                material_field(label, record, POISSON_RATIO, Dimension::Dimensionless, system)?;
            params.push(("young".to_string(), format_number(young)));
            params.push(("poisson".to_string(), format_number(poisson)));
        }
        GroupParams::Condition(ConditionData::Fixed) => {}
        GroupParams::Condition(ConditionData::Displacement { x, y, z }) => {
            for (axis, (name, value)) in [("x", x), ("y", y), ("z", z)].into_iter().enumerate() {
                let (flag, magnitude) = match value {
                    Some(raw) => (1, quantity(label, raw, Dimension::Length, system)?),
                    None => (0, 0.0),
                };
                params.push((format!("disp_flag{}", axis + 1), flag.to_string()));
                params.push((format!("disp_u{name}"), format_number(magnitude)));
            }
        }
        GroupParams::Condition(ConditionData::Pressure {
            magnitude,
            reversed,
        }) => {
            let value = quantity(label, magnitude, Dimension::Pressure, system)?;
            let signed = if *reversed { -value } else { value };
            params.push(("pressure_flag2".to_string(), "1".to_string()));
            params.push(("pressure_magnitude".to_string(), format_number(signed)));
        }
        GroupParams::Condition(ConditionData::SelfWeight { gravity, direction }) => {
            let density = body_density(analysis, label, system)?;
            let g = quantity(label, gravity, Dimension::Acceleration, system)?;
            let unit = unit_direction(label, *direction)?;
            params.push(("user1".to_string(), format_number(density)));
            for (i, component) in unit.iter().enumerate() {
                params.push((format!("user{}", i + 2), format_number(g * component)));
            }
        }
        GroupParams::Condition(ConditionData::Force {
            magnitude,
            direction,
            reversed,
        }) => {
            let value = quantity(label, magnitude, Dimension::Force, system)?;
            let mut unit = unit_direction(label, *direction)?;
            if *reversed {
                unit = unit.map(|c| -c);
            }
            params.push(("force_magnitude".to_string(), format_number(value)));
            for (name, component) in ["fx", "fy", "fz"].iter().zip(unit) {
                params.push((format!("force_{name}"), format_number(component)));
            }
        }
        GroupParams::Condition(ConditionData::Universal { parameters, .. }) => {
            params.extend(parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    Ok(params)
}

/// Density of the first material that declares one.
fn body_density(analysis: &Analysis, label: &str, system: UnitSystem) -> Result<f64> {
    let material = analysis
        .materials
        .iter()
        .find(|m| m.density().is_some())
        .ok_or_else(|| WriterError::MissingMaterialField {
            label: label.to_string(),
            field: DENSITY,
        })?;
    material_field(
        &material.label,
        &material.record,
        DENSITY,
        Dimension::Density,
        system,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::assemble_condition_groups;
    use femrun_model::{
        Condition, GeoRef, MaterialAssignment, MeshGenerator, MeshObject, SetType,
    };
    use std::collections::BTreeMap;

    fn base() -> Analysis {
        let mut analysis = Analysis::new("Analysis");
        analysis.meshes.push(MeshObject::new(
            "BoxMesh",
            "Box",
            MeshGenerator::Gmsh,
            "box.brep",
        ));
        analysis.materials.push(
            MaterialAssignment::new("Steel", Vec::new())
                .with_property(YOUNGS_MODULUS, "210000 MPa")
                .with_property(POISSON_RATIO, "0.3")
                .with_property(DENSITY, "7.9e-9 t/mm^3"),
        );
        analysis
    }

    fn render(analysis: &Analysis) -> Result<String> {
        let groups = assemble_condition_groups(analysis)?;
        render_mofem_config(analysis, &groups, UnitSystem::MmNewtonMpa)
    }

    #[test]
    fn material_block_converts_units() {
        let text = render(&base()).expect("config should render");
        assert_eq!(
            text,
            "[block_1]\nid=100\nadd=BLOCKSET\nname=MAT_ELASTIC\nyoung=210000\npoisson=0.3\n"
        );
    }

    #[test]
    fn displacement_writes_flags_for_every_axis() {
        let mut analysis = base();
        analysis.conditions.push(Condition::new(
            "Shift",
            vec![GeoRef::new("Box", "Face2")],
            ConditionData::Displacement {
                x: Some("0.5 mm".to_string()),
                y: None,
                z: Some("0".to_string()),
            },
        ));
        let text = render(&analysis).expect("config should render");
        assert!(text.contains(
            "[block_2]\nid=101\nadd=NODESET\nname=DISPLACEMENT\n\
             disp_flag1=1\ndisp_ux=0.5\ndisp_flag2=0\ndisp_uy=0\ndisp_flag3=1\ndisp_uz=0\n"
        ));
    }

    #[test]
    fn force_and_self_weight_blocks() {
        let mut analysis = base();
        analysis.conditions.push(Condition::new(
            "Pull",
            vec![GeoRef::new("Box", "Face4")],
            ConditionData::Force {
                magnitude: "2 kN".to_string(),
                direction: [1.0, 0.0, 0.0],
                reversed: true,
            },
        ));
        analysis.conditions.push(Condition::new(
            "Gravity",
            Vec::new(),
            ConditionData::SelfWeight {
                gravity: "9.81 m/s^2".to_string(),
                direction: [0.0, 0.0, -1.0],
            },
        ));
        let text = render(&analysis).expect("config should render");
        assert!(text.contains(
            "name=BODY_FORCES\nuser1=0.0000000079\nuser2=0\nuser3=0\nuser4=-9810\n"
        ));
        assert!(text.contains(
            "name=FORCE\nforce_magnitude=2000\nforce_fx=-1\nforce_fy=0\nforce_fz=0\n"
        ));
        let body = text.find("BODY_FORCES").expect("self-weight block");
        let force = text.find("name=FORCE").expect("force block");
        assert!(body < force);
    }

    #[test]
    fn universal_block_copies_parameters() {
        let mut analysis = base();
        let mut parameters = BTreeMap::new();
        parameters.insert("spring_stiffness_normal".to_string(), "10".to_string());
        parameters.insert("spring_stiffness_tangent".to_string(), "1".to_string());
        analysis.conditions.push(Condition::new(
            "Springs",
            vec![GeoRef::new("Box", "Face3")],
            ConditionData::Universal {
                blockset: "SPRING_BC".to_string(),
                set_type: SetType::Sideset,
                parameters,
            },
        ));
        let text = render(&analysis).expect("config should render");
        assert!(text.ends_with(
            "[block_2]\nid=101\nadd=SIDESET\nname=SPRING_BC\n\
             spring_stiffness_normal=10\nspring_stiffness_tangent=1\n"
        ));
    }

    #[test]
    fn missing_material_field_fails() {
        let mut analysis = base();
        analysis.materials[0].record.remove(POISSON_RATIO);
        let err = render(&analysis).expect_err("missing poisson ratio should fail");
        assert!(matches!(
            err,
            WriterError::MissingMaterialField { field: POISSON_RATIO, .. }
        ));
    }
}
