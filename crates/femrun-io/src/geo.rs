//! gmsh `.geo` script generation for group meshing.
//!
//! The script merges the exported BREP, declares one physical group per
//! assembled group (physical tag = block id), meshes and saves the raw mesh
//! as UNV. Conversion to the exchange format is a separate gmsh run.

use std::fmt::Write as _;
use std::path::Path;

use femrun_model::{Dimension, MeshObject, UnitSystem};

use crate::error::Result;
use crate::groups::AssembledGroup;
use crate::values::{format_number, quantity};

const DEFAULT_LENGTH_MAX: f64 = 1e22;

/// Inputs of one meshing script.
#[derive(Debug, Clone)]
pub struct GeoScript<'a> {
    pub geometry: &'a Path,
    pub raw_mesh: &'a Path,
    pub mesh: &'a MeshObject,
    pub groups: &'a [AssembledGroup],
    /// Order actually written; may differ from the mesh object's order after
    /// the higher-order policy was applied.
    pub element_order: u8,
}

impl GeoScript<'_> {
    pub fn render(&self) -> Result<String> {
        // CAD geometry is exported in millimetres.
        let system = UnitSystem::MmNewtonMpa;
        let label = self.mesh.name.as_str();
        let length_max = match &self.mesh.characteristic_length_max {
            Some(raw) => quantity(label, raw, Dimension::Length, system)?,
            None => DEFAULT_LENGTH_MAX,
        };
        let length_min = match &self.mesh.characteristic_length_min {
            Some(raw) => quantity(label, raw, Dimension::Length, system)?,
            None => 0.0,
        };

        let mut out = String::new();
        writeln!(out, "// gmsh group meshing script for {}", self.mesh.name)?;
        writeln!(out)?;
        writeln!(out, "Merge \"{}\";", self.geometry.display())?;
        writeln!(out)?;

        if !self.groups.is_empty() {
            writeln!(out, "// physical groups, tag = block id")?;
        }
        for group in self.groups {
            writeln!(
                out,
                "Physical {}(\"{}\", {}) = {{{}}};",
                group.element.gmsh_entity(),
                group.name,
                group.block_id,
                group.element_index
            )?;
        }
        if !self.groups.is_empty() {
            writeln!(out)?;
        }

        writeln!(
            out,
            "Mesh.CharacteristicLengthMax = {};",
            format_length(length_max)
        )?;
        writeln!(
            out,
            "Mesh.CharacteristicLengthMin = {};",
            format_length(length_min)
        )?;
        writeln!(out, "Mesh.Optimize = 1;")?;
        writeln!(out, "Mesh.ElementOrder = {};", self.element_order)?;
        writeln!(out, "Mesh.Algorithm = 2;")?;
        writeln!(out, "Mesh.Algorithm3D = 1;")?;
        writeln!(out)?;
        writeln!(out, "Geometry.Tolerance = 1e-06;")?;
        writeln!(out, "Mesh {};", self.mesh.dimension)?;
        writeln!(out, "Coherence Mesh;")?;
        writeln!(out)?;
        // nodes of every physical group are needed for NODESET blocks
        writeln!(out, "Mesh.SaveGroupsOfNodes = 1;")?;
        writeln!(out, "Mesh.SaveAll = 1;")?;
        writeln!(out, "Save \"{}\";", self.raw_mesh.display())?;
        Ok(out)
    }
}

fn format_length(value: f64) -> String {
    if value >= DEFAULT_LENGTH_MAX {
        "1e+22".to_string()
    } else {
        format_number(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::assemble_condition_groups;
    use femrun_model::{
        Analysis, Condition, ConditionData, GeoRef, MaterialAssignment, MeshGenerator,
    };
    use std::path::PathBuf;

    #[test]
    fn declares_one_physical_group_per_block() {
        let mut mesh = MeshObject::new("BoxMesh", "Box", MeshGenerator::Gmsh, "box.brep");
        mesh.characteristic_length_max = Some("2 mm".to_string());
        let mut analysis = Analysis::new("Analysis");
        analysis.meshes.push(mesh.clone());
        analysis
            .materials
            .push(MaterialAssignment::new("Steel", Vec::new()));
        analysis.conditions.push(Condition::new(
            "Support",
            vec![GeoRef::new("Box", "Face1"), GeoRef::new("Box", "Face2")],
            ConditionData::Fixed,
        ));
        let groups = assemble_condition_groups(&analysis).expect("groups should assemble");

        let geometry = PathBuf::from("/tmp/shape.brep");
        let raw_mesh = PathBuf::from("/tmp/raw.unv");
        let script = GeoScript {
            geometry: &geometry,
            raw_mesh: &raw_mesh,
            mesh: &mesh,
            groups: &groups,
            element_order: 1,
        }
        .render()
        .expect("script should render");

        assert!(script.contains("Merge \"/tmp/shape.brep\";"));
        assert!(script.contains("Physical Volume(\"0MAT_ELASTIC0\", 100) = {1};"));
        assert!(script.contains("Physical Surface(\"1FIX_ALL0\", 101) = {1};"));
        assert!(script.contains("Physical Surface(\"1FIX_ALL1\", 102) = {2};"));
        assert!(script.contains("Mesh.CharacteristicLengthMax = 2;"));
        assert!(script.contains("Mesh.CharacteristicLengthMin = 0;"));
        assert!(script.contains("Mesh.ElementOrder = 1;"));
        assert!(script.ends_with("Save \"/tmp/raw.unv\";\n"));
    }
}
