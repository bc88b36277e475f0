//! Analysis container: the read-only input of one solver run.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::condition::{Condition, ConditionKind};
use crate::group::{ConditionGroup, GroupEntry, GroupParams};
use crate::material::MaterialAssignment;

/// Tool that produced a mesh object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshGenerator {
    Gmsh,
    Netgen,
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for MeshGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshGenerator::Gmsh => f.write_str("gmsh"),
            MeshGenerator::Netgen => f.write_str("netgen"),
            MeshGenerator::Other(name) => f.write_str(name),
        }
    }
}

fn default_element_order() -> u8 {
    1
}

fn default_dimension() -> u8 {
    3
}

/// Mesh object of the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshObject {
    /// Basename of every mesh artifact in the run directory.
    pub name: String,
    /// Host shape the mesh is built on; geometric references point into it.
    pub shape: String,
    pub generator: MeshGenerator,
    /// Geometry source handed to the exporter (BREP).
    pub geometry: PathBuf,
    #[serde(default)]
    pub characteristic_length_max: Option<String>,
    #[serde(default)]
    pub characteristic_length_min: Option<String>,
    #[serde(default = "default_element_order")]
    pub element_order: u8,
    #[serde(default = "default_dimension")]
    pub dimension: u8,
}

impl MeshObject {
    pub fn new(
        name: impl Into<String>,
        shape: impl Into<String>,
        generator: MeshGenerator,
        geometry: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            shape: shape.into(),
            generator,
            geometry: geometry.into(),
            characteristic_length_max: None,
            characteristic_length_min: None,
            element_order: default_element_order(),
            dimension: default_dimension(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Analysis {
    pub name: String,
    #[serde(default)]
    pub meshes: Vec<MeshObject>,
    #[serde(default)]
    pub materials: Vec<MaterialAssignment>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Analysis {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The mesh of the analysis when there is exactly one.
    pub fn single_mesh(&self) -> Option<&MeshObject> {
        match self.meshes.as_slice() {
            [mesh] => Some(mesh),
            _ => None,
        }
    }

    pub fn conditions_of(&self, kind: ConditionKind) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().filter(move |c| c.kind() == kind)
    }

    /// Non-empty condition groups in block order.
    pub fn condition_groups(&self) -> Vec<ConditionGroup> {
        let single_material = self.materials.len() == 1;
        let mut groups = Vec::new();
        for kind in ConditionKind::ORDER {
            let mut group = ConditionGroup::new(kind);
            if kind == ConditionKind::Material {
                group.entries = self
                    .materials
                    .iter()
                    .map(|m| GroupEntry {
                        label: m.label.clone(),
                        references: m.references.clone(),
                        params: GroupParams::Material(m.record.clone()),
                        whole_shape_allowed: single_material,
                    })
                    .collect();
            } else {
                group.entries = self
                    .conditions_of(kind)
                    .map(|c| GroupEntry {
                        label: c.label.clone(),
                        references: c.references.clone(),
                        params: GroupParams::Condition(c.data.clone()),
                        whole_shape_allowed: !c.requires_references(),
                    })
                    .collect();
            }
            if !group.is_empty() {
                groups.push(group);
            }
        }
        groups
    }
}
