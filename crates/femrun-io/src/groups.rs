//! Group assembly: one named, numbered group per geometric reference.
//!
//! Groups are emitted kind by kind in [`ConditionKind::ORDER`], entries in
//! analysis order and references in entry order. A group is named
//! `{ordinal}{tag}{index}` where `ordinal` is the kind position and `index`
//! counts references within the kind. Block ids start at [`BLOCK_ID_BASE`]
//! and increase by one over the whole list, so the gmsh physical tags and
//! the solver config blocks always line up for identical input.

use femrun_model::{
    Analysis, ConditionData, ConditionKind, ElementKind, GeoRef, GroupParams, SetType,
};

use crate::error::{Result, WriterError};

pub const BLOCK_ID_BASE: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledGroup {
    pub name: String,
    pub kind: ConditionKind,
    /// Position of the kind in the fixed kind order.
    pub ordinal: usize,
    /// Position of the reference within its kind.
    pub index: usize,
    pub block_id: u32,
    /// Label of the analysis object the group came from.
    pub label: String,
    pub reference: GeoRef,
    pub element: ElementKind,
    /// 1-based element number inside the referenced shape.
    pub element_index: usize,
    pub params: GroupParams,
}

impl AssembledGroup {
    /// Value of `name=` in a MoFEM block.
    pub fn block_name(&self) -> &str {
        match &self.params {
            GroupParams::Condition(ConditionData::Universal { blockset, .. }) => blockset,
            _ => self.kind.tag(),
        }
    }

    /// Value of `add=` in a MoFEM block.
    pub fn set_type(&self) -> SetType {
        match &self.params {
            GroupParams::Condition(ConditionData::Universal { set_type, .. }) => *set_type,
            _ => self.kind.default_set_type(),
        }
    }
}

/// Builds the ordered group list of `analysis`.
///
/// Entries that allow it (a sole material, self-weight) fall back to the
/// first solid of the mesh shape when they carry no reference.
pub fn assemble_condition_groups(analysis: &Analysis) -> Result<Vec<AssembledGroup>> {
    let mesh = analysis.single_mesh().ok_or(WriterError::NoMesh)?;
    let mut groups = Vec::new();
    let mut next_block = BLOCK_ID_BASE;

    for group in analysis.condition_groups() {
        let ordinal = group.kind.ordinal();
        let mut index = 0usize;
        for entry in &group.entries {
            let references = if entry.references.is_empty() {
                if !entry.whole_shape_allowed {
                    return Err(WriterError::MissingReference {
                        label: entry.label.clone(),
                        kind: group.kind,
                    });
                }
                vec![GeoRef::new(mesh.shape.clone(), "Solid1")]
            } else {
                entry.references.clone()
            };

            for reference in references {
                if reference.object != mesh.shape {
                    return Err(WriterError::ForeignReference {
                        label: entry.label.clone(),
                        reference: reference.to_string(),
                        shape: mesh.shape.clone(),
                    });
                }
                let (element, element_index) =
                    reference
                        .parse_element()
                        .map_err(|source| WriterError::InvalidReference {
                            label: entry.label.clone(),
                            source,
                        })?;
                groups.push(AssembledGroup {
                    name: format!("{ordinal}{}{index}", group.kind.tag()),
                    kind: group.kind,
                    ordinal,
                    index,
                    block_id: next_block,
                    label: entry.label.clone(),
                    reference,
                    element,
                    element_index,
                    params: entry.params.clone(),
                });
                index += 1;
                next_block += 1;
            }
        }
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use femrun_model::{Condition, MaterialAssignment, MeshGenerator, MeshObject};

    fn analysis() -> Analysis {
        let mut analysis = Analysis::new("Analysis");
        analysis.meshes.push(MeshObject::new(
            "BoxMesh",
            "Box",
            MeshGenerator::Gmsh,
            "box.brep",
        ));
        analysis
            .materials
            .push(MaterialAssignment::new("Steel", Vec::new()));
        analysis.conditions.push(Condition::new(
            "Load",
            vec![GeoRef::new("Box", "Face6")],
            ConditionData::Pressure {
                magnitude: "5".to_string(),
                reversed: true,
            },
        ));
        analysis.conditions.push(Condition::new(
            "Support",
            vec![GeoRef::new("Box", "Face1"), GeoRef::new("Box", "Face2")],
            ConditionData::Fixed,
        ));
        analysis
    }

    #[test]
    fn names_and_ids_follow_fixed_order() {
        let groups = assemble_condition_groups(&analysis()).expect("groups should assemble");
        let summary: Vec<_> = groups
            .iter()
            .map(|g| (g.name.as_str(), g.block_id, g.reference.element.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("0MAT_ELASTIC0", 100, "Solid1"),
                ("1FIX_ALL0", 101, "Face1"),
                ("1FIX_ALL1", 102, "Face2"),
                ("3PRESSURE0", 103, "Face6"),
            ]
        );
        assert_eq!(groups[3].set_type(), SetType::Sideset);
    }

    #[test]
    fn assembly_is_deterministic() {
        let input = analysis();
        let first = assemble_condition_groups(&input).expect("first assembly");
        let second = assemble_condition_groups(&input).expect("second assembly");
        assert_eq!(first, second);
    }

    #[test]
    fn condition_without_reference_is_rejected() {
        let mut input = analysis();
        input.conditions.push(Condition::new(
            "Dangling",
            Vec::new(),
            ConditionData::Fixed,
        ));
        let err = assemble_condition_groups(&input).expect_err("missing reference should fail");
        assert!(matches!(
            err,
            WriterError::MissingReference { ref label, kind: ConditionKind::Fixed } if label == "Dangling"
        ));
    }

    #[test]
    fn malformed_reference_is_rejected() {
        let mut input = analysis();
        input.conditions[1].references.push(GeoRef::new("Box", "Shell1"));
        let err = assemble_condition_groups(&input).expect_err("bad element should fail");
        assert!(matches!(err, WriterError::InvalidReference { .. }));
    }

    #[test]
    fn reference_to_another_shape_is_rejected() {
        let mut input = analysis();
        input.conditions[1].references.push(GeoRef::new("Cyl", "Face1"));
        let err = assemble_condition_groups(&input).expect_err("foreign shape should fail");
        assert!(matches!(
            err,
            WriterError::ForeignReference { ref reference, ref shape, .. }
                if reference == "Cyl:Face1" && shape == "Box"
        ));
    }

    #[test]
    fn every_kind_is_ordered_regardless_of_insertion() {
        let mut input = Analysis::new("Analysis");
        input.meshes.push(MeshObject::new("BoxMesh", "Box", MeshGenerator::Gmsh, "box.brep"));
        input.conditions.push(Condition::new(
            "Springs",
            vec![GeoRef::new("Box", "Face5")],
            ConditionData::Universal {
                blockset: "SPRING_BC".to_string(),
                set_type: SetType::Sideset,
                parameters: Default::default(),
            },
        ));
        input.conditions.push(Condition::new(
            "Pull",
            vec![GeoRef::new("Box", "Face4")],
            ConditionData::Force {
                magnitude: "1 N".to_string(),
                direction: [1.0, 0.0, 0.0],
                reversed: false,
            },
        ));
        input.conditions.push(Condition::new(
            "Gravity",
            Vec::new(),
            ConditionData::SelfWeight {
                gravity: "9.81 m/s^2".to_string(),
                direction: [0.0, 0.0, -1.0],
            },
        ));
        input.conditions.push(Condition::new(
            "Load",
            vec![GeoRef::new("Box", "Face6")],
            ConditionData::Pressure {
                magnitude: "5".to_string(),
                reversed: false,
            },
        ));
        input.conditions.push(Condition::new(
            "Shift",
            vec![GeoRef::new("Box", "Face2")],
            ConditionData::Displacement {
                x: Some("1 mm".to_string()),
                y: None,
                z: None,
            },
        ));
        input.conditions.push(Condition::new(
            "Support",
            vec![GeoRef::new("Box", "Face1")],
            ConditionData::Fixed,
        ));
        input
            .materials
            .push(MaterialAssignment::new("Steel", Vec::new()));

        let groups = assemble_condition_groups(&input).expect("groups should assemble");
        let summary: Vec<_> = groups
            .iter()
            .map(|g| (g.name.as_str(), g.block_id))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("0MAT_ELASTIC0", 100),
                ("1FIX_ALL0", 101),
                ("2DISPLACEMENT0", 102),
                ("3PRESSURE0", 103),
                ("4BODY_FORCES0", 104),
                ("5FORCE0", 105),
                ("6UNIVERSAL0", 106),
            ]
        );
    }
}
