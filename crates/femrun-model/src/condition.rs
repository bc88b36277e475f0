//! Boundary conditions and geometric references.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of a condition group. Declaration order is the block order of every
/// generated solver input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Material,
    Fixed,
    Displacement,
    Pressure,
    SelfWeight,
    Force,
    Universal,
}

impl ConditionKind {
    pub const ORDER: [ConditionKind; 7] = [
        ConditionKind::Material,
        ConditionKind::Fixed,
        ConditionKind::Displacement,
        ConditionKind::Pressure,
        ConditionKind::SelfWeight,
        ConditionKind::Force,
        ConditionKind::Universal,
    ];

    /// Position of the kind in [`ConditionKind::ORDER`].
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Tag written as `name=` in MoFEM block sections and used in group names.
    pub fn tag(self) -> &'static str {
        match self {
            ConditionKind::Material => "MAT_ELASTIC",
            ConditionKind::Fixed => "FIX_ALL",
            ConditionKind::Displacement => "DISPLACEMENT",
            ConditionKind::Pressure => "PRESSURE",
            ConditionKind::SelfWeight => "BODY_FORCES",
            ConditionKind::Force => "FORCE",
            ConditionKind::Universal => "UNIVERSAL",
        }
    }

    pub fn default_set_type(self) -> SetType {
        match self {
            ConditionKind::Displacement | ConditionKind::Force => SetType::Nodeset,
            ConditionKind::Pressure => SetType::Sideset,
            _ => SetType::Blockset,
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConditionKind::Material => "material",
            ConditionKind::Fixed => "fixed",
            ConditionKind::Displacement => "displacement",
            ConditionKind::Pressure => "pressure",
            ConditionKind::SelfWeight => "self-weight",
            ConditionKind::Force => "force",
            ConditionKind::Universal => "universal",
        };
        f.write_str(name)
    }
}

/// MoFEM meshset type used by `add=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SetType {
    #[default]
    Blockset,
    Nodeset,
    Sideset,
}

impl SetType {
    pub fn as_str(self) -> &'static str {
        match self {
            SetType::Blockset => "BLOCKSET",
            SetType::Nodeset => "NODESET",
            SetType::Sideset => "SIDESET",
        }
    }
}

impl fmt::Display for SetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topological kind of a referenced sub-element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Vertex,
    Edge,
    Face,
    Solid,
}

impl ElementKind {
    /// Physical group keyword in a gmsh script.
    pub fn gmsh_entity(self) -> &'static str {
        match self {
            ElementKind::Vertex => "Point",
            ElementKind::Edge => "Curve",
            ElementKind::Face => "Surface",
            ElementKind::Solid => "Volume",
        }
    }

    pub fn dimension(self) -> u8 {
        match self {
            ElementKind::Vertex => 0,
            ElementKind::Edge => 1,
            ElementKind::Face => 2,
            ElementKind::Solid => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid geometric element '{0}', expected Vertex<n>, Edge<n>, Face<n> or Solid<n>")]
pub struct GeoRefError(pub String);

/// Reference to one sub-element of a host shape, e.g. `("Box", "Face3")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeoRef {
    pub object: String,
    pub element: String,
}

impl GeoRef {
    pub fn new(object: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            element: element.into(),
        }
    }

    /// Splits the element name into its kind and 1-based index.
    pub fn parse_element(&self) -> Result<(ElementKind, usize), GeoRefError> {
        let err = || GeoRefError(self.element.clone());
        let split = self
            .element
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(err)?;
        let (prefix, digits) = self.element.split_at(split);
        let kind = match prefix {
            "Vertex" => ElementKind::Vertex,
            "Edge" => ElementKind::Edge,
            "Face" => ElementKind::Face,
            "Solid" => ElementKind::Solid,
            _ => return Err(err()),
        };
        let index = digits.parse::<usize>().map_err(|_| err())?;
        if index == 0 {
            return Err(err());
        }
        Ok((kind, index))
    }
}

impl fmt::Display for GeoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object, self.element)
    }
}

impl FromStr for GeoRef {
    type Err = GeoRefError;

    /// Parses `Object:Element`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (object, element) = s
            .split_once(':')
            .ok_or_else(|| GeoRefError(s.to_string()))?;
        let reference = GeoRef::new(object.trim(), element.trim());
        reference.parse_element()?;
        Ok(reference)
    }
}

/// One prescribed displacement component. `None` leaves the axis free.
pub type AxisDisplacement = Option<String>;

/// Kind-specific data carried by a condition. Values are host quantity
/// strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionData {
    Fixed,
    Displacement {
        #[serde(default)]
        x: AxisDisplacement,
        #[serde(default)]
        y: AxisDisplacement,
        #[serde(default)]
        z: AxisDisplacement,
    },
    Pressure {
        magnitude: String,
        #[serde(default)]
        reversed: bool,
    },
    SelfWeight {
        gravity: String,
        #[serde(default = "default_gravity_direction")]
        direction: [f64; 3],
    },
    Force {
        magnitude: String,
        direction: [f64; 3],
        #[serde(default)]
        reversed: bool,
    },
    /// Free-form block: parameters are written verbatim in key order.
    Universal {
        blockset: String,
        #[serde(default)]
        set_type: SetType,
        #[serde(default)]
        parameters: BTreeMap<String, String>,
    },
}

fn default_gravity_direction() -> [f64; 3] {
    [0.0, 0.0, -1.0]
}

impl ConditionData {
    pub fn kind(&self) -> ConditionKind {
        match self {
            ConditionData::Fixed => ConditionKind::Fixed,
            ConditionData::Displacement { .. } => ConditionKind::Displacement,
            ConditionData::Pressure { .. } => ConditionKind::Pressure,
            ConditionData::SelfWeight { .. } => ConditionKind::SelfWeight,
            ConditionData::Force { .. } => ConditionKind::Force,
            ConditionData::Universal { .. } => ConditionKind::Universal,
        }
    }
}

/// A boundary condition object of the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub label: String,
    #[serde(default)]
    pub references: Vec<GeoRef>,
    #[serde(flatten)]
    pub data: ConditionData,
}

impl Condition {
    pub fn new(label: impl Into<String>, references: Vec<GeoRef>, data: ConditionData) -> Self {
        Self {
            label: label.into(),
            references,
            data,
        }
    }

    pub fn kind(&self) -> ConditionKind {
        self.data.kind()
    }

    /// Self-weight applies to the whole body and may carry no references.
    pub fn requires_references(&self) -> bool {
        !matches!(self.data, ConditionData::SelfWeight { .. })
    }
}
