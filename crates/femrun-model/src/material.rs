use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::condition::GeoRef;

pub const YOUNGS_MODULUS: &str = "YoungsModulus";
pub const POISSON_RATIO: &str = "PoissonRatio";
pub const DENSITY: &str = "Density";

/// A material object of the analysis: a host material card applied to a set
/// of solids. An empty reference list means "all solids of the mesh shape".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialAssignment {
    pub label: String,
    #[serde(default)]
    pub references: Vec<GeoRef>,
    /// Host material card, values are quantity strings.
    #[serde(default)]
    pub record: BTreeMap<String, String>,
}

impl MaterialAssignment {
    pub fn new(label: impl Into<String>, references: Vec<GeoRef>) -> Self {
        Self {
            label: label.into(),
            references,
            record: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.record.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.record.get(key).map(String::as_str)
    }

    pub fn youngs_modulus(&self) -> Option<&str> {
        self.get(YOUNGS_MODULUS)
    }

    pub fn poisson_ratio(&self) -> Option<&str> {
        self.get(POISSON_RATIO)
    }

    pub fn density(&self) -> Option<&str> {
        self.get(DENSITY)
    }
}
