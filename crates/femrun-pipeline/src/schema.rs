//! Static property schemas of solver objects.
//!
//! Every solver and equation declares its fields up front. A
//! [`SolverRecord`] is created from the schemas with all defaults filled in
//! and only accepts values of the declared kind.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Integer,
    Float,
    Text,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Bool => "bool",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Text => "text",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Integer(_) => FieldKind::Integer,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::Text(_) => FieldKind::Text,
        }
    }
}

impl From<FieldDefault> for FieldValue {
    fn from(value: FieldDefault) -> Self {
        match value {
            FieldDefault::Bool(b) => FieldValue::Bool(b),
            FieldDefault::Integer(i) => FieldValue::Integer(i),
            FieldDefault::Float(x) => FieldValue::Float(x),
            FieldDefault::Text(s) => FieldValue::Text(s.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: FieldDefault,
    pub group: &'static str,
    pub doc: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertySchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl PropertySchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

pub const SOLVER_SCHEMA: PropertySchema = PropertySchema {
    name: "Solver",
    fields: &[
        FieldSpec {
            name: "SteadyStateMaxIterations",
            kind: FieldKind::Integer,
            default: FieldDefault::Integer(1),
            group: "Steady State",
            doc: "Maximum steady state iterations",
        },
        FieldSpec {
            name: "SteadyStateMinIterations",
            kind: FieldKind::Integer,
            default: FieldDefault::Integer(0),
            group: "Steady State",
            doc: "Minimum steady state iterations",
        },
        FieldSpec {
            name: "ApproximationOrder",
            kind: FieldKind::Integer,
            default: FieldDefault::Integer(1),
            group: "Solver",
            doc: "Polynomial order of the MoFEM approximation",
        },
    ],
};

pub const ELASTICITY_SCHEMA: PropertySchema = PropertySchema {
    name: "Elasticity",
    fields: &[
        FieldSpec {
            name: "DoFrequencyAnalysis",
            kind: FieldKind::Bool,
            default: FieldDefault::Bool(false),
            group: "Eigen Values",
            doc: "Compute eigen modes instead of a static solution",
        },
        FieldSpec {
            name: "EigenmodesCount",
            kind: FieldKind::Integer,
            default: FieldDefault::Integer(5),
            group: "Eigen Values",
            doc: "Number of eigen modes",
        },
        FieldSpec {
            name: "CalculateStrains",
            kind: FieldKind::Bool,
            default: FieldDefault::Bool(false),
            group: "Results",
            doc: "Compute strains",
        },
        FieldSpec {
            name: "CalculateStresses",
            kind: FieldKind::Bool,
            default: FieldDefault::Bool(false),
            group: "Results",
            doc: "Compute stresses",
        },
        FieldSpec {
            name: "CalculatePrincipal",
            kind: FieldKind::Bool,
            default: FieldDefault::Bool(false),
            group: "Results",
            doc: "Compute principal stresses",
        },
        FieldSpec {
            name: "CalculatePangle",
            kind: FieldKind::Bool,
            default: FieldDefault::Bool(false),
            group: "Results",
            doc: "Compute principal angles",
        },
    ],
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("unknown property '{0}'")]
    UnknownField(String),

    #[error("property '{field}' expects a {expected} value, got {found}")]
    TypeMismatch {
        field: String,
        expected: FieldKind,
        found: FieldKind,
    },
}

/// Property values of one solver object.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverRecord {
    schemas: Vec<PropertySchema>,
    values: BTreeMap<String, FieldValue>,
}

impl SolverRecord {
    pub fn from_schemas(schemas: &[PropertySchema]) -> Self {
        let values = schemas
            .iter()
            .flat_map(|s| s.fields.iter())
            .map(|f| (f.name.to_string(), FieldValue::from(f.default)))
            .collect();
        Self {
            schemas: schemas.to_vec(),
            values,
        }
    }

    pub fn spec(&self, name: &str) -> Option<&FieldSpec> {
        self.schemas.iter().find_map(|s| s.field(name))
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name)? {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name)? {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Sets a declared field. Integers are accepted for float fields.
    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<(), SchemaError> {
        let spec = self
            .spec(name)
            .ok_or_else(|| SchemaError::UnknownField(name.to_string()))?;
        let value = match (spec.kind, value) {
            (FieldKind::Float, FieldValue::Integer(i)) => FieldValue::Float(i as f64),
            (expected, value) if value.kind() == expected => value,
            (expected, value) => {
                return Err(SchemaError::TypeMismatch {
                    field: name.to_string(),
                    expected,
                    found: value.kind(),
                });
            }
        };
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_starts_with_defaults() {
        let record = SolverRecord::from_schemas(&[SOLVER_SCHEMA, ELASTICITY_SCHEMA]);
        assert_eq!(record.get_int("SteadyStateMaxIterations"), Some(1));
        assert_eq!(record.get_int("SteadyStateMinIterations"), Some(0));
        assert_eq!(record.get_int("EigenmodesCount"), Some(5));
        assert_eq!(record.get_bool("DoFrequencyAnalysis"), Some(false));
        assert_eq!(record.spec("CalculatePangle").map(|s| s.group), Some("Results"));
    }

    #[test]
    fn set_checks_names_and_kinds() {
        let mut record = SolverRecord::from_schemas(&[ELASTICITY_SCHEMA]);
        record
            .set("EigenmodesCount", FieldValue::Integer(10))
            .expect("integer field accepts integer");
        assert_eq!(record.get_int("EigenmodesCount"), Some(10));

        assert_eq!(
            record.set("EigenmodesCount", FieldValue::Bool(true)),
            Err(SchemaError::TypeMismatch {
                field: "EigenmodesCount".to_string(),
                expected: FieldKind::Integer,
                found: FieldKind::Bool,
            })
        );
        assert_eq!(
            record.set("ApproximationOrder", FieldValue::Integer(2)),
            Err(SchemaError::UnknownField("ApproximationOrder".to_string()))
        );
    }

    #[test]
    fn json_values_decode_untagged() {
        let value: FieldValue = serde_json::from_str("true").expect("bool");
        assert_eq!(value, FieldValue::Bool(true));
        let value: FieldValue = serde_json::from_str("7").expect("integer");
        assert_eq!(value, FieldValue::Integer(7));
        let value: FieldValue = serde_json::from_str("\"Umfpack\"").expect("text");
        assert_eq!(value.to_string(), "Umfpack");
    }
}
