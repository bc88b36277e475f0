//! Universal boundary condition templates.
//!
//! A template is a JSON object mapping blockset names to parameter tables:
//!
//! ```json
//! { "SPRING_BC": { "spring_stiffness_normal": 10, "spring_stiffness_tangent": 1 } }
//! ```
//!
//! Each entry becomes a [`ConditionData::Universal`] whose parameters are
//! copied verbatim into the MoFEM block.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use femrun_model::{Analysis, Condition, ConditionData, GeoRef, SetType};
use tracing::debug;
use serde_json::Value;

use crate::error::{Result, WriterError};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UniversalTemplate {
    blocks: BTreeMap<String, BTreeMap<String, String>>,
}

impl UniversalTemplate {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)?;
        let Value::Object(entries) = root else {
            return Err(WriterError::Template(
                "top level must be an object of blocksets".to_string(),
            ));
        };
        let mut blocks = BTreeMap::new();
        for (blockset, params) in entries {
            let Value::Object(params) = params else {
                return Err(WriterError::Template(format!(
                    "blockset '{blockset}' must map to an object"
                )));
            };
            let mut table = BTreeMap::new();
            for (key, value) in params {
                let text = match value {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => u8::from(b).to_string(),
                    other => {
                        return Err(WriterError::Template(format!(
                            "{blockset}.{key}: unsupported value {other}"
                        )));
                    }
                };
                table.insert(key, text);
            }
            blocks.insert(blockset, table);
        }
        Ok(Self { blocks })
    }

    pub fn blocksets(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    pub fn parameters(&self, blockset: &str) -> Option<&BTreeMap<String, String>> {
        self.blocks.get(blockset)
    }

    /// Builds a universal condition for `blockset` applied to `references`.
    pub fn condition(
        &self,
        blockset: &str,
        label: impl Into<String>,
        set_type: SetType,
        references: Vec<GeoRef>,
    ) -> Result<Condition> {
        let parameters = self
            .parameters(blockset)
            .cloned()
            .ok_or_else(|| WriterError::Template(format!("unknown blockset '{blockset}'")))?;
        Ok(Condition::new(
            label,
            references,
            ConditionData::Universal {
                blockset: blockset.to_string(),
                set_type,
                parameters,
            },
        ))
    }

    /// Fills the parameters of every universal condition in `analysis`
    /// whose blockset the template knows. Returns how many were filled.
    pub fn apply(&self, analysis: &mut Analysis) -> Result<usize> {
        let mut filled = 0;
        for condition in &mut analysis.conditions {
            let ConditionData::Universal {
                blockset,
                set_type,
                parameters,
            } = &condition.data
            else {
                continue;
            };
            if self.parameters(blockset).is_none() {
                continue;
            }
            let mut merged = self.condition(
                blockset,
                condition.label.clone(),
                *set_type,
                condition.references.clone(),
            )?;
            if let ConditionData::Universal {
                parameters: defaults,
                ..
            } = &mut merged.data
            {
                defaults.extend(parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            debug!(condition = %condition.label, "filled universal parameters from template");
            *condition = merged;
            filled += 1;
        }
        Ok(filled)
    }
}
