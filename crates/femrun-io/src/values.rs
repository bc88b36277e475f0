//! Conversion of host quantity strings into solver numbers.

use std::collections::BTreeMap;

use femrun_model::{Dimension, UnitSystem, parse_quantity};

use crate::error::{Result, WriterError};

pub(crate) fn quantity(label: &str, raw: &str, dim: Dimension, system: UnitSystem) -> Result<f64> {
    parse_quantity(raw, dim, system).map_err(|err| WriterError::quantity(label, err))
}

pub(crate) fn material_field(
    label: &str,
    record: &BTreeMap<String, String>,
    field: &'static str,
    dim: Dimension,
    system: UnitSystem,
) -> Result<f64> {
    let raw = record
        .get(field)
        .ok_or_else(|| WriterError::MissingMaterialField {
            label: label.to_string(),
            field,
        })?;
    quantity(label, raw, dim, system)
}

pub(crate) fn unit_direction(label: &str, direction: [f64; 3]) -> Result<[f64; 3]> {
    let norm = direction.iter().map(|c| c * c).sum::<f64>().sqrt();
    if !norm.is_finite() || norm == 0.0 {
        return Err(WriterError::InvalidParameter {
            label: label.to_string(),
            message: "direction vector has zero length".to_string(),
        });
    }
    Ok(direction.map(|c| c / norm))
}

/// Plain decimal rendering without trailing `.0` or exponent notation.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        // avoid "-0"
        return "0".to_string();
    }
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_without_trailing_zero() {
        assert_eq!(format_number(210000.0), "210000");
        assert_eq!(format_number(-5.0), "-5");
        assert_eq!(format_number(0.3), "0.3");
        assert_eq!(format_number(-0.0), "0");
    }

    #[test]
    fn normalizes_directions() {
        assert_eq!(unit_direction("F", [0.0, 0.0, -2.0]).expect("unit vector"), [0.0, 0.0, -1.0]);
        assert!(unit_direction("F", [0.0; 3]).is_err());
    }
}
