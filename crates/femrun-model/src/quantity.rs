//! Typed quantity strings as stored by the host document.
//!
//! The host keeps physical values as strings such as `"210000 MPa"`,
//! `"9.81 m/s^2"` or a bare `"0.3"`. Writers never assume these are plain
//! numbers: they parse them here and convert into the unit system the target
//! solver expects.
//!
//! Every supported unit is a power-of-ten multiple of its SI base unit, so
//! conversions are done with exact decimal exponents instead of floating
//! point factors.
//!
//! ```
//! use femrun_model::{Dimension, Quantity, UnitSystem};
//!
//! let e: Quantity = "210000 MPa".parse().unwrap();
//! assert_eq!(e.value_in(Dimension::Pressure, UnitSystem::MmNewtonMpa).unwrap(), 210000.0);
//! assert_eq!(e.value_in(Dimension::Pressure, UnitSystem::Si).unwrap(), 2.1e11);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Physical dimension a solver parameter is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Dimensionless,
    Length,
    Force,
    Pressure,
    Acceleration,
    Density,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Dimensionless => "dimensionless",
            Dimension::Length => "length",
            Dimension::Force => "force",
            Dimension::Pressure => "pressure",
            Dimension::Acceleration => "acceleration",
            Dimension::Density => "density",
        };
        f.write_str(name)
    }
}

/// Consistent unit system of a solver input deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    /// m, N, Pa, kg/m^3 (Elmer)
    #[default]
    Si,
    /// mm, N, MPa, t/mm^3 (MoFEM decks written from CAD models)
    MmNewtonMpa,
}

impl UnitSystem {
    /// Decimal exponent of this system's base unit relative to SI.
    fn base_exponent(self, dim: Dimension) -> i32 {
        match (self, dim) {
            (UnitSystem::Si, _) => 0,
            (UnitSystem::MmNewtonMpa, Dimension::Dimensionless) => 0,
            (UnitSystem::MmNewtonMpa, Dimension::Length) => -3,
            (UnitSystem::MmNewtonMpa, Dimension::Force) => 0,
            (UnitSystem::MmNewtonMpa, Dimension::Pressure) => 6,
            (UnitSystem::MmNewtonMpa, Dimension::Acceleration) => -3,
            (UnitSystem::MmNewtonMpa, Dimension::Density) => 12,
        }
    }
}

/// (symbol, dimension, decimal exponent relative to SI)
const UNITS: &[(&str, Dimension, i32)] = &[
    ("m", Dimension::Length, 0),
    ("cm", Dimension::Length, -2),
    ("mm", Dimension::Length, -3),
    ("um", Dimension::Length, -6),
    ("N", Dimension::Force, 0),
    ("mN", Dimension::Force, -3),
    ("kN", Dimension::Force, 3),
    ("MN", Dimension::Force, 6),
    ("Pa", Dimension::Pressure, 0),
    ("N/m^2", Dimension::Pressure, 0),
    ("kPa", Dimension::Pressure, 3),
    ("MPa", Dimension::Pressure, 6),
    ("N/mm^2", Dimension::Pressure, 6),
    ("GPa", Dimension::Pressure, 9),
    ("m/s^2", Dimension::Acceleration, 0),
    ("mm/s^2", Dimension::Acceleration, -3),
    ("kg/m^3", Dimension::Density, 0),
    ("g/cm^3", Dimension::Density, 3),
    ("kg/mm^3", Dimension::Density, 9),
    ("t/mm^3", Dimension::Density, 12),
];

/// Errors raised while parsing or converting a quantity string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuantityError {
    #[error("empty quantity string")]
    Empty,

    #[error("invalid number in quantity '{0}'")]
    InvalidNumber(String),

    #[error("unknown unit '{unit}' in quantity '{raw}'")]
    UnknownUnit { raw: String, unit: String },

    #[error("quantity '{raw}' has unit of {found}, expected {expected}")]
    DimensionMismatch {
        raw: String,
        expected: Dimension,
        found: Dimension,
    },
}

/// A parsed quantity: numeric value plus the unit symbol it was written in.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    value: f64,
    unit: Option<String>,
    raw: String,
}

impl Quantity {
    /// Numeric value in the unit it was written in.
    pub fn raw_value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Converts the value into the base unit of `system` for `dim`.
    ///
    /// A quantity without a unit is taken as already expressed in the target
    /// system.
    pub fn value_in(&self, dim: Dimension, system: UnitSystem) -> Result<f64, QuantityError> {
        let Some(symbol) = self.unit.as_deref() else {
            return Ok(self.value);
        };
        let (_, found, exponent) = UNITS
            .iter()
            .find(|(s, _, _)| *s == symbol)
            .ok_or_else(|| QuantityError::UnknownUnit {
                raw: self.raw.clone(),
                unit: symbol.to_string(),
            })?;
        if *found != dim {
            return Err(QuantityError::DimensionMismatch {
                raw: self.raw.clone(),
                expected: dim,
                found: *found,
            });
        }
        let shift = exponent - system.base_exponent(dim);
        Ok(scale_decimal(self.value, shift))
    }
}

fn scale_decimal(value: f64, shift: i32) -> f64 {
    match shift {
        0 => value,
        s if s > 0 => value * 10f64.powi(s),
        s => value / 10f64.powi(-s),
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QuantityError::Empty);
        }
        let split = numeric_prefix_len(trimmed);
        let (number, unit) = trimmed.split_at(split);
        let value = number
            .trim()
            .parse::<f64>()
            .map_err(|_| QuantityError::InvalidNumber(raw.to_string()))?;
        let unit = unit.trim();
        Ok(Self {
            value,
            unit: (!unit.is_empty()).then(|| unit.to_string()),
            raw: raw.to_string(),
        })
    }
}

/// Length of the leading numeric literal, accepting exponents like `7.9e-9`.
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        let is_exponent = (c == b'e' || c == b'E')
            && i > 0
            && bytes
                .get(i + 1)
                .is_some_and(|n| n.is_ascii_digit() || *n == b'-' || *n == b'+');
        if c.is_ascii_digit() || c == b'.' || is_exponent {
            i += 1;
        } else if (c == b'-' || c == b'+')
            && (i == 0 || matches!(bytes[i - 1], b'e' | b'E'))
        {
            i += 1;
        } else {
            break;
        }
    }
    i
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parses `raw` and converts it in one step.
pub fn parse_quantity(raw: &str, dim: Dimension, system: UnitSystem) -> Result<f64, QuantityError> {
    raw.parse::<Quantity>()?.value_in(dim, system)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_value_and_unit() {
        let q: Quantity = "210000 MPa".parse().expect("quantity should parse");
        assert_eq!(q.raw_value(), 210000.0);
        assert_eq!(q.unit(), Some("MPa"));

        let q: Quantity = "7.9e-9 t/mm^3".parse().expect("exponent should parse");
        assert_eq!(q.raw_value(), 7.9e-9);
        assert_eq!(q.unit(), Some("t/mm^3"));

        let q: Quantity = "-5".parse().expect("bare number should parse");
        assert_eq!(q.raw_value(), -5.0);
        assert_eq!(q.unit(), None);
    }

    #[test]
    fn converts_between_systems() {
        assert_eq!(
            parse_quantity("5 MPa", Dimension::Pressure, UnitSystem::MmNewtonMpa),
            Ok(5.0)
        );
        assert_eq!(
            parse_quantity("5 MPa", Dimension::Pressure, UnitSystem::Si),
            Ok(5.0e6)
        );
        assert_eq!(
            parse_quantity("2 kN", Dimension::Force, UnitSystem::MmNewtonMpa),
            Ok(2000.0)
        );
        assert_eq!(
            parse_quantity("9.81 m/s^2", Dimension::Acceleration, UnitSystem::MmNewtonMpa),
            Ok(9810.0)
        );
    }

    #[test]
    fn rejects_unknown_units_and_wrong_dimensions() {
        let err = parse_quantity("3 furlong", Dimension::Length, UnitSystem::Si)
            .expect_err("unknown unit should fail");
        assert!(matches!(err, QuantityError::UnknownUnit { .. }));

        let err = parse_quantity("3 N", Dimension::Pressure, UnitSystem::Si)
            .expect_err("force is not a pressure");
        assert!(err.to_string().contains("expected pressure"));

        assert_eq!(
            "abc".parse::<Quantity>(),
            Err(QuantityError::InvalidNumber("abc".to_string()))
        );
        assert_eq!("  ".parse::<Quantity>(), Err(QuantityError::Empty));
    }
}
