//! Error types for femrun-io

use femrun_model::{ConditionKind, GeoRefError, QuantityError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WriterError>;

/// Malformed or missing analysis data met while writing solver input.
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("Analysis must contain exactly one mesh")]
    NoMesh,

    #[error("{label}: {kind} condition has no geometric reference")]
    MissingReference { label: String, kind: ConditionKind },

    #[error("{label}: invalid geometric reference: {source}")]
    InvalidReference {
        label: String,
        #[source]
        source: GeoRefError,
    },

    #[error("{label}: reference {reference} is not part of the meshed shape {shape}")]
    ForeignReference {
        label: String,
        reference: String,
        shape: String,
    },

    #[error("{label}: material record lacks field '{field}'")]
    MissingMaterialField { label: String, field: &'static str },

    #[error("{label}: {source}")]
    Quantity {
        label: String,
        #[source]
        source: QuantityError,
    },

    #[error("{label}: {message}")]
    InvalidParameter { label: String, message: String },

    #[error("Unsupported element order {0}: only first order meshes can be written")]
    UnsupportedElementOrder(u8),

    #[error("Invalid template: {0}")]
    Template(String),

    #[error("Formatting error: {0}")]
    Format(#[from] std::fmt::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WriterError {
    pub(crate) fn quantity(label: &str, source: QuantityError) -> Self {
        WriterError::Quantity {
            label: label.to_string(),
            source,
        }
    }
}

/// Failure to read a solver result file.
#[derive(Error, Debug)]
pub enum ResultReadError {
    #[error("Unsupported result format: {0}")]
    UnsupportedFormat(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
