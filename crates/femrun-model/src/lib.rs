//! Analysis data model consumed by the solver run pipeline.
//!
//! An [`Analysis`] is a read-only snapshot of what the host document holds:
//! one mesh object, material assignments and boundary conditions. Physical
//! values stay host quantity strings until a writer converts them with
//! [`Quantity`].

pub mod analysis;
pub mod backend;
pub mod condition;
pub mod group;
pub mod material;
pub mod quantity;

pub use analysis::{Analysis, MeshGenerator, MeshObject};
pub use backend::Backend;
pub use condition::{
    AxisDisplacement, Condition, ConditionData, ConditionKind, ElementKind, GeoRef, GeoRefError,
    SetType,
};
pub use group::{ConditionGroup, GroupEntry, GroupParams};
pub use material::{DENSITY, MaterialAssignment, POISSON_RATIO, YOUNGS_MODULUS};
pub use quantity::{Dimension, Quantity, QuantityError, UnitSystem, parse_quantity};
