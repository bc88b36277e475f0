use std::fmt;

use femrun_io::ElasticityOptions;
use femrun_model::Backend;
use serde::{Deserialize, Serialize};

use crate::host::ObjectId;
use crate::schema::{ELASTICITY_SCHEMA, PropertySchema, SOLVER_SCHEMA, SolverRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquationKind {
    #[default]
    Elasticity,
    BoneRemodelling,
}

impl EquationKind {
    pub fn schemas(self) -> Vec<PropertySchema> {
        match self {
            EquationKind::Elasticity => vec![SOLVER_SCHEMA, ELASTICITY_SCHEMA],
            EquationKind::BoneRemodelling => vec![SOLVER_SCHEMA],
        }
    }

    pub fn supported_by(self, backend: Backend) -> bool {
        match (self, backend) {
            (EquationKind::Elasticity, _) => true,
            (EquationKind::BoneRemodelling, Backend::Mofem) => true,
            (EquationKind::BoneRemodelling, Backend::Elmer) => false,
        }
    }
}

impl fmt::Display for EquationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EquationKind::Elasticity => f.write_str("elasticity"),
            EquationKind::BoneRemodelling => f.write_str("bone remodelling"),
        }
    }
}

/// The solver object of a run: backend selection, typed properties and the
/// host objects it owns across runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverObject {
    pub name: String,
    pub backend: Backend,
    pub equation: EquationKind,
    pub properties: SolverRecord,
    /// Result container, created by the first Results stage and reused.
    pub result: Option<ObjectId>,
    /// Text object holding the latest solver log.
    pub output: Option<ObjectId>,
}

impl SolverObject {
    pub fn new(name: impl Into<String>, backend: Backend, equation: EquationKind) -> Self {
        Self {
            name: name.into(),
            backend,
            equation,
            properties: SolverRecord::from_schemas(&equation.schemas()),
            result: None,
            output: None,
        }
    }

    pub fn approximation_order(&self) -> i64 {
        self.properties
            .get_int("ApproximationOrder")
            .unwrap_or(1)
            .max(1)
    }

    pub fn elasticity_options(&self) -> ElasticityOptions {
        let defaults = ElasticityOptions::default();
        let flag = |name: &str, default: bool| self.properties.get_bool(name).unwrap_or(default);
        let count = |name: &str, default: u32| {
            self.properties
                .get_int(name)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(default)
        };
        ElasticityOptions {
            eigen_analysis: flag("DoFrequencyAnalysis", defaults.eigen_analysis),
            eigenmodes_count: count("EigenmodesCount", defaults.eigenmodes_count),
            calculate_strains: flag("CalculateStrains", defaults.calculate_strains),
            calculate_stresses: flag("CalculateStresses", defaults.calculate_stresses),
            calculate_principal: flag("CalculatePrincipal", defaults.calculate_principal),
            calculate_pangle: flag("CalculatePangle", defaults.calculate_pangle),
            steady_state_max_iterations: count(
                "SteadyStateMaxIterations",
                defaults.steady_state_max_iterations,
            ),
            steady_state_min_iterations: count(
                "SteadyStateMinIterations",
                defaults.steady_state_min_iterations,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldValue;

    #[test]
    fn options_follow_properties() {
        let mut solver = SolverObject::new("SolverElmer", Backend::Elmer, EquationKind::Elasticity);
        assert_eq!(solver.elasticity_options(), ElasticityOptions::default());

        solver
            .properties
            .set("CalculateStresses", FieldValue::Bool(true))
            .expect("declared field");
        solver
            .properties
            .set("EigenmodesCount", FieldValue::Integer(12))
            .expect("declared field");
        let options = solver.elasticity_options();
        assert!(options.calculate_stresses);
        assert_eq!(options.eigenmodes_count, 12);
    }

    #[test]
    fn bone_remodelling_needs_mofem() {
        assert!(EquationKind::BoneRemodelling.supported_by(Backend::Mofem));
        assert!(!EquationKind::BoneRemodelling.supported_by(Backend::Elmer));
        let solver = SolverObject::new("SolverMoFEM", Backend::Mofem, EquationKind::BoneRemodelling);
        assert!(solver.properties.get("EigenmodesCount").is_none());
        assert_eq!(solver.approximation_order(), 1);
    }
}
