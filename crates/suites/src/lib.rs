//! Declarative deployment units, suites and the dependency graph that
//! resolves them, plus the Safe contract-suite declarations.

pub mod graph;
pub mod safe;

pub use graph::{
    Arg, DeploymentPlan, DeploymentUnit, GraphError, ModuleRegistry, PlannedUnit, Suite,
};
