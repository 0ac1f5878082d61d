//! Dependency graph over deployment units.
//!
//! A unit's constructor arguments may reference other units by id; the
//! reference resolves to that unit's CREATE2 address, which is computable
//! before the unit is deployed. Plans therefore never touch the network, and
//! execution resolves the same addresses the plan predicted.

use std::collections::{BTreeMap, HashMap, HashSet};

use bytes::Bytes;
use ethereum_types::{Address, H256};
use tracing::debug;

use safedeploy_sdk::artifact::ContractArtifact;
use safedeploy_sdk::calldata::Value;
use safedeploy_sdk::create2::{DEFAULT_SALT, singleton_create2_address};
use safedeploy_sdk::deployer::{DeployResult, Deployer};
use safedeploy_sdk::error::DeployError;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("cyclic dependency between deployment units: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("unknown deployment unit `{0}`")]
    UnknownUnit(String),

    #[error("unknown suite `{0}`")]
    UnknownSuite(String),

    #[error("no artifact available for contract `{0}`")]
    UnknownArtifact(String),

    #[error(transparent)]
    Deploy(#[from] DeployError),
}

/// A constructor argument: either a literal ABI value or the (possibly
/// not-yet-deployed) address of another unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Value(Value),
    UnitAddress(String),
}

/// A named contract deployment with its constructor bindings.
#[derive(Debug, Clone)]
pub struct DeploymentUnit {
    pub id: String,
    pub artifact: ContractArtifact,
    pub args: Vec<Arg>,
    /// Explicit ordering hints beyond the argument references.
    pub after: Vec<String>,
}

impl DeploymentUnit {
    pub fn new(id: impl Into<String>, artifact: ContractArtifact) -> Self {
        Self {
            id: id.into(),
            artifact,
            args: Vec::new(),
            after: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn after(mut self, unit_id: impl Into<String>) -> Self {
        self.after.push(unit_id.into());
        self
    }

    fn dependencies(&self) -> Vec<&str> {
        self.args
            .iter()
            .filter_map(|arg| match arg {
                Arg::UnitAddress(id) => Some(id.as_str()),
                Arg::Value(_) => None,
            })
            .chain(self.after.iter().map(String::as_str))
            .collect()
    }
}

/// A named bundle of units and sub-suites, deployed together.
#[derive(Debug, Clone, Default)]
pub struct Suite {
    pub id: String,
    pub units: Vec<String>,
    pub suites: Vec<String>,
}

impl Suite {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_unit(mut self, unit_id: impl Into<String>) -> Self {
        self.units.push(unit_id.into());
        self
    }

    pub fn with_suite(mut self, suite_id: impl Into<String>) -> Self {
        self.suites.push(suite_id.into());
        self
    }
}

/// One unit of a resolved plan: address and constructor values are final,
/// computed without any network access.
#[derive(Debug, Clone)]
pub struct PlannedUnit {
    pub id: String,
    pub expected_address: Address,
    pub init_code: Bytes,
    pub args: Vec<Value>,
    pub salt: H256,
}

/// Dependency-ordered deployment plan; dependencies always precede their
/// dependents.
#[derive(Debug, Clone, Default)]
pub struct DeploymentPlan {
    units: Vec<PlannedUnit>,
}

impl DeploymentPlan {
    pub fn units(&self) -> &[PlannedUnit] {
        &self.units
    }

    pub fn expected_address(&self, unit_id: &str) -> Option<Address> {
        self.units
            .iter()
            .find(|unit| unit.id == unit_id)
            .map(|unit| unit.expected_address)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Registry of declared units and suites.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    units: HashMap<String, DeploymentUnit>,
    suites: HashMap<String, Suite>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit(&mut self, unit: DeploymentUnit) -> &mut Self {
        self.units.insert(unit.id.clone(), unit);
        self
    }

    pub fn add_suite(&mut self, suite: Suite) -> &mut Self {
        self.suites.insert(suite.id.clone(), suite);
        self
    }

    pub fn unit(&self, id: &str) -> Option<&DeploymentUnit> {
        self.units.get(id)
    }

    /// Declarative entry point: resolves `targets` (unit or suite ids) into a
    /// dependency-ordered plan with every address and constructor value
    /// computed. Touches no network state.
    pub fn plan(&self, targets: &[&str]) -> Result<DeploymentPlan, GraphError> {
        self.plan_with_salt(targets, DEFAULT_SALT)
    }

    pub fn plan_with_salt(&self, targets: &[&str], salt: H256) -> Result<DeploymentPlan, GraphError> {
        let roots = self.collect_units(targets)?;
        let order = self.topological_order(&roots)?;

        // Arena of resolved addresses, populated in dependency order; a
        // unit's references are always resolved before the unit itself.
        let mut addresses: HashMap<String, Address> = HashMap::new();
        let mut units = Vec::with_capacity(order.len());
        for id in order {
            let unit = self
                .units
                .get(&id)
                .ok_or_else(|| GraphError::UnknownUnit(id.clone()))?;
            let args = self.resolve_args(unit, &addresses)?;
            let init_code = unit.artifact.init_code(&args)?;
            let expected_address = singleton_create2_address(&init_code, salt);
            debug!(unit = %id, address = %format!("{expected_address:#x}"), "Resolved unit");
            addresses.insert(id.clone(), expected_address);
            units.push(PlannedUnit {
                id,
                expected_address,
                init_code,
                args,
                salt,
            });
        }
        Ok(DeploymentPlan { units })
    }

    /// Imperative entry point: walks the plan and deploys each unit in
    /// sequence. Dependency references resolve to the dependency's actual
    /// address, which by CREATE2 determinism equals the planned one.
    pub async fn execute(
        &self,
        deployer: &Deployer,
        targets: &[&str],
    ) -> Result<BTreeMap<String, DeployResult>, GraphError> {
        let plan = self.plan(targets)?;
        let mut results = BTreeMap::new();
        for planned in plan.units() {
            let unit = self
                .units
                .get(&planned.id)
                .ok_or_else(|| GraphError::UnknownUnit(planned.id.clone()))?;
            let result = deployer
                .deploy(&unit.artifact, &planned.args, planned.salt)
                .await?;
            results.insert(planned.id.clone(), result);
        }
        Ok(results)
    }

    fn resolve_args(
        &self,
        unit: &DeploymentUnit,
        addresses: &HashMap<String, Address>,
    ) -> Result<Vec<Value>, GraphError> {
        unit.args
            .iter()
            .map(|arg| match arg {
                Arg::Value(value) => Ok(value.clone()),
                Arg::UnitAddress(id) => addresses
                    .get(id)
                    .map(|address| Value::Address(*address))
                    .ok_or_else(|| GraphError::UnknownUnit(id.clone())),
            })
            .collect()
    }

    /// Expands suites (recursively, deduplicated) into the set of unit ids
    /// the targets cover, preserving declaration order.
    fn collect_units(&self, targets: &[&str]) -> Result<Vec<String>, GraphError> {
        let mut units = Vec::new();
        let mut seen = HashSet::new();
        let mut expanding = Vec::new();
        for target in targets {
            self.expand_target(target, &mut units, &mut seen, &mut expanding)?;
        }
        Ok(units)
    }

    fn expand_target(
        &self,
        id: &str,
        units: &mut Vec<String>,
        seen: &mut HashSet<String>,
        expanding: &mut Vec<String>,
    ) -> Result<(), GraphError> {
        if self.units.contains_key(id) {
            if seen.insert(id.to_string()) {
                units.push(id.to_string());
            }
            return Ok(());
        }
        let suite = self
            .suites
            .get(id)
            .ok_or_else(|| GraphError::UnknownSuite(id.to_string()))?;
        if expanding.iter().any(|s| s == id) {
            let mut cycle: Vec<String> = expanding
                .iter()
                .skip_while(|s| *s != id)
                .cloned()
                .collect();
            cycle.push(id.to_string());
            return Err(GraphError::CyclicDependency(cycle));
        }
        expanding.push(id.to_string());
        for sub in &suite.suites {
            self.expand_target(sub, units, seen, expanding)?;
        }
        for unit_id in &suite.units {
            if !self.units.contains_key(unit_id) {
                return Err(GraphError::UnknownUnit(unit_id.clone()));
            }
            if seen.insert(unit_id.clone()) {
                units.push(unit_id.clone());
            }
        }
        expanding.pop();
        Ok(())
    }

    /// Depth-first topological sort over argument references and `after`
    /// hints, with an explicit stack. Referenced units are pulled into the
    /// order even when the targets did not name them.
    fn topological_order(&self, roots: &[String]) -> Result<Vec<String>, GraphError> {
        #[derive(PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let mut marks: HashMap<String, Mark> = HashMap::new();
        let mut order = Vec::new();

        for root in roots {
            if marks.contains_key(root) {
                continue;
            }
            marks.insert(root.clone(), Mark::Visiting);
            let mut stack: Vec<(String, usize)> = vec![(root.clone(), 0)];

            while let Some((id, next_dep)) = stack.last().cloned() {
                let unit = self
                    .units
                    .get(&id)
                    .ok_or_else(|| GraphError::UnknownUnit(id.clone()))?;
                let deps = unit.dependencies();

                if next_dep >= deps.len() {
                    marks.insert(id.clone(), Mark::Done);
                    order.push(id);
                    stack.pop();
                    continue;
                }
                if let Some(frame) = stack.last_mut() {
                    frame.1 += 1;
                }
                let dep = deps[next_dep].to_string();
                match marks.get(&dep) {
                    Some(Mark::Done) => {}
                    Some(Mark::Visiting) => {
                        let mut cycle: Vec<String> = stack
                            .iter()
                            .map(|(frame_id, _)| frame_id.clone())
                            .skip_while(|frame_id| *frame_id != dep)
                            .collect();
                        cycle.push(dep);
                        return Err(GraphError::CyclicDependency(cycle));
                    }
                    None => {
                        if !self.units.contains_key(&dep) {
                            return Err(GraphError::UnknownUnit(dep));
                        }
                        marks.insert(dep.clone(), Mark::Visiting);
                        stack.push((dep, 0));
                    }
                }
            }
        }
        Ok(order)
    }
}
