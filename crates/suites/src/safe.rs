//! The Safe smart-account contract suite.
//!
//! Mirrors the upstream deployment layout: singleton, L2 singleton, proxy
//! factory, fallback handlers, accessors, libraries, and the migration
//! contract wired to the singletons' deterministic addresses. The migration
//! unit is the one with real dependency edges: its constructor takes the
//! addresses of `Safe`, `SafeL2` and `CompatibilityFallbackHandler`, which
//! may or may not be deployed yet when it is resolved.

use safedeploy_sdk::artifact::{ArtifactSource, ContractArtifact};

use crate::graph::{Arg, DeploymentUnit, GraphError, ModuleRegistry, Suite};

pub const SAFE: &str = "Safe";
pub const SAFE_L2: &str = "SafeL2";
pub const SAFE_PROXY_FACTORY: &str = "SafeProxyFactory";
pub const TOKEN_CALLBACK_HANDLER: &str = "TokenCallbackHandler";
pub const COMPATIBILITY_FALLBACK_HANDLER: &str = "CompatibilityFallbackHandler";
pub const EXTENSIBLE_FALLBACK_HANDLER: &str = "ExtensibleFallbackHandler";
pub const SIMULATE_TX_ACCESSOR: &str = "SimulateTxAccessor";
pub const CREATE_CALL: &str = "CreateCall";
pub const MULTI_SEND: &str = "MultiSend";
pub const MULTI_SEND_CALL_ONLY: &str = "MultiSendCallOnly";
pub const SIGN_MESSAGE_LIB: &str = "SignMessageLib";
pub const SAFE_TO_L2_SETUP: &str = "SafeToL2Setup";
pub const SAFE_MIGRATION: &str = "SafeMigration";

pub const SUITE_SINGLETON: &str = "singleton";
pub const SUITE_L2: &str = "safe-l2";
pub const SUITE_PROXY_FACTORY: &str = "proxy-factory";
pub const SUITE_HANDLERS: &str = "handlers";
pub const SUITE_ACCESSORS: &str = "accessors";
pub const SUITE_LIBRARIES: &str = "libraries";
pub const SUITE_MAIN: &str = "main-suite";
pub const SUITE_MIGRATION: &str = "migration";

/// Contracts with argument-free constructors.
const PLAIN_CONTRACTS: [&str; 12] = [
    SAFE,
    SAFE_L2,
    SAFE_PROXY_FACTORY,
    TOKEN_CALLBACK_HANDLER,
    COMPATIBILITY_FALLBACK_HANDLER,
    EXTENSIBLE_FALLBACK_HANDLER,
    SIMULATE_TX_ACCESSOR,
    CREATE_CALL,
    MULTI_SEND,
    MULTI_SEND_CALL_ONLY,
    SIGN_MESSAGE_LIB,
    SAFE_TO_L2_SETUP,
];

/// Builds the registry of all Safe deployment units and suites, pulling each
/// contract's creation bytecode from `artifacts`.
pub fn registry(artifacts: &dyn ArtifactSource) -> Result<ModuleRegistry, GraphError> {
    let mut registry = ModuleRegistry::new();

    for name in PLAIN_CONTRACTS {
        registry.add_unit(DeploymentUnit::new(name, lookup(artifacts, name)?));
    }
    registry.add_unit(
        DeploymentUnit::new(SAFE_MIGRATION, lookup(artifacts, SAFE_MIGRATION)?)
            .with_arg(Arg::UnitAddress(SAFE.to_string()))
            .with_arg(Arg::UnitAddress(SAFE_L2.to_string()))
            .with_arg(Arg::UnitAddress(COMPATIBILITY_FALLBACK_HANDLER.to_string())),
    );

    registry.add_suite(Suite::new(SUITE_SINGLETON).with_unit(SAFE));
    registry.add_suite(Suite::new(SUITE_L2).with_unit(SAFE_L2));
    registry.add_suite(Suite::new(SUITE_PROXY_FACTORY).with_unit(SAFE_PROXY_FACTORY));
    registry.add_suite(
        Suite::new(SUITE_HANDLERS)
            .with_unit(TOKEN_CALLBACK_HANDLER)
            .with_unit(COMPATIBILITY_FALLBACK_HANDLER)
            .with_unit(EXTENSIBLE_FALLBACK_HANDLER),
    );
    registry.add_suite(Suite::new(SUITE_ACCESSORS).with_unit(SIMULATE_TX_ACCESSOR));
    registry.add_suite(
        Suite::new(SUITE_LIBRARIES)
            .with_unit(CREATE_CALL)
            .with_unit(MULTI_SEND)
            .with_unit(MULTI_SEND_CALL_ONLY)
            .with_unit(SIGN_MESSAGE_LIB)
            .with_unit(SAFE_TO_L2_SETUP),
    );
    registry.add_suite(
        Suite::new(SUITE_MAIN)
            .with_suite(SUITE_SINGLETON)
            .with_suite(SUITE_L2)
            .with_suite(SUITE_PROXY_FACTORY)
            .with_suite(SUITE_HANDLERS)
            .with_suite(SUITE_ACCESSORS)
            .with_suite(SUITE_LIBRARIES),
    );
    registry.add_suite(
        Suite::new(SUITE_MIGRATION)
            .with_suite(SUITE_MAIN)
            .with_unit(SAFE_MIGRATION),
    );

    Ok(registry)
}

fn lookup(artifacts: &dyn ArtifactSource, name: &str) -> Result<ContractArtifact, GraphError> {
    artifacts
        .artifact(name)
        .ok_or_else(|| GraphError::UnknownArtifact(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use hex_literal::hex;
    use safedeploy_sdk::artifact::InMemoryArtifacts;
    use safedeploy_sdk::calldata::Value;
    use safedeploy_sdk::create2::SAFE_SINGLETON_FACTORY;
    use safedeploy_sdk::deployer::Deployer;
    use safedeploy_sdk::factory::{FactoryInfo, StaticFactoryRegistry};
    use safedeploy_sdk::test_utils::MockChain;

    use bytes::Bytes;
    use ethereum_types::Address;

    const CHAIN_ID: u64 = 31337;

    /// Distinct dummy bytecode per contract so every unit gets its own
    /// deterministic address.
    fn artifacts() -> InMemoryArtifacts {
        let mut store = InMemoryArtifacts::new();
        let names = PLAIN_CONTRACTS.iter().chain([&SAFE_MIGRATION]);
        for (index, name) in names.enumerate() {
            let bytecode = vec![0x60, index as u8 + 1, 0x60, 0x01, 0x01];
            store = store.with_artifact(ContractArtifact::new(*name, bytecode));
        }
        store
    }

    fn factory_info() -> FactoryInfo {
        FactoryInfo {
            address: SAFE_SINGLETON_FACTORY,
            signer_address: Address::from_slice(&hex!(
                "e1cb04a0fa36ddd16a06ea828007e35e1a3cbc37"
            )),
            gas_limit: 100_000,
            gas_price: 100_000_000_000,
            transaction: Bytes::from_static(&hex!("f8a58085174876e800830186a08080b853604580")),
        }
    }

    #[test]
    fn main_suite_covers_twelve_contracts() {
        let registry = registry(&artifacts()).unwrap();
        let plan = registry.plan(&[SUITE_MAIN]).unwrap();
        assert_eq!(plan.len(), 12);
        assert!(plan.expected_address(SAFE_MIGRATION).is_none());
    }

    #[test]
    fn migration_suite_adds_the_migration_contract() {
        let registry = registry(&artifacts()).unwrap();
        let plan = registry.plan(&[SUITE_MIGRATION]).unwrap();
        assert_eq!(plan.len(), 13);

        // SafeMigration's constructor holds the three dependency addresses
        let migration = plan
            .units()
            .iter()
            .find(|unit| unit.id == SAFE_MIGRATION)
            .unwrap();
        assert_eq!(
            migration.args,
            vec![
                Value::Address(plan.expected_address(SAFE).unwrap()),
                Value::Address(plan.expected_address(SAFE_L2).unwrap()),
                Value::Address(
                    plan.expected_address(COMPATIBILITY_FALLBACK_HANDLER).unwrap()
                ),
            ]
        );
    }

    #[test]
    fn migration_resolves_even_when_targeted_alone() {
        let registry = registry(&artifacts()).unwrap();
        // dependencies are pulled in and ordered ahead of the migration
        let plan = registry.plan(&[SAFE_MIGRATION]).unwrap();
        let ids: Vec<&str> = plan.units().iter().map(|unit| unit.id.as_str()).collect();
        assert_eq!(ids.last(), Some(&SAFE_MIGRATION));
        assert!(ids.contains(&SAFE));
        assert!(ids.contains(&SAFE_L2));
        assert!(ids.contains(&COMPATIBILITY_FALLBACK_HANDLER));
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn missing_artifact_is_reported_by_name() {
        let err = registry(&InMemoryArtifacts::new()).unwrap_err();
        assert!(matches!(err, GraphError::UnknownArtifact(name) if name == SAFE));
    }

    #[tokio::test]
    async fn migration_suite_deploys_end_to_end() {
        let registry = registry(&artifacts()).unwrap();
        let plan = registry.plan(&[SUITE_MIGRATION]).unwrap();

        let chain = Arc::new(MockChain::new(CHAIN_ID));
        chain.register_factory_bootstrap(&factory_info(), hex!("604580").to_vec());
        let deployer = Deployer::new(
            chain.clone(),
            Arc::new(StaticFactoryRegistry::new().with_entry(CHAIN_ID, factory_info())),
        );

        let results = registry.execute(&deployer, &[SUITE_MIGRATION]).await.unwrap();
        assert_eq!(results.len(), 13);
        for planned in plan.units() {
            assert_eq!(results[&planned.id].address, planned.expected_address);
            assert!(results[&planned.id].deployed);
        }

        // re-running the whole suite is a no-op
        let rerun = registry.execute(&deployer, &[SUITE_MIGRATION]).await.unwrap();
        assert!(rerun.values().all(|result| !result.deployed));
        assert_eq!(chain.factory_calls(), 13);
    }
}
