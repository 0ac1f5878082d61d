//! Factory bootstrapping and deterministic contract deployment.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use tracing::{debug, info};

use crate::artifact::ContractArtifact;
use crate::calldata::{Value, encode_calldata};
use crate::client::{ChainClient, TransactionRequest};
use crate::create2::{SAFE_SINGLETON_FACTORY, singleton_create2_address};
use crate::error::DeployError;
use crate::factory::FactoryRegistry;

/// The factory's CREATE2 entry point.
pub const FACTORY_DEPLOY_SIGNATURE: &str = "deploy(bytes,bytes32)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployResult {
    pub address: Address,
    /// `false` means the address already held code before this run and no
    /// transaction was sent.
    pub deployed: bool,
}

/// Deploys contracts at chain-independent addresses through the singleton
/// factory. Idempotent: re-running against the same chain re-derives every
/// decision from on-chain state.
pub struct Deployer {
    client: Arc<dyn ChainClient>,
    registry: Arc<dyn FactoryRegistry>,
    // Set once the factory has been confirmed on this chain, so subsequent
    // deploys skip the code query. Never set on failure: a retried run must
    // restart from the on-chain check.
    factory_ready: AtomicBool,
}

impl Deployer {
    pub fn new(client: Arc<dyn ChainClient>, registry: Arc<dyn FactoryRegistry>) -> Self {
        Self {
            client,
            registry,
            factory_ready: AtomicBool::new(false),
        }
    }

    /// The address `artifact` will occupy once deployed with `args` and
    /// `salt`. Pure computation, touches no network state; dependents use it
    /// to reference units that have not been deployed yet.
    pub fn expected_address(
        artifact: &ContractArtifact,
        args: &[Value],
        salt: H256,
    ) -> Result<Address, DeployError> {
        let init_code = artifact.init_code(args)?;
        Ok(singleton_create2_address(&init_code, salt))
    }

    /// Makes sure the singleton factory exists on the target chain,
    /// bootstrapping it from its pre-signed transaction if necessary.
    ///
    /// Safe to call before every deployment; after the first confirmation it
    /// is a no-op for the rest of the session.
    pub async fn ensure_factory_deployed(&self) -> Result<(), DeployError> {
        if self.factory_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        if !self.client.get_code(SAFE_SINGLETON_FACTORY).await?.is_empty() {
            debug!("Singleton factory already deployed");
            self.factory_ready.store(true, Ordering::Release);
            return Ok(());
        }

        let chain_id = self.client.chain_id().await?;
        let info = self
            .registry
            .lookup(chain_id)
            .ok_or(DeployError::UnsupportedNetwork { chain_id })?;
        // deploy() targets the well-known address; a record pointing anywhere
        // else would bootstrap one address and deploy through another.
        if info.address != SAFE_SINGLETON_FACTORY {
            return Err(DeployError::FactoryAddressMismatch {
                chain_id,
                address: info.address,
                expected: SAFE_SINGLETON_FACTORY,
            });
        }

        let required = info.required_funding();
        let balance = self.client.get_balance(info.signer_address).await?;
        if balance < required {
            let shortfall = required - balance;
            info!(
                signer = %format!("{:#x}", info.signer_address),
                amount = %shortfall,
                "Funding singleton factory deployer"
            );
            let tx_hash = self
                .client
                .send_transaction(TransactionRequest {
                    to: Some(info.signer_address),
                    value: shortfall,
                    data: Bytes::new(),
                })
                .await?;
            self.client.wait_for_receipt(tx_hash).await?;
        }

        info!(chain_id, "Deploying singleton factory");
        let tx_hash = self.client.send_raw_transaction(&info.transaction).await?;
        self.client.wait_for_receipt(tx_hash).await?;

        if self.client.get_code(info.address).await?.is_empty() {
            return Err(DeployError::DeploymentFailed {
                name: "SafeSingletonFactory".to_string(),
                address: info.address,
            });
        }
        info!(address = %format!("{:#x}", info.address), "Singleton factory deployed");
        self.factory_ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Deploys `artifact` at its deterministic address, or returns the
    /// existing deployment if the address already holds code.
    pub async fn deploy(
        &self,
        artifact: &ContractArtifact,
        args: &[Value],
        salt: H256,
    ) -> Result<DeployResult, DeployError> {
        self.ensure_factory_deployed().await?;

        let init_code = artifact.init_code(args)?;
        let expected = singleton_create2_address(&init_code, salt);

        if !self.client.get_code(expected).await?.is_empty() {
            info!(
                contract = %artifact.name,
                address = %format!("{expected:#x}"),
                "Already deployed"
            );
            return Ok(DeployResult {
                address: expected,
                deployed: false,
            });
        }

        info!(contract = %artifact.name, "Deploying");
        let calldata = encode_calldata(
            FACTORY_DEPLOY_SIGNATURE,
            &[
                Value::Bytes(init_code),
                Value::FixedBytes(Bytes::copy_from_slice(salt.as_bytes())),
            ],
        )?;
        let tx_hash = self
            .client
            .send_transaction(TransactionRequest {
                to: Some(SAFE_SINGLETON_FACTORY),
                value: U256::zero(),
                data: calldata.into(),
            })
            .await?;
        self.client.wait_for_receipt(tx_hash).await?;

        // A reverted constructor (or a factory-level revert) leaves the
        // address empty; the code query is the source of truth, not the
        // receipt.
        if self.client.get_code(expected).await?.is_empty() {
            return Err(DeployError::DeploymentFailed {
                name: artifact.name.clone(),
                address: expected,
            });
        }
        info!(
            contract = %artifact.name,
            address = %format!("{expected:#x}"),
            tx_hash = %format!("{tx_hash:#x}"),
            "Deployed"
        );
        Ok(DeployResult {
            address: expected,
            deployed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create2::DEFAULT_SALT;
    use crate::factory::{FactoryInfo, StaticFactoryRegistry};
    use crate::test_utils::MockChain;
    use hex_literal::hex;

    const CHAIN_ID: u64 = 31337;

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

    fn supported_registry() -> Arc<StaticFactoryRegistry> {
        Arc::new(StaticFactoryRegistry::new().with_entry(CHAIN_ID, factory_info()))
    }

    fn chain_with_pending_factory() -> Arc<MockChain> {
        let chain = MockChain::new(CHAIN_ID);
        chain.register_factory_bootstrap(&factory_info(), hex!("60456000").to_vec());
        Arc::new(chain)
    }

    fn artifact() -> ContractArtifact {
        ContractArtifact::new("Demo", hex!("6001600101").to_vec())
    }

    #[tokio::test]
    async fn deploy_is_idempotent() {
        let chain = chain_with_pending_factory();
        let deployer = Deployer::new(chain.clone(), supported_registry());

        let first = deployer.deploy(&artifact(), &[], DEFAULT_SALT).await.unwrap();
        let second = deployer.deploy(&artifact(), &[], DEFAULT_SALT).await.unwrap();

        assert!(first.deployed);
        assert!(!second.deployed);
        assert_eq!(first.address, second.address);
        // one factory bootstrap funding + one creation, nothing for the rerun
        assert_eq!(chain.factory_calls(), 1);
    }

    #[tokio::test]
    async fn deployed_address_matches_expected_address() {
        let chain = chain_with_pending_factory();
        let deployer = Deployer::new(chain.clone(), supported_registry());

        let expected =
            Deployer::expected_address(&artifact(), &[], DEFAULT_SALT).unwrap();
        let result = deployer.deploy(&artifact(), &[], DEFAULT_SALT).await.unwrap();
        assert_eq!(result.address, expected);
        assert!(!chain.code_at(expected).is_empty());
    }

    #[tokio::test]
    async fn bootstrap_is_noop_when_factory_has_code() {
        let chain = Arc::new(MockChain::new(CHAIN_ID));
        chain.set_code(SAFE_SINGLETON_FACTORY, Bytes::from_static(&hex!("604580")));
        let deployer = Deployer::new(chain.clone(), supported_registry());

        deployer.ensure_factory_deployed().await.unwrap();
        assert_eq!(chain.sent_transaction_count(), 0);
        assert_eq!(chain.raw_transaction_count(), 0);
    }

    #[tokio::test]
    async fn funding_is_skipped_when_signer_balance_suffices() {
        let chain = chain_with_pending_factory();
        let info = factory_info();
        chain.set_balance(info.signer_address, info.required_funding());
        let deployer = Deployer::new(chain.clone(), supported_registry());

        deployer.ensure_factory_deployed().await.unwrap();
        assert_eq!(chain.raw_transaction_count(), 1);
        // no funding transfer was needed
        assert_eq!(chain.sent_transaction_count(), 0);
    }

    #[tokio::test]
    async fn funding_covers_exactly_the_shortfall() {
        let chain = chain_with_pending_factory();
        let info = factory_info();
        let preexisting = U256::from(1_000_000u64);
        chain.set_balance(info.signer_address, preexisting);
        let deployer = Deployer::new(chain.clone(), supported_registry());

        deployer.ensure_factory_deployed().await.unwrap();
        let transfers = chain.sent_transactions();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].to, Some(info.signer_address));
        assert_eq!(transfers[0].value, info.required_funding() - preexisting);
    }

    #[tokio::test]
    async fn unsupported_chain_fails_before_any_transaction() {
        let chain = Arc::new(MockChain::new(999));
        let deployer = Deployer::new(chain.clone(), supported_registry());

        let err = deployer.deploy(&artifact(), &[], DEFAULT_SALT).await.unwrap_err();
        assert!(matches!(err, DeployError::UnsupportedNetwork { chain_id: 999 }));
        assert_eq!(chain.sent_transaction_count(), 0);
        assert_eq!(chain.raw_transaction_count(), 0);
    }

    #[tokio::test]
    async fn off_factory_record_is_rejected_before_any_transaction() {
        let chain = Arc::new(MockChain::new(CHAIN_ID));
        let mut info = factory_info();
        info.address = Address::from_slice(&hex!("00000000000000000000000000000000000000aa"));
        let deployer = Deployer::new(
            chain.clone(),
            Arc::new(StaticFactoryRegistry::new().with_entry(CHAIN_ID, info)),
        );

        let err = deployer.ensure_factory_deployed().await.unwrap_err();
        assert!(matches!(
            err,
            DeployError::FactoryAddressMismatch { chain_id: CHAIN_ID, .. }
        ));
        assert_eq!(chain.sent_transaction_count(), 0);
        assert_eq!(chain.raw_transaction_count(), 0);
    }

    #[tokio::test]
    async fn reverting_constructor_reports_deployment_failed() {
        let chain = chain_with_pending_factory();
        // 0x600080fd: PUSH1 0x00 DUP1 REVERT — reverts during construction
        let reverting = ContractArtifact::new("Reverter", hex!("600080fd").to_vec());
        chain.mark_reverting(&hex!("600080fd")[..]);
        let deployer = Deployer::new(chain.clone(), supported_registry());

        let err = deployer.deploy(&reverting, &[], DEFAULT_SALT).await.unwrap_err();
        match err {
            DeployError::DeploymentFailed { name, address } => {
                assert_eq!(name, "Reverter");
                assert_eq!(
                    address,
                    Address::from_slice(&hex!("b294361e30b81858f2d9654df88350e12f8bc84d"))
                );
            }
            other => panic!("expected DeploymentFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn abstract_artifact_is_rejected_without_sending() {
        let chain = chain_with_pending_factory();
        let deployer = Deployer::new(chain.clone(), supported_registry());
        let abstract_artifact = ContractArtifact::new("Abstract", Bytes::new());

        let err = deployer
            .deploy(&abstract_artifact, &[], DEFAULT_SALT)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::InitCodeUnavailable(_)));
        assert_eq!(chain.factory_calls(), 0);
    }
}
