//! In-memory chain double for exercising the deployment pipeline without a
//! node. Simulates exactly what the engine observes: code and balance state,
//! the factory's `deploy(bytes,bytes32)` entry point, and the pre-signed
//! bootstrap transaction.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

use crate::client::{ChainClient, TransactionReceipt, TransactionRequest};
use crate::create2::{create2_address, keccak};
use crate::deployer::FACTORY_DEPLOY_SIGNATURE;
use crate::error::ChainClientError;
use crate::factory::FactoryInfo;

struct PendingBootstrap {
    raw: Vec<u8>,
    factory: Address,
    code: Bytes,
    signer: Address,
    required_funding: U256,
}

#[derive(Default)]
struct State {
    code: HashMap<Address, Bytes>,
    balances: HashMap<Address, U256>,
    bootstrap: Option<PendingBootstrap>,
    reverting_init_codes: HashSet<Vec<u8>>,
    sent: Vec<TransactionRequest>,
    raw_sent: Vec<Vec<u8>>,
    factory_calls: usize,
    next_tx: u64,
}

pub struct MockChain {
    chain_id: u64,
    state: Mutex<State>,
}

impl MockChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(State::default()),
        }
    }

    /// Registers `info.transaction` so that broadcasting it installs `code`
    /// at the factory address, provided the signer holds the required funding.
    pub fn register_factory_bootstrap(&self, info: &FactoryInfo, code: impl Into<Bytes>) {
        self.lock().bootstrap = Some(PendingBootstrap {
            raw: info.transaction.to_vec(),
            factory: info.address,
            code: code.into(),
            signer: info.signer_address,
            required_funding: info.required_funding(),
        });
    }

    /// Marks an init code whose constructor reverts: the factory call is
    /// included but leaves no code behind.
    pub fn mark_reverting(&self, init_code: impl Into<Vec<u8>>) {
        self.lock().reverting_init_codes.insert(init_code.into());
    }

    pub fn set_code(&self, address: Address, code: Bytes) {
        self.lock().code.insert(address, code);
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.lock().balances.insert(address, balance);
    }

    pub fn code_at(&self, address: Address) -> Bytes {
        self.lock().code.get(&address).cloned().unwrap_or_default()
    }

    /// Value transfers sent from the operator signer (funding transactions).
    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        self.lock()
            .sent
            .iter()
            .filter(|tx| tx.data.is_empty())
            .cloned()
            .collect()
    }

    pub fn sent_transaction_count(&self) -> usize {
        self.sent_transactions().len()
    }

    pub fn raw_transaction_count(&self) -> usize {
        self.lock().raw_sent.len()
    }

    /// Number of `deploy(bytes,bytes32)` invocations the factory received.
    pub fn factory_calls(&self) -> usize {
        self.lock().factory_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn deploy_selector() -> [u8; 4] {
        let digest = keccak(FACTORY_DEPLOY_SIGNATURE.as_bytes());
        [digest[0], digest[1], digest[2], digest[3]]
    }

    /// Decodes our own `deploy(bytes,bytes32)` calldata layout.
    fn decode_deploy_call(data: &[u8]) -> Option<(Vec<u8>, H256)> {
        let args = data.get(4..)?;
        let offset = U256::from_big_endian(args.get(..32)?).as_usize();
        let salt = H256::from_slice(args.get(32..64)?);
        let len = U256::from_big_endian(args.get(offset..offset + 32)?).as_usize();
        let init_code = args.get(offset + 32..offset + 32 + len)?.to_vec();
        Some((init_code, salt))
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64, ChainClientError> {
        Ok(self.chain_id)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, ChainClientError> {
        Ok(self.code_at(address))
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ChainClientError> {
        Ok(self
            .lock()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<H256, ChainClientError> {
        let mut state = self.lock();
        state.sent.push(request.clone());

        if request.data.len() >= 4 && request.data[..4] == Self::deploy_selector() {
            let to = request.to.ok_or_else(|| {
                ChainClientError::Rpc("contract call without a target".to_string())
            })?;
            let factory_code = state.code.get(&to).cloned().unwrap_or_default();
            if factory_code.is_empty() {
                return Err(ChainClientError::Rpc(format!(
                    "call to {to:#x} but no contract is deployed there"
                )));
            }
            let (init_code, salt) =
                Self::decode_deploy_call(&request.data).ok_or_else(|| {
                    ChainClientError::Rpc("malformed deploy(bytes,bytes32) calldata".to_string())
                })?;
            state.factory_calls += 1;
            if !state.reverting_init_codes.contains(&init_code) {
                let address = create2_address(to, salt, &init_code);
                state.code.insert(address, Bytes::from(init_code));
            }
        } else if request.data.is_empty() {
            if let Some(to) = request.to {
                let balance = state.balances.entry(to).or_default();
                *balance += request.value;
            }
        }

        state.next_tx += 1;
        Ok(H256::from_low_u64_be(state.next_tx))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256, ChainClientError> {
        let mut state = self.lock();
        state.raw_sent.push(raw.to_vec());

        match &state.bootstrap {
            Some(pending) if pending.raw == raw => {
                let balance = state
                    .balances
                    .get(&pending.signer)
                    .copied()
                    .unwrap_or_default();
                if balance < pending.required_funding {
                    return Err(ChainClientError::InsufficientFunds {
                        from: pending.signer,
                    });
                }
                let (factory, code) = (pending.factory, pending.code.clone());
                state.code.insert(factory, code);
            }
            _ => {
                return Err(ChainClientError::Rpc(
                    "unknown raw transaction".to_string(),
                ));
            }
        }

        state.next_tx += 1;
        Ok(H256::from_low_u64_be(state.next_tx))
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<TransactionReceipt, ChainClientError> {
        if tx_hash.is_zero() || H256::from_low_u64_be(self.lock().next_tx) < tx_hash {
            return Err(ChainClientError::TransactionNotFound(tx_hash));
        }
        Ok(TransactionReceipt {
            tx_hash,
            status: true,
        })
    }
}
