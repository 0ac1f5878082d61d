//! Network interface the deployment engine runs against.
//!
//! The engine treats the chain as an already-authenticated, already-selected
//! collaborator: implementations wrap whatever JSON-RPC client the embedder
//! uses. [`crate::test_utils::MockChain`] is the in-memory implementation
//! used by the test suite.

use async_trait::async_trait;
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

use crate::error::ChainClientError;

/// A transaction sent from the operator's first funded signer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub tx_hash: H256,
    pub status: bool,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, ChainClientError>;

    /// Runtime code at `address`; empty when no contract is deployed there.
    async fn get_code(&self, address: Address) -> Result<Bytes, ChainClientError>;

    async fn get_balance(&self, address: Address) -> Result<U256, ChainClientError>;

    /// Signs with the operator's first funded account and broadcasts.
    async fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<H256, ChainClientError>;

    /// Broadcasts an already-signed raw transaction as-is. The signature is
    /// fixed, so the sender is whoever signed it, not the operator.
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256, ChainClientError>;

    /// Blocks until the transaction is included in a block.
    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TransactionReceipt, ChainClientError>;
}
