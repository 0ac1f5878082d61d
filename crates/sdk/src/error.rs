//! Error types for the deployment engine.

use ethereum_types::{Address, H256};

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(
        "no singleton factory deployment is registered for chain id {chain_id}; \
         request one at https://github.com/safe-global/safe-singleton-factory"
    )]
    UnsupportedNetwork { chain_id: u64 },

    #[error(
        "factory record for chain id {chain_id} points at {address:#x}, \
         expected the well-known factory {expected:#x}"
    )]
    FactoryAddressMismatch {
        chain_id: u64,
        address: Address,
        expected: Address,
    },

    #[error("contract {0} has no creation bytecode")]
    InitCodeUnavailable(String),

    #[error("no code at {address:#x} after deploying {name} through the singleton factory")]
    DeploymentFailed { name: String, address: Address },

    #[error("failed to encode calldata: {0}")]
    Calldata(#[from] CalldataError),

    #[error("chain client error: {0}")]
    Client(#[from] ChainClientError),
}

/// Errors surfaced by the network interface. These propagate unmodified;
/// the engine has no retry policy of its own because a failed run is safe
/// to restart from scratch (every step re-derives state from the chain).
#[derive(Debug, thiserror::Error)]
pub enum ChainClientError {
    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("transaction {0:#x} was not included in a block")]
    TransactionNotFound(H256),

    #[error("insufficient funds in account {from:#x}")]
    InsufficientFunds { from: Address },
}

#[derive(Debug, thiserror::Error)]
pub enum CalldataError {
    #[error("fixed-bytes value of {0} bytes exceeds the 32-byte word size")]
    FixedBytesTooLong(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum FactoryRegistryError {
    #[error("failed to parse factory registry: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid chain id key `{0}` in factory registry")]
    InvalidChainId(String),

    #[error("failed to read factory registry: {0}")]
    Io(#[from] std::io::Error),
}
