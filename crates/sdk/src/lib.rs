//! Deterministic CREATE2 deployment through the Safe Singleton Factory.
//!
//! Every contract deployed through this crate lands at the same address on
//! every EVM chain, independent of the deployer account and its nonce
//! history. The factory itself is bootstrapped from a pre-signed raw
//! transaction, which is what pins its own address across chains.

pub mod artifact;
pub mod calldata;
pub mod client;
pub mod create2;
pub mod deployer;
pub mod error;
pub mod factory;
pub mod test_utils;

pub use artifact::{ArtifactSource, ContractArtifact, InMemoryArtifacts};
pub use calldata::{Value, encode_calldata, encode_tuple};
pub use client::{ChainClient, TransactionReceipt, TransactionRequest};
pub use create2::{DEFAULT_SALT, SAFE_SINGLETON_FACTORY, create2_address, singleton_create2_address};
pub use deployer::{DeployResult, Deployer};
pub use error::{CalldataError, ChainClientError, DeployError, FactoryRegistryError};
pub use factory::{FactoryInfo, FactoryRegistry, JsonFactoryRegistry, StaticFactoryRegistry};
