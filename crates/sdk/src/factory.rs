//! Per-chain singleton factory bootstrap records.
//!
//! The factory lands at the same address on every chain because it is always
//! created by the same pre-signed transaction. Those transactions live in an
//! external registry (the `safe-global/safe-singleton-factory` repository);
//! this module models its records and the lookup boundary so tests and
//! alternate environments can inject their own.

use std::collections::HashMap;
use std::path::Path;

use bytes::Bytes;
use ethereum_types::{Address, U256};
use serde::{Deserialize, Deserializer};

use crate::create2::SAFE_SINGLETON_FACTORY;
use crate::error::FactoryRegistryError;

/// Bootstrap record for one chain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryInfo {
    /// Factory contract address; constant across chains by construction.
    #[serde(default = "default_factory_address")]
    pub address: Address,
    /// Sender of the pre-signed transaction. Must hold `gas_limit * gas_price`
    /// before the transaction can be broadcast.
    pub signer_address: Address,
    #[serde(deserialize_with = "number_or_decimal_string")]
    pub gas_limit: u64,
    #[serde(deserialize_with = "number_or_decimal_string")]
    pub gas_price: u64,
    /// The raw signed deployment transaction, broadcast verbatim.
    #[serde(deserialize_with = "hex_bytes")]
    pub transaction: Bytes,
}

impl FactoryInfo {
    /// Balance the pre-signed transaction's sender needs before broadcast.
    pub fn required_funding(&self) -> U256 {
        U256::from(self.gas_limit) * U256::from(self.gas_price)
    }
}

fn default_factory_address() -> Address {
    SAFE_SINGLETON_FACTORY
}

// Upstream records carry gas fields as JSON numbers in older entries and as
// decimal strings in newer ones.
fn number_or_decimal_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        String(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::String(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn hex_bytes<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    hex::decode(s.strip_prefix("0x").unwrap_or(&s))
        .map(Bytes::from)
        .map_err(serde::de::Error::custom)
}

pub trait FactoryRegistry: Send + Sync {
    fn lookup(&self, chain_id: u64) -> Option<FactoryInfo>;
}

/// In-memory registry, for tests and embedders that source records themselves.
#[derive(Debug, Default, Clone)]
pub struct StaticFactoryRegistry {
    entries: HashMap<u64, FactoryInfo>,
}

impl StaticFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, chain_id: u64, info: FactoryInfo) -> Self {
        self.entries.insert(chain_id, info);
        self
    }
}

impl FactoryRegistry for StaticFactoryRegistry {
    fn lookup(&self, chain_id: u64) -> Option<FactoryInfo> {
        self.entries.get(&chain_id).cloned()
    }
}

/// Registry backed by a `{ "<chainId>": record }` JSON document vendored from
/// the upstream repository.
#[derive(Debug, Clone)]
pub struct JsonFactoryRegistry {
    entries: HashMap<u64, FactoryInfo>,
}

impl JsonFactoryRegistry {
    pub fn from_json(document: &str) -> Result<Self, FactoryRegistryError> {
        let raw: HashMap<String, FactoryInfo> = serde_json::from_str(document)?;
        let mut entries = HashMap::with_capacity(raw.len());
        for (key, info) in raw {
            let chain_id = key
                .parse()
                .map_err(|_| FactoryRegistryError::InvalidChainId(key))?;
            entries.insert(chain_id, info);
        }
        Ok(Self { entries })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FactoryRegistryError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FactoryRegistry for JsonFactoryRegistry {
    fn lookup(&self, chain_id: u64) -> Option<FactoryInfo> {
        self.entries.get(&chain_id).cloned()
    }
}
