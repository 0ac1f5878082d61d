//! CREATE2 address derivation.
//!
//! `address = last 20 bytes of keccak256(0xff ++ deployer ++ salt ++ keccak256(init_code))`
//! (EIP-1014). The formula depends only on its inputs, never on chain id or
//! sender nonce, which is what makes cross-chain address stability possible.

use ethereum_types::{Address, H160, H256};
use hex_literal::hex;
use sha3::{Digest, Keccak256};

/// Address of the Safe Singleton Factory, identical on every supported chain.
pub const SAFE_SINGLETON_FACTORY: Address =
    H160(hex!("914d7fec6aac8cd542e72bca78b30650d45643d7"));

/// Salt used for all suite deployments unless a caller overrides it.
pub const DEFAULT_SALT: H256 = H256([0u8; 32]);

pub fn keccak(data: impl AsRef<[u8]>) -> H256 {
    H256(Keccak256::digest(data.as_ref()).into())
}

/// Computes the CREATE2 address for `init_code` deployed by `deployer` with `salt`.
pub fn create2_address(deployer: Address, salt: H256, init_code: &[u8]) -> Address {
    let init_code_hash = keccak(init_code);
    let mut preimage = [0u8; 85];
    preimage[0] = 0xff;
    preimage[1..21].copy_from_slice(deployer.as_bytes());
    preimage[21..53].copy_from_slice(salt.as_bytes());
    preimage[53..85].copy_from_slice(init_code_hash.as_bytes());
    Address::from_slice(&keccak(preimage).as_bytes()[12..])
}

/// CREATE2 address with the deployer fixed to the Safe Singleton Factory.
pub fn singleton_create2_address(init_code: &[u8], salt: H256) -> Address {
    create2_address(SAFE_SINGLETON_FACTORY, salt, init_code)
}
