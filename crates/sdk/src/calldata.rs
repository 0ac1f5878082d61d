//! Minimal ABI encoding for factory calls and constructor arguments.
//!
//! Covers the value kinds the deployment suite actually passes: addresses,
//! unsigned integers, booleans, fixed 32-byte words and dynamic byte strings.

use bytes::Bytes;
use ethereum_types::{Address, U256};

use crate::create2::keccak;
use crate::error::CalldataError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Address(Address),
    Uint(U256),
    Bool(bool),
    /// Left-aligned, zero-padded to one word (`bytesN` semantics).
    FixedBytes(Bytes),
    /// Dynamic `bytes`, encoded through the offset/length tail.
    Bytes(Bytes),
}

impl Value {
    fn is_dynamic(&self) -> bool {
        matches!(self, Value::Bytes(_))
    }
}

/// ABI-encodes a call to `signature` (e.g. `"deploy(bytes,bytes32)"`):
/// 4-byte keccak selector followed by the encoded argument tuple.
pub fn encode_calldata(signature: &str, args: &[Value]) -> Result<Vec<u8>, CalldataError> {
    let digest = keccak(signature.as_bytes());
    let mut calldata = digest.as_bytes()[..4].to_vec();
    calldata.extend_from_slice(&encode_tuple(args)?);
    Ok(calldata)
}

/// Standard head/tail tuple encoding, also used for constructor arguments
/// appended to creation bytecode.
pub fn encode_tuple(values: &[Value]) -> Result<Vec<u8>, CalldataError> {
    let head_len = 32 * values.len();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for value in values {
        if value.is_dynamic() {
            head.extend_from_slice(&U256::from(head_len + tail.len()).to_big_endian());
            tail.extend_from_slice(&encode_dynamic(value));
        } else {
            head.extend_from_slice(&encode_static(value)?);
        }
    }
    head.extend_from_slice(&tail);
    Ok(head)
}

fn encode_static(value: &Value) -> Result<[u8; 32], CalldataError> {
    let mut word = [0u8; 32];
    match value {
        Value::Address(address) => word[12..].copy_from_slice(address.as_bytes()),
        Value::Uint(n) => word = n.to_big_endian(),
        Value::Bool(b) => word[31] = u8::from(*b),
        Value::FixedBytes(data) => {
            if data.len() > 32 {
                return Err(CalldataError::FixedBytesTooLong(data.len()));
            }
            word[..data.len()].copy_from_slice(data);
        }
        Value::Bytes(_) => unreachable!("dynamic values are encoded through the tail"),
    }
    Ok(word)
}

fn encode_dynamic(value: &Value) -> Vec<u8> {
    match value {
        Value::Bytes(data) => {
            let padded_len = data.len().div_ceil(32) * 32;
            let mut out = Vec::with_capacity(32 + padded_len);
            out.extend_from_slice(&U256::from(data.len()).to_big_endian());
            out.extend_from_slice(data);
            out.resize(32 + padded_len, 0);
            out
        }
        _ => unreachable!("static values are encoded in the head"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn encodes_address_left_padded() {
        let addr = Address::from_slice(&hex!("914d7fec6aac8cd542e72bca78b30650d45643d7"));
        let encoded = encode_tuple(&[Value::Address(addr)]).unwrap();
        assert_eq!(
            encoded,
            hex!("000000000000000000000000914d7fec6aac8cd542e72bca78b30650d45643d7")
        );
    }

    #[test]
    fn encodes_uint_and_bool() {
        let encoded = encode_tuple(&[Value::Uint(U256::from(0x2a)), Value::Bool(true)]).unwrap();
        assert_eq!(encoded.len(), 64);
        assert_eq!(encoded[31], 0x2a);
        assert_eq!(encoded[63], 0x01);
    }

    #[test]
    fn encodes_deploy_call() {
        // deploy(bytes _initCode, bytes32 _salt)
        let init_code = Bytes::from_static(&hex!("600080fd"));
        let salt = Bytes::copy_from_slice(&[0u8; 32]);
        let calldata = encode_calldata(
            "deploy(bytes,bytes32)",
            &[Value::Bytes(init_code), Value::FixedBytes(salt)],
        )
        .unwrap();
        // selector = keccak("deploy(bytes,bytes32)")[..4]
        assert_eq!(&calldata[..4], hex!("4af63f02"));
        // head: offset of the bytes tail (0x40), then the salt word
        assert_eq!(&calldata[4..36], &U256::from(0x40).to_big_endian());
        assert_eq!(&calldata[36..68], &[0u8; 32]);
        // tail: length word then the init code, zero-padded to a word
        assert_eq!(&calldata[68..100], &U256::from(4).to_big_endian());
        assert_eq!(&calldata[100..104], hex!("600080fd"));
        assert_eq!(&calldata[104..132], &[0u8; 28]);
        assert_eq!(calldata.len(), 132);
    }

    #[test]
    fn fixed_bytes_over_one_word_is_rejected() {
        let err = encode_tuple(&[Value::FixedBytes(Bytes::copy_from_slice(&[0u8; 33]))])
            .unwrap_err();
        assert!(matches!(err, CalldataError::FixedBytesTooLong(33)));
    }

    #[test]
    fn empty_dynamic_bytes() {
        let encoded = encode_tuple(&[Value::Bytes(Bytes::new())]).unwrap();
        // offset word + length word, no payload
        assert_eq!(encoded.len(), 64);
        assert_eq!(&encoded[..32], &U256::from(32).to_big_endian());
        assert_eq!(&encoded[32..], &[0u8; 32]);
    }
}
