//! Compiled contract artifacts.
//!
//! Artifacts are opaque compiler output: this crate never inspects the
//! bytecode beyond checking it exists. Embedders typically `include_bytes!`
//! their solc output or load it from the build directory.

use std::collections::HashMap;

use bytes::Bytes;

use crate::calldata::{Value, encode_tuple};
use crate::error::DeployError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractArtifact {
    pub name: String,
    /// Creation bytecode, without constructor arguments. Empty for abstract
    /// contracts, which cannot be deployed.
    pub bytecode: Bytes,
}

impl ContractArtifact {
    pub fn new(name: impl Into<String>, bytecode: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytecode: bytecode.into(),
        }
    }

    pub fn from_hex(name: impl Into<String>, bytecode: &str) -> Result<Self, hex::FromHexError> {
        let bytecode = hex::decode(bytecode.strip_prefix("0x").unwrap_or(bytecode))?;
        Ok(Self::new(name, bytecode))
    }

    /// Creation bytecode concatenated with the ABI-encoded constructor
    /// arguments. This byte sequence is what the CREATE2 address commits to.
    pub fn init_code(&self, args: &[Value]) -> Result<Bytes, DeployError> {
        if self.bytecode.is_empty() {
            return Err(DeployError::InitCodeUnavailable(self.name.clone()));
        }
        let mut code = self.bytecode.to_vec();
        code.extend_from_slice(&encode_tuple(args)?);
        Ok(Bytes::from(code))
    }
}

/// Lookup boundary between suite declarations and build tooling.
pub trait ArtifactSource: Send + Sync {
    fn artifact(&self, name: &str) -> Option<ContractArtifact>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryArtifacts {
    artifacts: HashMap<String, ContractArtifact>,
}

impl InMemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact(mut self, artifact: ContractArtifact) -> Self {
        self.artifacts.insert(artifact.name.clone(), artifact);
        self
    }
}

impl ArtifactSource for InMemoryArtifacts {
    fn artifact(&self, name: &str) -> Option<ContractArtifact> {
        self.artifacts.get(name).cloned()
    }
}
