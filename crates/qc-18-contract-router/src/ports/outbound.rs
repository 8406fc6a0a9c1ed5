//! # Driven Ports (SPI - Outbound)
//!
//! These are the interfaces the router step depends on.
//! External adapters implement these traits to provide:
//! - Router source generation
//! - Solidity compilation
//! - Artifact reporting, signer lookup and transaction broadcast
//!
//! Failures are returned as `CollaboratorError` and passed through to the
//! caller untouched. Retry and timeout policy lives behind these traits.

use crate::domain::entities::{
    CompiledContract, ContractArtifact, GenerateRequest, Receipt, UnsignedTransaction,
};
use crate::domain::value_objects::{Address, Hash};
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

// =============================================================================
// CODE GENERATION
// =============================================================================

/// Produces router source text from the resolved contracts.
pub trait RouterGenerator: Send + Sync {
    /// Generates the Solidity source of the router contract.
    ///
    /// The output is a fallback-dispatch contract that forwards each call,
    /// by selector, to the contract that implements it.
    fn generate(&self, request: &GenerateRequest) -> Result<String, CollaboratorError>;
}

// =============================================================================
// COMPILATION
// =============================================================================

/// Compiles router source.
#[async_trait]
pub trait SolidityCompiler: Send + Sync {
    /// Returns the compiler input manifest recorded for provenance.
    async fn compile_input(
        &self,
        contract_name: &str,
        source: &str,
    ) -> Result<Value, CollaboratorError>;

    /// Compiles the router and returns its init and runtime code.
    async fn compile(
        &self,
        contract_name: &str,
        source: &str,
    ) -> Result<CompiledContract, CollaboratorError>;

    /// Returns the raw compiler version string.
    async fn version(&self) -> Result<String, CollaboratorError>;
}

// =============================================================================
// CHAIN ACCESS
// =============================================================================

/// A broadcast transaction awaiting inclusion.
#[async_trait]
pub trait PendingTransaction: Send + Sync {
    /// Transaction hash.
    fn hash(&self) -> Hash;

    /// Waits for inclusion and returns the receipt.
    async fn wait(&self) -> Result<Receipt, CollaboratorError>;
}

/// An account able to sign and broadcast transactions.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Address of the account.
    async fn address(&self) -> Result<Address, CollaboratorError>;

    /// Signs and broadcasts a transaction.
    async fn send_transaction(
        &self,
        txn: UnsignedTransaction,
    ) -> Result<Box<dyn PendingTransaction>, CollaboratorError>;
}

/// Hands out signers.
#[async_trait]
pub trait SignerProvider: Send + Sync {
    /// Returns the signer for an explicit address.
    async fn get_signer(&self, address: &str) -> Result<Box<dyn Signer>, CollaboratorError>;

    /// Returns the default signer for a transaction.
    ///
    /// Implementations derive it deterministically from the transaction
    /// content and `salt`, so identical inputs deploy to identical addresses.
    async fn get_default_signer(
        &self,
        txn: &UnsignedTransaction,
        salt: Option<&str>,
    ) -> Result<Box<dyn Signer>, CollaboratorError>;
}

/// Receives compiled artifacts for later verification.
#[async_trait]
pub trait ArtifactReporter: Send + Sync {
    /// Records an artifact under `key` (`<Name>.sol:<Name>`).
    async fn report_contract_artifact(
        &self,
        key: &str,
        artifact: ContractArtifact,
    ) -> Result<(), CollaboratorError>;
}

/// Everything the pipeline runtime offers a step.
pub trait StepRuntime: ArtifactReporter + SignerProvider {
    /// Base working directory of the package build.
    ///
    /// `None` disables consistency checking.
    fn base_dir(&self) -> Option<&Path>;
}

// =============================================================================
// TESTS
// =============================================================================
