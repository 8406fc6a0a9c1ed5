//! # Simulated Chain Runtime
//!
//! In-memory `StepRuntime` for dry runs and tests.
//!
//! - Artifacts are kept in a map keyed by `<Name>.sol:<Name>`
//! - Named signers are looked up by address; default signers are derived
//!   from the transaction content and salt
//! - Contract creations land at the CREATE address of `(sender, nonce)`
//!   and are "mined" immediately, one block per transaction

use crate::domain::entities::{ContractArtifact, Receipt, UnsignedTransaction};
use crate::domain::services::{compute_contract_address, derive_address, keccak256};
use crate::domain::value_objects::{Address, Bytes, Hash};
use crate::errors::CollaboratorError;
use crate::ports::outbound::{
    ArtifactReporter, PendingTransaction, Signer, SignerProvider, StepRuntime,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct ChainState {
    block_number: u64,
    nonces: HashMap<Address, u64>,
    code: HashMap<Address, Bytes>,
    receipts: HashMap<Hash, Receipt>,
    artifacts: BTreeMap<String, ContractArtifact>,
}

/// In-memory chain and artifact store.
#[derive(Debug, Clone, Default)]
pub struct SimulatedChain {
    base_dir: Option<PathBuf>,
    state: Arc<RwLock<ChainState>>,
}

impl SimulatedChain {
    /// Creates a runtime with consistency checks disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runtime rooted at `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            state: Arc::default(),
        }
    }

    /// Returns a reported artifact.
    pub async fn artifact(&self, key: &str) -> Option<ContractArtifact> {
        self.state.read().await.artifacts.get(key).cloned()
    }

    /// Returns every reported artifact, keyed by `<Name>.sol:<Name>`.
    pub async fn artifacts(&self) -> BTreeMap<String, ContractArtifact> {
        self.state.read().await.artifacts.clone()
    }

    /// Returns the code deployed at `address`.
    pub async fn code_at(&self, address: &Address) -> Option<Bytes> {
        self.state.read().await.code.get(address).cloned()
    }

    /// Returns the next nonce of `address`.
    pub async fn nonce_of(&self, address: &Address) -> u64 {
        self.state
            .read()
            .await
            .nonces
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    /// Returns the receipt of a mined transaction.
    pub async fn receipt(&self, hash: &Hash) -> Option<Receipt> {
        self.state.read().await.receipts.get(hash).cloned()
    }

    /// Current block height.
    pub async fn block_number(&self) -> u64 {
        self.state.read().await.block_number
    }

    fn signer(&self, address: Address) -> Box<dyn Signer> {
        Box::new(SimulatedSigner {
            address,
            state: Arc::clone(&self.state),
        })
    }
}

#[async_trait]
impl ArtifactReporter for SimulatedChain {
    async fn report_contract_artifact(
        &self,
        key: &str,
        artifact: ContractArtifact,
    ) -> Result<(), CollaboratorError> {
        if key.is_empty() {
            return Err(CollaboratorError::Artifact("empty artifact key".to_string()));
        }
        debug!(key, "Stored contract artifact");
        self.state
            .write()
            .await
            .artifacts
            .insert(key.to_string(), artifact);
        Ok(())
    }
}

#[async_trait]
impl SignerProvider for SimulatedChain {
    async fn get_signer(&self, address: &str) -> Result<Box<dyn Signer>, CollaboratorError> {
        let address: Address = address
            .parse()
            .map_err(|e| CollaboratorError::Signer(format!("{address}: {e}")))?;
        Ok(self.signer(address))
    }

    async fn get_default_signer(
        &self,
        txn: &UnsignedTransaction,
        salt: Option<&str>,
    ) -> Result<Box<dyn Signer>, CollaboratorError> {
        let mut seed = txn.content_hash().as_bytes().to_vec();
        seed.extend_from_slice(salt.unwrap_or_default().as_bytes());
        let address = derive_address(&seed);
        debug!(signer = %address.to_hex(), "Derived default signer");
        Ok(self.signer(address))
    }
}

impl StepRuntime for SimulatedChain {
    fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }
}

// =============================================================================
// SIGNER
// =============================================================================

struct SimulatedSigner {
    address: Address,
    state: Arc<RwLock<ChainState>>,
}

#[async_trait]
impl Signer for SimulatedSigner {
    async fn address(&self) -> Result<Address, CollaboratorError> {
        Ok(self.address)
    }

    async fn send_transaction(
        &self,
        txn: UnsignedTransaction,
    ) -> Result<Box<dyn PendingTransaction>, CollaboratorError> {
        if txn.is_contract_creation() && txn.data.is_empty() {
            return Err(CollaboratorError::Transaction(
                "contract creation without init code".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        let nonce = state.nonces.get(&self.address).copied().unwrap_or(0);

        let mut preimage = self.address.as_bytes().to_vec();
        preimage.extend_from_slice(&nonce.to_be_bytes());
        preimage.extend_from_slice(txn.content_hash().as_bytes());
        let hash = keccak256(&preimage);

        let contract_address = if txn.is_contract_creation() {
            let created = compute_contract_address(self.address, nonce);
            if state.code.contains_key(&created) {
                return Err(CollaboratorError::Transaction(format!(
                    "contract already deployed at {}",
                    created.to_hex()
                )));
            }
            state.code.insert(created, txn.data.clone());
            Some(created)
        } else {
            None
        };

        state.nonces.insert(self.address, nonce + 1);
        state.block_number += 1;
        let receipt = Receipt {
            contract_address,
            transaction_hash: hash,
            block_number: state.block_number,
        };
        state.receipts.insert(hash, receipt.clone());

        info!(
            from = %self.address.to_hex(),
            nonce,
            block = receipt.block_number,
            "Simulated transaction mined"
        );

        Ok(Box::new(SimulatedPendingTransaction { receipt }))
    }
}

struct SimulatedPendingTransaction {
    receipt: Receipt,
}

#[async_trait]
impl PendingTransaction for SimulatedPendingTransaction {
    fn hash(&self) -> Hash {
        self.receipt.transaction_hash
    }

    async fn wait(&self) -> Result<Receipt, CollaboratorError> {
        Ok(self.receipt.clone())
    }
}

// =============================================================================
// TESTS
// =============================================================================
