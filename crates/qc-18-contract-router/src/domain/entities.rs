//! # Core Domain Entities
//!
//! Inputs and outputs of the router step: the namespace of prior build
//! outputs, the step configuration, the state snapshot used for drift
//! detection and the deployment record handed back to the pipeline.

use crate::domain::abi::AbiFragment;
use crate::domain::value_objects::{Address, Bytes, Hash, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use std::collections::BTreeMap;

// =============================================================================
// NAMESPACE
// =============================================================================

/// A contract produced by an earlier deployment step.
///
/// Read-only to the router step. The ABI is kept as raw JSON so a malformed
/// entry surfaces as `InvalidAbi` at merge time rather than on load.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    /// Solidity contract name.
    #[serde(default)]
    pub contract_name: String,
    /// Source file the contract was compiled from.
    #[serde(default)]
    pub source_name: String,
    /// Raw JSON ABI.
    #[serde(default)]
    pub abi: Value,
    /// Deployed address.
    #[serde(default)]
    pub address: String,
    /// Constructor arguments used at deployment.
    #[serde(default)]
    pub constructor_args: Vec<Value>,
    /// Hash of the deployment transaction.
    #[serde(default)]
    pub deploy_txn_hash: String,
    /// Label of the step that deployed it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_on: Option<String>,
}

/// A node of the hierarchical namespace of prior build outputs.
///
/// `imports` nest child namespaces (imported packages); `contracts` holds
/// the records deployed at this level.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    /// Imported child namespaces.
    #[serde(default)]
    pub imports: BTreeMap<String, Namespace>,
    /// Contracts at this level.
    #[serde(default)]
    pub contracts: BTreeMap<String, ContractRecord>,
}

impl Namespace {
    /// Creates an empty namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a contract at this level.
    #[must_use]
    pub fn with_contract(mut self, name: impl Into<String>, record: ContractRecord) -> Self {
        self.contracts.insert(name.into(), record);
        self
    }

    /// Adds an imported child namespace.
    #[must_use]
    pub fn with_import(mut self, name: impl Into<String>, child: Namespace) -> Self {
        self.imports.insert(name.into(), child);
        self
    }
}

/// The step context: the full key-value tree of prior outputs together
/// with its namespace view.
#[derive(Clone, Debug, Default)]
pub struct StepContext {
    values: Value,
    namespace: Namespace,
}

impl StepContext {
    /// Builds a context from the raw JSON tree.
    ///
    /// Keys other than `imports`/`contracts` stay reachable to templates.
    pub fn from_value(values: Value) -> Result<Self, serde_json::Error> {
        let namespace = if values.is_null() {
            Namespace::default()
        } else {
            serde_json::from_value(values.clone())?
        };
        Ok(Self { values, namespace })
    }

    /// Raw key-value tree.
    #[must_use]
    pub fn values(&self) -> &Value {
        &self.values
    }

    /// Namespace view.
    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

// =============================================================================
// STEP CONFIGURATION
// =============================================================================

/// User configuration of a router step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterStepConfig {
    /// Ordered dotted paths of the contracts to route to.
    pub contracts: Vec<String>,
    /// Explicit deployer address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Salt for the default deployer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    /// Extra step labels this step depends on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends: Option<Vec<String>>,
}

impl RouterStepConfig {
    /// Creates a config routing to the given paths.
    #[must_use]
    pub fn new<I, S>(contracts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            contracts: contracts.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// How a router step plugs into the build graph.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDescriptor {
    /// Step label, e.g. `router.CoreRouter`.
    pub label: String,
    /// Namespace keys the step reads.
    pub inputs: Vec<String>,
    /// Namespace keys the step writes.
    pub outputs: Vec<String>,
    /// Explicit step dependencies from the config.
    pub depends: Vec<String>,
}

/// Pipeline state handed in by the scheduler.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageState {
    /// Label of the step being executed, e.g. `router.CoreRouter`.
    pub current_label: String,
}

impl PackageState {
    /// Creates a package state for the given label.
    #[must_use]
    pub fn new(current_label: impl Into<String>) -> Self {
        Self {
            current_label: current_label.into(),
        }
    }
}

// =============================================================================
// STATE SNAPSHOT
// =============================================================================

/// Desired-state snapshot used by the pipeline to detect stale deployments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// ABI of every routed contract, keyed by rendered path.
    pub contract_abis: BTreeMap<String, Value>,
    /// Address of every routed contract, keyed by rendered path.
    pub contract_addresses: BTreeMap<String, String>,
    /// The rendered configuration.
    pub config: RouterStepConfig,
}

impl StateSnapshot {
    /// SHA-256 hex digest over the snapshot's canonical JSON.
    ///
    /// Map keys serialize in sorted order, so equal snapshots always
    /// produce equal fingerprints.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let encoded = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&encoded)))
    }
}

// =============================================================================
// PIPELINE VALUES
// =============================================================================

/// A resolved contract as handed to the router generator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDescriptor {
    /// Constructor arguments of the routed contract.
    pub constructor_args: Vec<Value>,
    /// Raw JSON ABI.
    pub abi: Value,
    /// Address calls are forwarded to.
    pub deployed_address: String,
    /// Deployment transaction hash.
    pub deploy_txn_hash: String,
    /// Solidity contract name.
    pub contract_name: String,
    /// Source file name.
    pub source_name: String,
    /// `sourceName:contractName`.
    pub qualified_name: String,
}

impl ContractDescriptor {
    /// Builds a descriptor from a resolved record.
    #[must_use]
    pub fn from_record(record: &ContractRecord) -> Self {
        Self {
            constructor_args: record.constructor_args.clone(),
            abi: record.abi.clone(),
            deployed_address: record.address.clone(),
            deploy_txn_hash: record.deploy_txn_hash.clone(),
            contract_name: record.contract_name.clone(),
            source_name: record.source_name.clone(),
            qualified_name: format!("{}:{}", record.source_name, record.contract_name),
        }
    }
}

/// Input of the router generator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Name of the router contract to emit.
    pub contract_name: String,
    /// Contracts to dispatch to, in configuration order.
    pub contracts: Vec<ContractDescriptor>,
}

/// Compiler output for the router.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledContract {
    /// Init code.
    pub bytecode: Bytes,
    /// Runtime code.
    pub deployed_bytecode: Bytes,
}

/// Provenance of a compiled artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSource {
    /// Compiler version, normalized to `<version>+commit.<hash>`.
    pub solc_version: String,
    /// Serialized compiler input.
    pub input: String,
}

/// Artifact reported to the pipeline for later verification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    /// Router contract name.
    pub contract_name: String,
    /// `<name>.sol`.
    pub source_name: String,
    /// Merged routable ABI.
    pub abi: Vec<AbiFragment>,
    /// Init code.
    pub bytecode: Bytes,
    /// Runtime code.
    pub deployed_bytecode: Bytes,
    /// Library link references (always empty for routers).
    pub link_references: BTreeMap<String, Value>,
    /// Compiler provenance.
    pub source: ArtifactSource,
}

/// A deployment transaction before signing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    /// Recipient (None for contract creation).
    pub to: Option<Address>,
    /// Calldata or init code.
    pub data: Bytes,
    /// Value in wei.
    pub value: U256,
}

impl UnsignedTransaction {
    /// Creates a contract-creation transaction.
    #[must_use]
    pub fn deployment(init_code: Bytes) -> Self {
        Self {
            to: None,
            data: init_code,
            value: U256::zero(),
        }
    }

    /// Returns true if this is a contract creation transaction.
    #[must_use]
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    /// Keccak-256 over the transaction content.
    #[must_use]
    pub fn content_hash(&self) -> Hash {
        let mut hasher = Keccak256::new();
        if let Some(to) = self.to {
            hasher.update(to.as_bytes());
        }
        let mut value = [0u8; 32];
        self.value.to_big_endian(&mut value);
        hasher.update(value);
        hasher.update(self.data.as_slice());
        Hash::new(hasher.finalize().into())
    }
}

/// Inclusion receipt of a broadcast transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Created contract address (contract creations only).
    pub contract_address: Option<Address>,
    /// Transaction hash.
    pub transaction_hash: Hash,
    /// Block the transaction was included in.
    pub block_number: u64,
}

// =============================================================================
// DEPLOYMENT RECORD
// =============================================================================

/// A deployed router as recorded in the pipeline outputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedContract {
    /// Router address.
    pub address: String,
    /// Merged routable ABI.
    pub abi: Vec<AbiFragment>,
    /// Step label that deployed the router.
    pub deployed_on: String,
    /// Deployment transaction hash.
    pub deploy_txn_hash: String,
    /// Router contract name.
    pub contract_name: String,
    /// `<name>.sol`.
    pub source_name: String,
}

/// Output of the router step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Deployed contracts keyed by name (exactly one router).
    pub contracts: BTreeMap<String, DeployedContract>,
}

impl DeploymentRecord {
    /// Looks up a deployed contract by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DeployedContract> {
        self.contracts.get(name)
    }
}

// =============================================================================
// TESTS
// =============================================================================
