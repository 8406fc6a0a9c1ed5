//! # Router Step Service
//!
//! Drives a router step through the deployment pipeline.
//!
//! ## Pipeline
//!
//! 1. Resolve every configured path into a contract descriptor
//! 2. Derive the router name from the step label
//! 3. Merge the routed ABIs into the router's callable surface
//! 4. Generate and compile the router source
//! 5. Deploy with the configured or default signer
//! 6. Report the artifact (`<Name>.sol:<Name>`)
//!
//! Every stage is fail-fast. Collaborator errors pass through unchanged.

use crate::config::ServiceConfig;
use crate::domain::abi::AbiFragment;
use crate::domain::entities::{
    ArtifactSource, ContractArtifact, ContractDescriptor, DeployedContract, DeploymentRecord,
    GenerateRequest, PackageState, RouterStepConfig, StateSnapshot, StepContext, StepDescriptor,
    UnsignedTransaction,
};
use crate::domain::invariants::validate_config;
use crate::domain::services::{
    merge_abis, normalize_compiler_version, require_contract, router_contract_name, step_inputs,
    step_outputs,
};
use crate::domain::template::render_config;
use crate::errors::{CollaboratorError, RouterError};
use crate::ports::inbound::RouterStepApi;
use crate::ports::outbound::{RouterGenerator, Signer, SolidityCompiler, StepRuntime};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

/// Statistics for the router step service.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceStats {
    /// Snapshots computed.
    pub states_computed: u64,
    /// Routers deployed.
    pub routers_deployed: u64,
    /// Failed `exec` calls.
    pub failed_deployments: u64,
}

/// The router step.
///
/// Holds the generator and compiler; chain access and artifact reporting
/// come from the `StepRuntime` passed to each call.
pub struct RouterStepService<G: RouterGenerator, C: SolidityCompiler> {
    /// Service configuration.
    config: ServiceConfig,
    /// Router source generator.
    generator: Arc<G>,
    /// Solidity compiler.
    compiler: Arc<C>,
    /// Service statistics.
    stats: Arc<RwLock<ServiceStats>>,
}

impl<G: RouterGenerator, C: SolidityCompiler> RouterStepService<G, C> {
    /// Creates a new router step service.
    pub fn new(generator: G, compiler: C, config: ServiceConfig) -> Self {
        Self {
            config,
            generator: Arc::new(generator),
            compiler: Arc::new(compiler),
            stats: Arc::new(RwLock::new(ServiceStats::default())),
        }
    }

    /// Returns the service configuration.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Get current service statistics.
    pub async fn stats(&self) -> ServiceStats {
        self.stats.read().await.clone()
    }

    /// Describes how a step labelled `label` plugs into the build graph.
    pub fn describe(
        &self,
        label: &str,
        config: &RouterStepConfig,
    ) -> Result<StepDescriptor, RouterError> {
        validate_config(config)?;
        let name = router_contract_name(label, &self.config.label_prefix)?;
        Ok(StepDescriptor {
            label: label.to_string(),
            inputs: step_inputs(config),
            outputs: step_outputs(&name),
            depends: config.depends.clone().unwrap_or_default(),
        })
    }

    /// Merged ABI of the contracts routed by a rendered config.
    pub fn merged_abi(
        &self,
        ctx: &StepContext,
        config: &RouterStepConfig,
    ) -> Result<Vec<AbiFragment>, RouterError> {
        merge_abis(ctx.namespace(), &config.contracts)
    }

    /// Generates the router source for a rendered config without compiling it.
    pub fn generate_source(
        &self,
        ctx: &StepContext,
        config: &RouterStepConfig,
        package_state: &PackageState,
    ) -> Result<(String, String), RouterError> {
        let contracts = Self::descriptors(ctx, config)?;
        let name = router_contract_name(&package_state.current_label, &self.config.label_prefix)?;
        let source = self.generator.generate(&GenerateRequest {
            contract_name: name.clone(),
            contracts,
        })?;
        Ok((name, source))
    }

    fn descriptors(
        ctx: &StepContext,
        config: &RouterStepConfig,
    ) -> Result<Vec<ContractDescriptor>, RouterError> {
        config
            .contracts
            .iter()
            .map(|path| require_contract(ctx.namespace(), path).map(ContractDescriptor::from_record))
            .collect()
    }

    async fn run_exec(
        &self,
        runtime: &dyn StepRuntime,
        ctx: &StepContext,
        config: &RouterStepConfig,
        package_state: &PackageState,
    ) -> Result<DeploymentRecord, RouterError> {
        validate_config(config)?;

        // A malformed ABI fails here as `InvalidAbi`, ahead of generation.
        let abi = self.merged_abi(ctx, config)?;

        let (name, source) = self.generate_source(ctx, config, package_state)?;
        debug!(router = %name, source_len = source.len(), "Generated router source");

        let input = self.compiler.compile_input(&name, &source).await?;
        let compiled = self.compiler.compile(&name, &source).await?;

        let raw_version = self.compiler.version().await?;
        let solc_version = normalize_compiler_version(&raw_version).ok_or_else(|| {
            CollaboratorError::Compiler(format!("unrecognized compiler version: {raw_version}"))
        })?;
        let source_name = format!("{name}.sol");

        let artifact_key = format!("{source_name}:{name}");
        let artifact = ContractArtifact {
            contract_name: name.clone(),
            source_name: source_name.clone(),
            abi: abi.clone(),
            bytecode: compiled.bytecode.clone(),
            deployed_bytecode: compiled.deployed_bytecode,
            link_references: BTreeMap::new(),
            source: ArtifactSource {
                solc_version,
                input: serialize_input(&input)?,
            },
        };

        let txn = UnsignedTransaction::deployment(compiled.bytecode);
        let signer: Box<dyn Signer> = match &config.from {
            Some(from) => runtime.get_signer(from).await?,
            None => {
                runtime
                    .get_default_signer(&txn, config.salt.as_deref())
                    .await?
            }
        };
        let deployer = signer.address().await?;

        let pending = signer.send_transaction(txn).await?;
        let receipt = pending.wait().await?;
        let address = receipt.contract_address.ok_or_else(|| {
            CollaboratorError::Transaction(format!(
                "receipt {} has no contract address",
                receipt.transaction_hash.to_hex()
            ))
        })?;

        // Reported only once the deployment is mined; failed runs leave no artifact.
        runtime
            .report_contract_artifact(&artifact_key, artifact)
            .await?;

        info!(
            router = %name,
            address = %address.to_hex(),
            deployer = %deployer.to_hex(),
            tx = %receipt.transaction_hash.to_hex(),
            "Router deployed"
        );

        let mut contracts = BTreeMap::new();
        contracts.insert(
            name.clone(),
            DeployedContract {
                address: address.to_checksum(),
                abi,
                deployed_on: package_state.current_label.clone(),
                deploy_txn_hash: receipt.transaction_hash.to_hex(),
                contract_name: name,
                source_name,
            },
        );
        Ok(DeploymentRecord { contracts })
    }
}

fn serialize_input(input: &Value) -> Result<String, RouterError> {
    serde_json::to_string(input)
        .map_err(|e| CollaboratorError::Compiler(format!("unserializable compiler input: {e}")).into())
}

#[async_trait]
impl<G: RouterGenerator, C: SolidityCompiler> RouterStepApi for RouterStepService<G, C> {
    fn validate(&self, config: &RouterStepConfig) -> Result<(), RouterError> {
        validate_config(config)
    }

    fn config_inject(
        &self,
        ctx: &StepContext,
        config: &RouterStepConfig,
    ) -> Result<RouterStepConfig, RouterError> {
        render_config(ctx.values(), config)
    }

    #[instrument(skip_all, fields(contracts = config.contracts.len()))]
    async fn get_state(
        &self,
        runtime: &dyn StepRuntime,
        ctx: &StepContext,
        config: &RouterStepConfig,
    ) -> Result<Option<StateSnapshot>, RouterError> {
        if runtime.base_dir().is_none() {
            debug!("Consistency checks disabled, skipping state");
            return Ok(None);
        }

        let rendered = self.config_inject(ctx, config)?;

        let mut contract_abis = BTreeMap::new();
        let mut contract_addresses = BTreeMap::new();
        for path in &rendered.contracts {
            let record = require_contract(ctx.namespace(), path)?;
            contract_abis.insert(path.clone(), record.abi.clone());
            contract_addresses.insert(path.clone(), record.address.clone());
        }

        self.stats.write().await.states_computed += 1;

        Ok(Some(StateSnapshot {
            contract_abis,
            contract_addresses,
            config: rendered,
        }))
    }

    #[instrument(skip_all, fields(label = %package_state.current_label))]
    async fn exec(
        &self,
        runtime: &dyn StepRuntime,
        ctx: &StepContext,
        config: &RouterStepConfig,
        package_state: &PackageState,
    ) -> Result<DeploymentRecord, RouterError> {
        info!(contracts = config.contracts.len(), "Executing router step");

        let result = self.run_exec(runtime, ctx, config, package_state).await;

        let mut stats = self.stats.write().await;
        match &result {
            Ok(_) => stats.routers_deployed += 1,
            Err(e) => {
                stats.failed_deployments += 1;
                error!(error = %e, "Router step failed");
            }
        }
        result
    }
}

/// Builds a step context from raw JSON, mapping shape errors to
/// `InvalidContext`.
pub fn context_from_json(values: Value) -> Result<StepContext, RouterError> {
    StepContext::from_value(values).map_err(|e| RouterError::InvalidContext(e.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================
