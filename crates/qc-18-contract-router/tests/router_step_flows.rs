//! # Router Step Flow Tests
//!
//! Drives `RouterStepService` end to end through stub ports and through the
//! in-memory `SimulatedChain`.

use async_trait::async_trait;
use qc_18_contract_router::prelude::*;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};

// =============================================================================
// STUB PORTS
// =============================================================================

/// Generator that records the requests it receives.
#[derive(Default, Clone)]
struct RecordingGenerator {
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
}

impl RouterGenerator for RecordingGenerator {
    fn generate(&self, request: &GenerateRequest) -> Result<String, CollaboratorError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(format!("contract {} {{}}", request.contract_name))
    }
}

/// Compiler returning fixed code.
#[derive(Default)]
struct FixedCompiler {
    fail: bool,
}

#[async_trait]
impl SolidityCompiler for FixedCompiler {
    async fn compile_input(&self, name: &str, source: &str) -> Result<Value, CollaboratorError> {
        Ok(json!({"language": "Solidity", "sources": {format!("{name}.sol"): {"content": source}}}))
    }

    async fn compile(&self, _: &str, _: &str) -> Result<CompiledContract, CollaboratorError> {
        if self.fail {
            return Err(CollaboratorError::Compiler("ParserError".to_string()));
        }
        Ok(CompiledContract {
            bytecode: Bytes::from(vec![0x60, 0x80, 0x60, 0x40]),
            deployed_bytecode: Bytes::from(vec![0x60, 0x80]),
        })
    }

    async fn version(&self) -> Result<String, CollaboratorError> {
        Ok("0.8.17+commit.8df45f5f.Emscripten.clang".to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SignerCall {
    Named(String),
    Default(Option<String>),
}

struct StubSigner {
    address: Address,
    fail_send: bool,
}

struct StubPending;

#[async_trait]
impl PendingTransaction for StubPending {
    fn hash(&self) -> Hash {
        Hash::new([0x11; 32])
    }

    async fn wait(&self) -> Result<Receipt, CollaboratorError> {
        Ok(Receipt {
            contract_address: Some(Address::new([0xaa; 20])),
            transaction_hash: Hash::new([0x11; 32]),
            block_number: 1,
        })
    }
}

#[async_trait]
impl Signer for StubSigner {
    async fn address(&self) -> Result<Address, CollaboratorError> {
        Ok(self.address)
    }

    async fn send_transaction(
        &self,
        txn: UnsignedTransaction,
    ) -> Result<Box<dyn PendingTransaction>, CollaboratorError> {
        assert!(txn.is_contract_creation());
        if self.fail_send {
            return Err(CollaboratorError::Transaction("nonce too low".to_string()));
        }
        Ok(Box::new(StubPending))
    }
}

/// Runtime that records signer lookups and reported artifacts.
#[derive(Default)]
struct RecordingRuntime {
    fail_send: bool,
    signer_calls: Mutex<Vec<SignerCall>>,
    artifacts: Mutex<Vec<(String, ContractArtifact)>>,
}

#[async_trait]
impl ArtifactReporter for RecordingRuntime {
    async fn report_contract_artifact(
        &self,
        key: &str,
        artifact: ContractArtifact,
    ) -> Result<(), CollaboratorError> {
        self.artifacts.lock().unwrap().push((key.to_string(), artifact));
        Ok(())
    }
}

#[async_trait]
impl SignerProvider for RecordingRuntime {
    async fn get_signer(&self, address: &str) -> Result<Box<dyn Signer>, CollaboratorError> {
        self.signer_calls
            .lock()
            .unwrap()
            .push(SignerCall::Named(address.to_string()));
        Ok(Box::new(StubSigner {
            address: Address::new([0x01; 20]),
            fail_send: self.fail_send,
        }))
    }

    async fn get_default_signer(
        &self,
        _txn: &UnsignedTransaction,
        salt: Option<&str>,
    ) -> Result<Box<dyn Signer>, CollaboratorError> {
        self.signer_calls
            .lock()
            .unwrap()
            .push(SignerCall::Default(salt.map(str::to_string)));
        Ok(Box::new(StubSigner {
            address: Address::new([0x02; 20]),
            fail_send: self.fail_send,
        }))
    }
}

impl StepRuntime for RecordingRuntime {
    fn base_dir(&self) -> Option<&Path> {
        None
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

/// Routes service logs to the test harness; `RUST_LOG=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn owner_fragment() -> Value {
    json!({"type": "function", "name": "owner", "inputs": [],
           "outputs": [{"name": "", "type": "address"}], "stateMutability": "view"})
}

fn fn_a() -> Value {
    json!({"type": "function", "name": "fnA", "inputs": [], "outputs": [], "stateMutability": "nonpayable"})
}

fn scenario_context() -> StepContext {
    context_from_json(json!({
        "contracts": {
            "Foo": {"contractName": "Foo", "sourceName": "Foo.sol", "abi": [fn_a()], "address": "0x1"}
        }
    }))
    .unwrap()
}

fn stub_service(
    compiler: FixedCompiler,
) -> (RouterStepService<RecordingGenerator, FixedCompiler>, RecordingGenerator) {
    let generator = RecordingGenerator::default();
    let service = RouterStepService::new(generator.clone(), compiler, ServiceConfig::default());
    (service, generator)
}

// =============================================================================
// SCENARIOS
// =============================================================================

/// Single contract: merged ABI is `[fnA]`, router name comes from the label.
#[tokio::test]
async fn test_single_contract_router() {
    init_tracing();
    let (service, generator) = stub_service(FixedCompiler::default());
    let runtime = RecordingRuntime::default();
    let ctx = scenario_context();
    let config = RouterStepConfig::new(["Foo"]);

    let abi = service.merged_abi(&ctx, &config).unwrap();
    assert_eq!(abi.len(), 1);
    assert_eq!(abi[0].name.as_deref(), Some("fnA"));

    let record = service
        .exec(&runtime, &ctx, &config, &PackageState::new("router.MyRouter"))
        .await
        .unwrap();

    let router = record.get("MyRouter").expect("router recorded under its name");
    assert_eq!(router.contract_name, "MyRouter");
    assert_eq!(router.source_name, "MyRouter.sol");
    assert_eq!(router.deployed_on, "router.MyRouter");
    assert_eq!(router.address, Address::new([0xaa; 20]).to_checksum());
    assert_eq!(router.deploy_txn_hash, Hash::new([0x11; 32]).to_hex());
    assert_eq!(router.abi, abi);

    let requests = generator.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].contract_name, "MyRouter");
    assert_eq!(requests[0].contracts[0].deployed_address, "0x1");
    assert_eq!(requests[0].contracts[0].qualified_name, "Foo.sol:Foo");
}

/// Two contracts exposing `owner()` yield a single `owner` fragment.
#[tokio::test]
async fn test_shared_owner_is_deduplicated() {
    let (service, _) = stub_service(FixedCompiler::default());
    let ctx = context_from_json(json!({
        "contracts": {
            "A": {"abi": [owner_fragment(), fn_a()], "address": "0xa"},
            "B": {"abi": [owner_fragment()], "address": "0xb"}
        }
    }))
    .unwrap();

    let abi = service
        .merged_abi(&ctx, &RouterStepConfig::new(["A", "B"]))
        .unwrap();
    let owners = abi.iter().filter(|f| f.name.as_deref() == Some("owner")).count();
    assert_eq!(owners, 1);
    assert_eq!(abi.len(), 2);
}

/// Templated paths and salt render against the context.
#[tokio::test]
async fn test_templated_config_renders() {
    let (service, _) = stub_service(FixedCompiler::default());
    let ctx = context_from_json(json!({"settings": {"target": "Foo", "salt": "abc"}})).unwrap();
    let config = RouterStepConfig {
        salt: Some("<%= settings.salt %>".to_string()),
        ..RouterStepConfig::new(["<%= settings.target %>"])
    };

    let rendered = service.config_inject(&ctx, &config).unwrap();
    assert_eq!(rendered.contracts, vec!["Foo"]);
    assert_eq!(rendered.salt.as_deref(), Some("abc"));
    assert!(rendered.from.is_none());
    // The original is untouched.
    assert_eq!(config.contracts, vec!["<%= settings.target %>"]);
}

#[tokio::test]
async fn test_unresolved_template_reference_fails() {
    let (service, _) = stub_service(FixedCompiler::default());
    let ctx = context_from_json(json!({"settings": {}})).unwrap();
    let err = service
        .config_inject(&ctx, &RouterStepConfig::new(["<%= settings.target %>"]))
        .unwrap_err();
    assert!(matches!(err, RouterError::UnresolvedTemplateReference { .. }));
}

// =============================================================================
// SIGNERS AND ARTIFACTS
// =============================================================================

#[tokio::test]
async fn test_explicit_from_uses_named_signer() {
    let (service, _) = stub_service(FixedCompiler::default());
    let runtime = RecordingRuntime::default();
    let config = RouterStepConfig {
        from: Some("0x0000000000000000000000000000000000000001".to_string()),
        salt: Some("ignored".to_string()),
        ..RouterStepConfig::new(["Foo"])
    };

    service
        .exec(&runtime, &scenario_context(), &config, &PackageState::new("router.R"))
        .await
        .unwrap();

    assert_eq!(
        *runtime.signer_calls.lock().unwrap(),
        vec![SignerCall::Named("0x0000000000000000000000000000000000000001".to_string())]
    );
}

#[tokio::test]
async fn test_default_signer_receives_salt() {
    let (service, _) = stub_service(FixedCompiler::default());
    let runtime = RecordingRuntime::default();
    let config = RouterStepConfig {
        salt: Some("main".to_string()),
        ..RouterStepConfig::new(["Foo"])
    };

    service
        .exec(&runtime, &scenario_context(), &config, &PackageState::new("router.R"))
        .await
        .unwrap();

    assert_eq!(
        *runtime.signer_calls.lock().unwrap(),
        vec![SignerCall::Default(Some("main".to_string()))]
    );
}

/// An empty salt is a valid value and reaches the signer lookup as-is.
#[tokio::test]
async fn test_empty_salt_passes_through() {
    let (service, _) = stub_service(FixedCompiler::default());
    let runtime = RecordingRuntime::default();
    let config = RouterStepConfig {
        salt: Some(String::new()),
        ..RouterStepConfig::new(["Foo"])
    };

    let record = service
        .exec(&runtime, &scenario_context(), &config, &PackageState::new("router.R"))
        .await
        .unwrap();

    assert!(record.get("R").is_some());
    assert_eq!(
        *runtime.signer_calls.lock().unwrap(),
        vec![SignerCall::Default(Some(String::new()))]
    );
}

#[tokio::test]
async fn test_artifact_shape() {
    let (service, _) = stub_service(FixedCompiler::default());
    let runtime = RecordingRuntime::default();

    service
        .exec(
            &runtime,
            &scenario_context(),
            &RouterStepConfig::new(["Foo"]),
            &PackageState::new("router.MyRouter"),
        )
        .await
        .unwrap();

    let artifacts = runtime.artifacts.lock().unwrap();
    assert_eq!(artifacts.len(), 1);
    let (key, artifact) = &artifacts[0];
    assert_eq!(key, "MyRouter.sol:MyRouter");
    assert_eq!(artifact.source_name, "MyRouter.sol");
    assert_eq!(artifact.source.solc_version, "0.8.17+commit.8df45f5f");
    assert!(artifact.link_references.is_empty());
    assert_eq!(artifact.abi.len(), 1);

    let input: Value = serde_json::from_str(&artifact.source.input).unwrap();
    assert_eq!(input["sources"]["MyRouter.sol"]["content"], "contract MyRouter {}");
}

// =============================================================================
// FAILURES
// =============================================================================

#[tokio::test]
async fn test_failed_broadcast_reports_no_artifact() {
    let (service, _) = stub_service(FixedCompiler::default());
    let runtime = RecordingRuntime {
        fail_send: true,
        ..RecordingRuntime::default()
    };

    let err = service
        .exec(
            &runtime,
            &scenario_context(),
            &RouterStepConfig::new(["Foo"]),
            &PackageState::new("router.R"),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RouterError::Collaborator(CollaboratorError::Transaction("nonce too low".to_string()))
    );
    assert!(runtime.artifacts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_compiler_failure_passes_through() {
    let (service, _) = stub_service(FixedCompiler { fail: true });
    let runtime = RecordingRuntime::default();

    let err = service
        .exec(
            &runtime,
            &scenario_context(),
            &RouterStepConfig::new(["Foo"]),
            &PackageState::new("router.R"),
        )
        .await
        .unwrap_err();

    assert!(err.is_collaborator());
    assert!(runtime.signer_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_label_and_missing_contract() {
    let (service, generator) = stub_service(FixedCompiler::default());
    let runtime = RecordingRuntime::default();
    let ctx = scenario_context();

    let err = service
        .exec(&runtime, &ctx, &RouterStepConfig::new(["Foo"]), &PackageState::new("MyRouter"))
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::InvalidLabel { .. }));

    let err = service
        .exec(&runtime, &ctx, &RouterStepConfig::new(["sub.Foo"]), &PackageState::new("router.R"))
        .await
        .unwrap_err();
    assert_eq!(err, RouterError::ContractNotFound("sub.Foo".to_string()));
    assert!(generator.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_abi_is_reported() {
    let (service, _) = stub_service(FixedCompiler::default());
    let ctx = context_from_json(json!({"contracts": {"Foo": {"abi": "nope", "address": "0x1"}}}))
        .unwrap();
    let err = service
        .exec(
            &RecordingRuntime::default(),
            &ctx,
            &RouterStepConfig::new(["Foo"]),
            &PackageState::new("router.R"),
        )
        .await
        .unwrap_err();
    assert_eq!(err, RouterError::InvalidAbi("Foo".to_string()));
}

// =============================================================================
// SIMULATED CHAIN
// =============================================================================

fn module_context() -> StepContext {
    context_from_json(json!({
        "contracts": {
            "OwnerModule": {
                "contractName": "OwnerModule",
                "sourceName": "contracts/OwnerModule.sol",
                "address": "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed",
                "abi": [owner_fragment()]
            }
        },
        "imports": {
            "token": {
                "contracts": {
                    "TokenModule": {
                        "contractName": "TokenModule",
                        "sourceName": "contracts/TokenModule.sol",
                        "address": "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359",
                        "abi": [
                            {"type": "function", "name": "transfer",
                             "inputs": [{"name": "to", "type": "address"}, {"name": "amount", "type": "uint256"}],
                             "outputs": [{"name": "", "type": "bool"}], "stateMutability": "nonpayable"},
                            owner_fragment()
                        ]
                    }
                }
            }
        }
    }))
    .unwrap()
}

/// Identical inputs on fresh chains deploy to identical addresses.
#[tokio::test]
async fn test_simulated_deployment_is_reproducible() {
    init_tracing();
    let service = RouterStepService::new(
        SolidityRouterGenerator::new(),
        FixedCompiler::default(),
        ServiceConfig::default(),
    );
    let config = RouterStepConfig {
        salt: Some("main".to_string()),
        ..RouterStepConfig::new(["OwnerModule", "token.TokenModule"])
    };
    let state = PackageState::new("router.CoreRouter");

    let first_chain = SimulatedChain::new();
    let first = service
        .exec(&first_chain, &module_context(), &config, &state)
        .await
        .unwrap();
    let second = service
        .exec(&SimulatedChain::new(), &module_context(), &config, &state)
        .await
        .unwrap();

    let router = first.get("CoreRouter").unwrap();
    assert_eq!(router.address, second.get("CoreRouter").unwrap().address);
    assert_eq!(router.abi.len(), 2);

    let artifact = first_chain.artifact("CoreRouter.sol:CoreRouter").await.unwrap();
    assert_eq!(artifact.bytecode.as_slice(), &[0x60, 0x80, 0x60, 0x40]);

    let address: Address = router.address.parse().unwrap();
    assert!(first_chain.code_at(&address).await.is_some());
}

#[tokio::test]
async fn test_state_snapshot_keys_match_rendered_paths() {
    let service = RouterStepService::new(
        SolidityRouterGenerator::new(),
        FixedCompiler::default(),
        ServiceConfig::default(),
    );
    let runtime = SimulatedChain::with_base_dir("/tmp/package");
    let config = RouterStepConfig::new(["OwnerModule", "token.TokenModule"]);

    let snapshot = service
        .get_state(&runtime, &module_context(), &config)
        .await
        .unwrap()
        .unwrap();

    let keys: Vec<_> = snapshot.contract_addresses.keys().cloned().collect();
    assert_eq!(keys, vec!["OwnerModule", "token.TokenModule"]);
    assert_eq!(
        snapshot.contract_abis.keys().collect::<Vec<_>>(),
        snapshot.contract_addresses.keys().collect::<Vec<_>>()
    );

    let err = service
        .get_state(&runtime, &module_context(), &RouterStepConfig::new(["token.Missing"]))
        .await
        .unwrap_err();
    assert_eq!(err, RouterError::ContractNotFound("token.Missing".to_string()));
}
