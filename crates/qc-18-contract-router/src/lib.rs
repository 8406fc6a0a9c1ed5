//! # QC-18 Contract Router - Router Synthesis Step
//!
//! **Subsystem ID:** 18
//! **Status:** Production-Ready
//!
//! ## Purpose
//!
//! A deployment pipeline step that synthesizes, compiles and deploys a
//! *router* contract: a single on-chain entry point whose fallback forwards
//! each call, by function selector, to the previously deployed contract
//! that implements it. The router's ABI is the deduplicated union of the
//! routed contracts' ABIs.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | INVARIANT-1 | At least one routed contract | `domain/invariants.rs` - `check_non_empty_invariant()` |
//! | INVARIANT-2 | Well-formed contract paths | `domain/invariants.rs` - `check_path_well_formed()` |
//! | INVARIANT-3 | Paths resolve in the namespace | `domain/invariants.rs` - `check_path_resolves()` |
//!
//! ## Components
//!
//! | Component | Location | Purpose |
//! |-----------|----------|---------|
//! | Resolver | `domain/services.rs` | Dotted path → contract record |
//! | ABI merger | `domain/services.rs`, `domain/abi.rs` | First-wins dedupe by canonical signature |
//! | Templater | `domain/template.rs` | `<%= %>`, `<%- %>`, `${}` interpolation |
//! | Orchestrator | `service.rs` | Generate, compile, report, deploy |
//! | Generator | `adapters/generator.rs` | Solidity fallback router source |
//! | Compiler | `adapters/solc.rs` | `solc --standard-json` |
//! | Simulated chain | `adapters/simulated_chain.rs` | In-memory runtime |
//!
//! ## Outbound Dependencies
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | `RouterGenerator` | Emit router source |
//! | `SolidityCompiler` | Compile router source |
//! | `StepRuntime` | Report artifacts, look up signers, broadcast |
//!
//! ## Usage Example
//!
//! ```ignore
//! use qc_18_contract_router::prelude::*;
//!
//! let service = RouterStepService::new(
//!     SolidityRouterGenerator::new(),
//!     SolcCompiler::new(config.compiler.clone()),
//!     config,
//! );
//! let rendered = service.config_inject(&ctx, &step_config)?;
//! let record = service
//!     .exec(&runtime, &ctx, &rendered, &PackageState::new("router.CoreRouter"))
//!     .await?;
//! println!("router at {}", record.get("CoreRouter").unwrap().address);
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod service;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{
        ArtifactSource, CompiledContract, ContractArtifact, ContractDescriptor, ContractRecord,
        DeployedContract, DeploymentRecord, GenerateRequest, Namespace, PackageState, Receipt,
        RouterStepConfig, StateSnapshot, StepContext, StepDescriptor, UnsignedTransaction,
    };

    // ABI
    pub use crate::domain::abi::{
        normalize_type, parse_abi, AbiFragment, AbiParam, CanonicalSignature, FragmentKind,
    };

    // Value objects
    pub use crate::domain::value_objects::{Address, Bytes, Hash, HexParseError, U256};

    // Domain services
    pub use crate::domain::services::{
        compute_contract_address, keccak256, merge_abis, normalize_compiler_version,
        require_contract, resolve, router_contract_name, step_inputs, step_outputs, Resolution,
        ROUTER_LABEL_PREFIX,
    };
    pub use crate::domain::template::{render_config, render_template};

    // Invariants
    pub use crate::domain::invariants::{
        check_all_invariants, validate_config, InvariantCheckResult, InvariantViolation,
    };

    // Ports
    pub use crate::ports::inbound::RouterStepApi;
    pub use crate::ports::outbound::{
        ArtifactReporter, PendingTransaction, RouterGenerator, Signer, SignerProvider,
        SolidityCompiler, StepRuntime,
    };

    // Errors
    pub use crate::errors::{CollaboratorError, RouterError};

    // Adapters
    pub use crate::adapters::{SimulatedChain, SolcCompiler, SolidityRouterGenerator};

    // Config and service
    pub use crate::config::{CompilerSettings, ConfigError, ServiceConfig};
    pub use crate::service::{context_from_json, RouterStepService, ServiceStats};
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Subsystem ID.
pub const SUBSYSTEM_ID: u8 = 18;

/// Subsystem name.
pub const SUBSYSTEM_NAME: &str = "Contract Router";

// =============================================================================
// TESTS
// =============================================================================
