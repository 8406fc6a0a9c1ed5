//! # Error Types
//!
//! All error types for router synthesis and deployment.

use thiserror::Error;

// =============================================================================
// ROUTER ERRORS
// =============================================================================

/// Errors produced by the router step.
///
/// Every variant is fatal to the current operation; nothing in the step
/// retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// A configured path did not resolve to a contract record.
    #[error("contract not found: {0}")]
    ContractNotFound(String),

    /// A resolved contract record carries an ABI that is not a list of fragments.
    #[error("contract definition for \"{0}\" does not have a valid abi")]
    InvalidAbi(String),

    /// A template placeholder referenced a missing context value.
    #[error("unresolved template reference `{reference}` in \"{template}\"")]
    UnresolvedTemplateReference { template: String, reference: String },

    /// A template could not be parsed or rendered.
    #[error("invalid template \"{template}\": {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// Step configuration failed validation.
    #[error("invalid router config: {0}")]
    InvalidConfig(String),

    /// The step label does not carry the router label prefix.
    #[error("step label \"{label}\" does not start with \"{prefix}\"")]
    InvalidLabel { label: String, prefix: String },

    /// The step context does not form a contract namespace.
    #[error("invalid step context: {0}")]
    InvalidContext(String),

    /// Failure reported by an external collaborator (passed through unchanged).
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl RouterError {
    /// Returns true if the error originated in a collaborator port.
    #[must_use]
    pub fn is_collaborator(&self) -> bool {
        matches!(self, Self::Collaborator(_))
    }
}

// =============================================================================
// COLLABORATOR ERRORS
// =============================================================================

/// Errors surfaced by the generator, compiler and chain ports.
///
/// The step never interprets these; it only tags which port failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Router source generation failed.
    #[error("router generation failed: {0}")]
    Generator(String),

    /// Compiler invocation or compilation failed.
    #[error("compilation failed: {0}")]
    Compiler(String),

    /// Signer lookup failed.
    #[error("signer unavailable: {0}")]
    Signer(String),

    /// Broadcast or inclusion failed.
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// Artifact reporting failed.
    #[error("artifact report failed: {0}")]
    Artifact(String),
}

// =============================================================================
// TESTS
// =============================================================================
