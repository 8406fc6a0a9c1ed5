//! # Domain Invariants
//!
//! Checks that MUST hold before a router step is planned or executed.
//!
//! - INVARIANT-1: At least one contract is routed
//! - INVARIANT-2: Every contract path is well formed
//! - INVARIANT-3: Every contract path resolves in the namespace

use crate::domain::entities::{Namespace, RouterStepConfig};
use crate::domain::services::resolve;
use crate::errors::RouterError;

// =============================================================================
// INVARIANT CHECKS
// =============================================================================

/// INVARIANT-1: the config routes to at least one contract.
#[must_use]
pub fn check_non_empty_invariant(config: &RouterStepConfig) -> bool {
    !config.contracts.is_empty()
}

/// INVARIANT-2: a rendered path has no empty segments.
#[must_use]
pub fn check_path_well_formed(path: &str) -> bool {
    !path.is_empty() && path.split('.').all(|segment| !segment.trim().is_empty())
}

/// INVARIANT-3: a path resolves to a contract record.
#[must_use]
pub fn check_path_resolves(root: &Namespace, path: &str) -> bool {
    resolve(root, path).found().is_some()
}

/// Check all invariants of a rendered config at once.
#[must_use]
pub fn check_all_invariants(root: &Namespace, config: &RouterStepConfig) -> InvariantCheckResult {
    let mut violations = Vec::new();

    if !check_non_empty_invariant(config) {
        violations.push(InvariantViolation::NoContracts);
    }

    for path in &config.contracts {
        if !check_path_well_formed(path) {
            violations.push(InvariantViolation::MalformedPath(path.clone()));
        } else if !check_path_resolves(root, path) {
            violations.push(InvariantViolation::UnresolvedPath(path.clone()));
        }
    }

    if violations.is_empty() {
        InvariantCheckResult::Valid
    } else {
        InvariantCheckResult::Invalid(violations)
    }
}

/// Validates the shape of a config before rendering.
///
/// Paths may still contain placeholders here, so only structural checks run.
pub fn validate_config(config: &RouterStepConfig) -> Result<(), RouterError> {
    if !check_non_empty_invariant(config) {
        return Err(RouterError::InvalidConfig(
            InvariantViolation::NoContracts.to_string(),
        ));
    }
    if let Some(path) = config.contracts.iter().find(|p| p.trim().is_empty()) {
        return Err(RouterError::InvalidConfig(
            InvariantViolation::MalformedPath(path.clone()).to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// INVARIANT TYPES
// =============================================================================

/// Result of checking all invariants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantCheckResult {
    /// All invariants hold.
    Valid,
    /// One or more invariants violated.
    Invalid(Vec<InvariantViolation>),
}

impl InvariantCheckResult {
    /// Returns true if all invariants hold.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Specific invariant violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// `contracts` is empty.
    NoContracts,
    /// A path has an empty segment.
    MalformedPath(String),
    /// A path does not resolve.
    UnresolvedPath(String),
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoContracts => write!(f, "at least one contract path is required"),
            Self::MalformedPath(path) => write!(f, "malformed contract path \"{path}\""),
            Self::UnresolvedPath(path) => write!(f, "contract not found: {path}"),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
