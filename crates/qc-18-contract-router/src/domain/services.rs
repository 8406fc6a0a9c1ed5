//! # Domain Services
//!
//! Pure business logic of the router step.
//! These functions are deterministic and have no side effects.
//!
//! - Namespace resolution of dotted contract paths
//! - ABI merging with first-occurrence deduplication
//! - Router naming and build-graph edges
//! - Address derivation helpers

use crate::domain::abi::{parse_abi, AbiFragment, CanonicalSignature};
use crate::domain::entities::{ContractRecord, Namespace, RouterStepConfig};
use crate::domain::value_objects::{Address, Hash};
use crate::errors::RouterError;
use sha3::{Digest, Keccak256};
use std::collections::HashSet;

// =============================================================================
// CONTEXT RESOLUTION
// =============================================================================

/// Outcome of resolving a dotted path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Resolution<'a> {
    /// The record stored at the path.
    Found(&'a ContractRecord),
    /// Some segment was absent. `missing` names the first absent segment.
    NotFound { missing: &'a str },
}

impl<'a> Resolution<'a> {
    /// Converts into an `Option`, dropping the miss details.
    #[must_use]
    pub fn found(self) -> Option<&'a ContractRecord> {
        match self {
            Self::Found(record) => Some(record),
            Self::NotFound { .. } => None,
        }
    }
}

/// Resolves `path` against `root`.
///
/// All segments but the last descend through `imports`; the last is looked
/// up in `contracts`. `sub.Foo` therefore means `imports.sub.contracts.Foo`.
#[must_use]
pub fn resolve<'a>(root: &'a Namespace, path: &'a str) -> Resolution<'a> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(name) = segments.pop() else {
        return Resolution::NotFound { missing: path };
    };

    let mut current = root;
    for segment in segments {
        match current.imports.get(segment) {
            Some(child) => current = child,
            None => return Resolution::NotFound { missing: segment },
        }
    }

    match current.contracts.get(name) {
        Some(record) => Resolution::Found(record),
        None => Resolution::NotFound { missing: name },
    }
}

/// Resolves `path`, failing with `ContractNotFound` on a miss.
pub fn require_contract<'a>(
    root: &'a Namespace,
    path: &'a str,
) -> Result<&'a ContractRecord, RouterError> {
    resolve(root, path)
        .found()
        .ok_or_else(|| RouterError::ContractNotFound(path.to_string()))
}

// =============================================================================
// ABI MERGING
// =============================================================================

/// Merges the ABIs of the contracts at `paths` into one callable surface.
///
/// Fragments keep path order and per-contract order. A fragment whose
/// canonical signature was already seen is dropped; the first occurrence wins.
pub fn merge_abis<S: AsRef<str>>(
    root: &Namespace,
    paths: &[S],
) -> Result<Vec<AbiFragment>, RouterError> {
    let mut seen: HashSet<CanonicalSignature> = HashSet::new();
    let mut merged = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let record = require_contract(root, path)?;
        let fragments =
            parse_abi(&record.abi).ok_or_else(|| RouterError::InvalidAbi(path.to_string()))?;

        for fragment in fragments {
            if seen.insert(fragment.canonical_signature()) {
                merged.push(fragment);
            }
        }
    }

    Ok(merged)
}

// =============================================================================
// NAMING AND BUILD-GRAPH EDGES
// =============================================================================

/// Label prefix of router steps.
pub const ROUTER_LABEL_PREFIX: &str = "router.";

/// Derives the router contract name from a step label.
pub fn router_contract_name(label: &str, prefix: &str) -> Result<String, RouterError> {
    match label.strip_prefix(prefix) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(RouterError::InvalidLabel {
            label: label.to_string(),
            prefix: prefix.to_string(),
        }),
    }
}

/// Build-graph inputs declared by a router step.
///
/// Multi-segment paths depend on the whole import (`imports.<first>`);
/// single-segment paths depend on the local contract (`contracts.<name>`).
#[must_use]
pub fn step_inputs(config: &RouterStepConfig) -> Vec<String> {
    let mut inputs: Vec<String> = Vec::new();
    for path in &config.contracts {
        let input = match path.split_once('.') {
            Some((first, _)) => format!("imports.{first}"),
            None => format!("contracts.{path}"),
        };
        if !inputs.contains(&input) {
            inputs.push(input);
        }
    }
    inputs
}

/// Build-graph outputs declared by a router step.
#[must_use]
pub fn step_outputs(router_name: &str) -> Vec<String> {
    vec![format!("contracts.{router_name}")]
}

// =============================================================================
// COMPILER VERSION
// =============================================================================

/// Normalizes a compiler version to its `<version>+commit.<hash>` prefix.
///
/// `0.8.17+commit.8df45f5f.Linux.g++` becomes `0.8.17+commit.8df45f5f`.
/// A leading `Version: ` banner line (from `solc --version`) is tolerated.
#[must_use]
pub fn normalize_compiler_version(raw: &str) -> Option<String> {
    let line = raw
        .lines()
        .find(|line| line.contains("commit."))?
        .trim()
        .trim_start_matches("Version:")
        .trim();

    let idx = line.find("commit.")?;
    let after = &line[idx + "commit.".len()..];
    let hash_len = after
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(after.len());
    if hash_len == 0 {
        return None;
    }
    Some(line[..idx + "commit.".len() + hash_len].to_string())
}

// =============================================================================
// ADDRESS DERIVATION
// =============================================================================

/// Computes keccak256 hash of data.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let hash = Keccak256::digest(data);
    Hash::new(hash.into())
}

/// Computes the contract address for a CREATE deployment.
///
/// Address = keccak256(rlp(\[sender, nonce\]))\[12:\]
#[must_use]
pub fn compute_contract_address(sender: Address, nonce: u64) -> Address {
    let mut content = Vec::with_capacity(32);

    // RLP encode address (20 bytes, 0x80 + 20 = 0x94)
    content.push(0x94);
    content.extend_from_slice(sender.as_bytes());

    if nonce == 0 {
        content.push(0x80);
    } else if nonce < 128 {
        content.push(nonce as u8);
    } else {
        let nonce_bytes = strip_leading_zeros(nonce);
        content.push(0x80 + nonce_bytes.len() as u8);
        content.extend_from_slice(&nonce_bytes);
    }

    // Content is at most 30 bytes, so the short list header always applies.
    let mut rlp_data = Vec::with_capacity(content.len() + 1);
    rlp_data.push(0xc0 + content.len() as u8);
    rlp_data.extend_from_slice(&content);

    address_from_hash(&Keccak256::digest(&rlp_data))
}

/// Derives an account address from a 32-byte seed, as `keccak256(seed)[12:]`.
#[must_use]
pub fn derive_address(seed: &[u8]) -> Address {
    address_from_hash(&Keccak256::digest(seed))
}

fn address_from_hash(hash: &[u8]) -> Address {
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..32]);
    Address::new(addr)
}

fn strip_leading_zeros(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    bytes[start..].to_vec()
}

// =============================================================================
// TESTS
// =============================================================================
