//! # ABI Fragments
//!
//! Typed view over JSON ABI entries and their canonical (minimal) signatures.
//!
//! Two fragments are equivalent when their canonical signatures are equal.
//! Parameter names, `internalType` and return-value names never take part in
//! equality; type aliases are normalized (`uint` becomes `uint256`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha3::{Digest, Keccak256};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// FRAGMENT MODEL
// =============================================================================

/// Kind tag of an ABI entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    /// Callable function. Also the default when `type` is omitted.
    #[default]
    Function,
    /// Log event.
    Event,
    /// Custom error.
    Error,
    /// Constructor.
    Constructor,
    /// Fallback entry point.
    Fallback,
    /// Plain ether receiver.
    Receive,
}

impl FragmentKind {
    /// Keyword used in the human-readable signature.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Event => "event",
            Self::Error => "error",
            Self::Constructor => "constructor",
            Self::Fallback => "fallback",
            Self::Receive => "receive",
        }
    }
}

/// A single input or output parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiParam {
    /// Parameter name (may be empty).
    #[serde(default)]
    pub name: String,
    /// Solidity type, e.g. `uint256[]` or `tuple`.
    #[serde(rename = "type")]
    pub ty: String,
    /// Tuple members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<AbiParam>>,
    /// Event parameter indexing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
    /// Compiler-provided source type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_type: Option<String>,
}

/// One ABI entry.
///
/// Unknown keys are preserved so a fragment serializes back to the shape
/// the producing compiler emitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiFragment {
    /// Entry kind.
    #[serde(rename = "type", default)]
    pub kind: FragmentKind,
    /// Entry name (absent for constructor/fallback/receive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Ordered inputs.
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    /// Ordered outputs (functions only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<AbiParam>>,
    /// `pure`, `view`, `nonpayable` or `payable`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_mutability: Option<String>,
    /// Legacy pre-0.5 `constant` flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<bool>,
    /// Legacy pre-0.5 `payable` flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payable: Option<bool>,
    /// Anonymous events carry no topic-0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,
    /// Anything else the compiler emitted.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Parses a raw JSON ABI.
///
/// Returns `None` when the value is not an array or an entry is not a
/// well-formed fragment object.
#[must_use]
pub fn parse_abi(value: &Value) -> Option<Vec<AbiFragment>> {
    let entries = value.as_array()?;
    entries
        .iter()
        .map(|entry| {
            if entry.is_object() {
                serde_json::from_value(entry.clone()).ok()
            } else {
                None
            }
        })
        .collect()
}

// =============================================================================
// TYPE NORMALIZATION
// =============================================================================

/// Normalizes a Solidity elementary type, keeping any array suffix.
///
/// `uint` → `uint256`, `int` → `int256`, `byte` → `bytes1`,
/// `fixed` → `fixed128x18`, `ufixed` → `ufixed128x18`.
#[must_use]
pub fn normalize_type(ty: &str) -> String {
    let ty: String = ty.chars().filter(|c| !c.is_whitespace()).collect();
    let (base, suffix) = match ty.find('[') {
        Some(idx) => ty.split_at(idx),
        None => (ty.as_str(), ""),
    };
    let base = match base {
        "uint" => "uint256",
        "int" => "int256",
        "byte" => "bytes1",
        "fixed" => "fixed128x18",
        "ufixed" => "ufixed128x18",
        other => other,
    };
    format!("{base}{suffix}")
}

/// Rendering mode for parameter types.
#[derive(Clone, Copy, PartialEq, Eq)]
enum TypeFormat {
    /// `tuple(uint256,address)` plus `indexed` markers.
    Minimal,
    /// `(uint256,address)` as hashed for selectors.
    Sighash,
}

impl AbiParam {
    fn format(&self, format: TypeFormat) -> String {
        let ty = normalize_type(&self.ty);
        let mut out = match (&self.components, ty.strip_prefix("tuple")) {
            (Some(components), Some(suffix)) => {
                let inner: Vec<String> = components.iter().map(|c| c.format(format)).collect();
                let prefix = if format == TypeFormat::Minimal { "tuple" } else { "" };
                format!("{prefix}({}){suffix}", inner.join(","))
            }
            _ => ty,
        };
        if format == TypeFormat::Minimal && self.indexed == Some(true) {
            out.push_str(" indexed");
        }
        out
    }

    /// Canonical type string used in selectors.
    #[must_use]
    pub fn sighash_type(&self) -> String {
        self.format(TypeFormat::Sighash)
    }
}

// =============================================================================
// CANONICAL SIGNATURE
// =============================================================================

/// Normalized structural key of a fragment.
///
/// Its `Display` form is the minimal human-readable signature, e.g.
/// `function balanceOf(address) view returns (uint256)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalSignature {
    /// Entry kind.
    pub kind: FragmentKind,
    /// Entry name (empty when unnamed).
    pub name: String,
    /// Normalized input types.
    pub inputs: Vec<String>,
    /// Non-default state mutability.
    pub mutability: Option<String>,
    /// Normalized output types.
    pub outputs: Vec<String>,
    /// Anonymous event flag.
    pub anonymous: bool,
}

impl fmt::Display for CanonicalSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FragmentKind::Function | FragmentKind::Event | FragmentKind::Error => {
                write!(f, "{} {}", self.kind.keyword(), self.name)?;
            }
            _ => write!(f, "{}", self.kind.keyword())?,
        }
        write!(f, "({})", self.inputs.join(","))?;
        if self.anonymous {
            write!(f, " anonymous")?;
        }
        if let Some(mutability) = &self.mutability {
            write!(f, " {mutability}")?;
        }
        if !self.outputs.is_empty() {
            write!(f, " returns ({})", self.outputs.join(","))?;
        }
        Ok(())
    }
}

impl AbiFragment {
    /// Effective state mutability, resolving the legacy flags.
    #[must_use]
    pub fn effective_mutability(&self) -> String {
        if let Some(m) = &self.state_mutability {
            return m.clone();
        }
        if self.payable == Some(true) {
            "payable".to_string()
        } else if self.constant == Some(true) {
            "view".to_string()
        } else {
            "nonpayable".to_string()
        }
    }

    /// Computes the canonical signature of this fragment.
    #[must_use]
    pub fn canonical_signature(&self) -> CanonicalSignature {
        let inputs = self
            .inputs
            .iter()
            .map(|p| p.format(TypeFormat::Minimal))
            .collect();

        let (mutability, outputs) = match self.kind {
            FragmentKind::Function | FragmentKind::Constructor | FragmentKind::Fallback => {
                let m = self.effective_mutability();
                let mutability = (m != "nonpayable").then_some(m);
                let outputs = if self.kind == FragmentKind::Function {
                    self.outputs
                        .iter()
                        .flatten()
                        .map(|p| p.format(TypeFormat::Minimal))
                        .collect()
                } else {
                    Vec::new()
                };
                (mutability, outputs)
            }
            FragmentKind::Receive => (Some("payable".to_string()), Vec::new()),
            FragmentKind::Event | FragmentKind::Error => (None, Vec::new()),
        };

        CanonicalSignature {
            kind: self.kind,
            name: self.name.clone().unwrap_or_default(),
            inputs,
            mutability,
            outputs,
            anonymous: self.kind == FragmentKind::Event && self.anonymous == Some(true),
        }
    }

    /// `name(type,...)` as hashed for selectors and topics.
    #[must_use]
    pub fn sighash(&self) -> String {
        let types: Vec<String> = self.inputs.iter().map(AbiParam::sighash_type).collect();
        format!(
            "{}({})",
            self.name.as_deref().unwrap_or_default(),
            types.join(",")
        )
    }

    /// Four-byte selector for functions and custom errors.
    #[must_use]
    pub fn selector(&self) -> Option<[u8; 4]> {
        match self.kind {
            FragmentKind::Function | FragmentKind::Error => {
                let hash = Keccak256::digest(self.sighash().as_bytes());
                let mut selector = [0u8; 4];
                selector.copy_from_slice(&hash[..4]);
                Some(selector)
            }
            _ => None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
