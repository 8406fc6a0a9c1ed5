//! # Router Source Generator
//!
//! Emits a Solidity router: one address constant per routed contract, a Yul
//! `switch` over function selectors in its fallback, and a `delegatecall`
//! to the contract that implements the selector.

use crate::domain::abi::{parse_abi, FragmentKind};
use crate::domain::entities::GenerateRequest;
use crate::domain::value_objects::Address;
use crate::errors::CollaboratorError;
use crate::ports::outbound::RouterGenerator;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;
use tracing::debug;

/// Pragma emitted at the top of generated routers.
pub const DEFAULT_PRAGMA: &str = "^0.8.0";

/// A selector routed to one module.
#[derive(Debug, Clone)]
struct Route {
    signature: String,
    module: String,
    contract_name: String,
}

/// A routed contract as it appears in the generated source.
#[derive(Debug, Clone)]
struct Module {
    constant: String,
    address: Address,
    qualified_name: String,
}

/// Generates fallback-dispatch routers.
#[derive(Debug, Clone)]
pub struct SolidityRouterGenerator {
    pragma: String,
}

impl Default for SolidityRouterGenerator {
    fn default() -> Self {
        Self {
            pragma: DEFAULT_PRAGMA.to_string(),
        }
    }
}

impl SolidityRouterGenerator {
    /// Creates a generator with the default pragma.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the pragma version constraint.
    #[must_use]
    pub fn with_pragma(mut self, pragma: impl Into<String>) -> Self {
        self.pragma = pragma.into();
        self
    }

    fn collect(
        request: &GenerateRequest,
    ) -> Result<(Vec<Module>, BTreeMap<[u8; 4], Route>), CollaboratorError> {
        let mut modules = Vec::with_capacity(request.contracts.len());
        let mut constants = HashSet::new();
        let mut routes: BTreeMap<[u8; 4], Route> = BTreeMap::new();

        for (index, contract) in request.contracts.iter().enumerate() {
            let address: Address = contract.deployed_address.parse().map_err(|e| {
                CollaboratorError::Generator(format!(
                    "invalid address for {}: {e}",
                    contract.qualified_name
                ))
            })?;

            let mut constant = module_constant(&contract.contract_name, index);
            if !constants.insert(constant.clone()) {
                constant = format!("{constant}_{index}");
                constants.insert(constant.clone());
            }

            let fragments = parse_abi(&contract.abi).ok_or_else(|| {
                CollaboratorError::Generator(format!(
                    "invalid abi for {}",
                    contract.qualified_name
                ))
            })?;

            for fragment in fragments.iter().filter(|f| f.kind == FragmentKind::Function) {
                let Some(selector) = fragment.selector() else {
                    continue;
                };
                let signature = fragment.sighash();

                if let Some(existing) = routes.get(&selector) {
                    if existing.signature != signature {
                        return Err(CollaboratorError::Generator(format!(
                            "selector collision 0x{}: {}.{} and {}.{}",
                            hex::encode(selector),
                            existing.contract_name,
                            existing.signature,
                            contract.contract_name,
                            signature
                        )));
                    }
                    continue;
                }

                routes.insert(
                    selector,
                    Route {
                        signature,
                        module: constant.clone(),
                        contract_name: contract.contract_name.clone(),
                    },
                );
            }

            modules.push(Module {
                constant,
                address,
                qualified_name: contract.qualified_name.clone(),
            });
        }

        Ok((modules, routes))
    }
}

impl RouterGenerator for SolidityRouterGenerator {
    fn generate(&self, request: &GenerateRequest) -> Result<String, CollaboratorError> {
        let (modules, routes) = Self::collect(request)?;
        debug!(
            router = %request.contract_name,
            modules = modules.len(),
            selectors = routes.len(),
            "Generating router source"
        );

        let mut src = String::new();
        render(&mut src, &request.contract_name, &self.pragma, &modules, &routes)
            .map_err(|e| CollaboratorError::Generator(e.to_string()))?;
        Ok(src)
    }
}

fn render(
    out: &mut String,
    name: &str,
    pragma: &str,
    modules: &[Module],
    routes: &BTreeMap<[u8; 4], Route>,
) -> std::fmt::Result {
    writeln!(out, "// SPDX-License-Identifier: UNLICENSED")?;
    writeln!(out, "pragma solidity {pragma};")?;
    writeln!(out)?;
    writeln!(out, "// GENERATED CODE - do not edit manually!")?;
    writeln!(out)?;
    writeln!(out, "contract {name} {{")?;
    writeln!(out, "    error UnknownSelector(bytes4 sel);")?;
    writeln!(out)?;
    for module in modules {
        writeln!(
            out,
            "    address private constant {} = {}; // {}",
            module.constant,
            module.address.to_checksum(),
            module.qualified_name
        )?;
    }
    writeln!(out)?;
    writeln!(out, "    fallback() external payable {{")?;
    writeln!(out, "        _forward();")?;
    writeln!(out, "    }}")?;
    writeln!(out)?;
    writeln!(out, "    receive() external payable {{")?;
    writeln!(out, "        _forward();")?;
    writeln!(out, "    }}")?;
    writeln!(out)?;
    writeln!(out, "    function _forward() internal {{")?;
    writeln!(out, "        bytes4 sig4 = msg.sig;")?;
    writeln!(out, "        address implementation;")?;
    writeln!(out)?;
    writeln!(out, "        assembly {{")?;
    writeln!(out, "            let sig32 := shr(224, sig4)")?;
    writeln!(out)?;
    writeln!(out, "            function findImplementation(sig) -> result {{")?;
    writeln!(out, "                switch sig")?;
    for (selector, route) in routes {
        writeln!(
            out,
            "                case 0x{} {{ result := {} }} // {}.{}",
            hex::encode(selector),
            route.module,
            route.contract_name,
            route.signature
        )?;
    }
    writeln!(out, "                default {{}}")?;
    writeln!(out, "            }}")?;
    writeln!(out)?;
    writeln!(out, "            implementation := findImplementation(sig32)")?;
    writeln!(out, "        }}")?;
    writeln!(out)?;
    writeln!(out, "        if (implementation == address(0)) {{")?;
    writeln!(out, "            revert UnknownSelector(sig4);")?;
    writeln!(out, "        }}")?;
    writeln!(out)?;
    writeln!(out, "        assembly {{")?;
    writeln!(out, "            calldatacopy(0, 0, calldatasize())")?;
    writeln!(out)?;
    writeln!(
        out,
        "            let result := delegatecall(gas(), implementation, 0, calldatasize(), 0, 0)"
    )?;
    writeln!(out, "            returndatacopy(0, 0, returndatasize())")?;
    writeln!(out)?;
    writeln!(out, "            switch result")?;
    writeln!(out, "            case 0 {{ revert(0, returndatasize()) }}")?;
    writeln!(out, "            default {{ return(0, returndatasize()) }}")?;
    writeln!(out, "        }}")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")
}

/// `CoreModule` → `_CORE_MODULE`.
fn module_constant(contract_name: &str, index: usize) -> String {
    if contract_name.is_empty() {
        return format!("_MODULE_{index}");
    }

    let mut out = String::from("_");
    let mut prev: Option<char> = None;
    for ch in contract_name.chars() {
        if ch.is_ascii_uppercase()
            && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
        {
            out.push('_');
        }
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push('_');
        }
        prev = Some(ch);
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ContractDescriptor;
    use serde_json::{json, Value};

    fn descriptor(name: &str, address: &str, abi: Value) -> ContractDescriptor {
        ContractDescriptor {
            constructor_args: Vec::new(),
            abi,
            deployed_address: address.to_string(),
            deploy_txn_hash: String::new(),
            contract_name: name.to_string(),
            source_name: format!("contracts/{name}.sol"),
            qualified_name: format!("contracts/{name}.sol:{name}"),
        }
    }

    fn func(name: &str, inputs: &[&str]) -> Value {
        let inputs: Vec<Value> = inputs.iter().map(|t| json!({"name": "", "type": t})).collect();
        json!({"type": "function", "name": name, "inputs": inputs, "outputs": []})
    }

    const ADDR_A: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
    const ADDR_B: &str = "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359";

    #[test]
    fn test_module_constant_names() {
        assert_eq!(module_constant("CoreModule", 0), "_CORE_MODULE");
        assert_eq!(module_constant("ERC20Token", 0), "_ERC20_TOKEN");
        assert_eq!(module_constant("", 3), "_MODULE_3");
    }

    #[test]
    fn test_generate_routes_sorted_selectors() {
        let request = GenerateRequest {
            contract_name: "CoreRouter".to_string(),
            contracts: vec![
                descriptor(
                    "TokenModule",
                    ADDR_A,
                    json!([func("transfer", &["address", "uint256"]), {"type": "event", "name": "Transfer", "inputs": []}]),
                ),
                descriptor("OwnerModule", ADDR_B, json!([func("owner", &[])])),
            ],
        };

        let src = SolidityRouterGenerator::new().generate(&request).unwrap();

        assert!(src.contains("contract CoreRouter {"));
        assert!(src.contains(
            "address private constant _TOKEN_MODULE = 0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed;"
        ));
        assert!(src.contains("case 0xa9059cbb { result := _TOKEN_MODULE } // TokenModule.transfer(address,uint256)"));
        assert!(src.contains("case 0x8da5cb5b { result := _OWNER_MODULE } // OwnerModule.owner()"));
        // Selectors are emitted in ascending order.
        let owner = src.find("0x8da5cb5b").unwrap();
        let transfer = src.find("0xa9059cbb").unwrap();
        assert!(owner < transfer);
        // Events are not routed.
        assert!(!src.contains("Transfer()"));
    }

    #[test]
    fn test_duplicate_signature_routes_to_first_module() {
        let request = GenerateRequest {
            contract_name: "R".to_string(),
            contracts: vec![
                descriptor("A", ADDR_A, json!([func("owner", &[])])),
                descriptor("B", ADDR_B, json!([func("owner", &[])])),
            ],
        };
        let src = SolidityRouterGenerator::new().generate(&request).unwrap();
        assert!(src.contains("result := _A }"));
        assert!(!src.contains("result := _B }"));
    }

    #[test]
    fn test_selector_collision_is_rejected() {
        // Both hash to selector 0x42966c68.
        let request = GenerateRequest {
            contract_name: "R".to_string(),
            contracts: vec![
                descriptor("A", ADDR_A, json!([func("burn", &["uint256"])])),
                descriptor("B", ADDR_B, json!([func("collate_propagate_storage", &["bytes16"])])),
            ],
        };
        let err = SolidityRouterGenerator::new().generate(&request).unwrap_err();
        assert!(matches!(err, CollaboratorError::Generator(msg) if msg.contains("selector collision")));
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let request = GenerateRequest {
            contract_name: "R".to_string(),
            contracts: vec![descriptor("A", "0x1", json!([]))],
        };
        assert!(SolidityRouterGenerator::new().generate(&request).is_err());
    }

    #[test]
    fn test_same_contract_name_gets_unique_constant() {
        let request = GenerateRequest {
            contract_name: "R".to_string(),
            contracts: vec![
                descriptor("Proxy", ADDR_A, json!([])),
                descriptor("Proxy", ADDR_B, json!([])),
            ],
        };
        let src = SolidityRouterGenerator::new().generate(&request).unwrap();
        assert!(src.contains("address private constant _PROXY ="));
        assert!(src.contains("address private constant _PROXY_1 ="));
    }

    #[test]
    fn test_generate_without_routes_emits_complete_contract() {
        let request = GenerateRequest {
            contract_name: "Empty".to_string(),
            contracts: Vec::new(),
        };
        let src = SolidityRouterGenerator::new().generate(&request).unwrap();
        assert!(src.starts_with("// SPDX-License-Identifier: UNLICENSED\n"));
        assert!(src.contains("                switch sig\n                default {}"));
        assert!(src.ends_with("    }\n}\n"));
        assert_eq!(src.matches('{').count(), src.matches('}').count());
    }
}
