//! # Solc Compiler Adapter
//!
//! Drives a native `solc` binary through its standard-JSON interface.

use crate::config::CompilerSettings;
use crate::domain::entities::CompiledContract;
use crate::domain::value_objects::Bytes;
use crate::errors::CollaboratorError;
use crate::ports::outbound::SolidityCompiler;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Compiler backed by a `solc` executable.
#[derive(Debug, Clone, Default)]
pub struct SolcCompiler {
    settings: CompilerSettings,
}

impl SolcCompiler {
    /// Creates a compiler using the given settings.
    #[must_use]
    pub fn new(settings: CompilerSettings) -> Self {
        Self { settings }
    }

    /// Returns the compiler settings.
    #[must_use]
    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Builds the standard-JSON input for a single router source.
    #[must_use]
    pub fn standard_json_input(&self, contract_name: &str, source: &str) -> Value {
        let mut settings = Map::new();
        settings.insert(
            "optimizer".to_string(),
            json!({
                "enabled": self.settings.optimizer_enabled,
                "runs": self.settings.optimizer_runs,
            }),
        );
        if let Some(evm) = &self.settings.evm_version {
            settings.insert("evmVersion".to_string(), json!(evm));
        }
        settings.insert(
            "outputSelection".to_string(),
            json!({
                "*": {
                    "*": ["abi", "evm.bytecode.object", "evm.deployedBytecode.object"]
                }
            }),
        );

        json!({
            "language": "Solidity",
            "sources": {
                source_file(contract_name): { "content": source }
            },
            "settings": Value::Object(settings),
        })
    }

    async fn run(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<Vec<u8>, CollaboratorError> {
        let mut child = Command::new(&self.settings.solc_path)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CollaboratorError::Compiler(format!(
                    "failed to spawn {}: {e}",
                    self.settings.solc_path.display()
                ))
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input)
                .await
                .map_err(|e| CollaboratorError::Compiler(format!("failed to write input: {e}")))?;
            // Close stdin so solc sees EOF.
            drop(pipe);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CollaboratorError::Compiler(format!("solc did not finish: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, "solc exited with failure");
            return Err(CollaboratorError::Compiler(format!(
                "solc exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl SolidityCompiler for SolcCompiler {
    async fn compile_input(
        &self,
        contract_name: &str,
        source: &str,
    ) -> Result<Value, CollaboratorError> {
        Ok(self.standard_json_input(contract_name, source))
    }

    #[instrument(skip(self, source), fields(solc = %self.settings.solc_path.display()))]
    async fn compile(
        &self,
        contract_name: &str,
        source: &str,
    ) -> Result<CompiledContract, CollaboratorError> {
        let input = serde_json::to_vec(&self.standard_json_input(contract_name, source))
            .map_err(|e| CollaboratorError::Compiler(e.to_string()))?;

        let stdout = self.run(&["--standard-json"], Some(&input)).await?;
        let output: Value = serde_json::from_slice(&stdout)
            .map_err(|e| CollaboratorError::Compiler(format!("malformed solc output: {e}")))?;

        let compiled = parse_standard_json_output(&output, contract_name)?;
        debug!(
            init_code = compiled.bytecode.len(),
            runtime_code = compiled.deployed_bytecode.len(),
            "Compiled router"
        );
        Ok(compiled)
    }

    async fn version(&self) -> Result<String, CollaboratorError> {
        let stdout = self.run(&["--version"], None).await?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }
}

/// `<Name>.sol`
fn source_file(contract_name: &str) -> String {
    format!("{contract_name}.sol")
}

/// Extracts the init and runtime code of `contract_name` from solc's
/// standard-JSON output.
///
/// Any diagnostic with severity `error` fails the compilation; warnings
/// are ignored.
pub fn parse_standard_json_output(
    output: &Value,
    contract_name: &str,
) -> Result<CompiledContract, CollaboratorError> {
    let errors: Vec<String> = output
        .get("errors")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|e| e.get("severity").and_then(Value::as_str) == Some("error"))
        .map(|e| {
            e.get("formattedMessage")
                .or_else(|| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .trim()
                .to_string()
        })
        .collect();

    if !errors.is_empty() {
        return Err(CollaboratorError::Compiler(errors.join("\n")));
    }

    let contract = output
        .pointer(&format!("/contracts/{}/{contract_name}", source_file(contract_name)))
        .ok_or_else(|| {
            CollaboratorError::Compiler(format!("no output for contract {contract_name}"))
        })?;

    Ok(CompiledContract {
        bytecode: bytecode_at(contract, "/evm/bytecode/object")?,
        deployed_bytecode: bytecode_at(contract, "/evm/deployedBytecode/object")?,
    })
}

fn bytecode_at(contract: &Value, pointer: &str) -> Result<Bytes, CollaboratorError> {
    let object = contract
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| CollaboratorError::Compiler(format!("missing {pointer} in solc output")))?;
    object
        .parse()
        .map_err(|e| CollaboratorError::Compiler(format!("invalid {pointer}: {e}")))
}

// =============================================================================
// TESTS
// =============================================================================
