//! # Service Configuration
//!
//! Runtime parameters of the router step. Every field has a sane default;
//! `from_env` applies overrides from `QC_ROUTER_*` environment variables.

use crate::domain::services::ROUTER_LABEL_PREFIX;
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable naming the solc binary.
pub const ENV_SOLC: &str = "QC_ROUTER_SOLC";
/// Environment variable overriding optimizer runs (`0` disables the optimizer).
pub const ENV_OPTIMIZER_RUNS: &str = "QC_ROUTER_OPTIMIZER_RUNS";
/// Environment variable overriding the target EVM version.
pub const ENV_EVM_VERSION: &str = "QC_ROUTER_EVM_VERSION";

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment override could not be parsed.
    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Compiler settings used for router builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerSettings {
    /// Path or name of the solc binary.
    pub solc_path: PathBuf,
    /// Whether the optimizer runs.
    pub optimizer_enabled: bool,
    /// Optimizer runs parameter.
    pub optimizer_runs: u32,
    /// Target EVM version (`None` uses the compiler default).
    pub evm_version: Option<String>,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            solc_path: PathBuf::from("solc"),
            optimizer_enabled: true,
            optimizer_runs: 200,
            evm_version: None,
        }
    }
}

/// Router step service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Label prefix stripped to obtain the router name.
    pub label_prefix: String,
    /// Compiler settings.
    pub compiler: CompilerSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            label_prefix: ROUTER_LABEL_PREFIX.to_string(),
            compiler: CompilerSettings::default(),
        }
    }
}

impl ServiceConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults with overrides taken from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(solc) = lookup(ENV_SOLC).filter(|v| !v.is_empty()) {
            config.compiler.solc_path = PathBuf::from(solc);
        }

        if let Some(runs) = lookup(ENV_OPTIMIZER_RUNS) {
            let runs: u32 = runs.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_OPTIMIZER_RUNS,
                value: runs.clone(),
            })?;
            config.compiler.optimizer_enabled = runs > 0;
            config.compiler.optimizer_runs = runs;
        }

        if let Some(evm) = lookup(ENV_EVM_VERSION).filter(|v| !v.is_empty()) {
            config.compiler.evm_version = Some(evm);
        }

        Ok(config)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.label_prefix, "router.");
        assert_eq!(config.compiler.solc_path, PathBuf::from("solc"));
        assert!(config.compiler.optimizer_enabled);
        assert_eq!(config.compiler.optimizer_runs, 200);
    }

    #[test]
    fn test_env_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            (ENV_SOLC, "/opt/solc-0.8.24"),
            (ENV_OPTIMIZER_RUNS, "0"),
            (ENV_EVM_VERSION, "paris"),
        ]))
        .unwrap();
        assert_eq!(config.compiler.solc_path, PathBuf::from("/opt/solc-0.8.24"));
        assert!(!config.compiler.optimizer_enabled);
        assert_eq!(config.compiler.evm_version.as_deref(), Some("paris"));
    }

    #[test]
    fn test_invalid_env_override() {
        let err = ServiceConfig::from_lookup(lookup(&[(ENV_OPTIMIZER_RUNS, "lots")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                var: ENV_OPTIMIZER_RUNS,
                value: "lots".to_string()
            }
        );
    }
}
