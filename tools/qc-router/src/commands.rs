//! Command implementations. Each returns the text printed to stdout.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use qc_18_contract_router::prelude::*;
use serde_json::json;
use tracing::info;

use crate::StepInput;

type Service = RouterStepService<SolidityRouterGenerator, SolcCompiler>;

/// Options of the `deploy` command.
#[derive(Debug, Default)]
pub struct DeployOptions {
    pub simulate: bool,
    pub solc: Option<PathBuf>,
    pub out: Option<PathBuf>,
}

/// Reads and parses the step context file.
pub async fn load_context(path: &Path) -> Result<StepContext> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read context {}", path.display()))?;
    let values = serde_json::from_str(&raw)
        .with_context(|| format!("context {} is not valid JSON", path.display()))?;
    Ok(context_from_json(values)?)
}

/// Reads and parses the step config file.
pub async fn load_config(path: &Path) -> Result<RouterStepConfig> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid router config {}", path.display()))
}

fn service(solc: Option<PathBuf>) -> Result<Service> {
    let mut config = ServiceConfig::from_env().context("invalid environment configuration")?;
    if let Some(solc) = solc {
        config.compiler.solc_path = solc;
    }
    Ok(RouterStepService::new(
        SolidityRouterGenerator::new(),
        SolcCompiler::new(config.compiler.clone()),
        config,
    ))
}

async fn load_rendered(service: &Service, input: &StepInput) -> Result<(StepContext, RouterStepConfig)> {
    let ctx = load_context(&input.context).await?;
    let config = load_config(&input.config).await?;
    service.validate(&config)?;
    let rendered = service.config_inject(&ctx, &config)?;
    Ok((ctx, rendered))
}

/// `state`: snapshot plus fingerprint, or `null` when checks are disabled.
pub async fn state(input: &StepInput, base_dir: Option<PathBuf>) -> Result<String> {
    let service = service(None)?;
    let ctx = load_context(&input.context).await?;
    let config = load_config(&input.config).await?;
    service.validate(&config)?;

    let runtime = base_dir.map(SimulatedChain::with_base_dir).unwrap_or_default();
    let output = match service.get_state(&runtime, &ctx, &config).await? {
        Some(snapshot) => {
            let fingerprint = snapshot.fingerprint()?;
            json!({
                "fingerprint": fingerprint,
                "snapshot": snapshot,
            })
        }
        None => serde_json::Value::Null,
    };
    Ok(serde_json::to_string_pretty(&output)?)
}

/// `abi`: merged router ABI.
pub async fn abi(input: &StepInput) -> Result<String> {
    let service = service(None)?;
    let (ctx, rendered) = load_rendered(&service, input).await?;
    let abi = service.merged_abi(&ctx, &rendered)?;
    Ok(serde_json::to_string_pretty(&abi)?)
}

/// `edges`: build-graph inputs and outputs.
pub async fn edges(config: &Path, label: &str) -> Result<String> {
    let service = service(None)?;
    let config = load_config(config).await?;
    let descriptor = service.describe(label, &config)?;
    Ok(serde_json::to_string_pretty(&descriptor)?)
}

/// `generate`: router source.
pub async fn generate(input: &StepInput, label: &str) -> Result<String> {
    let service = service(None)?;
    let (ctx, rendered) = load_rendered(&service, input).await?;
    let (_, source) = service.generate_source(&ctx, &rendered, &PackageState::new(label))?;
    Ok(source)
}

/// `deploy`: full pipeline on a simulated chain.
pub async fn deploy(input: &StepInput, label: &str, options: DeployOptions) -> Result<String> {
    if !options.simulate {
        bail!("only simulated deployments are supported; pass --simulate");
    }

    let service = service(options.solc)?;
    let (ctx, rendered) = load_rendered(&service, input).await?;
    let chain = SimulatedChain::new();

    let record = service
        .exec(&chain, &ctx, &rendered, &PackageState::new(label))
        .await
        .with_context(|| format!("router step {label} failed"))?;

    if let Some(out) = options.out {
        tokio::fs::create_dir_all(&out)
            .await
            .with_context(|| format!("failed to create {}", out.display()))?;
        for artifact in chain.artifacts().await.into_values() {
            let path = out.join(format!("{}.json", artifact.contract_name));
            tokio::fs::write(&path, serde_json::to_vec_pretty(&artifact)?)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote artifact");
        }
    }

    Ok(serde_json::to_string_pretty(&record)?)
}

// =============================================================================
// TESTS
// =============================================================================
