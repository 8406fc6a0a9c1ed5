//! QC-Router: Contract Router step CLI.
//!
//! Runs a router step against a JSON context without a full pipeline.
//!
//! ## Usage
//!
//! ```bash
//! # Desired-state snapshot and its fingerprint
//! qc-router state --context ctx.json --config step.json --base-dir .
//!
//! # Merged router ABI
//! qc-router abi --context ctx.json --config step.json
//!
//! # Router source
//! qc-router generate --context ctx.json --config step.json --label router.CoreRouter
//!
//! # Compile and deploy onto an in-memory chain
//! qc-router deploy --simulate --context ctx.json --config step.json --label router.CoreRouter
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Quantum-Chain Contract Router
#[derive(Parser, Debug)]
#[command(name = "qc-router")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

/// Step inputs shared by every command.
#[derive(ClapArgs, Debug, Clone)]
pub struct StepInput {
    /// JSON file holding the step context (`contracts`, `imports`, settings)
    #[arg(long)]
    pub context: PathBuf,

    /// JSON file holding the router step config
    #[arg(long)]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the desired-state snapshot and its fingerprint
    State {
        #[command(flatten)]
        input: StepInput,

        /// Package base directory (omit to disable consistency checks)
        #[arg(long)]
        base_dir: Option<PathBuf>,
    },

    /// Print the merged router ABI
    Abi {
        #[command(flatten)]
        input: StepInput,
    },

    /// Print the build-graph edges of the step
    Edges {
        /// Router step config file
        #[arg(long)]
        config: PathBuf,

        /// Step label, e.g. router.CoreRouter
        #[arg(long)]
        label: String,
    },

    /// Print the generated router source
    Generate {
        #[command(flatten)]
        input: StepInput,

        /// Step label, e.g. router.CoreRouter
        #[arg(long)]
        label: String,
    },

    /// Compile and deploy the router
    Deploy {
        #[command(flatten)]
        input: StepInput,

        /// Step label, e.g. router.CoreRouter
        #[arg(long)]
        label: String,

        /// Deploy onto an in-memory chain
        #[arg(long)]
        simulate: bool,

        /// solc binary (overrides QC_ROUTER_SOLC)
        #[arg(long)]
        solc: Option<PathBuf>,

        /// Directory the reported artifacts are written to
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_tracing(json_logs: bool, log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .context("invalid log filter")?;

    // Logs go to stderr so command output stays pipeable.
    if json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .context("failed to install tracing subscriber")?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .context("failed to install tracing subscriber")?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs, &args.log_level)?;

    let output = match args.command {
        Command::State { input, base_dir } => commands::state(&input, base_dir).await?,
        Command::Abi { input } => commands::abi(&input).await?,
        Command::Edges { config, label } => commands::edges(&config, &label).await?,
        Command::Generate { input, label } => commands::generate(&input, &label).await?,
        Command::Deploy {
            input,
            label,
            simulate,
            solc,
            out,
        } => {
            let options = commands::DeployOptions {
                simulate,
                solc,
                out,
            };
            commands::deploy(&input, &label, options).await?
        }
    };

    println!("{output}");
    Ok(())
}
