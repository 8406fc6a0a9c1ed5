//! # Driving Ports (API - Inbound)
//!
//! The interface the deployment pipeline uses to drive a router step.

use crate::domain::entities::{
    DeploymentRecord, PackageState, RouterStepConfig, StateSnapshot, StepContext,
};
use crate::errors::RouterError;
use crate::ports::outbound::StepRuntime;
use async_trait::async_trait;

/// Primary API of a router step.
///
/// ## Usage
///
/// ```ignore
/// let snapshot = step.get_state(&runtime, &ctx, &config).await?;
/// let record = step.exec(&runtime, &ctx, &config, &package_state).await?;
/// ```
#[async_trait]
pub trait RouterStepApi: Send + Sync {
    /// Validates a raw step config.
    fn validate(&self, config: &RouterStepConfig) -> Result<(), RouterError>;

    /// Renders the templated fields of `config` against the context.
    fn config_inject(
        &self,
        ctx: &StepContext,
        config: &RouterStepConfig,
    ) -> Result<RouterStepConfig, RouterError>;

    /// Computes the desired-state snapshot.
    ///
    /// Returns `Ok(None)` when the runtime has consistency checks disabled.
    async fn get_state(
        &self,
        runtime: &dyn StepRuntime,
        ctx: &StepContext,
        config: &RouterStepConfig,
    ) -> Result<Option<StateSnapshot>, RouterError>;

    /// Generates, compiles, reports and deploys the router.
    async fn exec(
        &self,
        runtime: &dyn StepRuntime,
        ctx: &StepContext,
        config: &RouterStepConfig,
        package_state: &PackageState,
    ) -> Result<DeploymentRecord, RouterError>;
}
