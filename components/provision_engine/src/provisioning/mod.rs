// components/provision_engine/src/provisioning/mod.rs
//! Provisioning pipeline for a recipe-described application
//!
//! Each stage is a Step that transforms its input into the next stage's
//! type, so the stages cannot be skipped or reordered. The first failing
//! stage ends the run; nothing after it is attempted.

use crate::actions::{execute_step, ExecutionMode};
use crate::config::ProvisioningConfig;
use crate::error::Result;
use crate::recipe::Recipe;
use crate::report::SharedReporter;
use crate::runner::CommandRunner;
use std::sync::Arc;

pub mod types;

mod stage0_preflight;
mod stage1_fetch;
mod stage2_toolchain;
mod stage3_configure;
mod stage4_compile;
mod stage5_install;
mod stage6_verify;

pub use stage0_preflight::PreflightAction;
pub use stage1_fetch::FetchArtifactsAction;
pub use stage2_toolchain::{activation_script, parse_environment, LoadToolchainAction};
pub use stage3_configure::{placeholder_values, ConfigureBuildAction};
pub use stage4_compile::CompileAction;
pub use stage5_install::InstallAction;
pub use stage6_verify::{verify_installation, VerifyAction};

pub use types::{PreparedLayout, StagedSources, ToolchainEnv, VerifiedInstallation};

/// What every step needs besides its input
#[derive(Clone)]
pub struct StepContext {
    pub runner: Arc<dyn CommandRunner>,
    pub reporter: SharedReporter,
    pub recipe: Arc<Recipe>,
}

/// Run every stage in order
pub async fn provision(
    config: ProvisioningConfig,
    ctx: &StepContext,
    mode: ExecutionMode,
) -> Result<VerifiedInstallation> {
    let mode_str = match mode {
        ExecutionMode::DryRun => "DRY RUN",
        ExecutionMode::Apply => "APPLY",
    };
    let reporter = &*ctx.reporter;

    tracing::info!(
        identity = %config.identity,
        project = %config.project,
        "starting provisioning [{}]",
        mode_str
    );

    tracing::info!("stage 0: preflight");
    let layout = execute_step(&PreflightAction { ctx: ctx.clone() }, config, mode, reporter).await?;

    tracing::info!("stage 1: fetch");
    let sources =
        execute_step(&FetchArtifactsAction { ctx: ctx.clone() }, layout, mode, reporter).await?;

    tracing::info!("stage 2: toolchain");
    let toolchain =
        execute_step(&LoadToolchainAction { ctx: ctx.clone() }, sources, mode, reporter).await?;

    tracing::info!("stage 3: configure");
    let configured =
        execute_step(&ConfigureBuildAction { ctx: ctx.clone() }, toolchain, mode, reporter).await?;

    tracing::info!("stage 4: compile");
    let compiled = execute_step(&CompileAction { ctx: ctx.clone() }, configured, mode, reporter).await?;

    tracing::info!("stage 5: install");
    let installed = execute_step(&InstallAction { ctx: ctx.clone() }, compiled, mode, reporter).await?;

    tracing::info!("stage 6: verify");
    let verified = execute_step(&VerifyAction { ctx: ctx.clone() }, installed, mode, reporter).await?;

    tracing::info!(
        executable = %verified.executable.display(),
        fetched = verified.installed.toolchain().sources.fetched_count(),
        "provisioning pipeline complete"
    );
    Ok(verified)
}
