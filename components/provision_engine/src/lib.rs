// components/provision_engine/src/lib.rs
//! Declarative, idempotent provisioning of an HPC application
//!
//! A [`Recipe`] says what to stage, patch, configure and build; a
//! [`ProvisioningConfig`] says for whom and where. [`Provisioner::run`] walks
//! the pipeline in [`provisioning`], delegating all real work to external
//! tools through a [`CommandRunner`].

pub mod actions;
pub mod artifact;
pub mod config;
pub mod error;
pub mod job_script;
pub mod provisioning;
pub mod recipe;
pub mod report;
pub mod runner;
pub mod summary;

use std::sync::Arc;

pub use actions::ExecutionMode;
pub use config::{EnvSource, ProcessEnv, ProvisioningConfig};
pub use error::{ErrorCategory, ProvisionError, Result};
pub use provisioning::{StepContext, VerifiedInstallation};
pub use recipe::Recipe;
pub use report::{NoticeLevel, Reporter, SharedReporter};
pub use runner::{CommandRunner, SystemRunner};

pub struct Provisioner {
    ctx: StepContext,
}

impl Provisioner {
    /// Provisioner that runs real programs on this host
    pub fn new(recipe: Recipe, reporter: SharedReporter) -> Self {
        Self::new_with_runner(recipe, Arc::new(SystemRunner), reporter)
    }

    pub fn new_with_runner(
        recipe: Recipe,
        runner: Arc<dyn CommandRunner>,
        reporter: SharedReporter,
    ) -> Self {
        Self {
            ctx: StepContext {
                runner,
                reporter,
                recipe: Arc::new(recipe),
            },
        }
    }

    pub fn recipe(&self) -> &Recipe {
        &self.ctx.recipe
    }

    pub async fn run(
        &self,
        config: ProvisioningConfig,
        mode: ExecutionMode,
    ) -> Result<VerifiedInstallation> {
        provisioning::provision(config, &self.ctx, mode).await
    }
}
