// components/provision_engine/src/provisioning/stage0_preflight.rs
//! Stage 0: make sure both roots are writable and host tools exist
//!
//! Nothing downstream is attempted until the install root and the staging
//! root can be created and written to.

use crate::actions::{Step, StepId};
use crate::artifact::Artifact;
use crate::config::ProvisioningConfig;
use crate::error::{ProvisionError, Result};
use crate::provisioning::types::PreparedLayout;
use crate::provisioning::StepContext;
use crate::recipe::{ArchiveFormat, Source};
use crate::report::send_log;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;

pub struct PreflightAction {
    pub ctx: StepContext,
}

impl PreflightAction {
    fn layout(&self, config: ProvisioningConfig) -> PreparedLayout {
        let artifacts = self
            .ctx
            .recipe
            .artifacts
            .iter()
            .map(|spec| Artifact::resolve(spec, &config))
            .collect();
        PreparedLayout { config, artifacts }
    }

    /// Programs that must exist before the toolchain is loaded
    fn host_tools(&self) -> BTreeSet<&'static str> {
        let mut tools = BTreeSet::from(["bash"]);
        for artifact in &self.ctx.recipe.artifacts {
            match &artifact.source {
                Source::Git { .. } => {
                    tools.insert("git");
                }
                Source::Archive { format, .. } => {
                    tools.insert("wget");
                    tools.insert(match format {
                        ArchiveFormat::Zip => "unzip",
                        ArchiveFormat::TarGz => "tar",
                    });
                }
            }
        }
        tools
    }
}

/// Create `dir` and prove we can write into it
async fn ensure_writable(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => ProvisionError::permission(dir, e),
        _ => ProvisionError::io(format!("creating {}", dir.display()), e),
    })?;

    // The scratch file is unlinked as soon as it is dropped
    tempfile::tempfile_in(dir)
        .map(drop)
        .map_err(|e| ProvisionError::permission(dir, e))
}

impl Step<ProvisioningConfig, PreparedLayout> for PreflightAction {
    fn id(&self) -> StepId {
        StepId::new("preflight")
    }

    fn description(&self) -> String {
        "Checking install and staging directories".to_string()
    }

    async fn check(&self, _input: &ProvisioningConfig) -> Result<bool> {
        Ok(true)
    }

    async fn apply(&self, input: ProvisioningConfig) -> Result<PreparedLayout> {
        for tool in self.host_tools() {
            self.ctx.runner.locate(tool).await?;
        }

        ensure_writable(&input.install_root).await?;
        ensure_writable(&input.staging_root).await?;
        send_log!(
            self.ctx.reporter,
            Info,
            "Install root: {}",
            input.install_root.display()
        );
        send_log!(
            self.ctx.reporter,
            Info,
            "Staging root: {}",
            input.staging_root.display()
        );

        Ok(self.layout(input))
    }

    async fn preview(&self, input: ProvisioningConfig) -> Result<PreparedLayout> {
        let layout = self.layout(input);
        send_log!(self.ctx.reporter, Info, "Would use {}", layout);
        Ok(layout)
    }
}
