// components/provision_engine/src/provisioning/stage5_install.rs
//! Stage 5: install the build into the install root

use crate::actions::{Step, StepId};
use crate::error::Result;
use crate::provisioning::types::{CompiledBuild, InstalledTree};
use crate::provisioning::StepContext;
use crate::report::send_log;
use crate::runner::{run_checked, ExternalCommand};

pub struct InstallAction {
    pub ctx: StepContext,
}

impl InstallAction {
    pub fn command(&self, compiled: &CompiledBuild) -> ExternalCommand {
        ExternalCommand::new("make")
            .arg("install")
            .current_dir(&compiled.configured.build_dir)
            .environment(compiled.configured.toolchain.environment.vars())
    }
}

impl Step<CompiledBuild, InstalledTree> for InstallAction {
    fn id(&self) -> StepId {
        StepId::new("install")
    }

    fn description(&self) -> String {
        "Installing".to_string()
    }

    async fn check(&self, _input: &CompiledBuild) -> Result<bool> {
        Ok(true)
    }

    async fn apply(&self, input: CompiledBuild) -> Result<InstalledTree> {
        run_checked(self.ctx.runner.as_ref(), &self.id(), &self.command(&input)).await?;
        send_log!(
            self.ctx.reporter,
            Success,
            "Installed into {}",
            input.configured.toolchain.config().install_root.display()
        );
        Ok(InstalledTree { compiled: input })
    }

    async fn preview(&self, input: CompiledBuild) -> Result<InstalledTree> {
        send_log!(self.ctx.reporter, Info, "Would run: {}", self.command(&input));
        Ok(InstalledTree { compiled: input })
    }
}
