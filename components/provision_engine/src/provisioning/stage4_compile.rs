// components/provision_engine/src/provisioning/stage4_compile.rs
//! Stage 4: parallel compile

use crate::actions::{Step, StepId};
use crate::error::Result;
use crate::provisioning::types::{CompiledBuild, ConfiguredBuild};
use crate::provisioning::StepContext;
use crate::report::send_log;
use crate::runner::{run_checked, ExternalCommand};

pub struct CompileAction {
    pub ctx: StepContext,
}

impl CompileAction {
    pub fn command(&self, configured: &ConfiguredBuild) -> ExternalCommand {
        ExternalCommand::new("make")
            .arg("-j")
            .arg(self.ctx.recipe.build.jobs.to_string())
            .current_dir(&configured.build_dir)
            .environment(configured.toolchain.environment.vars())
    }
}

impl Step<ConfiguredBuild, CompiledBuild> for CompileAction {
    fn id(&self) -> StepId {
        StepId::new("compile")
    }

    fn description(&self) -> String {
        format!("Compiling with {} jobs", self.ctx.recipe.build.jobs)
    }

    async fn check(&self, _input: &ConfiguredBuild) -> Result<bool> {
        Ok(true)
    }

    async fn apply(&self, input: ConfiguredBuild) -> Result<CompiledBuild> {
        run_checked(self.ctx.runner.as_ref(), &self.id(), &self.command(&input)).await?;
        send_log!(self.ctx.reporter, Success, "Compilation finished");
        Ok(CompiledBuild { configured: input })
    }

    async fn preview(&self, input: ConfiguredBuild) -> Result<CompiledBuild> {
        send_log!(self.ctx.reporter, Info, "Would run: {}", self.command(&input));
        Ok(CompiledBuild { configured: input })
    }
}
