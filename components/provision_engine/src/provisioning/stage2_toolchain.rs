// components/provision_engine/src/provisioning/stage2_toolchain.rs
//! Stage 2: load the pinned toolchain and capture the resulting environment
//!
//! `module` is a shell function, so activation happens inside one login
//! shell. The shell purges whatever is loaded, loads each component in order
//! and prints its environment, which then replaces the environment of every
//! later external command. Each `module` call exits with its own code so a
//! failure names the component that could not be loaded.

use crate::actions::{Step, StepId};
use crate::error::{ProvisionError, Result};
use crate::provisioning::types::{LoadedToolchain, StagedSources, ToolchainEnv};
use crate::provisioning::StepContext;
use crate::report::send_log;
use crate::runner::ExternalCommand;
use provision_primitives::ToolchainComponent;
use std::collections::BTreeMap;

const PURGE_FAILED: i32 = 90;
const FIRST_COMPONENT_CODE: i32 = 100;
const ENV_SENTINEL: &str = "__PROVISION_ENVIRONMENT__";

pub struct LoadToolchainAction {
    pub ctx: StepContext,
}

/// Shell script doing clear-then-load and dumping the environment
pub fn activation_script(modules: &[ToolchainComponent]) -> String {
    let mut script = format!("module purge || exit {}\n", PURGE_FAILED);
    for (index, component) in modules.iter().enumerate() {
        script.push_str(&format!(
            "module load {} || exit {}\n",
            component,
            FIRST_COMPONENT_CODE + index as i32
        ));
    }
    // Login scripts may print to stdout; everything before the sentinel is noise
    script.push_str(&format!("printf '%s\\0' {}\nenv -0\n", ENV_SENTINEL));
    script
}

/// Parse `env -0` output that follows the sentinel
pub fn parse_environment(stdout: &[u8]) -> BTreeMap<String, String> {
    let text = String::from_utf8_lossy(stdout);
    let mut entries = text.split('\0');
    let mut vars = BTreeMap::new();

    if !entries.any(|entry| entry.ends_with(ENV_SENTINEL)) {
        return vars;
    }
    for entry in entries {
        if let Some((key, value)) = entry.split_once('=') {
            if !key.is_empty() {
                vars.insert(key.to_string(), value.to_string());
            }
        }
    }
    vars
}

impl LoadToolchainAction {
    fn command(&self) -> ExternalCommand {
        ExternalCommand::new("bash")
            .arg("-lc")
            .arg(activation_script(&self.ctx.recipe.toolchain.modules))
    }

    fn failure(&self, code: Option<i32>) -> Option<ProvisionError> {
        let modules = &self.ctx.recipe.toolchain.modules;
        let index = code? - FIRST_COMPONENT_CODE;
        let index = usize::try_from(index).ok()?;
        modules
            .get(index)
            .map(|component| ProvisionError::ComponentLoad {
                component: component.clone(),
            })
    }
}

impl Step<StagedSources, LoadedToolchain> for LoadToolchainAction {
    fn id(&self) -> StepId {
        StepId::new("load-toolchain")
    }

    fn description(&self) -> String {
        "Loading toolchain modules".to_string()
    }

    async fn check(&self, _input: &StagedSources) -> Result<bool> {
        Ok(true)
    }

    async fn apply(&self, input: StagedSources) -> Result<LoadedToolchain> {
        let modules = self.ctx.recipe.toolchain.modules.clone();
        for component in &modules {
            send_log!(self.ctx.reporter, Info, "module load {}", component);
        }

        let step = self.id();
        let command = self.command();
        let output = self.ctx.runner.capture(&step, &command).await?;

        if !output.status.success() {
            if let Some(error) = self.failure(output.status.code()) {
                return Err(error);
            }
            return Err(ProvisionError::ToolFailed {
                step,
                command: if output.status.code() == Some(PURGE_FAILED) {
                    "module purge".to_string()
                } else {
                    command.to_string()
                },
                status: output.status,
            });
        }

        let vars = parse_environment(&output.stdout);
        if vars.is_empty() {
            return Err(ProvisionError::io(
                "capturing the toolchain environment",
                std::io::Error::new(std::io::ErrorKind::InvalidData, "shell printed no environment"),
            ));
        }
        tracing::debug!(count = vars.len(), "captured toolchain environment");
        send_log!(self.ctx.reporter, Success, "Loaded {} toolchain modules", modules.len());

        Ok(LoadedToolchain {
            sources: input,
            modules,
            environment: ToolchainEnv::Captured(vars),
        })
    }

    async fn preview(&self, input: StagedSources) -> Result<LoadedToolchain> {
        send_log!(self.ctx.reporter, Info, "Would run: {}", self.command());
        Ok(LoadedToolchain {
            sources: input,
            modules: self.ctx.recipe.toolchain.modules.clone(),
            environment: ToolchainEnv::Inherited,
        })
    }
}
