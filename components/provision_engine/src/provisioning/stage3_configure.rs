// components/provision_engine/src/provisioning/stage3_configure.rs
//! Stage 3: generate the build system with the loaded toolchain

use crate::actions::{Step, StepId};
use crate::error::{ProvisionError, Result};
use crate::provisioning::types::{ConfiguredBuild, LoadedToolchain, PreparedLayout};
use crate::provisioning::StepContext;
use crate::recipe::expand;
use crate::report::send_log;
use crate::runner::{run_checked, ExternalCommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub struct ConfigureBuildAction {
    pub ctx: StepContext,
}

/// Values `{placeholder}`s in build options may refer to
pub fn placeholder_values(layout: &PreparedLayout) -> BTreeMap<String, String> {
    let config = &layout.config;
    let mut vars = BTreeMap::new();
    vars.insert("install_root".to_string(), config.install_root.display().to_string());
    vars.insert("staging_root".to_string(), config.staging_root.display().to_string());
    vars.insert("prefix".to_string(), config.prefix.display().to_string());
    for artifact in &layout.artifacts {
        vars.insert(
            format!("artifact:{}", artifact.name),
            artifact.expected_path.display().to_string(),
        );
    }
    vars
}

impl ConfigureBuildAction {
    fn source_root(&self, layout: &PreparedLayout) -> Result<PathBuf> {
        let build = &self.ctx.recipe.build;
        layout
            .artifact_path(&build.source)
            .map(|p| p.to_path_buf())
            .ok_or_else(|| {
                ProvisionError::Recipe(format!("build refers to unknown artifact '{}'", build.source))
            })
    }

    fn build_dir(&self, layout: &PreparedLayout) -> Result<PathBuf> {
        Ok(self.source_root(layout)?.join(&self.ctx.recipe.build.build_subdir))
    }

    /// The full configure invocation for `toolchain`
    pub fn command(&self, toolchain: &LoadedToolchain) -> Result<ExternalCommand> {
        let build = &self.ctx.recipe.build;
        let layout = &toolchain.sources.layout;
        let source_root = self.source_root(layout)?;
        let vars = placeholder_values(layout);

        let mut command = ExternalCommand::new("cmake")
            .arg("-S")
            .path_arg(&source_root.join(&build.source_subdir))
            .arg("-B")
            .path_arg(&self.build_dir(layout)?);

        for preset in &build.presets {
            command = command.arg("-C").path_arg(&source_root.join(preset));
        }
        for (key, template) in &build.options {
            command = command.arg(format!("-D{}={}", key, expand(template, &vars)?));
        }
        if let Some(workaround) = &build.workaround {
            command = command.arg(format!("-D{}={}", workaround.variable, workaround.value));
        }

        Ok(command.environment(toolchain.environment.vars()))
    }
}

impl Step<LoadedToolchain, ConfiguredBuild> for ConfigureBuildAction {
    fn id(&self) -> StepId {
        StepId::new("configure")
    }

    fn description(&self) -> String {
        "Configuring build".to_string()
    }

    async fn check(&self, _input: &LoadedToolchain) -> Result<bool> {
        Ok(true)
    }

    async fn apply(&self, input: LoadedToolchain) -> Result<ConfiguredBuild> {
        let command = self.command(&input)?;
        if let Some(workaround) = &self.ctx.recipe.build.workaround {
            send_log!(
                self.ctx.reporter,
                Warning,
                "forcing {}={}: {}",
                workaround.variable,
                workaround.value,
                workaround.reason
            );
        }

        run_checked(self.ctx.runner.as_ref(), &self.id(), &command).await?;

        let build_dir = self.build_dir(&input.sources.layout)?;
        send_log!(self.ctx.reporter, Success, "Configured in {}", build_dir.display());
        Ok(ConfiguredBuild {
            toolchain: input,
            build_dir,
        })
    }

    async fn preview(&self, input: LoadedToolchain) -> Result<ConfiguredBuild> {
        send_log!(self.ctx.reporter, Info, "Would run: {}", self.command(&input)?);
        let build_dir = self.build_dir(&input.sources.layout)?;
        Ok(ConfiguredBuild {
            toolchain: input,
            build_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioning::tests::{context, loaded_toolchain};
    use crate::report::NoticeLevel;
    use crate::runner::stub::RecordingRunner;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[tokio::test]
    async fn command_expands_placeholders_and_keeps_preset_order() {
        let dir = TempDir::new().unwrap();
        let toolchain = loaded_toolchain(dir.path());
        let config = toolchain.config().clone();
        let (ctx, _, _) = context(RecordingRunner::new());

        let command = ConfigureBuildAction { ctx }.command(&toolchain).unwrap();
        let args = command.args.join(" ");

        let lammps = config.staging_root.join("lammps");
        assert!(args.starts_with(&format!(
            "-S {} -B {}",
            lammps.join("cmake").display(),
            lammps.join("build").display()
        )));
        let basic = args.find("basic.cmake").unwrap();
        let kokkos = args.find("kokkos-cuda.cmake").unwrap();
        assert!(basic < kokkos);
        assert!(args.contains(&format!("-DCMAKE_INSTALL_PREFIX={}", config.install_root.display())));
        assert!(args.contains(&format!(
            "-DCMAKE_PREFIX_PATH={}",
            config.prefix.join("libtorch").display()
        )));
        assert!(args.contains("-DMKL_INCLUDE_DIR=/tmp"));
        assert!(args.contains("-DPKG_ML-MACE=ON"));
        assert!(!args.contains('{'));
    }

    #[tokio::test]
    async fn command_runs_with_captured_environment() {
        let dir = TempDir::new().unwrap();
        let toolchain = loaded_toolchain(dir.path());
        let (ctx, _, _) = context(RecordingRunner::new());

        let command = ConfigureBuildAction { ctx }.command(&toolchain).unwrap();

        assert_eq!(command.environment.as_ref(), toolchain.environment.vars());
        assert!(command.environment.is_some());
    }

    #[tokio::test]
    async fn workaround_is_announced_as_a_warning() {
        let dir = TempDir::new().unwrap();
        let (ctx, runner, reporter) = context(RecordingRunner::new());

        let configured = ConfigureBuildAction { ctx }
            .apply(loaded_toolchain(dir.path()))
            .await
            .unwrap();

        let warnings = reporter.messages(NoticeLevel::Warning);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("MKL_INCLUDE_DIR=/tmp"));
        assert_eq!(runner.invocations()[0].program, "cmake");
        assert!(configured.build_dir.ends_with("lammps/build"));
    }

    #[tokio::test]
    async fn failing_cmake_is_a_tool_failure() {
        let dir = TempDir::new().unwrap();
        let (ctx, _, _) = context(RecordingRunner::new().failing_when(1, |c| c.program == "cmake"));

        let result = ConfigureBuildAction { ctx }.apply(loaded_toolchain(dir.path())).await;

        assert_matches!(
            result,
            Err(ProvisionError::ToolFailed { ref step, .. }) if step.as_str() == "configure"
        );
    }
}
