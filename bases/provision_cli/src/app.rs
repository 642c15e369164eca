// bases/provision_cli/src/app.rs
use crate::args::Args;
use crate::output::{ConsoleReporter, OutputHandler};
use provision_engine::{
    job_script, summary, ExecutionMode, ProcessEnv, ProvisionError, Provisioner, ProvisioningConfig,
    Recipe, Result,
};
use std::io::ErrorKind;
use std::sync::Arc;

pub struct App {
    args: Args,
    output: OutputHandler,
}

impl App {
    pub fn new(args: Args) -> Self {
        let output = OutputHandler::new(args.verbose);
        Self { args, output }
    }

    fn mode(&self) -> ExecutionMode {
        if self.args.check {
            ExecutionMode::DryRun
        } else {
            ExecutionMode::Apply
        }
    }

    pub async fn run(&self) -> Result<()> {
        let recipe = match &self.args.recipe {
            Some(path) => Recipe::load(path)?,
            None => Recipe::builtin()?,
        };
        let config = ProvisioningConfig::resolve(
            self.args.identity.clone(),
            self.args.project.clone(),
            &ProcessEnv,
            &recipe.layout,
        )?;

        let mode = self.mode();
        self.output.print_start(&config, mode == ExecutionMode::DryRun);

        let provisioner = Provisioner::new(recipe, Arc::new(ConsoleReporter));
        let verified = provisioner.run(config, mode).await?;

        if mode == ExecutionMode::DryRun {
            if let Some(path) = &self.args.job_script {
                tracing::info!(path = %path.display(), "check mode, job script not written");
            }
            return Ok(());
        }

        self.output
            .print_summary(&summary::render(&verified, provisioner.recipe()));

        if let Some(path) = &self.args.job_script {
            let script = job_script::render(&verified, provisioner.recipe());
            tokio::fs::write(path, script).await.map_err(|e| match e.kind() {
                ErrorKind::PermissionDenied => ProvisionError::permission(path, e),
                _ => ProvisionError::io(format!("writing {}", path.display()), e),
            })?;
            self.output.print_job_script(path);
        }
        Ok(())
    }

    pub fn print_error(&self, error: &ProvisionError) {
        self.output.print_error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use clap::Parser;
    use tempfile::TempDir;

    fn app(argv: &[&str]) -> App {
        let mut full = vec!["lammps-provision"];
        full.extend_from_slice(argv);
        App::new(Args::try_parse_from(full).unwrap())
    }

    #[tokio::test]
    async fn missing_identity_exits_with_configuration_code() {
        let result = app(&[]).run().await;

        assert_matches!(result, Err(ProvisionError::MissingIdentity));
        assert_eq!(result.unwrap_err().exit_code(), 1);
    }

    #[tokio::test]
    async fn unreadable_recipe_is_a_configuration_error() {
        let result = app(&["alice", "proj1", "--recipe", "/nonexistent/recipe.toml"])
            .run()
            .await;

        assert_matches!(result, Err(ProvisionError::RecipeRead { .. }));
    }

    #[tokio::test]
    async fn check_mode_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut recipe = Recipe::builtin().unwrap();
        recipe.layout.apps_base = dir.path().join("projappl");
        let recipe_path = dir.path().join("recipe.toml");
        std::fs::write(&recipe_path, toml::to_string(&recipe).unwrap()).unwrap();
        let job = dir.path().join("job.sh");

        app(&[
            "alice",
            "proj1",
            "--check",
            "--recipe",
            recipe_path.to_str().unwrap(),
            "--job-script",
            job.to_str().unwrap(),
        ])
        .run()
        .await
        .unwrap();

        assert!(!dir.path().join("projappl").exists());
        assert!(!job.exists());
    }
}
