// components/provision_engine/src/summary.rs
//! Post-install summary for the operator
//!
//! Everything here is derived from a verified installation and the recipe;
//! nothing is read from disk.

use crate::provisioning::VerifiedInstallation;
use crate::recipe::Recipe;
use std::path::PathBuf;

/// Directory holding the shared libraries the executable needs at run time
pub fn library_dir(verified: &VerifiedInstallation, recipe: &Recipe) -> PathBuf {
    let runtime = &recipe.runtime;
    verified
        .layout()
        .artifact_path(&runtime.library_artifact)
        .map(|p| p.join(&runtime.library_subdir))
        .unwrap_or_else(|| verified.config().prefix.join(&runtime.library_subdir))
}

/// Shell lines that recreate the runtime environment in a new session
pub fn environment_lines(verified: &VerifiedInstallation, recipe: &Recipe) -> Vec<String> {
    let mut lines = vec!["module purge".to_string()];
    lines.extend(
        verified
            .modules()
            .iter()
            .map(|component| format!("module load {}", component)),
    );
    lines.push(format!(
        "export LD_LIBRARY_PATH={}:$LD_LIBRARY_PATH",
        library_dir(verified, recipe).display()
    ));
    if let Some(bin_dir) = verified.executable.parent() {
        lines.push(format!("export PATH={}:$PATH", bin_dir.display()));
    }
    lines
}

/// `srun lmp -k on g 1 ... -in in.lammps`
pub fn run_command(verified: &VerifiedInstallation, recipe: &Recipe) -> String {
    let runtime = &recipe.runtime;
    let program = verified
        .executable
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| verified.executable.display().to_string());

    let mut parts = vec![runtime.launcher.clone(), program];
    parts.extend(runtime.accelerator_flags.iter().cloned());
    parts.push("-in".to_string());
    parts.push(runtime.input.clone());
    parts.join(" ")
}

pub fn render(verified: &VerifiedInstallation, recipe: &Recipe) -> String {
    let config = verified.config();
    let mut lines = vec![
        format!("Installation complete for {} ({})", config.identity, config.project),
        String::new(),
        format!("  Executable:    {}", verified.executable.display()),
        format!("  Install root:  {}", config.install_root.display()),
        format!("  Staging root:  {}", config.staging_root.display()),
        format!("  Build dir:     {}", verified.build_dir().display()),
        String::new(),
        "To use it in a new session:".to_string(),
    ];
    lines.extend(
        environment_lines(verified, recipe)
            .into_iter()
            .map(|line| format!("  {}", line)),
    );
    lines.push(String::new());
    lines.push("Run with:".to_string());
    lines.push(format!("  {}", run_command(verified, recipe)));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
