// components/provision_engine/src/job_script.rs
//! Slurm batch script for running the installed program
//!
//! Only renders text. Submitting is left to the operator.

use crate::provisioning::VerifiedInstallation;
use crate::recipe::Recipe;
use crate::summary::{environment_lines, run_command};

pub fn render(verified: &VerifiedInstallation, recipe: &Recipe) -> String {
    let job = &recipe.job;
    let gres = match &job.gpu_type {
        Some(kind) => format!("gpu:{}:{}", kind, job.gpus),
        None => format!("gpu:{}", job.gpus),
    };

    let mut lines = vec![
        "#!/bin/bash".to_string(),
        format!("#SBATCH --job-name={}", job.name),
        format!("#SBATCH --account={}", verified.config().project),
        format!("#SBATCH --partition={}", job.partition),
        format!("#SBATCH --time={}", job.time),
        format!("#SBATCH --nodes={}", job.nodes),
        format!("#SBATCH --ntasks-per-node={}", job.ntasks_per_node),
        format!("#SBATCH --cpus-per-task={}", job.cpus_per_task),
    ];
    if job.gpus > 0 {
        lines.push(format!("#SBATCH --gres={}", gres));
    }
    lines.push(String::new());
    lines.extend(environment_lines(verified, recipe));
    lines.push(String::new());
    lines.push(run_command(verified, recipe));

    let mut script = lines.join("\n");
    script.push('\n');
    script
}
