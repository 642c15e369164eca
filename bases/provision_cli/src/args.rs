// bases/provision_cli/src/args.rs
use clap::error::ErrorKind;
use clap::Parser;
use provision_engine::ErrorCategory;
use std::path::PathBuf;

/// Build and install LAMMPS with the MACE pair style for one user of a project
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// User the installation belongs to
    pub identity: Option<String>,

    /// Project directory to install under; falls back to $PROJECT
    pub project: Option<String>,

    /// Show what would be done without running or writing anything
    #[arg(long)]
    pub check: bool,

    /// Recipe to use instead of the built-in one
    #[arg(long, value_name = "FILE")]
    pub recipe: Option<PathBuf>,

    /// Write a Slurm batch script here after a successful install
    #[arg(long, value_name = "FILE")]
    pub job_script: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Tracing filter used when RUST_LOG is not set
    pub fn default_filter(&self) -> &'static str {
        if self.verbose {
            "provision_engine=debug,lammps_provision=debug"
        } else {
            "error"
        }
    }
}

/// Exit code for a rejected command line, or `None` when clap only printed
/// help or version text
///
/// clap's own usage code is 2, which here means a permission error.
pub fn usage_exit_code(error: &clap::Error) -> Option<i32> {
    match error.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => None,
        _ => Some(ErrorCategory::Configuration.exit_code()),
    }
}
