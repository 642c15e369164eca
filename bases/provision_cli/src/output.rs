// bases/provision_cli/src/output.rs
use colored::Colorize;
use provision_engine::{NoticeLevel, ProvisionError, ProvisioningConfig, Reporter};
use std::error::Error;
use std::path::Path;

/// Prints engine notices as tagged, colored lines
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn notice(&self, level: NoticeLevel, message: &str) {
        let tag = match level {
            NoticeLevel::Info => level.tag().blue(),
            NoticeLevel::Success => level.tag().green(),
            NoticeLevel::Warning => level.tag().yellow(),
        };
        match level {
            NoticeLevel::Warning => eprintln!("{} {}", tag, message),
            _ => println!("{} {}", tag, message),
        }
    }
}

/// `<category>: <error>: <cause>: ...` on one line
pub fn error_line(error: &ProvisionError) -> String {
    let mut line = format!("{}: {}", error.category(), error);
    let mut source = error.source();
    while let Some(cause) = source {
        line.push_str(": ");
        line.push_str(&cause.to_string());
        source = cause.source();
    }
    line
}

pub struct OutputHandler {
    verbose: bool,
}

impl OutputHandler {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn print_start(&self, config: &ProvisioningConfig, dry_run: bool) {
        let mode = if dry_run { " (check only)" } else { "" };
        println!(
            "{} Provisioning for {} in project {}{}",
            NoticeLevel::Info.tag().blue(),
            config.identity,
            config.project,
            mode
        );
        if self.verbose {
            println!("  prefix:       {}", config.prefix.display());
            println!("  install root: {}", config.install_root.display());
            println!("  staging root: {}", config.staging_root.display());
        }
    }

    pub fn print_summary(&self, summary: &str) {
        println!();
        print!("{}", summary);
    }

    pub fn print_job_script(&self, path: &Path) {
        println!(
            "{} Job script written to {}",
            NoticeLevel::Success.tag().green(),
            path.display()
        );
    }

    pub fn print_error(&self, error: &ProvisionError) {
        eprintln!("{} {}", "[ERROR]".red().bold(), error_line(error));
        if let Some(hint) = error.hint() {
            eprintln!("        {}", hint.dimmed());
        }
    }
}
