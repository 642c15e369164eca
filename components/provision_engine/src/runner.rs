// components/provision_engine/src/runner.rs
//! External program invocation
//!
//! The engine never inspects what a tool prints. Programs inherit the
//! terminal so their diagnostics reach the operator verbatim, and only the
//! exit status flows back into the pipeline.

use crate::actions::StepId;
use crate::error::{ProvisionError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// One program invocation, fully described before it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    /// When set, replaces the inherited environment entirely
    pub environment: Option<BTreeMap<String, String>>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            environment: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn environment(mut self, environment: Option<&BTreeMap<String, String>>) -> Self {
        self.environment = environment.cloned();
        self
    }

    /// The last positional argument, which for fetch tools is the destination
    pub fn last_arg(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg.replace('\'', r"'\''"))?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// How an external program ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStatus {
    code: Option<i32>,
}

impl ToolStatus {
    pub const SUCCESS: Self = Self { code: Some(0) };

    pub fn exited(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn signalled() -> Self {
        Self { code: None }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

impl From<std::process::ExitStatus> for ToolStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exited with code {}", code),
            None => write!(f, "was terminated by a signal"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub status: ToolStatus,
    pub stdout: Vec<u8>,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Fail unless `program` can be found on PATH
    async fn locate(&self, program: &str) -> Result<()>;

    /// Run with inherited stdio and report only the exit status
    async fn run(&self, step: &StepId, command: &ExternalCommand) -> Result<ToolStatus>;

    /// Run with stdout captured; stderr still goes to the terminal
    async fn capture(&self, step: &StepId, command: &ExternalCommand) -> Result<CapturedOutput>;
}

/// Run a command and turn a non-zero exit into a tool failure
pub async fn run_checked(
    runner: &dyn CommandRunner,
    step: &StepId,
    command: &ExternalCommand,
) -> Result<()> {
    tracing::debug!(%step, %command, "running");
    let status = runner.run(step, command).await?;
    if !status.success() {
        return Err(ProvisionError::ToolFailed {
            step: step.clone(),
            command: command.to_string(),
            status,
        });
    }
    Ok(())
}

/// Runs programs on the host with tokio
pub struct SystemRunner;

impl SystemRunner {
    fn prepare(command: &ExternalCommand) -> Command {
        let mut process = Command::new(&command.program);
        process.args(&command.args).kill_on_drop(true);
        if let Some(dir) = &command.current_dir {
            process.current_dir(dir);
        }
        if let Some(environment) = &command.environment {
            process.env_clear().envs(environment);
        }
        process
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn locate(&self, program: &str) -> Result<()> {
        which::which(program)
            .map(|_| ())
            .map_err(|_| ProvisionError::ToolMissing {
                program: program.to_string(),
            })
    }

    async fn run(&self, step: &StepId, command: &ExternalCommand) -> Result<ToolStatus> {
        let status = Self::prepare(command)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| ProvisionError::Launch {
                step: step.clone(),
                command: command.to_string(),
                source,
            })?;
        Ok(status.into())
    }

    async fn capture(&self, step: &StepId, command: &ExternalCommand) -> Result<CapturedOutput> {
        let output = Self::prepare(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()
            .await
            .map_err(|source| ProvisionError::Launch {
                step: step.clone(),
                command: command.to_string(),
                source,
            })?;
        Ok(CapturedOutput {
            status: output.status.into(),
            stdout: output.stdout,
        })
    }
}
