// components/provision_engine/src/error.rs
//! Provisioning error types
//!
//! Every failure is fatal to the current invocation. Errors carry enough
//! context to print one categorized line for the operator; the external
//! tool's own diagnostics have already been streamed to the terminal.

use crate::actions::StepId;
use crate::runner::ToolStatus;
use provision_primitives::{PrimitiveError, ToolchainComponent};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("no identity given: pass a username as the first argument")]
    MissingIdentity,

    #[error("no project given for '{identity}': pass it as the second argument or set ${env_var}")]
    MissingProject { identity: String, env_var: String },

    #[error("invalid parameter")]
    InvalidParameter(#[from] PrimitiveError),

    #[error("failed to read recipe {path}")]
    RecipeRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid recipe {path}")]
    RecipeParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("recipe problem: {0}")]
    Recipe(String),

    #[error("cannot write to {path}")]
    Permission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("required program '{program}' was not found on PATH")]
    ToolMissing { program: String },

    #[error("failed to launch '{command}' during {step}")]
    Launch {
        step: StepId,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' {status} during {step}")]
    ToolFailed {
        step: StepId,
        command: String,
        status: ToolStatus,
    },

    #[error("toolchain component {component} failed to load")]
    ComponentLoad { component: ToolchainComponent },

    #[error("io error during {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("installation reported success but {path} is {problem}")]
    Integrity { path: PathBuf, problem: String },
}

/// Coarse classification used for the `[ERROR]` line and the exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Permission,
    ExternalTool,
    Filesystem,
    Integrity,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "configuration error",
            ErrorCategory::Permission => "permission error",
            ErrorCategory::ExternalTool => "external tool failure",
            ErrorCategory::Filesystem => "filesystem error",
            ErrorCategory::Integrity => "integrity error",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCategory::Configuration => 1,
            ErrorCategory::Permission => 2,
            ErrorCategory::ExternalTool => 3,
            ErrorCategory::Integrity => 4,
            ErrorCategory::Filesystem => 5,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ProvisionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProvisionError::MissingIdentity
            | ProvisionError::MissingProject { .. }
            | ProvisionError::InvalidParameter(_)
            | ProvisionError::RecipeRead { .. }
            | ProvisionError::RecipeParse { .. }
            | ProvisionError::Recipe(_) => ErrorCategory::Configuration,
            ProvisionError::Permission { .. } => ErrorCategory::Permission,
            ProvisionError::ToolMissing { .. }
            | ProvisionError::Launch { .. }
            | ProvisionError::ToolFailed { .. }
            | ProvisionError::ComponentLoad { .. } => ErrorCategory::ExternalTool,
            ProvisionError::Io { source, .. }
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                ErrorCategory::Permission
            }
            ProvisionError::Io { .. } => ErrorCategory::Filesystem,
            ProvisionError::Integrity { .. } => ErrorCategory::Integrity,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    /// Short remediation text for categories where the operator can act directly
    pub fn hint(&self) -> Option<&'static str> {
        match self.category() {
            ErrorCategory::Configuration => {
                Some("usage: lammps-provision <identity> [project]")
            }
            ErrorCategory::Permission => {
                Some("check that the project directory exists and that you have write permission")
            }
            ErrorCategory::Integrity => {
                Some("the build reported success; inspect the build directory before re-running")
            }
            ErrorCategory::ExternalTool | ErrorCategory::Filesystem => None,
        }
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        ProvisionError::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn permission(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProvisionError::Permission {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
