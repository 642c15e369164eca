// components/provision_engine/src/config.rs
//! Configuration resolution
//!
//! Turns the positional arguments and a handful of environment variables
//! into an immutable [`ProvisioningConfig`]. Nothing here touches the
//! filesystem; write access is checked by the preflight step.

use crate::error::{ProvisionError, Result};
use crate::recipe::Layout;
use provision_primitives::{Identity, ProjectName};
use std::collections::HashMap;
use std::path::PathBuf;

/// Environment variable consulted when no project argument is given
pub const PROJECT_ENV: &str = "PROJECT";

/// Environment variable that overrides the staging base directory
pub const STAGING_ENV: &str = "TMPDIR";

pub const DEFAULT_STAGING_BASE: &str = "/tmp";

/// Read-only view of environment variables
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Resolved once at startup, never mutated afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningConfig {
    pub identity: Identity,
    pub project: ProjectName,
    /// `<apps_base>/<project>/<identity>`; holds the install root and
    /// persistent third-party dependencies
    pub prefix: PathBuf,
    pub install_root: PathBuf,
    /// Scratch tree for sources and the build directory
    pub staging_root: PathBuf,
}

impl ProvisioningConfig {
    /// Resolve from positional arguments with environment fallbacks
    ///
    /// An explicit `project` always wins over `$PROJECT`. Empty strings
    /// count as absent.
    pub fn resolve(
        identity: Option<String>,
        project: Option<String>,
        env: &impl EnvSource,
        layout: &Layout,
    ) -> Result<Self> {
        let identity = identity
            .filter(|s| !s.is_empty())
            .ok_or(ProvisionError::MissingIdentity)?;
        let identity = Identity::new(identity)?;

        let project = project
            .filter(|s| !s.is_empty())
            .or_else(|| env.var(PROJECT_ENV).filter(|s| !s.is_empty()))
            .ok_or_else(|| ProvisionError::MissingProject {
                identity: identity.to_string(),
                env_var: PROJECT_ENV.to_string(),
            })?;
        let project = ProjectName::new(project)?;

        let staging_base = env
            .var(STAGING_ENV)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_BASE));

        let prefix = layout
            .apps_base
            .join(project.as_str())
            .join(identity.as_str());
        let install_root = prefix.join(&layout.install_dir);
        let staging_root = staging_base
            .join(identity.as_str())
            .join(&layout.staging_dir);

        Ok(Self {
            identity,
            project,
            prefix,
            install_root,
            staging_root,
        })
    }
}
