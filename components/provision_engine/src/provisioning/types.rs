// components/provision_engine/src/provisioning/types.rs
//! Provisioning pipeline stage types
//!
//! Each type is the output of one step and the input of the next. A stage
//! value can only be built by the step before it, so the compiler rejects a
//! pipeline that skips or reorders steps.

use crate::artifact::{Artifact, FetchOutcome};
use crate::config::ProvisioningConfig;
use provision_primitives::ToolchainComponent;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Stage 0: Preflight
// ============================================================================

/// Roots exist and are writable; artifacts resolved to concrete paths
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedLayout {
    pub config: ProvisioningConfig,
    pub artifacts: Vec<Artifact>,
}

impl PreparedLayout {
    pub fn artifact_path(&self, name: &str) -> Option<&Path> {
        self.artifacts
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.expected_path.as_path())
    }
}

impl fmt::Display for PreparedLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "install root {}, staging root {}",
            self.config.install_root.display(),
            self.config.staging_root.display()
        )
    }
}

// ============================================================================
// Stage 1: Fetch
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct StagedSources {
    pub layout: PreparedLayout,
    /// Outcome per artifact, then per patch, in recipe order
    pub outcomes: Vec<(String, FetchOutcome)>,
}

impl StagedSources {
    pub fn fetched_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == FetchOutcome::Fetched)
            .count()
    }
}

// ============================================================================
// Stage 2: Toolchain
// ============================================================================

/// Environment external tools run with after the toolchain is loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainEnv {
    /// Dry run: nothing was loaded, commands would inherit the process env
    Inherited,
    Captured(BTreeMap<String, String>),
}

impl ToolchainEnv {
    pub fn vars(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            ToolchainEnv::Inherited => None,
            ToolchainEnv::Captured(vars) => Some(vars),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedToolchain {
    pub sources: StagedSources,
    pub modules: Vec<ToolchainComponent>,
    pub environment: ToolchainEnv,
}

impl LoadedToolchain {
    pub fn config(&self) -> &ProvisioningConfig {
        &self.sources.layout.config
    }
}

// ============================================================================
// Stage 3..5: Configure, compile, install
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ConfiguredBuild {
    pub toolchain: LoadedToolchain,
    pub build_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledBuild {
    pub configured: ConfiguredBuild,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstalledTree {
    pub compiled: CompiledBuild,
}

impl InstalledTree {
    pub fn toolchain(&self) -> &LoadedToolchain {
        &self.compiled.configured.toolchain
    }
}

// ============================================================================
// Stage 6: Verified (final)
// ============================================================================

/// An installation whose executable was found on disk
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedInstallation {
    pub installed: InstalledTree,
    pub executable: PathBuf,
}

impl VerifiedInstallation {
    pub fn config(&self) -> &ProvisioningConfig {
        self.installed.toolchain().config()
    }

    pub fn modules(&self) -> &[ToolchainComponent] {
        &self.installed.toolchain().modules
    }

    pub fn layout(&self) -> &PreparedLayout {
        &self.installed.toolchain().sources.layout
    }

    pub fn build_dir(&self) -> &Path {
        &self.installed.compiled.configured.build_dir
    }
}

impl fmt::Display for VerifiedInstallation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} installed for {}", self.executable.display(), self.config().identity)
    }
}
