// components/provision_primitives/src/lib.rs
//! Validated identifiers shared by the provisioning engine and its CLI
//!
//! Every value that ends up inside a filesystem path or a `module load`
//! command goes through one of these newtypes, so an empty username or a
//! project name containing `/` is rejected before any directory is computed.
//!
//! # Examples
//!
//! ```
//! use provision_primitives::{Identity, ToolchainComponent};
//!
//! let user = Identity::new("alice").unwrap();
//! assert_eq!(user.as_str(), "alice");
//!
//! let gcc: ToolchainComponent = "gcc/11.3.0".parse().unwrap();
//! assert_eq!(gcc.name(), "gcc");
//! assert_eq!(gcc.version(), "11.3.0");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU16;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("{kind} '{value}' contains '{offending}', which is not allowed")]
    InvalidCharacter {
        kind: &'static str,
        value: String,
        offending: char,
    },

    #[error("{kind} '{value}' is a reserved path segment")]
    Reserved { kind: &'static str, value: String },

    #[error("toolchain component '{0}' must be written as name/version")]
    MalformedComponent(String),

    #[error("job count must be at least 1")]
    ZeroJobs,
}

/// Checks that `value` can be used verbatim as one directory name
fn validate_segment(kind: &'static str, value: &str) -> Result<(), PrimitiveError> {
    if value.is_empty() {
        return Err(PrimitiveError::Empty { kind });
    }
    if value == "." || value == ".." {
        return Err(PrimitiveError::Reserved {
            kind,
            value: value.to_string(),
        });
    }
    if let Some(offending) = value
        .chars()
        .find(|c| *c == '/' || *c == '\\' || c.is_whitespace() || c.is_control())
    {
        return Err(PrimitiveError::InvalidCharacter {
            kind,
            value: value.to_string(),
            offending,
        });
    }
    Ok(())
}

/// Module names and versions end up inside a shell script; only plain
/// tokens are allowed
fn validate_module_token(kind: &'static str, value: &str) -> Result<(), PrimitiveError> {
    validate_segment(kind, value)?;
    if let Some(offending) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-')))
    {
        return Err(PrimitiveError::InvalidCharacter {
            kind,
            value: value.to_string(),
            offending,
        });
    }
    Ok(())
}

/// The user a provisioning run is performed for
///
/// The inner value is PRIVATE; construction always validates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Result<Self, PrimitiveError> {
        let value = value.into();
        validate_segment("identity", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = PrimitiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Project (billing account / tenant) that owns the install prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectName(String);

impl ProjectName {
    pub fn new(value: impl Into<String>) -> Result<Self, PrimitiveError> {
        let value = value.into();
        validate_segment("project", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProjectName {
    type Error = PrimitiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProjectName> for String {
    fn from(project: ProjectName) -> Self {
        project.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A version-pinned module, written `name/version` (e.g. `cuda/11.7.0`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolchainComponent {
    name: String,
    version: String,
}

impl ToolchainComponent {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Result<Self, PrimitiveError> {
        let name = name.into();
        let version = version.into();
        validate_module_token("module name", &name)?;
        validate_module_token("module version", &version)?;
        Ok(Self { name, version })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl FromStr for ToolchainComponent {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => {
                Self::new(name, version)
            }
            _ => Err(PrimitiveError::MalformedComponent(s.to_string())),
        }
    }
}

impl TryFrom<String> for ToolchainComponent {
    type Error = PrimitiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ToolchainComponent> for String {
    fn from(component: ToolchainComponent) -> Self {
        component.to_string()
    }
}

impl fmt::Display for ToolchainComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// Worker count handed to the external build tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct JobCount(NonZeroU16);

impl JobCount {
    pub const DEFAULT: Self = match NonZeroU16::new(8) {
        Some(jobs) => Self(jobs),
        None => unreachable!(),
    };

    pub fn new(jobs: u16) -> Result<Self, PrimitiveError> {
        NonZeroU16::new(jobs)
            .map(Self)
            .ok_or(PrimitiveError::ZeroJobs)
    }

    pub fn get(&self) -> u16 {
        self.0.get()
    }
}

impl Default for JobCount {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u16> for JobCount {
    type Error = PrimitiveError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobCount> for u16 {
    fn from(jobs: JobCount) -> Self {
        jobs.get()
    }
}

impl fmt::Display for JobCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
