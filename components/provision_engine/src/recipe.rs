// components/provision_engine/src/recipe.rs
//! Declarative description of what gets provisioned
//!
//! A recipe lists the artifacts to stage, the plugin patches to apply, the
//! pinned toolchain, the build options and how the installed program is
//! launched. The built-in recipe builds LAMMPS with the MACE pair style
//! against libtorch; another recipe can be loaded from a TOML file.

use crate::error::{ProvisionError, Result};
use provision_primitives::{JobCount, ToolchainComponent};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

const BUILTIN: &str = include_str!("../recipes/lammps-mace.toml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    pub layout: Layout,
    #[serde(rename = "artifact")]
    pub artifacts: Vec<ArtifactSpec>,
    #[serde(default, rename = "patch", skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<PatchSpec>,
    pub toolchain: ToolchainSpec,
    pub build: BuildSpec,
    pub runtime: RuntimeSpec,
    pub job: JobSpec,
}

/// Where the install prefix and the staging tree live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Layout {
    pub apps_base: PathBuf,
    pub install_dir: String,
    pub staging_dir: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactSpec {
    pub name: String,
    pub root: ArtifactRoot,
    pub dir: String,
    pub source: Source,
}

/// Which resolved root an artifact is placed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactRoot {
    /// Persistent, next to the install root; needed at run time
    Prefix,
    /// Scratch; needed only while building
    Staging,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Source {
    Git {
        url: String,
        branch: String,
    },
    Archive {
        url: String,
        /// File name the download is saved under in the staging root
        file: String,
        format: ArchiveFormat,
        /// Directory the archive unpacks to
        top_dir: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

/// A script shipped by one artifact that modifies another in place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchSpec {
    pub name: String,
    pub plugin: String,
    pub script: String,
    pub target: String,
    /// Path relative to the target that exists once the patch is applied
    pub marker: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolchainSpec {
    pub modules: Vec<ToolchainComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSpec {
    /// Artifact holding the sources
    pub source: String,
    pub source_subdir: String,
    pub build_subdir: String,
    #[serde(default)]
    pub jobs: JobCount,
    /// Initial-cache files relative to the source artifact, applied in order
    #[serde(default)]
    pub presets: Vec<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    pub workaround: Option<CacheWorkaround>,
}

/// A cache variable forced to a value that is knowingly not "correct"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheWorkaround {
    pub variable: String,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSpec {
    /// Relative to the install root
    pub executable: String,
    pub library_artifact: String,
    pub library_subdir: String,
    pub launcher: String,
    pub accelerator_flags: Vec<String>,
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub name: String,
    pub partition: String,
    pub time: String,
    pub nodes: u16,
    pub ntasks_per_node: u16,
    pub cpus_per_task: u16,
    pub gpus: u16,
    pub gpu_type: Option<String>,
}

impl Recipe {
    /// The recipe compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN, Path::new("<builtin>"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ProvisionError::RecipeRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    fn parse(contents: &str, origin: &Path) -> Result<Self> {
        let recipe: Recipe = toml::from_str(contents).map_err(|source| ProvisionError::RecipeParse {
            path: origin.to_path_buf(),
            source,
        })?;
        recipe.validate()?;
        Ok(recipe)
    }

    pub fn artifact(&self, name: &str) -> Option<&ArtifactSpec> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// Cross-reference checks serde cannot express
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for artifact in &self.artifacts {
            if !seen.insert(artifact.name.as_str()) {
                return Err(ProvisionError::Recipe(format!(
                    "artifact '{}' is declared twice",
                    artifact.name
                )));
            }
            if artifact.dir.is_empty() || artifact.dir.contains('/') {
                return Err(ProvisionError::Recipe(format!(
                    "artifact '{}' must use a single directory name, got '{}'",
                    artifact.name, artifact.dir
                )));
            }
        }

        let require = |name: &str, used_by: &str| -> Result<()> {
            if self.artifact(name).is_none() {
                return Err(ProvisionError::Recipe(format!(
                    "{} refers to unknown artifact '{}'",
                    used_by, name
                )));
            }
            Ok(())
        };

        for patch in &self.patches {
            require(&patch.plugin, &format!("patch '{}'", patch.name))?;
            require(&patch.target, &format!("patch '{}'", patch.name))?;
        }
        require(&self.build.source, "build")?;
        require(&self.runtime.library_artifact, "runtime")?;

        if self.toolchain.modules.is_empty() {
            return Err(ProvisionError::Recipe(
                "toolchain must pin at least one module".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand `{name}` placeholders from `vars`
///
/// Unknown placeholders are an error rather than being passed through, so a
/// typo never reaches the build generator as a literal path.
pub fn expand(template: &str, vars: &BTreeMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            ProvisionError::Recipe(format!("unterminated placeholder in '{}'", template))
        })?;
        let key = &after[..end];
        let value = vars.get(key).ok_or_else(|| {
            ProvisionError::Recipe(format!("unknown placeholder '{{{}}}' in '{}'", key, template))
        })?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
