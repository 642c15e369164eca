// components/provision_engine/src/artifact.rs
//! Staging external artifacts onto the filesystem
//!
//! Presence of the expected path is the only idempotence signal. To keep that
//! signal honest, every fetch lands in a `.<dir>.partial` sibling and is
//! renamed into place only after the tool succeeded, so an interrupted clone
//! or extraction can never masquerade as a finished artifact.

use crate::actions::StepId;
use crate::config::ProvisioningConfig;
use crate::error::{ProvisionError, Result};
use crate::recipe::{ArchiveFormat, ArtifactRoot, ArtifactSpec, PatchSpec, Source};
use crate::report::{send_log, Reporter};
use crate::runner::{run_checked, CommandRunner, ExternalCommand};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// An artifact with its location resolved against a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub source: Source,
    pub expected_path: PathBuf,
}

impl Artifact {
    pub fn resolve(spec: &ArtifactSpec, config: &ProvisioningConfig) -> Self {
        let root = match spec.root {
            ArtifactRoot::Prefix => &config.prefix,
            ArtifactRoot::Staging => &config.staging_root,
        };
        Self {
            name: spec.name.clone(),
            source: spec.source.clone(),
            expected_path: root.join(&spec.dir),
        }
    }

    /// Sibling directory a fetch writes into before the final rename
    pub fn partial_path(&self) -> PathBuf {
        let dir = self
            .expected_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone());
        self.expected_path.with_file_name(format!(".{}.partial", dir))
    }
}

/// The sole idempotence check: the expected path exists
pub fn is_already_provisioned(artifact: &Artifact) -> bool {
    artifact.expected_path.exists()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Already present; nothing was run
    Skipped,
    Fetched,
    /// Dry run: would be fetched
    Planned,
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Skipped => write!(f, "already present"),
            FetchOutcome::Fetched => write!(f, "fetched"),
            FetchOutcome::Planned => write!(f, "would fetch"),
        }
    }
}

/// Retrieves artifacts with external tools
pub struct Fetcher<'a> {
    pub runner: &'a dyn CommandRunner,
    pub reporter: &'a dyn Reporter,
    /// Where archives are downloaded before extraction
    pub download_dir: &'a Path,
    pub step: StepId,
}

impl<'a> Fetcher<'a> {
    /// The commands a fetch of `artifact` runs, in order
    pub fn commands(&self, artifact: &Artifact) -> Vec<ExternalCommand> {
        let partial = artifact.partial_path();
        match &artifact.source {
            Source::Git { url, branch } => vec![ExternalCommand::new("git")
                .args(["clone", "--depth", "1", "--branch"])
                .arg(branch.as_str())
                .arg(url.as_str())
                .path_arg(&partial)],
            Source::Archive {
                url, file, format, ..
            } => {
                let download = self.download_dir.join(file);
                let extract = match format {
                    ArchiveFormat::Zip => ExternalCommand::new("unzip")
                        .arg("-q")
                        .path_arg(&download)
                        .arg("-d")
                        .path_arg(&partial),
                    ArchiveFormat::TarGz => ExternalCommand::new("tar")
                        .arg("-xzf")
                        .path_arg(&download)
                        .arg("-C")
                        .path_arg(&partial),
                };
                vec![
                    ExternalCommand::new("wget")
                        .args(["-q", "-O"])
                        .path_arg(&download)
                        .arg(url.as_str()),
                    extract,
                ]
            }
        }
    }

    /// Make sure `artifact` exists at its expected path
    ///
    /// Any failing sub-step is returned as an error and the artifact is left
    /// absent; a rerun starts it from scratch.
    pub async fn ensure(&self, artifact: &Artifact) -> Result<FetchOutcome> {
        if is_already_provisioned(artifact) {
            send_log!(
                self.reporter,
                Info,
                "{} already present at {}, skipping",
                artifact.name,
                artifact.expected_path.display()
            );
            return Ok(FetchOutcome::Skipped);
        }

        if let Some(parent) = artifact.expected_path.parent() {
            create_dir_all(parent).await?;
        }

        let partial = artifact.partial_path();
        if partial.exists() {
            send_log!(
                self.reporter,
                Warning,
                "removing incomplete {} left by an earlier run",
                partial.display()
            );
            remove_dir_all(&partial).await?;
        }

        send_log!(self.reporter, Info, "Fetching {}", artifact.name);
        let commands = self.commands(artifact);

        match &artifact.source {
            Source::Git { .. } => {
                for command in &commands {
                    run_checked(self.runner, &self.step, command).await?;
                }
                rename(&partial, &artifact.expected_path).await?;
            }
            Source::Archive { file, top_dir, .. } => {
                let download = self.download_dir.join(file);
                create_dir_all(self.download_dir).await?;
                create_dir_all(&partial).await?;
                for command in &commands {
                    run_checked(self.runner, &self.step, command).await?;
                }

                let unpacked = partial.join(top_dir);
                if !unpacked.is_dir() {
                    return Err(ProvisionError::io(
                        format!("extracting {}", artifact.name),
                        std::io::Error::new(
                            ErrorKind::NotFound,
                            format!("archive did not contain {}/", top_dir),
                        ),
                    ));
                }
                rename(&unpacked, &artifact.expected_path).await?;
                remove_dir_all(&partial).await?;
                tokio::fs::remove_file(&download)
                    .await
                    .map_err(|e| ProvisionError::io(format!("removing {}", download.display()), e))?;
            }
        }

        if !is_already_provisioned(artifact) {
            return Err(ProvisionError::io(
                format!("fetching {}", artifact.name),
                std::io::Error::new(
                    ErrorKind::NotFound,
                    format!("{} missing after fetch", artifact.expected_path.display()),
                ),
            ));
        }

        send_log!(
            self.reporter,
            Success,
            "{} ready at {}",
            artifact.name,
            artifact.expected_path.display()
        );
        Ok(FetchOutcome::Fetched)
    }
}

/// A plugin patch resolved against the staged artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub name: String,
    pub script: PathBuf,
    pub plugin_dir: PathBuf,
    pub target_dir: PathBuf,
    pub marker: PathBuf,
}

impl Patch {
    pub fn resolve(spec: &PatchSpec, artifacts: &[Artifact]) -> Result<Self> {
        let find = |name: &str| {
            artifacts
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.expected_path.clone())
                .ok_or_else(|| {
                    ProvisionError::Recipe(format!(
                        "patch '{}' refers to unknown artifact '{}'",
                        spec.name, name
                    ))
                })
        };
        let plugin_dir = find(&spec.plugin)?;
        let target_dir = find(&spec.target)?;
        Ok(Self {
            name: spec.name.clone(),
            script: plugin_dir.join(&spec.script),
            marker: target_dir.join(&spec.marker),
            plugin_dir,
            target_dir,
        })
    }

    pub fn is_applied(&self) -> bool {
        self.marker.exists()
    }

    pub fn command(&self) -> ExternalCommand {
        ExternalCommand::new("bash")
            .path_arg(&self.script)
            .path_arg(&self.target_dir)
            .current_dir(&self.plugin_dir)
    }

    pub async fn apply(&self, runner: &dyn CommandRunner, reporter: &dyn Reporter, step: &StepId) -> Result<FetchOutcome> {
        if self.is_applied() {
            send_log!(reporter, Info, "patch {} already applied, skipping", self.name);
            return Ok(FetchOutcome::Skipped);
        }
        send_log!(reporter, Info, "Applying patch {}", self.name);
        run_checked(runner, step, &self.command()).await?;

        if !self.is_applied() {
            return Err(ProvisionError::Integrity {
                path: self.marker.clone(),
                problem: format!("missing after patch '{}' ran", self.name),
            });
        }
        Ok(FetchOutcome::Fetched)
    }
}

async fn create_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        if e.kind() == ErrorKind::PermissionDenied {
            ProvisionError::permission(path, e)
        } else {
            ProvisionError::io(format!("creating {}", path.display()), e)
        }
    })
}

async fn remove_dir_all(path: &Path) -> Result<()> {
    tokio::fs::remove_dir_all(path)
        .await
        .map_err(|e| ProvisionError::io(format!("removing {}", path.display()), e))
}

async fn rename(from: &Path, to: &Path) -> Result<()> {
    tokio::fs::rename(from, to).await.map_err(|e| {
        ProvisionError::io(format!("moving {} to {}", from.display(), to.display()), e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::stub::RecordingReporter;
    use crate::report::NoticeLevel;
    use crate::runner::stub::RecordingRunner;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    const STEP: StepId = StepId::new("fetch-artifacts");

    fn git_artifact(root: &Path) -> Artifact {
        Artifact {
            name: "lammps".to_string(),
            source: Source::Git {
                url: "https://example.org/lammps.git".to_string(),
                branch: "stable".to_string(),
            },
            expected_path: root.join("lammps"),
        }
    }

    fn zip_artifact(root: &Path) -> Artifact {
        Artifact {
            name: "libtorch".to_string(),
            source: Source::Archive {
                url: "https://example.org/libtorch.zip".to_string(),
                file: "libtorch.zip".to_string(),
                format: ArchiveFormat::Zip,
                top_dir: "libtorch".to_string(),
            },
            expected_path: root.join("prefix").join("libtorch"),
        }
    }

    /// Mimics what git/wget/unzip leave behind
    fn fake_tools(command: &ExternalCommand) {
        match command.program.as_str() {
            "git" => {
                let dest = PathBuf::from(command.last_arg().unwrap());
                std::fs::create_dir_all(dest.join("src")).unwrap();
            }
            "wget" => std::fs::write(&command.args[2], b"zip").unwrap(),
            "unzip" => {
                let dest = PathBuf::from(command.last_arg().unwrap());
                std::fs::create_dir_all(dest.join("libtorch").join("lib")).unwrap();
            }
            _ => {}
        }
    }

    #[tokio::test]
    async fn present_artifact_is_skipped_without_invocations() {
        let dir = TempDir::new().unwrap();
        let artifact = git_artifact(dir.path());
        std::fs::create_dir_all(&artifact.expected_path).unwrap();
        let runner = RecordingRunner::new();
        let reporter = RecordingReporter::shared();
        let fetcher = Fetcher {
            runner: &runner,
            reporter: &reporter,
            download_dir: dir.path(),
            step: STEP,
        };

        assert_eq!(fetcher.ensure(&artifact).await.unwrap(), FetchOutcome::Skipped);
        assert_eq!(fetcher.ensure(&artifact).await.unwrap(), FetchOutcome::Skipped);
        assert!(runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn second_ensure_after_fetch_is_skipped() {
        let dir = TempDir::new().unwrap();
        let artifact = git_artifact(dir.path());
        let runner = RecordingRunner::new().with_effect(fake_tools);
        let reporter = RecordingReporter::shared();
        let fetcher = Fetcher {
            runner: &runner,
            reporter: &reporter,
            download_dir: dir.path(),
            step: STEP,
        };

        assert_eq!(fetcher.ensure(&artifact).await.unwrap(), FetchOutcome::Fetched);
        assert_eq!(fetcher.ensure(&artifact).await.unwrap(), FetchOutcome::Skipped);

        assert_eq!(runner.invocations().len(), 1);
        assert!(artifact.expected_path.join("src").is_dir());
        assert!(!artifact.partial_path().exists());
    }

    #[tokio::test]
    async fn clone_goes_through_partial_directory() {
        let dir = TempDir::new().unwrap();
        let artifact = git_artifact(dir.path());
        let runner = RecordingRunner::new().with_effect(fake_tools);
        let reporter = RecordingReporter::shared();
        let fetcher = Fetcher {
            runner: &runner,
            reporter: &reporter,
            download_dir: dir.path(),
            step: STEP,
        };

        fetcher.ensure(&artifact).await.unwrap();

        let clone = &runner.invocations()[0];
        assert_eq!(
            clone.args[..5],
            ["clone", "--depth", "1", "--branch", "stable"]
        );
        assert_eq!(
            PathBuf::from(clone.last_arg().unwrap()),
            artifact.partial_path()
        );
    }

    #[tokio::test]
    async fn failed_clone_leaves_nothing_that_looks_provisioned() {
        let dir = TempDir::new().unwrap();
        let artifact = git_artifact(dir.path());
        // git creates its destination before failing half way
        let runner = RecordingRunner::new().failing_when(128, |c| {
            std::fs::create_dir_all(c.last_arg().unwrap()).unwrap();
            c.program == "git"
        });
        let reporter = RecordingReporter::shared();
        let fetcher = Fetcher {
            runner: &runner,
            reporter: &reporter,
            download_dir: dir.path(),
            step: STEP,
        };

        let result = fetcher.ensure(&artifact).await;

        assert_matches!(result, Err(ProvisionError::ToolFailed { .. }));
        assert!(!is_already_provisioned(&artifact));
    }

    #[tokio::test]
    async fn stale_partial_directory_is_replaced() {
        let dir = TempDir::new().unwrap();
        let artifact = git_artifact(dir.path());
        std::fs::create_dir_all(artifact.partial_path().join("junk")).unwrap();
        let runner = RecordingRunner::new().with_effect(fake_tools);
        let reporter = RecordingReporter::shared();
        let fetcher = Fetcher {
            runner: &runner,
            reporter: &reporter,
            download_dir: dir.path(),
            step: STEP,
        };

        fetcher.ensure(&artifact).await.unwrap();

        assert!(!artifact.expected_path.join("junk").exists());
        assert_eq!(reporter.messages(NoticeLevel::Warning).len(), 1);
    }

    #[tokio::test]
    async fn archive_is_downloaded_extracted_and_cleaned_up() {
        let dir = TempDir::new().unwrap();
        let downloads = dir.path().join("staging");
        let artifact = zip_artifact(dir.path());
        let runner = RecordingRunner::new().with_effect(fake_tools);
        let reporter = RecordingReporter::shared();
        let fetcher = Fetcher {
            runner: &runner,
            reporter: &reporter,
            download_dir: &downloads,
            step: STEP,
        };

        assert_eq!(fetcher.ensure(&artifact).await.unwrap(), FetchOutcome::Fetched);

        let programs: Vec<_> = runner.invocations().into_iter().map(|c| c.program).collect();
        assert_eq!(programs, ["wget", "unzip"]);
        assert!(artifact.expected_path.join("lib").is_dir());
        assert!(!downloads.join("libtorch.zip").exists());
        assert!(!artifact.partial_path().exists());
    }

    #[tokio::test]
    async fn failed_download_skips_extraction() {
        let dir = TempDir::new().unwrap();
        let artifact = zip_artifact(dir.path());
        let runner = RecordingRunner::new().failing_when(8, |c| c.program == "wget");
        let reporter = RecordingReporter::shared();
        let fetcher = Fetcher {
            runner: &runner,
            reporter: &reporter,
            download_dir: dir.path(),
            step: STEP,
        };

        assert!(fetcher.ensure(&artifact).await.is_err());
        assert_eq!(runner.invocations().len(), 1);
        assert!(!is_already_provisioned(&artifact));
    }

    #[tokio::test]
    async fn archive_without_expected_top_dir_fails() {
        let dir = TempDir::new().unwrap();
        let artifact = zip_artifact(dir.path());
        let runner = RecordingRunner::new();
        let reporter = RecordingReporter::shared();
        let fetcher = Fetcher {
            runner: &runner,
            reporter: &reporter,
            download_dir: dir.path(),
            step: STEP,
        };

        assert_matches!(fetcher.ensure(&artifact).await, Err(ProvisionError::Io { .. }));
        assert!(!is_already_provisioned(&artifact));
    }

    #[tokio::test]
    async fn patch_runs_once_and_checks_marker() {
        let dir = TempDir::new().unwrap();
        let lammps = git_artifact(dir.path());
        let plugin = Artifact {
            name: "pair_plugin".to_string(),
            expected_path: dir.path().join("pair_plugin"),
            ..lammps.clone()
        };
        let spec = PatchSpec {
            name: "plugin".to_string(),
            plugin: "pair_plugin".to_string(),
            script: "patch_lammps.sh".to_string(),
            target: "lammps".to_string(),
            marker: "src/pair_plugin.cpp".to_string(),
        };
        let patch = Patch::resolve(&spec, &[lammps.clone(), plugin]).unwrap();
        let marker = patch.marker.clone();
        let runner = RecordingRunner::new().with_effect(move |_| {
            std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
            std::fs::write(&marker, b"").unwrap();
        });
        let reporter = RecordingReporter::shared();

        assert_eq!(patch.apply(&runner, &reporter, &STEP).await.unwrap(), FetchOutcome::Fetched);
        assert_eq!(patch.apply(&runner, &reporter, &STEP).await.unwrap(), FetchOutcome::Skipped);
        assert_eq!(runner.invocations().len(), 1);
        assert_eq!(
            runner.invocations()[0].args[1],
            lammps.expected_path.display().to_string()
        );
    }

    #[tokio::test]
    async fn patch_that_leaves_no_marker_is_an_integrity_error() {
        let dir = TempDir::new().unwrap();
        let lammps = git_artifact(dir.path());
        let spec = PatchSpec {
            name: "plugin".to_string(),
            plugin: "lammps".to_string(),
            script: "patch.sh".to_string(),
            target: "lammps".to_string(),
            marker: "src/pair_plugin.cpp".to_string(),
        };
        let patch = Patch::resolve(&spec, &[lammps]).unwrap();
        let runner = RecordingRunner::new();
        let reporter = RecordingReporter::shared();

        assert_matches!(
            patch.apply(&runner, &reporter, &STEP).await,
            Err(ProvisionError::Integrity { .. })
        );
    }
}
