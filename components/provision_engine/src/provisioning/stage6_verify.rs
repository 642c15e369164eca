// components/provision_engine/src/provisioning/stage6_verify.rs
//! Stage 6: the executable must exist and be runnable

use crate::actions::{Step, StepId};
use crate::error::{ProvisionError, Result};
use crate::provisioning::types::{InstalledTree, VerifiedInstallation};
use crate::provisioning::StepContext;
use crate::report::send_log;
use std::path::{Path, PathBuf};

pub struct VerifyAction {
    pub ctx: StepContext,
}

impl VerifyAction {
    fn executable(&self, installed: &InstalledTree) -> PathBuf {
        installed
            .toolchain()
            .config()
            .install_root
            .join(&self.ctx.recipe.runtime.executable)
    }
}

/// A regular file with at least one execute bit
pub fn verify_installation(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|e| ProvisionError::Integrity {
        path: path.to_path_buf(),
        problem: match e.kind() {
            std::io::ErrorKind::NotFound => "not found after install".to_string(),
            _ => format!("not accessible: {}", e),
        },
    })?;

    if !metadata.is_file() {
        return Err(ProvisionError::Integrity {
            path: path.to_path_buf(),
            problem: "is not a regular file".to_string(),
        });
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(ProvisionError::Integrity {
                path: path.to_path_buf(),
                problem: "is not executable".to_string(),
            });
        }
    }
    Ok(())
}

impl Step<InstalledTree, VerifiedInstallation> for VerifyAction {
    fn id(&self) -> StepId {
        StepId::new("verify")
    }

    fn description(&self) -> String {
        "Verifying installation".to_string()
    }

    async fn check(&self, _input: &InstalledTree) -> Result<bool> {
        Ok(true)
    }

    async fn apply(&self, input: InstalledTree) -> Result<VerifiedInstallation> {
        let executable = self.executable(&input);
        verify_installation(&executable)?;
        send_log!(self.ctx.reporter, Success, "Found {}", executable.display());
        Ok(VerifiedInstallation {
            installed: input,
            executable,
        })
    }

    async fn preview(&self, input: InstalledTree) -> Result<VerifiedInstallation> {
        let executable = self.executable(&input);
        send_log!(self.ctx.reporter, Info, "Would check {}", executable.display());
        Ok(VerifiedInstallation {
            installed: input,
            executable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn missing_executable_is_an_integrity_error() {
        let dir = TempDir::new().unwrap();
        let result = verify_installation(&dir.path().join("bin/lmp"));

        assert_matches!(result, Err(ProvisionError::Integrity { ref problem, .. }) if problem.contains("not found"));
        assert_eq!(result.unwrap_err().exit_code(), 4);
    }

    #[test]
    fn unreadable_path_reports_its_cause() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("lammps-mace");
        std::fs::write(&file, b"").unwrap();

        let result = verify_installation(&file.join("bin/lmp"));

        assert_matches!(
            result,
            Err(ProvisionError::Integrity { ref problem, .. })
                if problem.starts_with("not accessible: ") && !problem.contains("not found")
        );
    }

    #[test]
    fn directory_is_not_an_executable() {
        let dir = TempDir::new().unwrap();
        assert_matches!(
            verify_installation(dir.path()),
            Err(ProvisionError::Integrity { .. })
        );
    }

    #[cfg(unix)]
    #[test]
    fn execute_bit_is_required() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let lmp = dir.path().join("lmp");
        std::fs::write(&lmp, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&lmp, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert_matches!(verify_installation(&lmp), Err(ProvisionError::Integrity { .. }));

        std::fs::set_permissions(&lmp, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(verify_installation(&lmp).is_ok());
    }
}
