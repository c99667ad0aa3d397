use crate::error::SchedulerError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

/// A fully validated PR creation request, ready to hand to `gh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrRequest {
    pub local_path: PathBuf,
    pub repo: String,
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: String,
}

/// Raw form input as the user typed it. Validation aggregates every
/// blank required field into a single error so the user fixes the form
/// in one pass.
#[derive(Debug, Clone, Default)]
pub struct PrForm {
    pub local_path: String,
    pub repo: String,
    pub fork_user: String,
    pub fork_branch: String,
    pub base: String,
    pub title: String,
    pub body: String,
}

impl PrForm {
    pub fn validate(&self) -> Result<PrRequest, SchedulerError> {
        let required = [
            ("Local Git Repo", self.local_path.as_str()),
            ("Origin Repository", self.repo.as_str()),
            ("Forked Username", self.fork_user.as_str()),
            ("Forked Branch", self.fork_branch.as_str()),
            ("Base Branch", self.base.as_str()),
            ("PR Title", self.title.as_str()),
        ];

        let missing: Vec<String> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(label, _)| (*label).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SchedulerError::MissingFields(missing));
        }

        Ok(PrRequest {
            local_path: PathBuf::from(self.local_path.trim()),
            repo: self.repo.trim().to_string(),
            head: format!("{}:{}", self.fork_user.trim(), self.fork_branch.trim()),
            base: self.base.trim().to_string(),
            title: self.title.trim().to_string(),
            body: self.body.trim().to_string(),
        })
    }
}

/// The external "open a pull request" capability. Opaque, possibly
/// slow, possibly failing; tests substitute a stub.
pub trait PrCreator {
    fn create(&self, request: &PrRequest) -> Result<(), SchedulerError>;
}

/// Creates PRs by shelling out to the GitHub CLI.
pub struct GhCli;

impl PrCreator for GhCli {
    fn create(&self, request: &PrRequest) -> Result<(), SchedulerError> {
        verify_git_repo(&request.local_path)?;

        let output = Command::new("gh")
            .args([
                "pr",
                "create",
                "--repo",
                &request.repo,
                "--head",
                &request.head,
                "--base",
                &request.base,
                "--title",
                &request.title,
                "--body",
                &request.body,
            ])
            .current_dir(&request.local_path)
            .output()
            .map_err(|e| SchedulerError::RemoteCreation(format!("failed to run gh: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SchedulerError::RemoteCreation(stderr));
        }

        Ok(())
    }
}

/// The path must exist and hold git metadata at the moment of creation,
/// not just when the schedule was entered.
fn verify_git_repo(path: &Path) -> Result<(), SchedulerError> {
    if path.exists() && path.join(".git").exists() {
        Ok(())
    } else {
        Err(SchedulerError::InvalidRepoPath(path.to_path_buf()))
    }
}

pub fn get_current_user() -> Result<String> {
    let output = Command::new("gh")
        .args(["api", "user", "--jq", ".login"])
        .output()
        .context("Failed to run gh cli")?;

    if !output.status.success() {
        anyhow::bail!("gh auth failed - is gh cli authenticated?");
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_form() -> PrForm {
        PrForm {
            local_path: "/tmp/work".to_string(),
            repo: "org/repo".to_string(),
            fork_user: "me".to_string(),
            fork_branch: "feature".to_string(),
            base: "main".to_string(),
            title: "Fix bug".to_string(),
            body: "Details".to_string(),
        }
    }

    #[test]
    fn validate_builds_the_head_ref() {
        let request = filled_form().validate().unwrap();
        assert_eq!(request.head, "me:feature");
        assert_eq!(request.repo, "org/repo");
    }

    #[test]
    fn validate_reports_every_missing_field_at_once() {
        let mut form = filled_form();
        form.title = "   ".to_string();
        form.base = String::new();

        match form.validate() {
            Err(SchedulerError::MissingFields(missing)) => {
                assert_eq!(missing, vec!["Base Branch", "PR Title"]);
            }
            other => panic!("expected MissingFields, got {other:?}"),
        }
    }

    #[test]
    fn body_is_optional() {
        let mut form = filled_form();
        form.body = String::new();
        assert!(form.validate().is_ok());
    }

    #[test]
    fn verify_git_repo_rejects_plain_directories() {
        let dir = tempfile::tempdir().unwrap();
        let err = verify_git_repo(dir.path()).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidRepoPath(_)));

        std::fs::create_dir(dir.path().join(".git")).unwrap();
        assert!(verify_git_repo(dir.path()).is_ok());
    }
}
