//! Repository transfer through the `git` and `git lfs` command line.

use crate::error::{MigrationError, Result};
use crate::provider::{GitCredentials, RepositoryTransfer, WorkingCopy};

use async_trait::async_trait;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;
use tracing::debug;

/// Name of the remote pointing at the destination repository.
pub const DEST_REMOTE: &str = "final-destination";

/// Transfers repositories by shelling out to git.
///
/// Every step that exits non-zero is fatal; conflicting or partially pushed
/// histories are never reconciled.
#[derive(Debug, Clone, Default)]
pub struct GitTransfer;

impl GitTransfer {
    pub fn new() -> Self {
        Self
    }

    fn git(
        &self,
        dir: Option<&Path>,
        args: &[&str],
        failure: fn(String) -> MigrationError,
    ) -> Result<Output> {
        let mut command = Command::new("git");
        if let Some(dir) = dir {
            command.current_dir(dir);
        }
        // Arguments may carry credentials; log only the subcommand.
        debug!(subcommand = args.first().copied().unwrap_or_default(), "Running git");

        let output = command.args(args).output()?;
        if !output.status.success() {
            return Err(failure(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(output)
    }
}

#[async_trait]
impl RepositoryTransfer for GitTransfer {
    async fn clone_repo(
        &self,
        source_url: &str,
        credentials: &GitCredentials,
    ) -> Result<WorkingCopy> {
        let temp_dir = TempDir::new()?;
        let clone_path = temp_dir.path().join("repo.git");
        let clone_path_str = clone_path.to_string_lossy().into_owned();

        // A bare clone keeps every remote branch as a local head, so a later
        // `push --all` carries all of them.
        let header = format!("http.extraHeader={}", credentials.basic_auth_header());
        self.git(
            None,
            &["clone", "--bare", "--config", &header, source_url, &clone_path_str],
            MigrationError::GitCloneFailed,
        )?;

        Ok(WorkingCopy::in_temp_dir(temp_dir, clone_path))
    }

    async fn fetch_lfs(&self, copy: &WorkingCopy) -> Result<()> {
        self.git(
            Some(copy.path()),
            &["lfs", "fetch", "--all"],
            MigrationError::LfsFailed,
        )?;
        Ok(())
    }

    async fn add_remote_and_push(
        &self,
        copy: &WorkingCopy,
        dest_url: &str,
        credentials: &GitCredentials,
    ) -> Result<()> {
        let dir = Some(copy.path());
        self.git(
            dir,
            &["remote", "add", DEST_REMOTE, dest_url],
            MigrationError::GitPushFailed,
        )?;
        self.git(
            dir,
            &[
                "config",
                "--replace-all",
                "http.extraHeader",
                &credentials.basic_auth_header(),
            ],
            MigrationError::GitPushFailed,
        )?;
        self.git(
            dir,
            &["push", "--porcelain", "--all", DEST_REMOTE],
            MigrationError::GitPushFailed,
        )?;
        self.git(
            dir,
            &["push", "--porcelain", "--tags", DEST_REMOTE],
            MigrationError::GitPushFailed,
        )?;
        Ok(())
    }

    async fn push_lfs(&self, copy: &WorkingCopy, dest_url: &str) -> Result<()> {
        self.git(
            Some(copy.path()),
            &["lfs", "push", "--all", dest_url],
            MigrationError::LfsFailed,
        )?;
        Ok(())
    }
}
