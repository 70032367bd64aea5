//! Seams between the migration engine and the outside world.
//!
//! The engine reads the source tree and writes the destination tree through
//! [`RepositoryProvider`], and copies repository history through
//! [`RepositoryTransfer`]. Both are object safe so the engine can hold them
//! as `Arc<dyn ...>`.

use crate::error::Result;
use crate::types::*;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Read/write access to one forge instance.
///
/// List operations return every page. Operations documented as mutating
/// are never called during a dry run.
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// The user the access token belongs to.
    async fn current_user(&self) -> Result<User>;

    async fn get_group(&self, group_id: u64) -> Result<Group>;

    async fn list_subgroups(&self, group_id: u64) -> Result<Vec<Group>>;

    /// Projects directly inside a group (not inside its subgroups).
    async fn list_projects(&self, group_id: u64) -> Result<Vec<Project>>;

    /// Mutating.
    async fn create_group(&self, group: &NewGroup) -> Result<Group>;

    /// Mutating.
    async fn set_group_avatar(&self, group_id: u64, filename: &str, image: Vec<u8>) -> Result<()>;

    /// Mutating.
    async fn create_project(&self, project: &NewProject) -> Result<Project>;

    /// Mutating.
    async fn delete_project(&self, project_id: u64) -> Result<()>;

    /// Mutating.
    async fn set_project_avatar(
        &self,
        project_id: u64,
        filename: &str,
        image: Vec<u8>,
    ) -> Result<()>;

    async fn list_branches(&self, project_id: u64) -> Result<Vec<Branch>>;

    async fn list_labels(&self, project_id: u64) -> Result<Vec<Label>>;

    /// Mutating.
    async fn create_label(&self, project_id: u64, label: &Label) -> Result<()>;

    async fn list_variables(&self, project_id: u64) -> Result<Vec<Variable>>;

    /// Mutating.
    async fn create_variable(&self, project_id: u64, variable: &Variable) -> Result<()>;

    async fn list_protected_branches(&self, project_id: u64) -> Result<Vec<ProtectedBranch>>;

    /// Mutating.
    async fn create_protected_branch(
        &self,
        project_id: u64,
        rule: &NewProtectedBranch,
    ) -> Result<()>;

    async fn list_protected_tags(&self, project_id: u64) -> Result<Vec<ProtectedTag>>;

    /// Mutating.
    async fn create_protected_tag(&self, project_id: u64, rule: &NewProtectedTag) -> Result<()>;

    async fn list_milestones(&self, project_id: u64) -> Result<Vec<Milestone>>;

    /// Mutating.
    async fn create_milestone(&self, project_id: u64, milestone: &NewMilestone)
        -> Result<Milestone>;

    /// All issues, oldest first.
    async fn list_issues(&self, project_id: u64) -> Result<Vec<Issue>>;

    /// Mutating.
    async fn create_issue(&self, project_id: u64, issue: &NewIssue) -> Result<Issue>;

    /// Mutating.
    async fn close_issue(&self, project_id: u64, issue_iid: u64) -> Result<()>;

    /// Open merge requests, oldest first.
    async fn list_open_merge_requests(&self, project_id: u64) -> Result<Vec<MergeRequest>>;

    /// Mutating.
    async fn create_merge_request(
        &self,
        project_id: u64,
        merge_request: &NewMergeRequest,
    ) -> Result<MergeRequest>;

    async fn list_notes(&self, project_id: u64, target: NoteTarget) -> Result<Vec<Note>>;

    /// Mutating.
    async fn create_note(&self, project_id: u64, target: NoteTarget, note: &NewNote)
        -> Result<()>;

    async fn list_wiki_pages(&self, project_id: u64) -> Result<Vec<WikiPage>>;

    /// Mutating.
    async fn create_wiki_page(&self, project_id: u64, page: &NewWikiPage) -> Result<()>;

    async fn list_pipelines(&self, project_id: u64) -> Result<Vec<Pipeline>>;

    /// Mutating.
    async fn delete_pipeline(&self, project_id: u64, pipeline_id: u64) -> Result<()>;

    /// Fetch an avatar image using a browser session cookie.
    ///
    /// `Ok(None)` means the instance refused to hand it out.
    async fn download_avatar(&self, url: &str, session_cookie: &str) -> Result<Option<Vec<u8>>>;
}

/// HTTP basic credentials for git over HTTPS.
#[derive(Clone)]
pub struct GitCredentials {
    pub username: String,
    pub token: String,
}

impl GitCredentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }

    /// Value for an `Authorization` header.
    pub fn basic_auth_header(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.token));
        format!("Authorization: Basic {encoded}")
    }
}

impl fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// A local clone used as staging area between source and destination.
///
/// When backed by a temporary directory the clone is removed on drop.
#[derive(Debug)]
pub struct WorkingCopy {
    path: PathBuf,
    _dir: Option<TempDir>,
}

impl WorkingCopy {
    /// A working copy at `path` inside a temporary directory it owns.
    pub fn in_temp_dir(dir: TempDir, path: PathBuf) -> Self {
        Self {
            path,
            _dir: Some(dir),
        }
    }

    /// A working copy at a path managed by the caller.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _dir: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total size in bytes of every file below the working copy.
    pub fn disk_usage(&self) -> u64 {
        WalkDir::new(&self.path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.metadata().ok())
            .map(|meta| meta.len())
            .sum()
    }
}

/// Copies repository history, including LFS objects, between instances.
#[async_trait]
pub trait RepositoryTransfer: Send + Sync {
    async fn clone_repo(&self, source_url: &str, credentials: &GitCredentials)
        -> Result<WorkingCopy>;

    async fn fetch_lfs(&self, copy: &WorkingCopy) -> Result<()>;

    async fn add_remote_and_push(
        &self,
        copy: &WorkingCopy,
        dest_url: &str,
        credentials: &GitCredentials,
    ) -> Result<()>;

    async fn push_lfs(&self, copy: &WorkingCopy, dest_url: &str) -> Result<()>;
}
