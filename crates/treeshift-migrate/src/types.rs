//! Typed records for the entities read from and written to a forge.
//!
//! Every field the engine relies on is declared up front. Fields that an
//! instance may omit are `Option`s so that a missing value is a decision at
//! the call site rather than a deserialization failure.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated user behind an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub name: String,
}

/// Author reference embedded in issues, merge requests and notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub name: String,
    #[serde(default)]
    pub username: String,
}

/// A group (or subgroup).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub full_path: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Namespace a project lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRef {
    pub id: u64,
    #[serde(default)]
    pub full_path: String,
}

/// A project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub namespace: NamespaceRef,
    #[serde(default)]
    pub description: Option<String>,
    pub http_url_to_repo: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A repository branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
}

/// A project label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
}

/// A CI/CD variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    pub value: String,
    #[serde(default = "default_environment_scope")]
    pub environment_scope: String,
    #[serde(default)]
    pub masked: bool,
    #[serde(default)]
    pub protected: bool,
    #[serde(default = "default_variable_type")]
    pub variable_type: String,
}

fn default_environment_scope() -> String {
    "*".to_string()
}

fn default_variable_type() -> String {
    "env_var".to_string()
}

/// One entry of a protection rule's access level list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLevel {
    pub access_level: u32,
}

/// First access level of a rule list, or 0 ("no access") when empty.
pub fn first_access_level(levels: &[AccessLevel]) -> u32 {
    levels.first().map_or(0, |l| l.access_level)
}

/// A branch protection rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedBranch {
    pub name: String,
    #[serde(default)]
    pub push_access_levels: Vec<AccessLevel>,
    #[serde(default)]
    pub merge_access_levels: Vec<AccessLevel>,
    #[serde(default)]
    pub unprotect_access_levels: Vec<AccessLevel>,
    #[serde(default)]
    pub allow_force_push: bool,
}

/// A tag protection rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedTag {
    pub name: String,
    #[serde(default)]
    pub create_access_levels: Vec<AccessLevel>,
}

/// A project milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

/// Milestone reference embedded in issues and merge requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneRef {
    pub id: u64,
}

/// An issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub confidential: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub milestone: Option<MilestoneRef>,
    pub author: UserRef,
}

impl Issue {
    pub fn is_closed(&self) -> bool {
        self.state == "closed"
    }
}

/// A merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub id: u64,
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub source_branch: String,
    pub target_branch: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub milestone: Option<MilestoneRef>,
    pub author: UserRef,
}

/// A comment on an issue or merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: u64,
    pub body: String,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub confidential: bool,
    pub created_at: DateTime<Utc>,
    pub author: UserRef,
}

/// Which noteable a note belongs to, addressed by internal id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteTarget {
    Issue(u64),
    MergeRequest(u64),
}

/// A wiki page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiPage {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_wiki_format")]
    pub format: String,
}

fn default_wiki_format() -> String {
    "markdown".to_string()
}

/// A CI pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: u64,
    pub status: String,
}

impl Pipeline {
    /// Pipelines in these states will not run any further jobs.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status.as_str(),
            "success" | "failed" | "canceled" | "skipped"
        )
    }
}

/// Request body for creating a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGroup {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Request body for creating a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProject {
    pub name: String,
    pub path: String,
    pub namespace_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Request body for creating a milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMilestone {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
}

/// Request body for creating a branch protection rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProtectedBranch {
    pub name: String,
    pub push_access_level: u32,
    pub merge_access_level: u32,
    pub unprotect_access_level: u32,
    pub allow_force_push: bool,
}

/// Request body for creating a tag protection rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProtectedTag {
    pub name: String,
    pub create_access_level: u32,
}

/// Request body for creating an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub iid: u64,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
    pub confidential: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

/// Request body for creating a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMergeRequest {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<u64>,
}

/// Request body for creating a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewNote {
    pub body: String,
    pub confidential: bool,
    pub created_at: DateTime<Utc>,
}

/// Request body for creating a wiki page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewWikiPage {
    pub title: String,
    pub content: String,
    pub format: String,
}
