//! In-memory forge and transfer doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use treeshift_migrate::*;

pub const VALID_COOKIE: &str = "valid-cookie";

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub name: &'static str,
    pub mutating: bool,
    pub id: u64,
}

#[derive(Debug, Clone)]
pub struct ProjectData {
    pub project: Project,
    pub branches: Vec<Branch>,
    pub labels: Vec<Label>,
    pub variables: Vec<Variable>,
    pub protected_branches: Vec<ProtectedBranch>,
    pub protected_tags: Vec<ProtectedTag>,
    pub milestones: Vec<Milestone>,
    pub issues: Vec<Issue>,
    pub merge_requests: Vec<MergeRequest>,
    pub notes: HashMap<NoteTarget, Vec<Note>>,
    pub wiki: Vec<WikiPage>,
    pub pipelines: Vec<Pipeline>,
    pub avatar: Option<String>,
}

impl ProjectData {
    fn new(project: Project) -> Self {
        Self {
            project,
            branches: Vec::new(),
            labels: Vec::new(),
            variables: Vec::new(),
            protected_branches: Vec::new(),
            protected_tags: Vec::new(),
            milestones: Vec::new(),
            issues: Vec::new(),
            merge_requests: Vec::new(),
            notes: HashMap::new(),
            wiki: Vec::new(),
            pipelines: Vec::new(),
            avatar: None,
        }
    }
}

#[derive(Default)]
struct Inner {
    groups: BTreeMap<u64, Group>,
    group_avatars: HashMap<u64, String>,
    /// Extra parent -> child edges on top of `parent_id`, to build non-trees.
    extra_children: Vec<(u64, u64)>,
    projects: BTreeMap<u64, ProjectData>,
    next_id: u64,
    calls: Vec<Call>,
    fail_once: HashSet<&'static str>,
}

/// A forge instance held entirely in memory.
pub struct FakeForge {
    host: &'static str,
    inner: Mutex<Inner>,
}

pub fn at(day: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 5, day, 12, 0, 0).unwrap()
}

pub fn author(name: &str) -> UserRef {
    UserRef {
        name: name.to_string(),
        username: name.to_lowercase().replace(' ', "."),
    }
}

impl FakeForge {
    pub fn new(host: &'static str, first_created_id: u64) -> Self {
        Self {
            host,
            inner: Mutex::new(Inner {
                next_id: first_created_id,
                ..Default::default()
            }),
        }
    }

    pub fn add_group(&self, id: u64, path: &str, parent: Option<u64>) -> Group {
        let mut inner = self.inner.lock();
        let full_path = match parent.and_then(|p| inner.groups.get(&p)) {
            Some(p) => format!("{}/{path}", p.full_path),
            None => path.to_string(),
        };
        let group = Group {
            id,
            name: path.to_uppercase(),
            path: path.to_string(),
            full_path,
            description: Some(format!("The {path} group")),
            parent_id: parent,
            avatar_url: None,
        };
        inner.groups.insert(id, group.clone());
        group
    }

    pub fn link_subgroup(&self, parent: u64, child: u64) {
        self.inner.lock().extra_children.push((parent, child));
    }

    pub fn add_project(&self, id: u64, path: &str, group_id: u64, branches: &[&str]) {
        let mut inner = self.inner.lock();
        let ns_path = inner
            .groups
            .get(&group_id)
            .map(|g| g.full_path.clone())
            .unwrap_or_default();
        let project = Project {
            id,
            name: path.to_string(),
            path: path.to_string(),
            namespace: NamespaceRef {
                id: group_id,
                full_path: ns_path.clone(),
            },
            description: Some(format!("All about {path}")),
            http_url_to_repo: format!("https://{}/{ns_path}/{path}.git", self.host),
            avatar_url: None,
        };
        let mut data = ProjectData::new(project);
        data.branches = branches
            .iter()
            .map(|b| Branch {
                name: b.to_string(),
            })
            .collect();
        inner.projects.insert(id, data);
    }

    pub fn edit_project(&self, id: u64, edit: impl FnOnce(&mut ProjectData)) {
        let mut inner = self.inner.lock();
        let data = inner.projects.get_mut(&id).expect("unknown project");
        edit(data);
    }

    pub fn edit_group(&self, id: u64, edit: impl FnOnce(&mut Group)) {
        let mut inner = self.inner.lock();
        edit(inner.groups.get_mut(&id).expect("unknown group"));
    }

    /// Make the next call of `operation` fail with an API error.
    pub fn fail_once(&self, operation: &'static str) {
        self.inner.lock().fail_once.insert(operation);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.mutating).collect()
    }

    pub fn calls_named(&self, name: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.name == name).collect()
    }

    /// Record an operation performed on this instance outside the API.
    pub fn log(&self, name: &'static str, mutating: bool, id: u64) {
        self.inner.lock().calls.push(Call { name, mutating, id });
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub fn group_by_path(&self, full_path: &str) -> Option<Group> {
        self.inner
            .lock()
            .groups
            .values()
            .find(|g| g.full_path == full_path)
            .cloned()
    }

    pub fn group_count(&self) -> usize {
        self.inner.lock().groups.len()
    }

    pub fn group_avatar(&self, id: u64) -> Option<String> {
        self.inner.lock().group_avatars.get(&id).cloned()
    }

    pub fn project(&self, id: u64) -> Option<ProjectData> {
        self.inner.lock().projects.get(&id).cloned()
    }

    pub fn projects_named(&self, name: &str) -> Vec<ProjectData> {
        self.inner
            .lock()
            .projects
            .values()
            .filter(|p| p.project.name == name)
            .cloned()
            .collect()
    }

    pub fn project_by_url(&self, url: &str) -> Option<u64> {
        self.inner
            .lock()
            .projects
            .values()
            .find(|p| p.project.http_url_to_repo == url)
            .map(|p| p.project.id)
    }

    pub fn add_pipeline(&self, project_id: u64, status: &str) {
        let mut inner = self.inner.lock();
        let id = next_id(&mut inner);
        if let Some(data) = inner.projects.get_mut(&project_id) {
            data.pipelines.push(Pipeline {
                id,
                status: status.to_string(),
            });
        }
    }

    pub fn protect_branch(&self, project_id: u64, name: &str) {
        let mut inner = self.inner.lock();
        if let Some(data) = inner.projects.get_mut(&project_id) {
            if !data.protected_branches.iter().any(|b| b.name == name) {
                data.protected_branches.push(ProtectedBranch {
                    name: name.to_string(),
                    push_access_levels: vec![AccessLevel { access_level: 40 }],
                    merge_access_levels: vec![AccessLevel { access_level: 40 }],
                    unprotect_access_levels: Vec::new(),
                    allow_force_push: false,
                });
            }
        }
    }

    /// Record a call and honour injected failures.
    fn record(&self, name: &'static str, mutating: bool, id: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call { name, mutating, id });
        if inner.fail_once.remove(name) {
            return Err(MigrationError::ApiError(format!("injected failure in {name}")));
        }
        Ok(())
    }

    fn with_project<T>(&self, id: u64, f: impl FnOnce(&mut ProjectData) -> T) -> Result<T> {
        let mut inner = self.inner.lock();
        inner
            .projects
            .get_mut(&id)
            .map(f)
            .ok_or_else(|| MigrationError::NotFound(format!("project {id}")))
    }
}

fn next_id(inner: &mut Inner) -> u64 {
    let id = inner.next_id;
    inner.next_id += 1;
    id
}

#[async_trait]
impl RepositoryProvider for FakeForge {
    async fn current_user(&self) -> Result<User> {
        self.record("current_user", false, 0)?;
        Ok(User {
            id: 1,
            username: "migrator".to_string(),
            name: "Migration Bot".to_string(),
        })
    }

    async fn get_group(&self, group_id: u64) -> Result<Group> {
        self.record("get_group", false, group_id)?;
        self.inner
            .lock()
            .groups
            .get(&group_id)
            .cloned()
            .ok_or_else(|| MigrationError::NotFound(format!("group {group_id}")))
    }

    async fn list_subgroups(&self, group_id: u64) -> Result<Vec<Group>> {
        self.record("list_subgroups", false, group_id)?;
        let inner = self.inner.lock();
        let mut children: Vec<Group> = inner
            .groups
            .values()
            .filter(|g| g.parent_id == Some(group_id))
            .cloned()
            .collect();
        for (parent, child) in &inner.extra_children {
            if *parent == group_id {
                if let Some(g) = inner.groups.get(child) {
                    children.push(g.clone());
                }
            }
        }
        Ok(children)
    }

    async fn list_projects(&self, group_id: u64) -> Result<Vec<Project>> {
        self.record("list_projects", false, group_id)?;
        Ok(self
            .inner
            .lock()
            .projects
            .values()
            .filter(|p| p.project.namespace.id == group_id)
            .map(|p| p.project.clone())
            .collect())
    }

    async fn create_group(&self, group: &NewGroup) -> Result<Group> {
        self.record("create_group", true, 0)?;
        let mut inner = self.inner.lock();
        let taken = inner
            .groups
            .values()
            .any(|g| g.parent_id == group.parent_id && g.path == group.path);
        if taken {
            return Err(MigrationError::ApiError(format!(
                "path {} has already been taken",
                group.path
            )));
        }
        let full_path = match group.parent_id {
            Some(parent) => {
                let parent = inner
                    .groups
                    .get(&parent)
                    .ok_or_else(|| MigrationError::NotFound(format!("group {parent}")))?;
                format!("{}/{}", parent.full_path, group.path)
            }
            None => group.path.clone(),
        };
        let id = next_id(&mut inner);
        let created = Group {
            id,
            name: group.name.clone(),
            path: group.path.clone(),
            full_path,
            description: group.description.clone(),
            parent_id: group.parent_id,
            avatar_url: None,
        };
        inner.groups.insert(id, created.clone());
        Ok(created)
    }

    async fn set_group_avatar(&self, group_id: u64, filename: &str, _image: Vec<u8>) -> Result<()> {
        self.record("set_group_avatar", true, group_id)?;
        self.inner
            .lock()
            .group_avatars
            .insert(group_id, filename.to_string());
        Ok(())
    }

    async fn create_project(&self, project: &NewProject) -> Result<Project> {
        self.record("create_project", true, project.namespace_id)?;
        let mut inner = self.inner.lock();
        let ns_path = inner
            .groups
            .get(&project.namespace_id)
            .map(|g| g.full_path.clone())
            .ok_or_else(|| {
                MigrationError::NotFound(format!("namespace {}", project.namespace_id))
            })?;
        let taken = inner.projects.values().any(|p| {
            p.project.namespace.id == project.namespace_id && p.project.path == project.path
        });
        if taken {
            return Err(MigrationError::ApiError(format!(
                "path {} has already been taken",
                project.path
            )));
        }
        let id = next_id(&mut inner);
        let created = Project {
            id,
            name: project.name.clone(),
            path: project.path.clone(),
            namespace: NamespaceRef {
                id: project.namespace_id,
                full_path: ns_path.clone(),
            },
            description: project.description.clone(),
            http_url_to_repo: format!("https://{}/{ns_path}/{}.git", self.host, project.path),
            avatar_url: None,
        };
        inner.projects.insert(id, ProjectData::new(created.clone()));
        Ok(created)
    }

    async fn delete_project(&self, project_id: u64) -> Result<()> {
        self.record("delete_project", true, project_id)?;
        self.inner
            .lock()
            .projects
            .remove(&project_id)
            .map(|_| ())
            .ok_or_else(|| MigrationError::NotFound(format!("project {project_id}")))
    }

    async fn set_project_avatar(
        &self,
        project_id: u64,
        filename: &str,
        _image: Vec<u8>,
    ) -> Result<()> {
        self.record("set_project_avatar", true, project_id)?;
        self.with_project(project_id, |p| p.avatar = Some(filename.to_string()))
    }

    async fn list_branches(&self, project_id: u64) -> Result<Vec<Branch>> {
        self.record("list_branches", false, project_id)?;
        self.with_project(project_id, |p| p.branches.clone())
    }

    async fn list_labels(&self, project_id: u64) -> Result<Vec<Label>> {
        self.record("list_labels", false, project_id)?;
        self.with_project(project_id, |p| p.labels.clone())
    }

    async fn create_label(&self, project_id: u64, label: &Label) -> Result<()> {
        self.record("create_label", true, project_id)?;
        self.with_project(project_id, |p| p.labels.push(label.clone()))
    }

    async fn list_variables(&self, project_id: u64) -> Result<Vec<Variable>> {
        self.record("list_variables", false, project_id)?;
        self.with_project(project_id, |p| p.variables.clone())
    }

    async fn create_variable(&self, project_id: u64, variable: &Variable) -> Result<()> {
        self.record("create_variable", true, project_id)?;
        self.with_project(project_id, |p| p.variables.push(variable.clone()))
    }

    async fn list_protected_branches(&self, project_id: u64) -> Result<Vec<ProtectedBranch>> {
        self.record("list_protected_branches", false, project_id)?;
        self.with_project(project_id, |p| p.protected_branches.clone())
    }

    async fn create_protected_branch(
        &self,
        project_id: u64,
        rule: &NewProtectedBranch,
    ) -> Result<()> {
        self.record("create_protected_branch", true, project_id)?;
        self.with_project(project_id, |p| {
            p.protected_branches.push(ProtectedBranch {
                name: rule.name.clone(),
                push_access_levels: vec![AccessLevel {
                    access_level: rule.push_access_level,
                }],
                merge_access_levels: vec![AccessLevel {
                    access_level: rule.merge_access_level,
                }],
                unprotect_access_levels: vec![AccessLevel {
                    access_level: rule.unprotect_access_level,
                }],
                allow_force_push: rule.allow_force_push,
            })
        })
    }

    async fn list_protected_tags(&self, project_id: u64) -> Result<Vec<ProtectedTag>> {
        self.record("list_protected_tags", false, project_id)?;
        self.with_project(project_id, |p| p.protected_tags.clone())
    }

    async fn create_protected_tag(&self, project_id: u64, rule: &NewProtectedTag) -> Result<()> {
        self.record("create_protected_tag", true, project_id)?;
        self.with_project(project_id, |p| {
            p.protected_tags.push(ProtectedTag {
                name: rule.name.clone(),
                create_access_levels: vec![AccessLevel {
                    access_level: rule.create_access_level,
                }],
            })
        })
    }

    async fn list_milestones(&self, project_id: u64) -> Result<Vec<Milestone>> {
        self.record("list_milestones", false, project_id)?;
        self.with_project(project_id, |p| p.milestones.clone())
    }

    async fn create_milestone(
        &self,
        project_id: u64,
        milestone: &NewMilestone,
    ) -> Result<Milestone> {
        self.record("create_milestone", true, project_id)?;
        let id = next_id(&mut self.inner.lock());
        let created = Milestone {
            id,
            title: milestone.title.clone(),
            description: milestone.description.clone(),
            due_date: milestone.due_date,
            start_date: milestone.start_date,
        };
        let stored = created.clone();
        self.with_project(project_id, move |p| p.milestones.push(stored))?;
        Ok(created)
    }

    async fn list_issues(&self, project_id: u64) -> Result<Vec<Issue>> {
        self.record("list_issues", false, project_id)?;
        self.with_project(project_id, |p| p.issues.clone())
    }

    async fn create_issue(&self, project_id: u64, issue: &NewIssue) -> Result<Issue> {
        self.record("create_issue", true, project_id)?;
        let id = next_id(&mut self.inner.lock());
        let created = Issue {
            id,
            iid: issue.iid,
            title: issue.title.clone(),
            description: Some(issue.description.clone()),
            state: "opened".to_string(),
            labels: issue.labels.clone(),
            issue_type: issue.issue_type.clone(),
            confidential: issue.confidential,
            created_at: issue.created_at,
            due_date: issue.due_date,
            milestone: issue.milestone_id.map(|id| MilestoneRef { id }),
            author: author("Migration Bot"),
        };
        let stored = created.clone();
        self.with_project(project_id, move |p| p.issues.push(stored))?;
        Ok(created)
    }

    async fn close_issue(&self, project_id: u64, issue_iid: u64) -> Result<()> {
        self.record("close_issue", true, project_id)?;
        self.with_project(project_id, |p| {
            for issue in p.issues.iter_mut().filter(|i| i.iid == issue_iid) {
                issue.state = "closed".to_string();
            }
        })
    }

    async fn list_open_merge_requests(&self, project_id: u64) -> Result<Vec<MergeRequest>> {
        self.record("list_open_merge_requests", false, project_id)?;
        self.with_project(project_id, |p| p.merge_requests.clone())
    }

    async fn create_merge_request(
        &self,
        project_id: u64,
        merge_request: &NewMergeRequest,
    ) -> Result<MergeRequest> {
        self.record("create_merge_request", true, project_id)?;
        let id = next_id(&mut self.inner.lock());
        self.with_project(project_id, |p| {
            let created = MergeRequest {
                id,
                iid: p.merge_requests.len() as u64 + 1,
                title: merge_request.title.clone(),
                description: Some(merge_request.description.clone()),
                source_branch: merge_request.source_branch.clone(),
                target_branch: merge_request.target_branch.clone(),
                labels: merge_request.labels.clone(),
                milestone: merge_request.milestone_id.map(|id| MilestoneRef { id }),
                author: author("Migration Bot"),
            };
            p.merge_requests.push(created.clone());
            created
        })
    }

    async fn list_notes(&self, project_id: u64, target: NoteTarget) -> Result<Vec<Note>> {
        self.record("list_notes", false, project_id)?;
        self.with_project(project_id, |p| p.notes.get(&target).cloned().unwrap_or_default())
    }

    async fn create_note(&self, project_id: u64, target: NoteTarget, note: &NewNote) -> Result<()> {
        self.record("create_note", true, project_id)?;
        let id = next_id(&mut self.inner.lock());
        self.with_project(project_id, |p| {
            p.notes.entry(target).or_default().push(Note {
                id,
                body: note.body.clone(),
                system: false,
                confidential: note.confidential,
                created_at: note.created_at,
                author: author("Migration Bot"),
            })
        })
    }

    async fn list_wiki_pages(&self, project_id: u64) -> Result<Vec<WikiPage>> {
        self.record("list_wiki_pages", false, project_id)?;
        self.with_project(project_id, |p| p.wiki.clone())
    }

    async fn create_wiki_page(&self, project_id: u64, page: &NewWikiPage) -> Result<()> {
        self.record("create_wiki_page", true, project_id)?;
        self.with_project(project_id, |p| {
            p.wiki.push(WikiPage {
                slug: page.title.to_lowercase().replace(' ', "-"),
                title: page.title.clone(),
                content: page.content.clone(),
                format: page.format.clone(),
            })
        })
    }

    async fn list_pipelines(&self, project_id: u64) -> Result<Vec<Pipeline>> {
        self.record("list_pipelines", false, project_id)?;
        self.with_project(project_id, |p| p.pipelines.clone())
    }

    async fn delete_pipeline(&self, project_id: u64, pipeline_id: u64) -> Result<()> {
        self.record("delete_pipeline", true, project_id)?;
        self.with_project(project_id, |p| p.pipelines.retain(|pl| pl.id != pipeline_id))
    }

    async fn download_avatar(&self, url: &str, session_cookie: &str) -> Result<Option<Vec<u8>>> {
        self.record("download_avatar", false, 0)?;
        if session_cookie == VALID_COOKIE && url.ends_with(".png") {
            Ok(Some(vec![137, 80, 78, 71]))
        } else {
            Ok(None)
        }
    }
}

/// Transfer double: pushing to the destination protects `main` and starts
/// a pipeline, the way a real instance reacts to a first push.
pub struct FakeTransfer {
    dest: Arc<FakeForge>,
    pub pushes: Mutex<Vec<String>>,
    fail_push: Mutex<bool>,
}

impl FakeTransfer {
    pub fn new(dest: Arc<FakeForge>) -> Self {
        Self {
            dest,
            pushes: Mutex::new(Vec::new()),
            fail_push: Mutex::new(false),
        }
    }

    pub fn fail_next_push(&self) {
        *self.fail_push.lock() = true;
    }

    pub fn pushed_urls(&self) -> Vec<String> {
        self.pushes.lock().clone()
    }
}

#[async_trait]
impl RepositoryTransfer for FakeTransfer {
    async fn clone_repo(
        &self,
        _source_url: &str,
        _credentials: &GitCredentials,
    ) -> Result<WorkingCopy> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("repo.git");
        std::fs::create_dir_all(&path)?;
        std::fs::write(path.join("pack"), vec![0u8; 2048])?;
        Ok(WorkingCopy::in_temp_dir(dir, path))
    }

    async fn fetch_lfs(&self, copy: &WorkingCopy) -> Result<()> {
        std::fs::write(copy.path().join("lfs-object"), vec![0u8; 1024])?;
        Ok(())
    }

    async fn add_remote_and_push(
        &self,
        _copy: &WorkingCopy,
        dest_url: &str,
        _credentials: &GitCredentials,
    ) -> Result<()> {
        if std::mem::take(&mut *self.fail_push.lock()) {
            return Err(MigrationError::GitPushFailed("remote hung up".to_string()));
        }
        self.pushes.lock().push(dest_url.to_string());
        if let Some(project_id) = self.dest.project_by_url(dest_url) {
            self.dest.log("git_push", true, project_id);
            self.dest.protect_branch(project_id, "main");
            self.dest.add_pipeline(project_id, "pending");
            self.dest.add_pipeline(project_id, "success");
        }
        Ok(())
    }

    async fn push_lfs(&self, _copy: &WorkingCopy, _dest_url: &str) -> Result<()> {
        Ok(())
    }
}

/// Source tree used by most tests:
///
/// ```text
/// acme (1)
/// ├── website (10)             orphan
/// ├── platform (2)
/// │   ├── api (20)             milestones, issues, MRs, notes, wiki, ...
/// │   └── scratch (21)         no branches
/// ├── empty (3)
/// │   └── also-empty (4)
/// └── infra (5)
///     └── deep (6)
///         └── terraform (61)
/// ```
///
/// The destination holds `orphans` (50) and `mirror` (60).
pub struct Harness {
    pub source: Arc<FakeForge>,
    pub dest: Arc<FakeForge>,
    pub transfer: Arc<FakeTransfer>,
    pub dir: TempDir,
}

pub const SOURCE_ROOT: u64 = 1;
pub const ORPHAN_GROUP: u64 = 50;
pub const MAIN_GROUP: u64 = 60;

impl Harness {
    pub fn new() -> Self {
        let source = Arc::new(FakeForge::new("source.example", 5000));
        let dest = Arc::new(FakeForge::new("dest.example", 1000));
        let transfer = Arc::new(FakeTransfer::new(dest.clone()));

        source.add_group(SOURCE_ROOT, "acme", None);
        source.add_project(10, "website", SOURCE_ROOT, &["main"]);
        source.edit_project(10, |p| {
            p.labels.push(Label {
                name: "bug".to_string(),
                color: "#d9534f".to_string(),
                description: Some("Something is broken".to_string()),
                priority: Some(1),
            });
        });

        source.add_group(2, "platform", Some(SOURCE_ROOT));
        source.add_project(20, "api", 2, &["main", "release"]);
        source.edit_project(20, populate_api);
        source.add_project(21, "scratch", 2, &[]);

        source.add_group(3, "empty", Some(SOURCE_ROOT));
        source.add_group(4, "also-empty", Some(3));

        source.add_group(5, "infra", Some(SOURCE_ROOT));
        source.add_group(6, "deep", Some(5));
        source.add_project(61, "terraform", 6, &["main"]);

        dest.add_group(ORPHAN_GROUP, "orphans", None);
        dest.add_group(MAIN_GROUP, "mirror", None);

        Self {
            source,
            dest,
            transfer,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn state_path(&self) -> std::path::PathBuf {
        self.dir.path().join("state.json")
    }

    pub fn config(&self) -> MigrationConfig {
        MigrationConfig::new(
            Endpoint::new("source.example", "source-token"),
            Endpoint::new("dest.example", "dest-token"),
            SOURCE_ROOT,
            ORPHAN_GROUP,
        )
        .with_main_group(MAIN_GROUP)
        .with_pause(Duration::ZERO)
        .with_state_file(self.state_path())
    }

    pub fn migrator(&self, config: MigrationConfig) -> Result<Migrator> {
        Migrator::new(
            config,
            Collaborators {
                source: self.source.clone(),
                dest: self.dest.clone(),
                transfer: self.transfer.clone(),
                source_credentials: GitCredentials::new("migrator", "source-token"),
                dest_credentials: GitCredentials::new("migrator", "dest-token"),
            },
        )
    }

    pub async fn run(&self) -> Result<MigrationSummary> {
        self.migrator(self.config())?.run().await
    }

    pub fn saved_state(&self) -> MigrationState {
        StateStore::open(self.state_path()).load().unwrap()
    }

    /// The single destination copy of a source project.
    pub fn dest_project(&self, name: &str) -> ProjectData {
        let mut copies = self.dest.projects_named(name);
        assert_eq!(copies.len(), 1, "expected exactly one copy of {name}");
        copies.remove(0)
    }
}

fn populate_api(p: &mut ProjectData) {
    p.variables.push(Variable {
        key: "DEPLOY_TOKEN".to_string(),
        value: "s3cret".to_string(),
        environment_scope: "production".to_string(),
        masked: true,
        protected: true,
        variable_type: "env_var".to_string(),
    });
    p.protected_branches = vec![
        ProtectedBranch {
            name: "main".to_string(),
            push_access_levels: vec![AccessLevel { access_level: 40 }],
            merge_access_levels: vec![AccessLevel { access_level: 30 }],
            unprotect_access_levels: Vec::new(),
            allow_force_push: false,
        },
        ProtectedBranch {
            name: "release".to_string(),
            push_access_levels: Vec::new(),
            merge_access_levels: vec![AccessLevel { access_level: 40 }],
            unprotect_access_levels: vec![AccessLevel { access_level: 60 }],
            allow_force_push: true,
        },
    ];
    p.protected_tags = vec![ProtectedTag {
        name: "v*".to_string(),
        create_access_levels: vec![AccessLevel { access_level: 40 }],
    }];
    p.milestones = vec![
        Milestone {
            id: 200,
            title: "1.0".to_string(),
            description: Some("First release".to_string()),
            due_date: None,
            start_date: None,
        },
        Milestone {
            id: 201,
            title: "2.0".to_string(),
            description: None,
            due_date: None,
            start_date: None,
        },
    ];
    p.issues = vec![
        Issue {
            id: 300,
            iid: 1,
            title: "Crash on start".to_string(),
            description: Some("It crashes.".to_string()),
            state: "closed".to_string(),
            labels: vec!["bug".to_string()],
            issue_type: Some("issue".to_string()),
            confidential: false,
            created_at: at(1),
            due_date: None,
            milestone: Some(MilestoneRef { id: 200 }),
            author: author("Ada Lovelace"),
        },
        Issue {
            id: 301,
            iid: 2,
            title: "Add metrics".to_string(),
            description: None,
            state: "opened".to_string(),
            labels: Vec::new(),
            issue_type: Some("issue".to_string()),
            confidential: true,
            created_at: at(2),
            due_date: None,
            milestone: Some(MilestoneRef { id: 201 }),
            author: author("Grace Hopper"),
        },
        Issue {
            id: 302,
            iid: 3,
            title: "Group-level planning".to_string(),
            description: Some("Tracked at group level".to_string()),
            state: "opened".to_string(),
            labels: Vec::new(),
            issue_type: None,
            confidential: false,
            created_at: at(3),
            due_date: None,
            milestone: Some(MilestoneRef { id: 999 }),
            author: author("Grace Hopper"),
        },
    ];
    p.merge_requests = vec![MergeRequest {
        id: 400,
        iid: 7,
        title: "Fix crash".to_string(),
        description: Some("Closes #1".to_string()),
        source_branch: "fix-crash".to_string(),
        target_branch: "main".to_string(),
        labels: vec!["bug".to_string()],
        milestone: Some(MilestoneRef { id: 200 }),
        author: author("Ada Lovelace"),
    }];
    p.notes.insert(
        NoteTarget::Issue(1),
        vec![
            Note {
                id: 500,
                body: "Reproduced on Linux".to_string(),
                system: false,
                confidential: false,
                created_at: at(4),
                author: author("Grace Hopper"),
            },
            Note {
                id: 501,
                body: "closed".to_string(),
                system: true,
                confidential: false,
                created_at: at(5),
                author: author("Ada Lovelace"),
            },
        ],
    );
    p.notes.insert(
        NoteTarget::MergeRequest(7),
        vec![Note {
            id: 502,
            body: "LGTM".to_string(),
            system: false,
            confidential: false,
            created_at: at(6),
            author: author("Grace Hopper"),
        }],
    );
    p.wiki = vec![WikiPage {
        slug: "home".to_string(),
        title: "Home".to_string(),
        content: "Welcome to the API".to_string(),
        format: "markdown".to_string(),
    }];
}
