//! Walks the source tree and drives the group and project state machines.
//!
//! The walk is strictly sequential: orphan projects of the source root first,
//! then each subgroup of the root, depth first. A subgroup whose subtree has
//! no project at all is skipped.

use crate::config::MigrationConfig;
use crate::error::{MigrationError, Result};
use crate::progress::MigrationProgress;
use crate::provider::{GitCredentials, RepositoryProvider, RepositoryTransfer};
use crate::report::MigrationSummary;
use crate::state::{MigrationState, StateStore};
use crate::types::Group;

use futures::future::{BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Where migrated objects are created on the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The destination instance root. Only groups can be created here.
    Root,
    /// An existing destination group.
    Group { id: u64, full_path: String },
    /// A group a dry run would have created.
    Planned { full_path: String },
}

impl Target {
    /// Destination group id, if the group exists.
    pub fn group_id(&self) -> Option<u64> {
        match self {
            Self::Group { id, .. } => Some(*id),
            Self::Root | Self::Planned { .. } => None,
        }
    }

    /// Full path a child with `path` gets below this target.
    pub fn child_path(&self, path: &str) -> String {
        match self {
            Self::Root => path.to_string(),
            Self::Group { full_path, .. } | Self::Planned { full_path } => {
                format!("{full_path}/{path}")
            }
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "(instance root)"),
            Self::Group { full_path, .. } | Self::Planned { full_path } => {
                write!(f, "{full_path}")
            }
        }
    }
}

/// The external systems a migration talks to.
pub struct Collaborators {
    pub source: Arc<dyn RepositoryProvider>,
    pub dest: Arc<dyn RepositoryProvider>,
    pub transfer: Arc<dyn RepositoryTransfer>,
    /// Git credentials for cloning from the source.
    pub source_credentials: GitCredentials,
    /// Git credentials for pushing to the destination.
    pub dest_credentials: GitCredentials,
}

/// Migrates one source group tree into the destination.
pub struct Migrator {
    pub(crate) source: Arc<dyn RepositoryProvider>,
    pub(crate) dest: Arc<dyn RepositoryProvider>,
    pub(crate) transfer: Arc<dyn RepositoryTransfer>,
    pub(crate) source_credentials: GitCredentials,
    pub(crate) dest_credentials: GitCredentials,
    pub(crate) config: MigrationConfig,
    pub(crate) store: StateStore,
    pub(crate) state: MigrationState,
    pub(crate) progress: MigrationProgress,
    pub(crate) summary: MigrationSummary,
    /// Groups entered by the walk, to detect non-tree hierarchies.
    pub(crate) visited: HashSet<u64>,
    probe_cache: HashMap<u64, bool>,
}

impl Migrator {
    /// Validate the configuration and load prior progress from the statefile.
    ///
    /// Dry runs open the statefile append-only and never write to it.
    pub fn new(config: MigrationConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let store = if config.dry_run {
            StateStore::open_append_only(&config.state_file)?
        } else {
            StateStore::open(&config.state_file)
        };
        let state = store.load()?;
        debug!(
            groups = state.group.len(),
            projects = state.project.len(),
            "Loaded statefile"
        );

        Ok(Self {
            source: collaborators.source,
            dest: collaborators.dest,
            transfer: collaborators.transfer,
            source_credentials: collaborators.source_credentials,
            dest_credentials: collaborators.dest_credentials,
            summary: MigrationSummary::new(config.dry_run),
            config,
            store,
            state,
            progress: MigrationProgress::new(),
            visited: HashSet::new(),
            probe_cache: HashMap::new(),
        })
    }

    /// Set a progress tracker.
    pub fn with_progress(mut self, progress: MigrationProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Progress recorded so far.
    pub fn state(&self) -> &MigrationState {
        &self.state
    }

    pub fn summary(&self) -> &MigrationSummary {
        &self.summary
    }

    /// Run the migration.
    pub async fn run(&mut self) -> Result<MigrationSummary> {
        if self.config.dry_run {
            info!("DRY RUN: nothing will be written to the destination");
        }
        info!("Starting migration...");

        debug!("Retrieving source group");
        let root = self.source.get_group(self.config.source_group).await?;
        // Each run walks the tree afresh.
        self.visited.clear();
        self.probe_cache.clear();
        self.summary = MigrationSummary::new(self.config.dry_run);
        self.visited.insert(root.id);

        let orphan_target = self.destination_group(self.config.orphan_group).await?;
        let main_target = self.destination_group(self.config.main_group).await?;

        debug!("Enumerating orphans");
        let orphans = self.source.list_projects(root.id).await?;
        if orphans.is_empty() {
            info!("No orphans to migrate");
        } else {
            info!("Migrating {} orphans...", orphans.len());
            for project in &orphans {
                self.migrate_project(project, &orphan_target).await?;
            }
        }
        info!("Finished migrating orphans");

        debug!("Enumerating subgroups");
        let subgroups = self.source.list_subgroups(root.id).await?;
        if subgroups.is_empty() {
            info!("No subgroups to migrate");
        } else {
            info!("Migrating {} subgroups...", subgroups.len());
            for group in &subgroups {
                self.migrate_subgroup(group, &main_target).await?;
            }
        }
        info!("Finished migrating subgroups");

        self.summary.complete();
        info!(
            groups_created = self.summary.groups_created,
            projects_migrated = self.summary.projects_migrated,
            "Migration complete"
        );
        Ok(self.summary.clone())
    }

    /// Resolve a configured destination group; 0 is the instance root.
    async fn destination_group(&self, gid: u64) -> Result<Target> {
        if gid == 0 {
            return Ok(Target::Root);
        }
        let group = self.dest.get_group(gid).await?;
        Ok(Target::Group {
            id: group.id,
            full_path: group.full_path,
        })
    }

    /// Whether the subtree rooted at `group` holds at least one project.
    pub async fn probe(&mut self, group: &Group) -> Result<bool> {
        let mut stack = Vec::new();
        self.probe_group(group.id, &mut stack).await
    }

    fn probe_group<'a>(
        &'a mut self,
        group_id: u64,
        stack: &'a mut Vec<u64>,
    ) -> BoxFuture<'a, Result<bool>> {
        async move {
            if let Some(&known) = self.probe_cache.get(&group_id) {
                return Ok(known);
            }
            if stack.contains(&group_id) {
                return Err(MigrationError::CycleDetected(group_id));
            }

            let projects = self.source.list_projects(group_id).await?;
            let found = if !projects.is_empty() {
                true
            } else {
                stack.push(group_id);
                let children = self.source.list_subgroups(group_id).await?;
                let mut found = false;
                for child in children {
                    if self.probe_group(child.id, stack).await? {
                        found = true;
                        break;
                    }
                }
                stack.pop();
                found
            };

            self.probe_cache.insert(group_id, found);
            Ok(found)
        }
        .boxed()
    }

    /// Pause to let the destination settle after heavy writes.
    pub(crate) async fn pause(&self) {
        if self.config.pause.is_zero() {
            return;
        }
        debug!(
            seconds = self.config.pause.as_secs_f64(),
            "Letting the destination breathe"
        );
        tokio::time::sleep(self.config.pause).await;
    }
}
