//! Per-group lifecycle: a group is either not yet created or created.
//!
//! A destination group is recorded in the statefile right after it is
//! created and before any of its children are migrated, so a crash while
//! migrating children never creates the group a second time.

use crate::entities;
use crate::error::{MigrationError, Result};
use crate::planner::{Migrator, Target};
use crate::types::{Group, NewGroup};

use futures::future::{BoxFuture, FutureExt};
use tracing::{info, instrument, warn};

impl Migrator {
    /// Migrate a subgroup if its subtree holds any project.
    pub(crate) fn migrate_subgroup<'a>(
        &'a mut self,
        group: &'a Group,
        parent: &'a Target,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if !self.probe(group).await? {
                warn!(
                    "Group {} contains no projects in its subtree and will not be migrated",
                    group.full_path
                );
                self.summary.groups_skipped += 1;
                return Ok(());
            }
            self.migrate_group(group, parent).await
        }
        .boxed()
    }

    /// Create (or recover) the destination copy of `source` below `parent`,
    /// then migrate its projects and its subgroups.
    #[instrument(skip_all, fields(group = %source.full_path))]
    pub async fn migrate_group(&mut self, source: &Group, parent: &Target) -> Result<()> {
        if !self.visited.insert(source.id) {
            return Err(MigrationError::CycleDetected(source.id));
        }

        let full_path = parent.child_path(&source.path);
        info!(
            "Migrating group {} to destination namespace {full_path}",
            source.full_path
        );

        let target = match self.state.group_dest(source.id) {
            Some(dest_id) => {
                info!("Group {} already migrated", source.full_path);
                self.summary.groups_reused += 1;
                Target::Group {
                    id: dest_id,
                    full_path,
                }
            }
            None if self.config.dry_run => {
                warn!(
                    "DRY RUN: group {} will not be created at {full_path}",
                    source.full_path
                );
                Target::Planned { full_path }
            }
            None => self.create_group(source, parent, full_path).await?,
        };

        let projects = self.source.list_projects(source.id).await?;
        for project in &projects {
            self.migrate_project(project, &target).await?;
        }

        let children = self.source.list_subgroups(source.id).await?;
        for child in &children {
            self.migrate_subgroup(child, &target).await?;
        }

        Ok(())
    }

    async fn create_group(
        &mut self,
        source: &Group,
        parent: &Target,
        full_path: String,
    ) -> Result<Target> {
        let parent_id = match parent {
            Target::Root => None,
            Target::Group { id, .. } => Some(*id),
            Target::Planned { .. } => {
                return Err(MigrationError::UnsupportedFeature(format!(
                    "cannot create {full_path} below a group that was never created"
                )))
            }
        };

        // Fetched before creation: once the group is recorded there is no
        // second chance to copy its avatar.
        let avatar = entities::fetch_avatar(
            self.source.as_ref(),
            source.avatar_url.as_deref(),
            self.config.session_cookie.as_deref(),
            &format!("group {}", source.full_path),
        )
        .await?;

        let created = self
            .dest
            .create_group(&NewGroup {
                name: source.name.clone(),
                path: source.path.clone(),
                parent_id,
                description: source.description.clone(),
            })
            .await?;

        self.state.record_group(source.id, created.id);
        self.store.persist(&self.state)?;
        self.summary.groups_created += 1;
        info!(dest_id = created.id, "Created group {full_path}");

        // The group is already recorded and never revisited, so a failed
        // upload only warns.
        if let Some((filename, image)) = avatar {
            if let Err(e) = self
                .dest
                .set_group_avatar(created.id, &filename, image)
                .await
            {
                warn!("Failed to set avatar of group {full_path}: {e}");
            }
        }

        let full_path = if created.full_path.is_empty() {
            full_path
        } else {
            created.full_path
        };
        Ok(Target::Group {
            id: created.id,
            full_path,
        })
    }
}
