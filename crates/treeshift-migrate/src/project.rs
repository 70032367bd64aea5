//! Per-project lifecycle: not seen, pending (created, content incomplete), done.
//!
//! A destination project is recorded as pending before any content is
//! copied into it and marked done only after the last fill step. A pending
//! entry found on startup means the previous run died mid-fill: the
//! destination project is deleted and migrated again from scratch.

use crate::entities;
use crate::error::{MigrationError, Result};
use crate::planner::{Migrator, Target};
use crate::progress::MigrationPhase;
use crate::remap::IdRemapTable;
use crate::report::{format_bytes, ProjectReport};
use crate::types::{NewProject, Project};

use tracing::{debug, info, instrument, warn};

impl Migrator {
    /// Migrate one project into `target`.
    ///
    /// Returns the per-entity counts, or `None` when nothing was migrated
    /// (already done, skipped, or dry run).
    #[instrument(skip_all, fields(project = %source.name))]
    pub async fn migrate_project(
        &mut self,
        source: &Project,
        target: &Target,
    ) -> Result<Option<ProjectReport>> {
        let name = &source.name;
        let source_ns = &source.namespace.full_path;
        info!("Migrating project {name} from namespace {source_ns} to {target}");

        if let Some(entry) = self.state.project_entry(source.id) {
            if entry.done {
                info!("Project {name} already migrated");
                self.summary.projects_already_done += 1;
                return Ok(None);
            }

            warn!(
                dest_id = entry.id,
                "Project {name} was only partially migrated; deleting it and starting over"
            );
            if !self.config.dry_run {
                self.discard_partial_project(source.id, entry.id).await?;
            }
        }

        let branches = self.source.list_branches(source.id).await?;
        if branches.is_empty() {
            warn!("Project {name} in {source_ns} has no branches and will not be migrated");
            self.summary.projects_skipped += 1;
            return Ok(None);
        }

        if self.config.dry_run {
            warn!("DRY RUN: project {name} from namespace {source_ns} will not be migrated");
            self.summary.projects_planned += 1;
            return Ok(None);
        }

        let namespace_id = target.group_id().ok_or_else(|| {
            MigrationError::InvalidConfig(format!(
                "project {name} cannot be created in {target}: projects need a destination group"
            ))
        })?;

        self.progress.start_project(name);
        debug!("Creating project {name} in namespace ID {namespace_id}");
        let created = self
            .dest
            .create_project(&NewProject {
                name: source.name.clone(),
                path: source.path.clone(),
                namespace_id,
                description: source.description.clone(),
            })
            .await?;

        self.state.record_pending_project(source.id, created.id);
        self.store.persist(&self.state)?;

        let report = self.fill_project(source, &created).await?;

        self.state.mark_project_done(source.id);
        self.store.persist(&self.state)?;
        self.progress.set_phase(MigrationPhase::Complete);

        log_report(name, &report);
        self.summary.record_project(&report);
        Ok(Some(report))
    }

    /// Delete-and-retry: remove a partially filled destination project and
    /// its statefile entry.
    async fn discard_partial_project(&mut self, source_id: u64, dest_id: u64) -> Result<()> {
        match self.dest.delete_project(dest_id).await {
            Ok(()) => debug!(dest_id, "Deleted partial project"),
            Err(MigrationError::NotFound(_)) => {
                debug!(dest_id, "Partial project is already gone");
            }
            Err(e) => return Err(e),
        }

        self.state.forget_project(source_id);
        self.store.persist(&self.state)?;
        self.summary.projects_retried += 1;

        self.pause().await;
        Ok(())
    }

    /// Copy every kind of child entity, in dependency order.
    async fn fill_project(&self, source: &Project, dest: &Project) -> Result<ProjectReport> {
        let src = self.source.as_ref();
        let dst = self.dest.as_ref();
        let (sid, did) = (source.id, dest.id);
        let mut report = ProjectReport::default();

        let avatar = entities::fetch_avatar(
            src,
            source.avatar_url.as_deref(),
            self.config.session_cookie.as_deref(),
            &format!("project {}", source.name),
        )
        .await?;
        if let Some((filename, image)) = avatar {
            dst.set_project_avatar(did, &filename, image).await?;
            report.avatar_migrated = true;
        }

        self.progress.set_phase(MigrationPhase::MigratingLabels);
        report.labels = entities::migrate_labels(src, dst, sid, did).await?;

        self.progress.set_phase(MigrationPhase::MigratingVariables);
        report.variables = entities::migrate_variables(src, dst, sid, did).await?;

        self.progress.set_phase(MigrationPhase::TransferringRepository);
        debug!("Starting repository migration");
        let (git_bytes, lfs_bytes) = entities::migrate_repository(
            self.transfer.as_ref(),
            &source.http_url_to_repo,
            &dest.http_url_to_repo,
            &self.source_credentials,
            &self.dest_credentials,
        )
        .await?;
        report.git_bytes = git_bytes;
        report.lfs_bytes = lfs_bytes;
        self.pause().await;

        self.progress.set_phase(MigrationPhase::MigratingProtectedTags);
        report.protected_tags = entities::migrate_protected_tags(src, dst, sid, did).await?;

        self.progress.set_phase(MigrationPhase::MigratingProtectedBranches);
        report.protected_branches =
            entities::migrate_protected_branches(src, dst, sid, did).await?;

        self.progress.set_phase(MigrationPhase::MigratingMilestones);
        let mut remap = IdRemapTable::new();
        report.milestones = entities::migrate_milestones(src, dst, sid, did, &mut remap).await?;

        self.progress.set_phase(MigrationPhase::MigratingMergeRequests);
        let (mrs, mr_notes) = entities::migrate_merge_requests(src, dst, sid, did, &remap).await?;
        report.merge_requests = mrs;
        report.merge_request_notes = mr_notes;

        self.progress.set_phase(MigrationPhase::MigratingIssues);
        let (issues, issue_notes) = entities::migrate_issues(src, dst, sid, did, &remap).await?;
        report.issues = issues;
        report.issue_notes = issue_notes;

        self.progress.set_phase(MigrationPhase::MigratingWiki);
        report.wiki_pages = entities::migrate_wiki(src, dst, sid, did).await?;

        self.progress.set_phase(MigrationPhase::HaltingPipelines);
        report.pipelines_halted = entities::halt_pipelines(dst, did).await?;

        Ok(report)
    }
}

fn log_report(name: &str, report: &ProjectReport) {
    if report.variables > 0 {
        info!("Migrated {} variables in project {name}", report.variables);
    }
    if report.labels > 0 {
        info!("Migrated {} labels in project {name}", report.labels);
    }
    info!(
        "Migrated {} (plus {} in LFS) repository data in project {name}",
        format_bytes(report.git_bytes),
        format_bytes(report.lfs_bytes)
    );
    if report.protected_tags > 0 {
        info!("Migrated {} protected tags in project {name}", report.protected_tags);
    }
    if report.protected_branches > 0 {
        info!(
            "Migrated {} protected branches in project {name}",
            report.protected_branches
        );
    }
    if report.milestones > 0 {
        info!("Migrated {} milestones in project {name}", report.milestones);
    }
    if report.merge_requests > 0 {
        info!(
            "Migrated {} open merge requests, containing {} notes, in project {name}",
            report.merge_requests, report.merge_request_notes
        );
    }
    if report.issues > 0 {
        info!(
            "Migrated {} issues, containing {} notes, in project {name}",
            report.issues, report.issue_notes
        );
    }
    if report.wiki_pages > 0 {
        info!("Migrated {} wiki pages in project {name}", report.wiki_pages);
    }
    if report.pipelines_halted > 0 {
        info!(
            "Removed {} pending CI pipelines in project {name}",
            report.pipelines_halted
        );
    }
}
