//! Copies the child entities of one project.
//!
//! Every function reads from `source` and creates on `dest` without looking
//! for existing copies, except for protection rules which the destination
//! may already have set up on its own. Re-running a function against the
//! same destination project therefore duplicates entities; the project state
//! machine only ever fills freshly created projects.

use crate::error::Result;
use crate::provider::{GitCredentials, RepositoryProvider, RepositoryTransfer};
use crate::remap::IdRemapTable;
use crate::types::*;

use tracing::{debug, warn};

/// Prefix marking notes generated by the source instance itself.
pub const SYSTEM_NOTE_PREFIX: &str = "[SYSTEM NOTE] ";

/// Attribute a body to its original author, since authorship cannot be
/// reassigned on the destination.
pub fn attributed(author: &UserRef, body: &str) -> String {
    format!("By {}: {body}", author.name)
}

/// Body of a copied note.
pub fn note_body(note: &Note) -> String {
    let prefix = if note.system { SYSTEM_NOTE_PREFIX } else { "" };
    format!("{prefix}{}", attributed(&note.author, &note.body))
}

pub async fn migrate_labels(
    source: &dyn RepositoryProvider,
    dest: &dyn RepositoryProvider,
    source_project: u64,
    dest_project: u64,
) -> Result<usize> {
    let mut count = 0;
    for label in source.list_labels(source_project).await? {
        debug!(label = %label.name, "Migrating label");
        dest.create_label(dest_project, &label).await?;
        count += 1;
    }
    Ok(count)
}

pub async fn migrate_variables(
    source: &dyn RepositoryProvider,
    dest: &dyn RepositoryProvider,
    source_project: u64,
    dest_project: u64,
) -> Result<usize> {
    let mut count = 0;
    for variable in source.list_variables(source_project).await? {
        debug!(key = %variable.key, "Migrating variable");
        dest.create_variable(dest_project, &variable).await?;
        count += 1;
    }
    Ok(count)
}

/// Copy repository history and LFS objects.
///
/// Returns the size of the git data and the extra size of the LFS objects.
pub async fn migrate_repository(
    transfer: &dyn RepositoryTransfer,
    source_url: &str,
    dest_url: &str,
    source_credentials: &GitCredentials,
    dest_credentials: &GitCredentials,
) -> Result<(u64, u64)> {
    debug!(from = %source_url, "Cloning");
    let copy = transfer.clone_repo(source_url, source_credentials).await?;
    let git_bytes = copy.disk_usage();

    debug!("Pulling LFS history");
    transfer.fetch_lfs(&copy).await?;
    let lfs_bytes = copy.disk_usage().saturating_sub(git_bytes);

    debug!(to = %dest_url, "Pushing");
    transfer
        .add_remote_and_push(&copy, dest_url, dest_credentials)
        .await?;
    transfer.push_lfs(&copy, dest_url).await?;

    Ok((git_bytes, lfs_bytes))
}

pub async fn migrate_protected_tags(
    source: &dyn RepositoryProvider,
    dest: &dyn RepositoryProvider,
    source_project: u64,
    dest_project: u64,
) -> Result<usize> {
    let existing = dest.list_protected_tags(dest_project).await?;
    let mut count = 0;
    for tag in source.list_protected_tags(source_project).await? {
        if existing.iter().any(|e| e.name == tag.name) {
            debug!(tag = %tag.name, "Tag already protected on destination");
            continue;
        }
        dest.create_protected_tag(
            dest_project,
            &NewProtectedTag {
                name: tag.name.clone(),
                create_access_level: first_access_level(&tag.create_access_levels),
            },
        )
        .await?;
        count += 1;
    }
    Ok(count)
}

pub async fn migrate_protected_branches(
    source: &dyn RepositoryProvider,
    dest: &dyn RepositoryProvider,
    source_project: u64,
    dest_project: u64,
) -> Result<usize> {
    // The destination usually protects the default branch on first push.
    let existing = dest.list_protected_branches(dest_project).await?;
    let mut count = 0;
    for rule in source.list_protected_branches(source_project).await? {
        if existing.iter().any(|e| e.name == rule.name) {
            debug!(branch = %rule.name, "Branch already protected on destination");
            continue;
        }
        dest.create_protected_branch(
            dest_project,
            &NewProtectedBranch {
                name: rule.name.clone(),
                push_access_level: first_access_level(&rule.push_access_levels),
                merge_access_level: first_access_level(&rule.merge_access_levels),
                unprotect_access_level: first_access_level(&rule.unprotect_access_levels),
                allow_force_push: rule.allow_force_push,
            },
        )
        .await?;
        count += 1;
    }
    Ok(count)
}

/// Copy milestones, recording each new destination id in `remap`.
pub async fn migrate_milestones(
    source: &dyn RepositoryProvider,
    dest: &dyn RepositoryProvider,
    source_project: u64,
    dest_project: u64,
    remap: &mut IdRemapTable,
) -> Result<usize> {
    let mut count = 0;
    for stone in source.list_milestones(source_project).await? {
        let created = dest
            .create_milestone(
                dest_project,
                &NewMilestone {
                    title: stone.title.clone(),
                    description: stone.description.clone(),
                    due_date: stone.due_date,
                    start_date: stone.start_date,
                },
            )
            .await?;
        remap.insert_milestone(stone.id, created.id);
        count += 1;
    }
    Ok(count)
}

/// Destination milestone for a source reference.
///
/// References to milestones that were not migrated with this project are
/// dropped rather than passed through with the source id.
fn remap_milestone(
    remap: &IdRemapTable,
    reference: Option<MilestoneRef>,
    owner: &str,
) -> Option<u64> {
    let source_id = reference?.id;
    let dest_id = remap.milestone(source_id);
    if dest_id.is_none() {
        warn!(
            milestone = source_id,
            "Milestone of {owner} is not a project milestone and will not be linked"
        );
    }
    dest_id
}

pub async fn migrate_notes(
    source: &dyn RepositoryProvider,
    dest: &dyn RepositoryProvider,
    source_project: u64,
    source_target: NoteTarget,
    dest_project: u64,
    dest_target: NoteTarget,
) -> Result<usize> {
    let mut count = 0;
    for note in source.list_notes(source_project, source_target).await? {
        dest.create_note(
            dest_project,
            dest_target,
            &NewNote {
                body: note_body(&note),
                confidential: note.confidential,
                created_at: note.created_at,
            },
        )
        .await?;
        count += 1;
    }
    Ok(count)
}

/// Copy open merge requests and their notes.
///
/// Returns the number of merge requests and the number of notes.
pub async fn migrate_merge_requests(
    source: &dyn RepositoryProvider,
    dest: &dyn RepositoryProvider,
    source_project: u64,
    dest_project: u64,
    remap: &IdRemapTable,
) -> Result<(usize, usize)> {
    let mut count = 0;
    let mut note_count = 0;
    for mr in source.list_open_merge_requests(source_project).await? {
        let request = NewMergeRequest {
            source_branch: mr.source_branch.clone(),
            target_branch: mr.target_branch.clone(),
            title: mr.title.clone(),
            description: attributed(&mr.author, mr.description.as_deref().unwrap_or_default()),
            labels: mr.labels.clone(),
            milestone_id: remap_milestone(
                remap,
                mr.milestone,
                &format!("merge request !{}", mr.iid),
            ),
        };
        let created = dest.create_merge_request(dest_project, &request).await?;
        count += 1;

        note_count += migrate_notes(
            source,
            dest,
            source_project,
            NoteTarget::MergeRequest(mr.iid),
            dest_project,
            NoteTarget::MergeRequest(created.iid),
        )
        .await?;
    }
    Ok((count, note_count))
}

/// Copy issues and their notes, closing those closed on the source.
///
/// Returns the number of issues and the number of notes.
pub async fn migrate_issues(
    source: &dyn RepositoryProvider,
    dest: &dyn RepositoryProvider,
    source_project: u64,
    dest_project: u64,
    remap: &IdRemapTable,
) -> Result<(usize, usize)> {
    let mut count = 0;
    let mut note_count = 0;
    for issue in source.list_issues(source_project).await? {
        let request = NewIssue {
            title: issue.title.clone(),
            iid: issue.iid,
            description: attributed(
                &issue.author,
                issue.description.as_deref().unwrap_or_default(),
            ),
            labels: issue.labels.clone(),
            issue_type: issue.issue_type.clone(),
            confidential: issue.confidential,
            created_at: issue.created_at,
            milestone_id: remap_milestone(remap, issue.milestone, &format!("issue #{}", issue.iid)),
            due_date: issue.due_date,
        };
        let created = dest.create_issue(dest_project, &request).await?;
        count += 1;

        note_count += migrate_notes(
            source,
            dest,
            source_project,
            NoteTarget::Issue(issue.iid),
            dest_project,
            NoteTarget::Issue(created.iid),
        )
        .await?;

        if issue.is_closed() {
            dest.close_issue(dest_project, created.iid).await?;
        }
    }
    Ok((count, note_count))
}

pub async fn migrate_wiki(
    source: &dyn RepositoryProvider,
    dest: &dyn RepositoryProvider,
    source_project: u64,
    dest_project: u64,
) -> Result<usize> {
    let mut count = 0;
    for page in source.list_wiki_pages(source_project).await? {
        debug!(slug = %page.slug, "Migrating wiki page");
        dest.create_wiki_page(
            dest_project,
            &NewWikiPage {
                title: page.title.clone(),
                content: page.content.clone(),
                format: page.format.clone(),
            },
        )
        .await?;
        count += 1;
    }
    Ok(count)
}

/// Delete every pipeline on the destination project that could still run.
///
/// Pushing history may trigger pipelines the destination has no runners or
/// secrets for.
pub async fn halt_pipelines(dest: &dyn RepositoryProvider, dest_project: u64) -> Result<usize> {
    let mut count = 0;
    for pipeline in dest.list_pipelines(dest_project).await? {
        if pipeline.is_terminal() {
            debug!(
                pipeline = pipeline.id,
                status = %pipeline.status,
                "Pipeline is finished; no action taken"
            );
            continue;
        }
        debug!(pipeline = pipeline.id, "Destroying pipeline");
        dest.delete_pipeline(dest_project, pipeline.id).await?;
        count += 1;
    }
    Ok(count)
}

/// Fetch an avatar image from the source.
///
/// Returns the file name and bytes, or `None` when there is no avatar, no
/// session cookie, or the source refuses to hand it out.
pub async fn fetch_avatar(
    source: &dyn RepositoryProvider,
    avatar_url: Option<&str>,
    session_cookie: Option<&str>,
    owner: &str,
) -> Result<Option<(String, Vec<u8>)>> {
    let Some(url) = avatar_url else {
        return Ok(None);
    };
    let Some(cookie) = session_cookie else {
        warn!("Avatar of {owner} will not be migrated due to missing session cookie");
        return Ok(None);
    };

    match source.download_avatar(url, cookie).await? {
        Some(image) => Ok(Some((avatar_filename(url), image))),
        None => {
            warn!("Failed to retrieve avatar from {url}");
            Ok(None)
        }
    }
}

fn avatar_filename(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("avatar.png")
        .to_string()
}
