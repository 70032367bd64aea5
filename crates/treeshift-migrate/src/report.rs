//! Per-project counts and whole-run totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What was copied into one destination project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub labels: usize,
    pub variables: usize,
    /// Bytes of git data in the staging clone.
    pub git_bytes: u64,
    /// Additional bytes fetched by git-lfs.
    pub lfs_bytes: u64,
    pub protected_tags: usize,
    pub protected_branches: usize,
    pub milestones: usize,
    pub merge_requests: usize,
    pub merge_request_notes: usize,
    pub issues: usize,
    pub issue_notes: usize,
    pub wiki_pages: usize,
    pub pipelines_halted: usize,
    pub avatar_migrated: bool,
}

impl ProjectReport {
    /// Number of child entities created, excluding repository data.
    pub fn total_entities(&self) -> usize {
        self.labels
            + self.variables
            + self.protected_tags
            + self.protected_branches
            + self.milestones
            + self.merge_requests
            + self.merge_request_notes
            + self.issues
            + self.issue_notes
            + self.wiki_pages
    }
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub dry_run: bool,
    pub groups_created: usize,
    /// Groups found in the statefile and not created again.
    pub groups_reused: usize,
    /// Groups without any project in their subtree.
    pub groups_skipped: usize,
    pub projects_migrated: usize,
    /// Projects already marked done in the statefile.
    pub projects_already_done: usize,
    /// Partially migrated projects that were deleted and migrated again.
    pub projects_retried: usize,
    /// Projects without any branch.
    pub projects_skipped: usize,
    /// Projects a dry run would have migrated.
    pub projects_planned: usize,
    pub entities_migrated: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl MigrationSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    /// Fold one finished project into the totals.
    pub fn record_project(&mut self, report: &ProjectReport) {
        self.projects_migrated += 1;
        self.entities_migrated += report.total_entities();
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Print a summary of the run.
    pub fn print_summary(&self) {
        if self.dry_run {
            println!("\n=== Dry Run Summary (nothing was written) ===\n");
        } else {
            println!("\n=== Migration Summary ===\n");
        }
        println!("Groups created:           {}", self.groups_created);
        println!("Groups already migrated:  {}", self.groups_reused);
        println!("Groups skipped (empty):   {}", self.groups_skipped);
        if self.dry_run {
            println!("Projects planned:         {}", self.projects_planned);
        } else {
            println!("Projects migrated:        {}", self.projects_migrated);
            println!("  of which retried:       {}", self.projects_retried);
        }
        println!("Projects already done:    {}", self.projects_already_done);
        println!("Projects skipped (empty): {}", self.projects_skipped);
        println!("Entities migrated:        {}", self.entities_migrated);

        if let Some(duration) = self.duration() {
            println!("\nCompleted in {} seconds", duration.num_seconds());
        }
    }
}

/// Human readable size in binary units, at most two decimals.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    if bytes == 0 {
        return "0B".to_string();
    }

    let mut unit = 0;
    let mut size = bytes as f64;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    let rounded = (size * 100.0).round() / 100.0;
    format!("{rounded}{}", UNITS[unit])
}
