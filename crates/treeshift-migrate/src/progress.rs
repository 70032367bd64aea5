//! Progress tracking for project fills.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Progress update information.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Project currently being filled.
    pub project: String,

    /// Current phase of the fill.
    pub phase: MigrationPhase,

    /// Phases completed so far.
    pub completed: u64,

    /// Number of phases in a fill.
    pub total: u64,
}

/// Phases of a project fill, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MigrationPhase {
    CreatingProject = 0,
    MigratingLabels,
    MigratingVariables,
    TransferringRepository,
    MigratingProtectedTags,
    MigratingProtectedBranches,
    MigratingMilestones,
    MigratingMergeRequests,
    MigratingIssues,
    MigratingWiki,
    HaltingPipelines,
    Complete,
}

impl MigrationPhase {
    const ALL: [MigrationPhase; 12] = [
        Self::CreatingProject,
        Self::MigratingLabels,
        Self::MigratingVariables,
        Self::TransferringRepository,
        Self::MigratingProtectedTags,
        Self::MigratingProtectedBranches,
        Self::MigratingMilestones,
        Self::MigratingMergeRequests,
        Self::MigratingIssues,
        Self::MigratingWiki,
        Self::HaltingPipelines,
        Self::Complete,
    ];

    fn from_index(index: u8) -> Self {
        Self::ALL
            .get(index as usize)
            .copied()
            .unwrap_or(Self::Complete)
    }
}

impl std::fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreatingProject => write!(f, "Creating project"),
            Self::MigratingLabels => write!(f, "Migrating labels"),
            Self::MigratingVariables => write!(f, "Migrating variables"),
            Self::TransferringRepository => write!(f, "Transferring repository"),
            Self::MigratingProtectedTags => write!(f, "Migrating protected tags"),
            Self::MigratingProtectedBranches => write!(f, "Migrating protected branches"),
            Self::MigratingMilestones => write!(f, "Migrating milestones"),
            Self::MigratingMergeRequests => write!(f, "Migrating merge requests"),
            Self::MigratingIssues => write!(f, "Migrating issues"),
            Self::MigratingWiki => write!(f, "Migrating wiki"),
            Self::HaltingPipelines => write!(f, "Halting pipelines"),
            Self::Complete => write!(f, "Complete"),
        }
    }
}

/// Progress tracker for project fills.
pub struct MigrationProgress {
    phase: AtomicU8,
    project: Mutex<String>,
    callback: Option<Arc<ProgressCallback>>,
}

impl MigrationProgress {
    /// Create a new progress tracker.
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(MigrationPhase::Complete as u8),
            project: Mutex::new(String::new()),
            callback: None,
        }
    }

    /// Create a progress tracker with a callback.
    pub fn with_callback(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
            ..Self::new()
        }
    }

    /// Start tracking a new project.
    pub fn start_project(&self, name: &str) {
        *self.project.lock() = name.to_string();
        self.set_phase(MigrationPhase::CreatingProject);
    }

    /// Set the current phase.
    pub fn set_phase(&self, phase: MigrationPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
        self.notify();
    }

    /// Get current phase.
    pub fn current_phase(&self) -> MigrationPhase {
        MigrationPhase::from_index(self.phase.load(Ordering::SeqCst))
    }

    /// Share of the current project's fill that is done, in percent.
    pub fn percentage(&self) -> f64 {
        let total = MigrationPhase::Complete as u8 as f64;
        (self.phase.load(Ordering::SeqCst) as f64 / total) * 100.0
    }

    fn notify(&self) {
        if let Some(callback) = &self.callback {
            let update = ProgressUpdate {
                project: self.project.lock().clone(),
                phase: self.current_phase(),
                completed: u64::from(self.phase.load(Ordering::SeqCst)),
                total: MigrationPhase::Complete as u64,
            };
            callback(update);
        }
    }
}

impl Default for MigrationProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Console progress reporter using indicatif.
pub struct ConsoleProgressReporter {
    progress_bar: indicatif::ProgressBar,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter.
    pub fn new() -> Self {
        let progress_bar = indicatif::ProgressBar::new(MigrationPhase::Complete as u64);
        let style = indicatif::ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
            .progress_chars("#>-");
        progress_bar.set_style(style);

        Self { progress_bar }
    }

    /// Create a progress callback for use with migration.
    pub fn callback(&self) -> ProgressCallback {
        let pb = self.progress_bar.clone();
        Box::new(move |update: ProgressUpdate| {
            pb.set_length(update.total);
            pb.set_position(update.completed);
            pb.set_message(format!("{}: {}", update.project, update.phase));
        })
    }

    /// Finish the progress bar.
    pub fn finish(&self, message: &str) {
        self.progress_bar.finish_with_message(message.to_string());
    }
}

impl Default for ConsoleProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
