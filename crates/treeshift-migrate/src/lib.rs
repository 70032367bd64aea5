//! # Treeshift Migration Engine
//!
//! This crate copies a tree of groups, subgroups and projects from one
//! GitLab-style forge to another, including repository history, LFS objects,
//! labels, CI variables, protection rules, milestones, issues, open merge
//! requests, notes and wiki pages.
//!
//! ## Features
//!
//! - **Resumable**: progress is checkpointed to a statefile after every
//!   group creation and around every project fill.
//! - **Crash repair**: a project left half-filled by a crashed run is
//!   deleted and migrated again from scratch.
//! - **Milestone remapping**: issues and merge requests are linked to the
//!   re-created milestones, never to source ids.
//! - **Dry run**: walks the same tree and logs the same intent without a
//!   single write.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use treeshift_migrate::{
//!     Collaborators, Endpoint, GitCredentials, GitLabClient, GitTransfer, MigrationConfig,
//!     Migrator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = Endpoint::new("gitlab.com", "glpat-source");
//!     let dest = Endpoint::new("git.example.org", "glpat-dest");
//!     let (source_client, source_user) = GitLabClient::connect(&source).await?;
//!     let (dest_client, dest_user) = GitLabClient::connect(&dest).await?;
//!
//!     let config = MigrationConfig::new(source.clone(), dest.clone(), 1234, 56);
//!     let mut migrator = Migrator::new(
//!         config,
//!         Collaborators {
//!             source: Arc::new(source_client),
//!             dest: Arc::new(dest_client),
//!             transfer: Arc::new(GitTransfer::new()),
//!             source_credentials: GitCredentials::new(source_user.username, source.token),
//!             dest_credentials: GitCredentials::new(dest_user.username, dest.token),
//!         },
//!     )?;
//!
//!     migrator.run().await?.print_summary();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entities;
pub mod error;
pub mod gitlab;
mod group;
pub mod planner;
pub mod progress;
mod project;
pub mod provider;
pub mod remap;
pub mod report;
pub mod state;
pub mod transfer;
pub mod types;

// Re-export main types
pub use config::{Endpoint, MigrationConfig};
pub use error::{MigrationError, Result};
pub use gitlab::GitLabClient;
pub use planner::{Collaborators, Migrator, Target};
pub use progress::{ConsoleProgressReporter, MigrationPhase, MigrationProgress, ProgressCallback};
pub use provider::{GitCredentials, RepositoryProvider, RepositoryTransfer, WorkingCopy};
pub use remap::IdRemapTable;
pub use report::{MigrationSummary, ProjectReport};
pub use state::{MigrationState, StateStore};
pub use transfer::GitTransfer;
pub use types::*;

/// Version of the migration engine.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
