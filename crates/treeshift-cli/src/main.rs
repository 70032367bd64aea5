//! treeshift - copy a GitLab group tree to another instance.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use treeshift_migrate::{
    Collaborators, ConsoleProgressReporter, Endpoint, GitCredentials, GitLabClient, GitTransfer,
    MigrationConfig, MigrationProgress, Migrator,
};

mod logging;

use logging::LogFormat;

/// Resumable migration of a group, its subgroups and projects between
/// GitLab instances.
///
/// Progress is checkpointed to a statefile; after a failure, run the same
/// command again to pick up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "treeshift")]
#[command(author, version, about)]
struct Cli {
    /// Source instance
    #[arg(long, env = "TREESHIFT_SOURCE_URL", default_value = "gitlab.com")]
    source_url: String,

    /// Access token for the source instance
    #[arg(short = 't', long, env = "TREESHIFT_SOURCE_TOKEN", hide_env_values = true)]
    source_token: String,

    /// Id of the source group to migrate
    #[arg(short = 'g', long, env = "TREESHIFT_SOURCE_GROUP")]
    source_group: u64,

    /// `_gitlab_session` cookie of the source user, needed for avatars
    #[arg(long, env = "TREESHIFT_SESSION_COOKIE", hide_env_values = true)]
    session_cookie: Option<String>,

    /// Destination instance
    #[arg(short = 'U', long, env = "TREESHIFT_DEST_URL")]
    dest_url: String,

    /// Access token for the destination instance
    #[arg(short = 'T', long, env = "TREESHIFT_DEST_TOKEN", hide_env_values = true)]
    dest_token: String,

    /// Destination group receiving the subgroups (0 = instance root)
    #[arg(short = 'G', long, env = "TREESHIFT_DEST_GROUP", default_value_t = 0)]
    dest_group: u64,

    /// Destination group receiving projects that sit directly in the source group
    #[arg(short = 'O', long, env = "TREESHIFT_DEST_ORPHAN_GROUP")]
    dest_orphan_group: u64,

    /// Walk the tree and log what would happen without writing anything
    #[arg(short = 'n', long, env = "TREESHIFT_DRY_RUN")]
    dry_run: bool,

    /// Seconds to pause after heavy writes to the destination
    #[arg(long, env = "TREESHIFT_SLEEP_TIME", default_value_t = 2.0)]
    sleep_time: f64,

    /// Statefile recording migration progress
    #[arg(
        long,
        env = "TREESHIFT_STATE_FILE",
        default_value = treeshift_migrate::config::DEFAULT_STATE_FILE
    )]
    state_file: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log every instrumented call on entry and exit
    #[arg(long, env = "TREESHIFT_TRACE_CALLS")]
    trace_calls: bool,

    /// Log output format
    #[arg(long, value_enum, env = "TREESHIFT_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Show a progress bar for each project
    #[arg(long)]
    progress: bool,
}

impl Cli {
    fn config(&self) -> Result<MigrationConfig> {
        anyhow::ensure!(
            self.sleep_time.is_finite() && self.sleep_time >= 0.0,
            "--sleep-time must be a non-negative number of seconds"
        );

        let mut config = MigrationConfig::new(
            Endpoint::new(&self.source_url, &self.source_token),
            Endpoint::new(&self.dest_url, &self.dest_token),
            self.source_group,
            self.dest_orphan_group,
        )
        .with_main_group(self.dest_group)
        .with_dry_run(self.dry_run)
        .with_pause(Duration::from_secs_f64(self.sleep_time))
        .with_state_file(&self.state_file);
        if let Some(cookie) = &self.session_cookie {
            config = config.with_session_cookie(cookie);
        }
        Ok(config)
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.config()?;
    config.validate().context("invalid configuration")?;

    let (source, source_user) = GitLabClient::connect(&config.source)
        .await
        .with_context(|| format!("failed to connect to source {}", config.source.url))?;
    let (dest, dest_user) = GitLabClient::connect(&config.dest)
        .await
        .with_context(|| format!("failed to connect to destination {}", config.dest.url))?;
    tracing::info!(
        source = %source_user.username,
        dest = %dest_user.username,
        "Connected to both instances"
    );

    let collaborators = Collaborators {
        source: Arc::new(source),
        dest: Arc::new(dest),
        transfer: Arc::new(GitTransfer::new()),
        source_credentials: GitCredentials::new(source_user.username, &config.source.token),
        dest_credentials: GitCredentials::new(dest_user.username, &config.dest.token),
    };

    let state_file = config.state_file.clone();
    let mut migrator = Migrator::new(config, collaborators)
        .with_context(|| format!("failed to load statefile {}", state_file.display()))?;

    let reporter = cli.progress.then(ConsoleProgressReporter::new);
    if let Some(reporter) = &reporter {
        migrator = migrator.with_progress(MigrationProgress::with_callback(reporter.callback()));
    }

    let outcome = migrator.run().await;
    if let Some(reporter) = &reporter {
        reporter.finish(if outcome.is_ok() { "done" } else { "aborted" });
    }

    match outcome {
        Ok(summary) => {
            summary.print_summary();
            Ok(())
        }
        Err(e) => {
            migrator.summary().print_summary();
            Err(e).with_context(|| {
                format!(
                    "migration aborted; progress is saved in {}, run again to resume",
                    state_file.display()
                )
            })
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(logging::level_for(cli.verbose), cli.log_format, cli.trace_calls);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
