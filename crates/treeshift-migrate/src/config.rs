//! Configuration for a migration run.

use crate::error::{MigrationError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default statefile location, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = "treeshift-state.json";

/// Default pause after a repository transfer or a delete-and-retry.
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(2);

/// Connection details for one forge instance.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Instance base URL, always with a scheme.
    pub url: String,

    /// Personal access token.
    pub token: String,
}

impl Endpoint {
    /// Create an endpoint, prefixing `https://` when no scheme is given.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: normalize_url(&url.into()),
            token: token.into(),
        }
    }
}

/// Prefix `https://` unless the URL already names a scheme.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// Configuration for a migration run.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Instance to read from.
    pub source: Endpoint,

    /// Instance to write to.
    pub dest: Endpoint,

    /// Group on the source side whose tree is migrated.
    pub source_group: u64,

    /// Destination parent for subgroups; 0 means the instance root.
    pub main_group: u64,

    /// Destination group for projects living directly in the source group.
    pub orphan_group: u64,

    /// Browser session cookie for the source user, needed to fetch avatars.
    pub session_cookie: Option<String>,

    /// Walk the tree without writing anything.
    pub dry_run: bool,

    /// Pause after repository transfer and after delete-and-retry.
    pub pause: Duration,

    /// Location of the statefile.
    pub state_file: PathBuf,
}

impl MigrationConfig {
    /// Create a new migration configuration.
    pub fn new(source: Endpoint, dest: Endpoint, source_group: u64, orphan_group: u64) -> Self {
        Self {
            source,
            dest,
            source_group,
            main_group: 0,
            orphan_group,
            session_cookie: None,
            dry_run: false,
            pause: DEFAULT_PAUSE,
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
        }
    }

    /// Set the destination parent for subgroups.
    pub fn with_main_group(mut self, gid: u64) -> Self {
        self.main_group = gid;
        self
    }

    /// Set the session cookie used for avatars.
    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    /// Enable or disable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the inter-step pause.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Set the statefile location.
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = path.into();
        self
    }

    /// Reject missing or contradictory inputs before anything is contacted.
    pub fn validate(&self) -> Result<()> {
        for (side, endpoint) in [("source", &self.source), ("destination", &self.dest)] {
            if endpoint.token.trim().is_empty() {
                return Err(MigrationError::InvalidConfig(format!(
                    "no access token given for the {side} instance"
                )));
            }
            if endpoint.url == "https://" || endpoint.url == "http://" {
                return Err(MigrationError::InvalidConfig(format!(
                    "no URL given for the {side} instance"
                )));
            }
        }

        if self.source_group == 0 {
            return Err(MigrationError::InvalidConfig(
                "source group id must not be 0".to_string(),
            ));
        }

        if self.orphan_group == 0 {
            return Err(MigrationError::InvalidConfig(
                "orphan group id must not be 0: projects cannot live at the instance root"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
