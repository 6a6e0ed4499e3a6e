//! Authorization session cache.
//!
//! Account authorization yields a token and two base URLs that stay valid for
//! roughly a day. They are persisted to a single-line cache file
//! (`timestamp token apiUrl downloadUrl`) so consecutive invocations skip the
//! authorization round trip while the cache is fresh.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;

use crate::config::SessionConfig;
use crate::error::{Error, Result};

/// Token and base URLs shared read-only by every request of a transfer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionContext {
    /// Account authorization token
    pub authorization_token: String,
    /// Base URL for API calls
    pub api_url: String,
    /// Base URL for file downloads
    pub download_url: String,
    /// Unix timestamp (seconds) at which the authorization was obtained
    pub obtained_at: i64,
}

impl SessionContext {
    /// Build a context obtained at `obtained_at`
    pub fn new(
        authorization_token: impl Into<String>,
        api_url: impl Into<String>,
        download_url: impl Into<String>,
        obtained_at: i64,
    ) -> Self {
        Self {
            authorization_token: authorization_token.into(),
            api_url: api_url.into(),
            download_url: download_url.into(),
            obtained_at,
        }
    }

    /// True if any of the token or URLs is missing
    ///
    /// An unknown context must be refreshed before use.
    pub fn is_unknown(&self) -> bool {
        self.authorization_token.is_empty() || self.api_url.is_empty() || self.download_url.is_empty()
    }

    /// True once `ttl` has elapsed since the context was obtained
    pub fn is_stale_at(&self, now: i64, ttl: Duration) -> bool {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        now.saturating_sub(self.obtained_at) >= ttl_secs
    }
}

/// File-backed cache of the most recent [`SessionContext`].
#[derive(Clone, Debug)]
pub struct SessionCache {
    path: PathBuf,
    ttl: Duration,
}

impl SessionCache {
    /// Cache stored at `path`, fresh for `ttl`
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    /// Cache described by the session section of the config
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.cache_path.clone(), config.ttl)
    }

    /// Location of the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached context as of now
    pub fn load(&self) -> SessionContext {
        self.load_at(Utc::now().timestamp())
    }

    /// Load the cached context as of `now`
    ///
    /// Returns an unknown (empty) context if the file is absent, malformed, or
    /// older than the TTL. A bad cache file is never an error: it only costs
    /// one authorization round trip.
    pub fn load_at(&self, now: i64) -> SessionContext {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to read session cache");
                }
                return SessionContext::default();
            }
        };

        let Some(context) = parse_line(&content) else {
            tracing::debug!(path = %self.path.display(), "Ignoring malformed session cache");
            return SessionContext::default();
        };

        if context.is_stale_at(now, self.ttl) {
            tracing::debug!(obtained_at = context.obtained_at, "Session cache is stale");
            return SessionContext::default();
        }

        context
    }

    /// Persist `context`, creating the cache directory if needed
    ///
    /// Unknown contexts are not written.
    pub fn save(&self, context: &SessionContext) -> Result<()> {
        if context.is_unknown() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create session directory '{}': {}",
                        parent.display(),
                        e
                    ),
                ))
            })?;
        }

        let line = format!(
            "{} {} {} {}\n",
            context.obtained_at,
            context.authorization_token,
            context.api_url,
            context.download_url
        );
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to open session cache '{}': {}",
                    self.path.display(),
                    e
                ),
            ))
        })?;

        // The mode only applies on creation; tighten a file left by older versions.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(line.as_bytes())?;

        tracing::debug!(path = %self.path.display(), "Session cache updated");
        Ok(())
    }
}

fn parse_line(content: &str) -> Option<SessionContext> {
    let mut fields = content.split_whitespace();
    let obtained_at = fields.next()?.parse::<i64>().ok()?;
    let authorization_token = fields.next()?;
    let api_url = fields.next()?;
    let download_url = fields.next()?;

    Some(SessionContext::new(
        authorization_token,
        api_url,
        download_url,
        obtained_at,
    ))
}
