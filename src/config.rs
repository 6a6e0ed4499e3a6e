//! Configuration types for blazer

use crate::error::{Error, Result};
use crate::planner::{MAX_FILE_PARTS, MINIMUM_PART_SIZE_BYTES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration
///
/// Every field has a default, so an empty JSON object is a valid config file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage service endpoints and HTTP client settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Multipart transfer settings
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Retry policy for transient (5xx) failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Authorization session cache
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Load a JSON config file; missing keys fall back to defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the transfer engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.transfer.threads == 0 {
            return Err(Error::config("transfer.threads", "must be at least 1"));
        }
        if self.transfer.min_part_size == 0 {
            return Err(Error::config("transfer.min_part_size", "must be non-zero"));
        }
        if self.transfer.max_parts == 0 {
            return Err(Error::config("transfer.max_parts", "must be non-zero"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts", "must be at least 1"));
        }
        if self.session.ttl.is_zero() {
            return Err(Error::config("session.ttl", "must be non-zero"));
        }
        Ok(())
    }
}

/// Storage service endpoint and HTTP client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL used for account authorization (default: "https://api.backblazeb2.com")
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// TCP/TLS connect timeout (default: 20 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Total per-request timeout (default: none)
    ///
    /// A single part can be hundreds of megabytes, so a whole-request timeout is
    /// off unless explicitly configured.
    #[serde(default, with = "optional_duration_serde")]
    pub request_timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            user_agent: default_user_agent(),
            connect_timeout: default_connect_timeout(),
            request_timeout: None,
        }
    }
}

/// Multipart transfer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Worker count for multipart uploads and downloads (default: 4)
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Minimum part size in bytes (default: 100,000,000)
    ///
    /// Files smaller than twice this size use a single unsplit request.
    #[serde(default = "default_min_part_size")]
    pub min_part_size: u64,

    /// Maximum number of parts per file (default: 10,000)
    #[serde(default = "default_max_parts")]
    pub max_parts: u64,
}

impl TransferConfig {
    /// Files at or above this size take the multipart path
    pub fn large_file_threshold(&self) -> u64 {
        self.min_part_size.saturating_mul(2)
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            min_part_size: default_min_part_size(),
            max_parts: default_max_parts(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, including the first (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff step; the k-th retry waits `k * delay` (default: 5 seconds)
    #[serde(default = "default_delay", with = "duration_serde")]
    pub delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: default_delay(),
            max_delay: default_max_delay(),
            jitter: false,
        }
    }
}

/// Authorization session cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Cache file path (default: "$HOME/.blazer/session")
    #[serde(default = "default_session_path")]
    pub cache_path: PathBuf,

    /// How long a cached authorization stays fresh (default: one day)
    #[serde(default = "default_session_ttl", with = "duration_serde")]
    pub ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_path: default_session_path(),
            ttl: default_session_ttl(),
        }
    }
}

/// Returns the user's home directory.
pub(crate) fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn default_auth_url() -> String {
    "https://api.backblazeb2.com".to_string()
}

fn default_user_agent() -> String {
    format!("blazer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_threads() -> usize {
    4
}

fn default_min_part_size() -> u64 {
    MINIMUM_PART_SIZE_BYTES
}

fn default_max_parts() -> u64 {
    MAX_FILE_PARTS
}

fn default_max_attempts() -> u32 {
    5
}

fn default_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_session_path() -> PathBuf {
    home_dir().join(".blazer").join("session")
}

fn default_session_ttl() -> Duration {
    Duration::from_secs(86_400)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
