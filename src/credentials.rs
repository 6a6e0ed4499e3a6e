//! Account credentials.
//!
//! Credentials live in a small whitespace-separated key/value file:
//!
//! ```text
//! accountId 0012ab34cd56
//! applicationKey K001xxxxxxxxxxxxxxxxxxxxxxxxxxx
//! name personal
//! ```
//!
//! Without an explicit path, `./.blazer` is tried first, then `$HOME/.blazer`.

use std::path::{Path, PathBuf};

use crate::config::home_dir;
use crate::error::{Error, Result};

/// Name of the credentials file looked up in the working and home directories.
pub const CREDENTIALS_FILE_NAME: &str = ".blazer";

/// Account id and application key used for authorization.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Account (or key) id
    pub account_id: String,
    /// Application key secret
    pub application_key: String,
    /// Optional profile label
    pub name: Option<String>,
}

// Keep the secret out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("application_key", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

impl Credentials {
    /// Create credentials directly
    pub fn new(account_id: impl Into<String>, application_key: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            application_key: application_key.into(),
            name: None,
        }
    }

    /// Parse credentials file content
    ///
    /// Unknown keys are ignored. `accountId` and `applicationKey` are required.
    pub fn parse(content: &str) -> Result<Self> {
        let mut creds = Credentials::default();
        let mut tokens = content.split_whitespace();

        while let Some(key) = tokens.next() {
            match key {
                "accountId" => creds.account_id = tokens.next().unwrap_or_default().to_string(),
                "applicationKey" => {
                    creds.application_key = tokens.next().unwrap_or_default().to_string()
                }
                "name" => creds.name = tokens.next().map(str::to_string),
                _ => {}
            }
        }

        if creds.account_id.is_empty() {
            return Err(Error::Credentials("missing accountId".to_string()));
        }
        if creds.application_key.is_empty() {
            return Err(Error::Credentials("missing applicationKey".to_string()));
        }
        Ok(creds)
    }

    /// Load credentials from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Credentials(format!(
                "could not load credentials file from {}: {}",
                path.display(),
                e
            ))
        })?;
        let creds = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), name = ?creds.name, "Loaded credentials");
        Ok(creds)
    }

    /// Load credentials from `path`, or from the default locations when `None`
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let candidates = default_locations();
        for candidate in &candidates {
            if candidate.is_file() {
                return Self::from_file(candidate);
            }
        }

        Err(Error::Credentials(format!(
            "could not open credentials file (tried {})",
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = Vec::with_capacity(2);
    if let Ok(cwd) = std::env::current_dir() {
        locations.push(cwd.join(CREDENTIALS_FILE_NAME));
    }
    locations.push(home_dir().join(CREDENTIALS_FILE_NAME));
    locations
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_keys_in_any_order() {
        let creds = Credentials::parse("name work\napplicationKey K001secret\naccountId 0012ab\n")
            .unwrap();

        assert_eq!(creds.account_id, "0012ab");
        assert_eq!(creds.application_key, "K001secret");
        assert_eq!(creds.name.as_deref(), Some("work"));
    }

    #[test]
    fn ignores_unknown_keys() {
        let creds = Credentials::parse("region us-west\naccountId a applicationKey b").unwrap();
        assert_eq!(creds, Credentials::new("a", "b"));
    }

    #[test]
    fn missing_key_is_credentials_error() {
        assert!(matches!(
            Credentials::parse("accountId abc"),
            Err(Error::Credentials(msg)) if msg.contains("applicationKey")
        ));
        assert!(matches!(
            Credentials::parse("applicationKey abc"),
            Err(Error::Credentials(msg)) if msg.contains("accountId")
        ));
    }

    #[test]
    fn debug_output_redacts_key() {
        let rendered = format!("{:?}", Credentials::new("acct", "super-secret"));
        assert!(rendered.contains("acct"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn discover_with_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds");
        std::fs::write(&path, "accountId a\napplicationKey b\n").unwrap();

        let creds = Credentials::discover(Some(&path)).unwrap();
        assert_eq!(creds.account_id, "a");
    }

    #[test]
    fn explicit_missing_file_is_credentials_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Credentials::discover(Some(&dir.path().join("absent")));
        assert!(matches!(result, Err(Error::Credentials(_))));
    }
}
