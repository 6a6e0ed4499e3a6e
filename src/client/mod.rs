//! Top-level storage client.
//!
//! [`Blazer`] ties the pieces together: it resolves an authorization session
//! once, then drives uploads and downloads through the small (unsplit) path or
//! the multipart path depending on file size.
//!
//! Split into focused submodules:
//! - [`upload`] - Upload orchestration (single request or start/parts/finish)
//! - [`download`] - Download orchestration (single request or parts/coalesce)

mod download;
mod upload;


use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::api::ApiClient;
use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::{Error, Result, TransferError};
use crate::session::{SessionCache, SessionContext};
use crate::transfer::TaskContext;
use crate::types::{Bucket, Event, FileInfo};

/// Storage client (cloneable - all shared state is Arc-wrapped)
#[derive(Clone)]
pub struct Blazer {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Storage service HTTP client
    pub(crate) api: ApiClient,
    /// Account credentials (the account id scopes bucket listing)
    pub(crate) credentials: Arc<Credentials>,
    /// Authorization resolved at connect time; never mutated afterwards
    pub(crate) session: Arc<SessionContext>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl Blazer {
    /// Connect to the storage service
    ///
    /// Reuses the cached session when it is fresh; otherwise authorizes with
    /// `credentials` and persists the new session for later invocations.
    pub async fn connect(config: Config, credentials: Credentials) -> Result<Self> {
        config.validate()?;
        let api = ApiClient::new(&config.api)?;
        let cache = SessionCache::from_config(&config.session);

        let mut session = cache.load();
        if session.is_unknown() {
            let auth = api.authorize_account(&credentials).await?;
            session = SessionContext::new(
                auth.authorization_token,
                auth.api_url,
                auth.download_url,
                Utc::now().timestamp(),
            );
            tracing::info!(api_url = %session.api_url, "Authorized account");

            // A cache we cannot write only costs a re-authorization next time.
            if let Err(e) = cache.save(&session) {
                tracing::warn!(error = %e, "Failed to persist session cache");
            }
        } else {
            tracing::debug!(api_url = %session.api_url, "Using cached session");
        }

        Self::build(config, api, credentials, session)
    }

    /// Build a client around an already known session
    ///
    /// No authorization request is made and the cache file is not touched.
    pub fn with_session(
        config: Config,
        credentials: Credentials,
        session: SessionContext,
    ) -> Result<Self> {
        config.validate()?;
        if session.is_unknown() {
            return Err(Error::Other(
                "session is missing a token or base URL".to_string(),
            ));
        }
        let api = ApiClient::new(&config.api)?;
        Self::build(config, api, credentials, session)
    }

    fn build(
        config: Config,
        api: ApiClient,
        credentials: Credentials,
        session: SessionContext,
    ) -> Result<Self> {
        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);

        Ok(Self {
            config: Arc::new(config),
            api,
            credentials: Arc::new(credentials),
            session: Arc::new(session),
            event_tx,
        })
    }

    /// Subscribe to transfer events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// Events are buffered, but if a subscriber falls behind by more than 1000 events,
    /// it will receive a `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use blazer::{Blazer, Config, Credentials};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = Blazer::connect(Config::default(), Credentials::discover(None)?).await?;
    ///
    ///     let mut events = client.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "transfer event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Session every request of this client uses
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Buckets owned by the account
    pub async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        self.api
            .list_buckets(&self.session, &self.credentials.account_id)
            .await
    }

    /// Resolve a bucket name to its id
    pub async fn bucket_id(&self, bucket_name: &str) -> Result<String> {
        self.list_buckets()
            .await?
            .into_iter()
            .find(|b| b.bucket_name == bucket_name)
            .map(|b| b.bucket_id)
            .ok_or_else(|| Error::NotFound(format!("bucket '{}'", bucket_name)))
    }

    /// Metadata of one file version
    ///
    /// Metadata describing a different file than `file_id` is rejected with
    /// [`TransferError::FileIdMismatch`].
    pub async fn get_file_info(&self, file_id: &str) -> Result<FileInfo> {
        let info = self.api.get_file_info(&self.session, file_id).await?;
        if info.file_id != file_id {
            return Err(TransferError::FileIdMismatch {
                expected: file_id.to_string(),
                actual: info.file_id,
            }
            .into());
        }
        Ok(info)
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Thread count for one transfer: the caller's choice or the configured default
    pub(crate) fn resolve_threads(&self, threads: Option<usize>) -> Result<usize> {
        match threads {
            Some(0) => Err(Error::config("threads", "must be at least 1")),
            Some(n) => Ok(n),
            None => Ok(self.config.transfer.threads),
        }
    }

    /// Context lent to every part task of one transfer
    pub(crate) fn task_context(&self) -> Arc<TaskContext> {
        Arc::new(TaskContext {
            api: self.api.clone(),
            session: Arc::clone(&self.session),
            retry: self.config.retry.clone(),
            event_tx: self.event_tx.clone(),
        })
    }
}
