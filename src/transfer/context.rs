//! Transfer context shared by every part task of one transfer.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::api::ApiClient;
use crate::config::RetryConfig;
use crate::session::SessionContext;
use crate::types::Event;

/// Read-only state lent to every part task
///
/// The session is fixed before dispatch and never refreshed while tasks run.
#[derive(Clone)]
pub struct TaskContext {
    /// Storage service client
    pub api: ApiClient,
    /// Authorization in force for this transfer
    pub session: Arc<SessionContext>,
    /// Per-part retry policy
    pub retry: RetryConfig,
    /// Progress events
    pub event_tx: broadcast::Sender<Event>,
}

impl TaskContext {
    /// Publish an event; dropped silently when nobody is subscribed
    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
