//! In-process origin.
//!
//! [`LocalOrigin`] plays the role of the browser's same-origin broadcast
//! channel: every [`LocalTransport`] it hands out posts into one
//! `tokio::sync::broadcast` channel and subscribes to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{CommsError, Envelope, Subscription, TabId, Transport};
use crate::constants::ORIGIN_CHANNEL_CAPACITY;

/// Shared medium for all tabs of one origin.
#[derive(Debug, Clone)]
pub struct LocalOrigin {
    tx: broadcast::Sender<Envelope>,
}

impl Default for LocalOrigin {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalOrigin {
    /// Create an origin with no tabs.
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(ORIGIN_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Open a tab with a random id.
    pub fn connect(&self) -> LocalTransport {
        self.connect_as(TabId::generate())
    }

    /// Open a tab with a chosen id.
    pub fn connect_as(&self, tab_id: TabId) -> LocalTransport {
        LocalTransport {
            tab_id,
            tx: self.tx.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of live subscriptions across all tabs.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One tab's endpoint on a [`LocalOrigin`].
#[derive(Debug, Clone)]
pub struct LocalTransport {
    tab_id: TabId,
    tx: broadcast::Sender<Envelope>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for LocalTransport {
    fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    async fn post(&self, envelope: Envelope) -> Result<(), CommsError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CommsError::Closed);
        }
        // A send error only means nobody is subscribed, which is not a failure.
        if self.tx.send(envelope).is_err() {
            log::debug!("[{}] no listeners on origin", self.tab_id);
        }
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.tab_id.clone(), self.tx.subscribe())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
