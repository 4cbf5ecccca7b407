//! Cross-tab message bus.
//!
//! All tabs on an origin share one broadcast medium. [`Communications`] sits
//! on top of a [`Transport`] and adds the two patterns the session layer
//! needs: fire-and-forget broadcast and correlated request/reply with a
//! timeout.
//!
//! # Architecture
//!
//! ```text
//! Communications (per tab)
//!     │
//!     ├── send(message)                  ──► Transport::post
//!     ├── send_and_wait(message, t)      ──► subscribe, post, filter replyTo == id
//!     ├── reply(request, response)       ──► Transport::post (replyTo = request.id)
//!     └── subscribe()                    ──► Subscription (drop to unsubscribe)
//!
//! Transport (trait)
//!     └── LocalTransport ── LocalOrigin (tokio broadcast, in-process)
//! ```
//!
//! # Delivery
//!
//! Delivery is asynchronous and at most once. A tab never receives its own
//! broadcasts. Several tabs may answer one request; `send_and_wait` resolves
//! with the first matching reply and ignores the rest. No reply within the
//! timeout resolves to `None`, which callers read as "nobody else is here".
//!
//! Rust guideline compliant 2026-02

pub mod local;
pub mod message;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

pub use local::{LocalOrigin, LocalTransport};
pub use message::{DeputyMessage, Envelope, PageListing, RowStatus, TabId};

/// Errors that can occur during bus operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommsError {
    /// The transport was closed.
    Closed,
    /// The transport failed to post a message.
    SendFailed(String),
    /// A reply's type does not pair with the request's type.
    MismatchedReply {
        /// Request discriminant.
        request: &'static str,
        /// Offered reply discriminant.
        response: &'static str,
    },
}

impl std::fmt::Display for CommsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Transport closed"),
            Self::SendFailed(msg) => write!(f, "Send failed: {msg}"),
            Self::MismatchedReply { request, response } => {
                write!(f, "Cannot answer '{request}' with '{response}'")
            }
        }
    }
}

impl std::error::Error for CommsError {}

/// A same-origin broadcast medium as seen from one tab.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Identity of the tab owning this endpoint.
    fn tab_id(&self) -> &TabId;

    /// Deliver `envelope` to every other tab on the origin.
    ///
    /// # Errors
    ///
    /// Returns `CommsError::Closed` after [`Transport::close`], or
    /// `CommsError::SendFailed` if the medium rejects the message.
    async fn post(&self, envelope: Envelope) -> Result<(), CommsError>;

    /// Start receiving envelopes posted by other tabs from now on.
    fn subscribe(&self) -> Subscription;

    /// Stop posting. Existing subscriptions drain and end.
    fn close(&self);
}

/// Receiving half of a bus subscription.
///
/// Envelopes sent by the owning tab are filtered out. Dropping the
/// subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    own_tab: TabId,
    rx: broadcast::Receiver<Envelope>,
}

impl Subscription {
    /// Wrap a broadcast receiver for `own_tab`.
    pub fn new(own_tab: TabId, rx: broadcast::Receiver<Envelope>) -> Self {
        Self { own_tab, rx }
    }

    /// Next envelope from another tab, or `None` once the medium is gone.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) if envelope.sender == self.own_tab => {}
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Tab {} lagged, skipped {} message(s)", self.own_tab, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Per-tab message bus client.
#[derive(Debug, Clone)]
pub struct Communications {
    transport: Arc<dyn Transport>,
}

impl Communications {
    /// Wrap a transport endpoint.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// This tab's identity.
    pub fn tab_id(&self) -> &TabId {
        self.transport.tab_id()
    }

    /// Broadcast a message without expecting a reply.
    ///
    /// Returns the envelope id.
    pub async fn send(&self, message: DeputyMessage) -> Result<Uuid, CommsError> {
        let envelope = Envelope::new(self.tab_id().clone(), message);
        let id = envelope.id;
        log::debug!("[{}] send {}", self.tab_id(), envelope.message.type_name());
        self.transport.post(envelope).await?;
        Ok(id)
    }

    /// Broadcast a request and wait for the first reply carrying its id.
    ///
    /// Resolves to `Ok(None)` when nothing answers within `timeout`,
    /// including when no other tab is listening.
    pub async fn send_and_wait(
        &self,
        message: DeputyMessage,
        timeout: Duration,
    ) -> Result<Option<Envelope>, CommsError> {
        // Subscribe before posting so a fast reply cannot slip past.
        let mut subscription = self.transport.subscribe();
        let envelope = Envelope::new(self.tab_id().clone(), message);
        let request_id = envelope.id;
        let type_name = envelope.message.type_name();

        log::debug!("[{}] send {} ({})", self.tab_id(), type_name, request_id);
        self.transport.post(envelope).await?;

        let wait = async {
            while let Some(candidate) = subscription.recv().await {
                if candidate.answers(request_id) {
                    return Some(candidate);
                }
            }
            None
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(Some(reply)) => {
                log::debug!(
                    "[{}] {} answered by {} with {}",
                    self.tab_id(),
                    type_name,
                    reply.sender,
                    reply.message.type_name()
                );
                Ok(Some(reply))
            }
            Ok(None) => Err(CommsError::Closed),
            Err(_elapsed) => {
                log::debug!("[{}] {} timed out after {:?}", self.tab_id(), type_name, timeout);
                Ok(None)
            }
        }
    }

    /// Answer `request` with `response`.
    ///
    /// # Errors
    ///
    /// Returns `CommsError::MismatchedReply` if `response` is not the
    /// response type paired with the request.
    pub async fn reply(
        &self,
        request: &Envelope,
        response: DeputyMessage,
    ) -> Result<(), CommsError> {
        let expected = request.message.response_type_name();
        if expected != Some(response.type_name()) {
            return Err(CommsError::MismatchedReply {
                request: request.message.type_name(),
                response: response.type_name(),
            });
        }

        let envelope = Envelope::reply(self.tab_id().clone(), request, response);
        log::debug!(
            "[{}] reply {} to {}",
            self.tab_id(),
            envelope.message.type_name(),
            request.sender
        );
        self.transport.post(envelope).await
    }

    /// Receive envelopes from other tabs until the subscription is dropped.
    pub fn subscribe(&self) -> Subscription {
        self.transport.subscribe()
    }

    /// Close the underlying transport.
    pub fn close(&self) {
        self.transport.close();
    }
}
