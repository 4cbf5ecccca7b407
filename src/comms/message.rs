//! Message types exchanged between tabs.
//!
//! Every message is a variant of [`DeputyMessage`], discriminated on the wire
//! by a camelCase `type` field. Messages travel inside an [`Envelope`] that
//! carries the sender, a fresh id, and for replies the id of the request.
//!
//! # Request/response pairs
//!
//! | request | response |
//! |---|---|
//! | `sessionRequest` | `sessionResponse` |
//! | `sessionStop` | `sessionStopResponse` |
//! | `pageStatusRequest` | `pageStatusResponse` |
//!
//! `sessionStarted`, `sessionClosed` and `pageStatusUpdate` are broadcasts.
//!
//! # Wire Format
//!
//! ```json
//! { "id": "<uuid>", "sender": "<tab id>", "replyTo": "<uuid>",
//!   "type": "sessionResponse", "session": { "casePageId": 42, "caseSections": ["S1"] } }
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::page::SectionId;
use crate::storage::SessionInformation;

/// Identity of one browser context (tab) on the origin.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub String);

impl TabId {
    /// A fresh random tab id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Truncate for display
        write!(f, "{}", self.0.get(..8).unwrap_or(&self.0))
    }
}

impl From<&str> for TabId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Review status of one page listed in a case page section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowStatus {
    /// Not reviewed yet.
    Unfinished,
    /// Reviewed, outcome unclear.
    Unknown,
    /// Violations found.
    WithViolations,
    /// No violations found.
    WithoutViolations,
    /// The page no longer exists.
    Missing,
    /// Content removed pending review.
    PresumptiveRemoval,
}

/// Where a page is listed inside an active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageListing {
    /// Case page holding the listing.
    pub case_page_id: u64,
    /// Section listing the page.
    pub section: SectionId,
    /// Last status recorded for the page, if any.
    pub status: Option<RowStatus>,
}

/// A message on the origin bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DeputyMessage {
    /// Ask whether any tab holds the root session.
    SessionRequest,
    /// Reply from the root tab with its session.
    SessionResponse {
        /// The root's active session.
        session: Option<SessionInformation>,
    },
    /// Ask the root of a case page to stop its session.
    SessionStop {
        /// Case page whose session should stop.
        case_page_id: u64,
    },
    /// Reply to `sessionStop`.
    SessionStopResponse {
        /// Whether a session was stopped.
        stopped: bool,
    },
    /// Ask whether a page is listed in an active section.
    PageStatusRequest {
        /// Page title.
        page: String,
    },
    /// Reply to `pageStatusRequest`.
    PageStatusResponse {
        /// Where the page is listed, or `None` if it is not.
        listing: Option<PageListing>,
    },
    /// A tab has claimed the root role.
    SessionStarted {
        /// The claimed session.
        session: SessionInformation,
    },
    /// The root closed its session.
    SessionClosed {
        /// Case page whose session closed.
        case_page_id: u64,
    },
    /// A page session changed the status of its page.
    PageStatusUpdate {
        /// Case page the page is listed on.
        case_page_id: u64,
        /// Page title.
        page: String,
        /// New status.
        status: RowStatus,
    },
}

impl DeputyMessage {
    /// Wire discriminant of this message.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SessionRequest => "sessionRequest",
            Self::SessionResponse { .. } => "sessionResponse",
            Self::SessionStop { .. } => "sessionStop",
            Self::SessionStopResponse { .. } => "sessionStopResponse",
            Self::PageStatusRequest { .. } => "pageStatusRequest",
            Self::PageStatusResponse { .. } => "pageStatusResponse",
            Self::SessionStarted { .. } => "sessionStarted",
            Self::SessionClosed { .. } => "sessionClosed",
            Self::PageStatusUpdate { .. } => "pageStatusUpdate",
        }
    }

    /// Discriminant of the response paired with this request, if it is one.
    pub fn response_type_name(&self) -> Option<&'static str> {
        match self {
            Self::SessionRequest => Some("sessionResponse"),
            Self::SessionStop { .. } => Some("sessionStopResponse"),
            Self::PageStatusRequest { .. } => Some("pageStatusResponse"),
            _ => None,
        }
    }

    /// Whether this message is a request expecting a reply.
    pub fn is_request(&self) -> bool {
        self.response_type_name().is_some()
    }

    /// Whether this message is a reply to a request.
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Self::SessionResponse { .. }
                | Self::SessionStopResponse { .. }
                | Self::PageStatusResponse { .. }
        )
    }
}

/// A message with routing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Fresh per envelope; used as the correlation id for requests.
    pub id: Uuid,
    /// Sending tab.
    pub sender: TabId,
    /// Id of the request this envelope answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Uuid>,
    /// The message itself.
    #[serde(flatten)]
    pub message: DeputyMessage,
}

impl Envelope {
    /// Wrap a message from `sender`.
    pub fn new(sender: TabId, message: DeputyMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            reply_to: None,
            message,
        }
    }

    /// Wrap a reply to `request` from `sender`.
    pub fn reply(sender: TabId, request: &Envelope, message: DeputyMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            reply_to: Some(request.id),
            message,
        }
    }

    /// Whether this envelope answers the request with id `request_id`.
    pub fn answers(&self, request_id: Uuid) -> bool {
        self.reply_to == Some(request_id)
    }
}
