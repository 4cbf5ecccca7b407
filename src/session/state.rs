//! Per-tab session states.

use crate::comms::PageListing;
use crate::page::SectionId;
use crate::storage::SessionInformation;

/// What the entry UI offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// First visit: a start button on every heading.
    Start,
    /// A prior visit left these sections open.
    Continue {
        /// Sections that would be reopened.
        sections: Vec<SectionId>,
    },
}

/// Where a tab stands in the session lifecycle.
///
/// ```text
/// NoSession ──► EntryOffered ──► Active ──► Closing ──► NoSession
///     │                             ▲
///     ├──► OverwritePrompted ───────┘ (after the other session stops)
///     │         └──► Declined   (until the kept session closes)
///     ├──► Deferred      (another tab is root for this case page)
///     └──► PageSession   (this page is listed in another tab's session)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing to offer on this page.
    #[default]
    NoSession,
    /// Start or continue affordances are rendered.
    EntryOffered(EntryKind),
    /// A session for another case page exists; the user decides whether to
    /// replace it.
    OverwritePrompted {
        /// The session that would be replaced.
        existing: SessionInformation,
    },
    /// The user kept the session running on another case page. Nothing
    /// may start here until that session closes.
    Declined {
        /// The session the user chose to keep.
        existing: SessionInformation,
    },
    /// Another tab holds the root session for this case page.
    Deferred {
        /// The other tab's session.
        remote: SessionInformation,
    },
    /// This tab is the root.
    Active,
    /// The root session is being torn down.
    Closing,
    /// This page is under review from another tab.
    PageSession(PageListing),
}

impl SessionState {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoSession => "no-session",
            Self::EntryOffered(EntryKind::Start) => "entry-offered",
            Self::EntryOffered(EntryKind::Continue { .. }) => "continue-offered",
            Self::OverwritePrompted { .. } => "overwrite-prompted",
            Self::Declined { .. } => "declined",
            Self::Deferred { .. } => "deferred",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::PageSession(_) => "page-session",
        }
    }

    /// Whether a new root session may be started from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::NoSession | Self::EntryOffered(_))
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
