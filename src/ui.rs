//! Rendering port.
//!
//! The session layer tells a [`SessionUi`] what to show; it never builds
//! widgets itself. [`RecordingUi`] records every call as a [`UiEvent`] and can
//! be told to fail section preparation, which is how tests and the `simulate`
//! command observe a tab.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use crate::comms::{PageListing, RowStatus};
use crate::page::{Heading, SectionId};
use crate::storage::{CasePageCacheRecord, SessionInformation};

/// Rendering sink for one tab.
pub trait SessionUi: Send + Sync + std::fmt::Debug {
    /// Remove everything previously rendered by the session layer.
    fn clear(&self);

    /// Render "start session" affordances on each heading.
    fn offer_entry(&self, headings: &[Heading]);

    /// Render the "continue where you left off" prompt.
    fn offer_continue(&self, record: &CasePageCacheRecord);

    /// Render the "being edited in another tab" notice.
    fn show_elsewhere_notice(&self, session: &SessionInformation);

    /// Ask whether to stop the session running on another case page.
    fn show_overwrite_prompt(&self, existing: &SessionInformation);

    /// Build the working UI for a section. Returns `false` if it could not
    /// be prepared.
    fn prepare_section(&self, heading: &Heading) -> bool;

    /// Remove a section's working UI.
    fn teardown_section(&self, section: &SectionId);

    /// Render the "start working on this section" overlay.
    fn show_section_overlay(&self, section: &SectionId);

    /// Reflect a status change reported by a page session.
    fn update_row_status(&self, section: &SectionId, page: &str, status: RowStatus);

    /// Render the page toolbar of a page session.
    fn show_page_toolbar(&self, listing: &PageListing, page: &str);

    /// Remove the page toolbar.
    fn remove_page_toolbar(&self);
}

/// A recorded [`SessionUi`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// `clear`
    Cleared,
    /// `offer_entry`
    EntryOffered {
        /// Headings that received a start button.
        sections: Vec<SectionId>,
    },
    /// `offer_continue`
    ContinueOffered {
        /// Case page to continue.
        case_page_id: u64,
        /// Sections that would be reopened.
        sections: Vec<SectionId>,
    },
    /// `show_elsewhere_notice`
    ElsewhereNotice {
        /// Session held by the other tab.
        session: SessionInformation,
    },
    /// `show_overwrite_prompt`
    OverwritePrompt {
        /// Session that would be replaced.
        existing: SessionInformation,
    },
    /// `prepare_section` that succeeded.
    SectionPrepared(SectionId),
    /// `prepare_section` that failed.
    SectionFailed(SectionId),
    /// `teardown_section`
    SectionTornDown(SectionId),
    /// `show_section_overlay`
    SectionOverlay(SectionId),
    /// `update_row_status`
    RowStatus {
        /// Section listing the page.
        section: SectionId,
        /// Page title.
        page: String,
        /// New status.
        status: RowStatus,
    },
    /// `show_page_toolbar`
    PageToolbar {
        /// Listing the toolbar belongs to.
        listing: PageListing,
    },
    /// `remove_page_toolbar`
    PageToolbarRemoved,
}

/// [`SessionUi`] that records calls.
#[derive(Debug, Default)]
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
    failing: Mutex<HashSet<SectionId>>,
}

impl RecordingUi {
    /// Create a recorder with no failing sections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `prepare_section` fail for `section`.
    pub fn fail_section(&self, section: impl Into<SectionId>) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(section.into());
    }

    /// All events so far.
    pub fn events(&self) -> Vec<UiEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain recorded events.
    pub fn take(&self) -> Vec<UiEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// The most recent event.
    pub fn last(&self) -> Option<UiEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Whether any recorded event satisfies `predicate`.
    pub fn saw(&self, predicate: impl Fn(&UiEvent) -> bool) -> bool {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(predicate)
    }

    fn push(&self, event: UiEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl SessionUi for RecordingUi {
    fn clear(&self) {
        self.push(UiEvent::Cleared);
    }

    fn offer_entry(&self, headings: &[Heading]) {
        self.push(UiEvent::EntryOffered {
            sections: headings.iter().map(|h| h.id.clone()).collect(),
        });
    }

    fn offer_continue(&self, record: &CasePageCacheRecord) {
        self.push(UiEvent::ContinueOffered {
            case_page_id: record.page_id,
            sections: record.last_active_sections.clone(),
        });
    }

    fn show_elsewhere_notice(&self, session: &SessionInformation) {
        self.push(UiEvent::ElsewhereNotice {
            session: session.clone(),
        });
    }

    fn show_overwrite_prompt(&self, existing: &SessionInformation) {
        self.push(UiEvent::OverwritePrompt {
            existing: existing.clone(),
        });
    }

    fn prepare_section(&self, heading: &Heading) -> bool {
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&heading.id);
        if failing {
            self.push(UiEvent::SectionFailed(heading.id.clone()));
            false
        } else {
            self.push(UiEvent::SectionPrepared(heading.id.clone()));
            true
        }
    }

    fn teardown_section(&self, section: &SectionId) {
        self.push(UiEvent::SectionTornDown(section.clone()));
    }

    fn show_section_overlay(&self, section: &SectionId) {
        self.push(UiEvent::SectionOverlay(section.clone()));
    }

    fn update_row_status(&self, section: &SectionId, page: &str, status: RowStatus) {
        self.push(UiEvent::RowStatus {
            section: section.clone(),
            page: page.to_string(),
            status,
        });
    }

    fn show_page_toolbar(&self, listing: &PageListing, _page: &str) {
        self.push(UiEvent::PageToolbar {
            listing: listing.clone(),
        });
    }

    fn remove_page_toolbar(&self) {
        self.push(UiEvent::PageToolbarRemoved);
    }
}
