//! Root session: the one tab authoritative for a case page.
//!
//! The root owns the persisted [`SessionInformation`]. Every change to the
//! active section set is written through to storage and to the case page
//! cache before the call returns.

use std::collections::HashMap;

use anyhow::Result;

use super::SessionContext;
use crate::case_page::CasePage;
use crate::comms::{DeputyMessage, PageListing, RowStatus};
use crate::page::{Heading, SectionId};
use crate::storage::SessionInformation;

/// Result of [`RootSession::close_section`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionClose {
    /// The section was not active.
    NotActive,
    /// The section closed and others remain.
    Remaining,
    /// It was the last section; the whole session must close.
    LastSection,
}

/// State owned by the root tab.
#[derive(Debug)]
pub struct RootSession {
    case_page: CasePage,
    info: SessionInformation,
    statuses: HashMap<String, RowStatus>,
}

impl RootSession {
    /// Build a root session for `case_page_id` and activate `sections`.
    ///
    /// Sections missing from the page or failing to prepare are skipped.
    /// Returns `None` if no section could be activated; any stored session
    /// is cleared in that case so no empty session is left behind.
    pub async fn establish(
        ctx: &SessionContext,
        case_page_id: u64,
        sections: &[SectionId],
    ) -> Result<Option<Self>> {
        let mut root = Self {
            case_page: CasePage::new(case_page_id, ctx.storage.clone()),
            info: SessionInformation::new(case_page_id, Vec::new()),
            statuses: HashMap::new(),
        };
        root.case_page.bump().await?;

        for section in sections {
            match ctx.page.heading(section) {
                Some(heading) => {
                    root.activate_section(ctx, heading).await?;
                }
                None => log::warn!(
                    "Section {} no longer exists on case page {}",
                    section,
                    case_page_id
                ),
            }
        }

        if root.info.case_sections.is_empty() {
            log::info!(
                "No sections of case page {} could be opened, not starting a session",
                case_page_id
            );
            ctx.storage.clear_session_information().await?;
            return Ok(None);
        }

        Ok(Some(root))
    }

    /// The session as persisted.
    pub fn info(&self) -> &SessionInformation {
        &self.info
    }

    /// Case page id.
    pub fn case_page_id(&self) -> u64 {
        self.info.case_page_id
    }

    /// Open a section. Returns `false` if its UI could not be prepared.
    ///
    /// Already active sections are left alone.
    pub async fn activate_section(&mut self, ctx: &SessionContext, heading: &Heading) -> Result<bool> {
        if self.info.has_section(&heading.id) {
            return Ok(true);
        }
        if !ctx.ui.prepare_section(heading) {
            log::warn!("Could not prepare section {}, leaving it closed", heading.id);
            return Ok(false);
        }

        self.info.case_sections.push(heading.id.clone());
        ctx.storage.set_session_information(&self.info).await?;
        self.case_page.add_active_section(&heading.id).await?;
        log::info!(
            "Activated section {} on case page {}",
            heading.id,
            self.info.case_page_id
        );
        Ok(true)
    }

    /// Close a section.
    ///
    /// The last section is left in place and reported as
    /// [`SectionClose::LastSection`]; the caller closes the whole session.
    pub async fn close_section(&mut self, ctx: &SessionContext, section: &SectionId) -> Result<SectionClose> {
        if !self.info.has_section(section) {
            return Ok(SectionClose::NotActive);
        }
        if self.info.case_sections.len() == 1 {
            return Ok(SectionClose::LastSection);
        }

        self.info.case_sections.retain(|s| s != section);
        ctx.ui.teardown_section(section);
        ctx.storage.set_session_information(&self.info).await?;
        self.case_page.remove_active_section(section).await?;
        ctx.ui.show_section_overlay(section);
        log::info!("Closed section {}", section);
        Ok(SectionClose::Remaining)
    }

    /// Tear down the session: UI, cache, stored record, then broadcast
    /// `sessionClosed`.
    pub async fn close(self, ctx: &SessionContext) -> Result<()> {
        for section in &self.info.case_sections {
            ctx.ui.teardown_section(section);
        }
        self.case_page.save_to_cache(&self.info.case_sections).await?;
        ctx.storage.clear_session_information().await?;
        ctx.comms
            .send(DeputyMessage::SessionClosed {
                case_page_id: self.info.case_page_id,
            })
            .await?;
        log::info!("Closed session on case page {}", self.info.case_page_id);
        Ok(())
    }

    /// Give up the root role to another tab without touching storage.
    pub fn demote(self, ctx: &SessionContext) {
        for section in &self.info.case_sections {
            ctx.ui.teardown_section(section);
        }
        log::warn!(
            "Yielded root role for case page {} to another tab",
            self.info.case_page_id
        );
    }

    /// Where `page` is listed among the active sections.
    pub fn listing_for(&self, ctx: &SessionContext, page: &str) -> Option<PageListing> {
        self.info
            .case_sections
            .iter()
            .filter_map(|id| ctx.page.heading(id))
            .find(|heading| heading.lists(page))
            .map(|heading| PageListing {
                case_page_id: self.info.case_page_id,
                section: heading.id.clone(),
                status: self.statuses.get(page).copied(),
            })
    }

    /// Apply a status reported by a page session. Returns whether the page
    /// is listed in an active section.
    pub fn record_status(&mut self, ctx: &SessionContext, page: &str, status: RowStatus) -> bool {
        let Some(listing) = self.listing_for(ctx, page) else {
            log::debug!("Ignoring status for unlisted page {}", page);
            return false;
        };
        self.statuses.insert(page.to_string(), status);
        ctx.ui.update_row_status(&listing.section, page, status);
        true
    }
}
