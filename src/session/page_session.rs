//! Page session: a satellite tab on a page listed in another tab's session.
//!
//! The satellite never writes the session record. It learns its listing by
//! asking the root, and reports status changes back as broadcasts.

use anyhow::Result;

use super::SessionContext;
use crate::comms::{DeputyMessage, PageListing, RowStatus};

/// Lightweight session for a listed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSession {
    listing: PageListing,
    page: String,
}

impl PageSession {
    /// Ask the root whether the current page is listed in an active section.
    ///
    /// Returns `None` if no root answers or the page is not listed.
    pub async fn discover(ctx: &SessionContext) -> Result<Option<Self>> {
        let page = ctx.page.title().to_string();
        let reply = ctx
            .comms
            .send_and_wait(
                DeputyMessage::PageStatusRequest { page: page.clone() },
                ctx.config.message_timeout(),
            )
            .await?;

        match reply.map(|envelope| envelope.message) {
            Some(DeputyMessage::PageStatusResponse {
                listing: Some(listing),
            }) => {
                log::info!(
                    "Page '{}' is listed in section {} of case page {}",
                    page,
                    listing.section,
                    listing.case_page_id
                );
                Ok(Some(Self { listing, page }))
            }
            _ => Ok(None),
        }
    }

    /// Where the page is listed.
    pub fn listing(&self) -> &PageListing {
        &self.listing
    }

    /// Whether this page session belongs to `case_page_id`.
    pub fn is_bound_to(&self, case_page_id: u64) -> bool {
        self.listing.case_page_id == case_page_id
    }

    /// Render the toolbar.
    pub fn open(&self, ctx: &SessionContext) {
        ctx.ui.show_page_toolbar(&self.listing, &self.page);
    }

    /// Report a new status to the root.
    pub async fn set_status(&mut self, ctx: &SessionContext, status: RowStatus) -> Result<()> {
        ctx.comms
            .send(DeputyMessage::PageStatusUpdate {
                case_page_id: self.listing.case_page_id,
                page: self.page.clone(),
                status,
            })
            .await?;
        self.listing.status = Some(status);
        Ok(())
    }

    /// Remove the toolbar.
    pub fn close(self, ctx: &SessionContext) {
        ctx.ui.remove_page_toolbar();
        log::info!("Page session for '{}' ended", self.page);
    }
}
