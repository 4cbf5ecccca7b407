//! Session bootstrapping and cross-tab message handling.
//!
//! One [`Session`] runs per tab. On every page load [`Session::init`] reads
//! the stored [`SessionInformation`] and decides what this tab is:
//!
//! ```text
//! stored session?
//!   none ──────────────► case page? entry/continue UI : nothing
//!   same case page ────► sessionRequest ─► answered? defer : restore as root
//!   other case page ───► case page? overwrite prompt : pageStatusRequest ─► page session
//! ```
//!
//! A listener task ([`Session::spawn_listener`]) drains the tab's bus
//! subscription and dispatches each message through
//! [`Session::handle_message`]. The tab's mutable state sits behind an async
//! mutex that is never held while waiting for a reply.
//!
//! # Competing roots
//!
//! Query-then-claim leaves a window in which two tabs can both decide to be
//! root. Every new root broadcasts `sessionStarted`; a root receiving another
//! tab's `sessionStarted` keeps the role only if its tab id sorts first, and
//! otherwise tears down its UI and yields.
//!
//! Rust guideline compliant 2026-02

pub mod page_session;
pub mod root;
pub mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::case_page::CasePage;
use crate::comms::{Communications, DeputyMessage, Envelope, RowStatus, TabId};
use crate::config::{Config, CCI_MODULE};
use crate::page::{PageContext, SectionId};
use crate::storage::{SessionInformation, Storage};
use crate::ui::SessionUi;

pub use page_session::PageSession;
pub use root::{RootSession, SectionClose};
pub use state::{EntryKind, SessionState};

/// Everything a tab's session needs, passed explicitly.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Message bus client for this tab.
    pub comms: Communications,
    /// Origin-wide durable store.
    pub storage: Storage,
    /// Effective configuration.
    pub config: Config,
    /// Rendering sink.
    pub ui: Arc<dyn SessionUi>,
    /// The loaded page.
    pub page: Arc<dyn PageContext>,
    cancel: CancellationToken,
}

impl SessionContext {
    /// Assemble a context.
    pub fn new(
        comms: Communications,
        storage: Storage,
        config: Config,
        ui: Arc<dyn SessionUi>,
        page: Arc<dyn PageContext>,
    ) -> Self {
        Self {
            comms,
            storage,
            config,
            ui,
            page,
            cancel: CancellationToken::new(),
        }
    }

    /// This tab's identity.
    pub fn tab_id(&self) -> &TabId {
        self.comms.tab_id()
    }

    /// Stop the listener and close the transport (tab unload).
    pub fn dispose(&self) {
        self.cancel.cancel();
        self.comms.close();
    }

    /// Whether [`SessionContext::dispose`] ran.
    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Debug, Default)]
struct Core {
    state: SessionState,
    root: Option<RootSession>,
    page_session: Option<PageSession>,
}

impl Core {
    fn transition(&mut self, tab: &TabId, next: SessionState) {
        if self.state != next {
            log::info!("[{}] {} -> {}", tab, self.state, next);
        }
        self.state = next;
    }
}

#[derive(Debug)]
struct Inner {
    ctx: SessionContext,
    core: Mutex<Core>,
}

/// Handle to one tab's session. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Create an idle session. Call [`Session::init`] to bootstrap it.
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx,
                core: Mutex::new(Core::default()),
            }),
        }
    }

    /// Create a session, start its listener, and bootstrap it.
    pub async fn start(ctx: SessionContext) -> Result<Self> {
        let session = Self::new(ctx);
        session.spawn_listener();
        session.init().await?;
        Ok(session)
    }

    /// The tab's context.
    pub fn context(&self) -> &SessionContext {
        &self.inner.ctx
    }

    /// Current state.
    pub async fn state(&self) -> SessionState {
        self.inner.core.lock().await.state.clone()
    }

    /// The session this tab owns as root, if any.
    pub async fn session_information(&self) -> Option<SessionInformation> {
        self.inner
            .core
            .lock()
            .await
            .root
            .as_ref()
            .map(|root| root.info().clone())
    }

    /// Whether this tab is the root.
    pub async fn is_root(&self) -> bool {
        self.inner.core.lock().await.root.is_some()
    }

    // ========================================================================
    // Bootstrapping
    // ========================================================================

    /// Decide this tab's role from stored state and the other tabs.
    pub async fn init(&self) -> Result<()> {
        let ctx = self.context();
        if !ctx.config.is_module_enabled(CCI_MODULE) {
            log::debug!("[{}] Case page sessions disabled", ctx.tab_id());
            return Ok(());
        }
        if ctx.is_disposed() {
            log::debug!("[{}] Tab disposed, not initializing", ctx.tab_id());
            return Ok(());
        }

        {
            let mut core = self.inner.core.lock().await;
            if core.root.is_some() {
                log::debug!("[{}] Already root, nothing to initialize", ctx.tab_id());
                return Ok(());
            }
            if let Some(page_session) = core.page_session.take() {
                page_session.close(ctx);
            }
            ctx.ui.clear();
            core.transition(ctx.tab_id(), SessionState::NoSession);
        }

        let page_id = ctx.page.page_id();
        match ctx.storage.session_information().await? {
            None => {
                if ctx.page.is_case_page() {
                    let mut core = self.inner.core.lock().await;
                    self.offer_entry(&mut core).await?;
                }
            }
            Some(stored) if stored.case_page_id == page_id => match self.query_root().await? {
                Some(remote) => {
                    let mut core = self.inner.core.lock().await;
                    self.yield_to(&mut core, remote);
                }
                None => self.restore(stored).await?,
            },
            Some(stored) => {
                if ctx.page.is_case_page() {
                    let mut core = self.inner.core.lock().await;
                    ctx.ui.show_overwrite_prompt(&stored);
                    core.transition(
                        ctx.tab_id(),
                        SessionState::OverwritePrompted { existing: stored },
                    );
                } else if let Some(page_session) = PageSession::discover(ctx).await? {
                    let mut core = self.inner.core.lock().await;
                    page_session.open(ctx);
                    core.transition(
                        ctx.tab_id(),
                        SessionState::PageSession(page_session.listing().clone()),
                    );
                    core.page_session = Some(page_session);
                }
            }
        }
        Ok(())
    }

    /// Ask the other tabs whether one of them is root.
    async fn query_root(&self) -> Result<Option<SessionInformation>> {
        let ctx = self.context();
        let reply = ctx
            .comms
            .send_and_wait(DeputyMessage::SessionRequest, ctx.config.message_timeout())
            .await?;
        Ok(match reply.map(|envelope| envelope.message) {
            Some(DeputyMessage::SessionResponse { session }) => session,
            _ => None,
        })
    }

    /// Rebuild the root session from storage after a reload or crash.
    async fn restore(&self, stored: SessionInformation) -> Result<()> {
        let ctx = self.context();
        let mut core = self.inner.core.lock().await;
        if core.root.is_some() {
            return Ok(());
        }

        log::info!(
            "[{}] Restoring session on case page {} ({} section(s))",
            ctx.tab_id(),
            stored.case_page_id,
            stored.case_sections.len()
        );
        match RootSession::establish(ctx, stored.case_page_id, &stored.case_sections).await? {
            Some(root) => self.become_root(&mut core, root).await,
            None => {
                ctx.comms
                    .send(DeputyMessage::SessionClosed {
                        case_page_id: stored.case_page_id,
                    })
                    .await?;
                self.offer_entry(&mut core).await
            }
        }
    }

    /// Render continue (if cached sections still exist) or entry UI.
    async fn offer_entry(&self, core: &mut Core) -> Result<()> {
        let ctx = self.context();
        let cached = CasePage::new(ctx.page.page_id(), ctx.storage.clone())
            .cache_info()
            .await?;

        match cached {
            Some(mut record) => {
                record
                    .last_active_sections
                    .retain(|section| ctx.page.heading(section).is_some());
                if record.last_active_sections.is_empty() {
                    ctx.ui.offer_entry(ctx.page.headings());
                    core.transition(ctx.tab_id(), SessionState::EntryOffered(EntryKind::Start));
                } else {
                    ctx.ui.offer_continue(&record);
                    core.transition(
                        ctx.tab_id(),
                        SessionState::EntryOffered(EntryKind::Continue {
                            sections: record.last_active_sections,
                        }),
                    );
                }
            }
            None => {
                ctx.ui.offer_entry(ctx.page.headings());
                core.transition(ctx.tab_id(), SessionState::EntryOffered(EntryKind::Start));
            }
        }
        Ok(())
    }

    fn yield_to(&self, core: &mut Core, remote: SessionInformation) {
        let ctx = self.context();
        if remote.case_page_id == ctx.page.page_id() {
            ctx.ui.show_elsewhere_notice(&remote);
            core.transition(ctx.tab_id(), SessionState::Deferred { remote });
        } else {
            ctx.ui.show_overwrite_prompt(&remote);
            core.transition(
                ctx.tab_id(),
                SessionState::OverwritePrompted { existing: remote },
            );
        }
    }

    async fn become_root(&self, core: &mut Core, root: RootSession) -> Result<()> {
        let ctx = self.context();
        let session = root.info().clone();
        core.root = Some(root);
        core.transition(ctx.tab_id(), SessionState::Active);
        ctx.comms
            .send(DeputyMessage::SessionStarted { session })
            .await?;
        Ok(())
    }

    // ========================================================================
    // User actions
    // ========================================================================

    /// Start a session on one section of the current case page.
    ///
    /// Returns `false` if the section could not be opened.
    pub async fn start_session(&self, section: &SectionId) -> Result<bool> {
        self.claim(std::slice::from_ref(section)).await
    }

    /// Reopen the sections cached from the last visit.
    pub async fn continue_session(&self) -> Result<bool> {
        let sections = match self.state().await {
            SessionState::EntryOffered(EntryKind::Continue { sections }) => sections,
            other => anyhow::bail!("Nothing to continue ({})", other),
        };
        self.claim(&sections).await
    }

    /// Start a session on the given sections of the current case page.
    pub async fn continue_session_with(&self, sections: &[SectionId]) -> Result<bool> {
        self.claim(sections).await
    }

    async fn claim(&self, sections: &[SectionId]) -> Result<bool> {
        let ctx = self.context();
        if !ctx.page.is_case_page() {
            anyhow::bail!("Page {} is not a case page", ctx.page.page_id());
        }
        for section in sections {
            ctx.page
                .heading(section)
                .with_context(|| format!("No section {} on this page", section))?;
        }

        let mut core = self.inner.core.lock().await;
        if !core.state.can_start() {
            anyhow::bail!("Cannot start a session while {}", core.state);
        }

        ctx.ui.clear();
        match RootSession::establish(ctx, ctx.page.page_id(), sections).await? {
            Some(root) => {
                self.become_root(&mut core, root).await?;
                Ok(true)
            }
            None => {
                self.offer_entry(&mut core).await?;
                Ok(false)
            }
        }
    }

    /// Open another section of the active session.
    pub async fn activate_section(&self, section: &SectionId) -> Result<bool> {
        let ctx = self.context();
        let heading = ctx
            .page
            .heading(section)
            .with_context(|| format!("No section {} on this page", section))?;

        let mut core = self.inner.core.lock().await;
        let root = core.root.as_mut().context("No active session in this tab")?;
        root.activate_section(ctx, heading).await
    }

    /// Close one section; closing the last one closes the session.
    pub async fn close_section(&self, section: &SectionId) -> Result<()> {
        let outcome = {
            let mut core = self.inner.core.lock().await;
            let root = core.root.as_mut().context("No active session in this tab")?;
            root.close_section(self.context(), section).await?
        };

        match outcome {
            SectionClose::LastSection => self.close_session().await,
            SectionClose::NotActive => {
                log::debug!("Section {} was not active", section);
                Ok(())
            }
            SectionClose::Remaining => Ok(()),
        }
    }

    /// Close the session and re-initialize this tab.
    pub async fn close_session(&self) -> Result<()> {
        let ctx = self.context();
        {
            let mut core = self.inner.core.lock().await;
            let root = core.root.take().context("No active session in this tab")?;
            core.transition(ctx.tab_id(), SessionState::Closing);
            root.close(ctx).await?;
            core.transition(ctx.tab_id(), SessionState::NoSession);
        }
        self.init().await
    }

    /// Answer the overwrite prompt.
    ///
    /// Accepting asks the other root to stop and clears the stored session
    /// whether or not anyone answered. Declining keeps the tab out of the
    /// way until the kept session broadcasts `sessionClosed`.
    pub async fn resolve_overwrite(&self, accept: bool) -> Result<()> {
        let ctx = self.context();
        let existing = match self.state().await {
            SessionState::OverwritePrompted { existing } => existing,
            other => anyhow::bail!("No overwrite decision pending ({})", other),
        };

        if !accept {
            let mut core = self.inner.core.lock().await;
            ctx.ui.clear();
            core.transition(ctx.tab_id(), SessionState::Declined { existing });
            return Ok(());
        }

        let reply = ctx
            .comms
            .send_and_wait(
                DeputyMessage::SessionStop {
                    case_page_id: existing.case_page_id,
                },
                ctx.config.message_timeout(),
            )
            .await?;
        match reply.map(|envelope| envelope.message) {
            Some(DeputyMessage::SessionStopResponse { stopped: true }) => log::info!(
                "[{}] Session on case page {} stopped by its tab",
                ctx.tab_id(),
                existing.case_page_id
            ),
            _ => log::info!(
                "[{}] No tab stopped case page {}, clearing stored session",
                ctx.tab_id(),
                existing.case_page_id
            ),
        }

        ctx.storage.clear_session_information().await?;
        self.init().await
    }

    /// Report a status change from this tab's page session.
    pub async fn set_page_status(&self, status: RowStatus) -> Result<()> {
        let ctx = self.context();
        let mut core = self.inner.core.lock().await;
        let page_session = core
            .page_session
            .as_mut()
            .context("This page has no page session")?;
        page_session.set_status(ctx, status).await?;
        let listing = page_session.listing().clone();
        core.transition(ctx.tab_id(), SessionState::PageSession(listing));
        Ok(())
    }

    // ========================================================================
    // Message handling
    // ========================================================================

    /// Spawn the task that dispatches this tab's incoming messages until the
    /// context is disposed.
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let mut subscription = self.context().comms.subscribe();
        let cancel = self.context().cancel.clone();
        let session = self.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    next = subscription.recv() => {
                        let Some(envelope) = next else { break };
                        let type_name = envelope.message.type_name();
                        if let Err(e) = session.handle_message(envelope).await {
                            log::warn!(
                                "[{}] Failed to handle {}: {:#}",
                                session.context().tab_id(),
                                type_name,
                                e
                            );
                        }
                    }
                }
            }
            log::debug!("[{}] Listener stopped", session.context().tab_id());
        })
    }

    /// Dispatch one message from another tab.
    pub async fn handle_message(&self, envelope: Envelope) -> Result<()> {
        let ctx = self.context();
        match &envelope.message {
            DeputyMessage::SessionRequest => {
                let session = self.session_information().await;
                if let Some(session) = session {
                    ctx.comms
                        .reply(
                            &envelope,
                            DeputyMessage::SessionResponse {
                                session: Some(session),
                            },
                        )
                        .await?;
                }
            }
            DeputyMessage::SessionStop { case_page_id } => {
                let stopped = {
                    let mut core = self.inner.core.lock().await;
                    match core.root.take() {
                        Some(root) if root.case_page_id() == *case_page_id => {
                            core.transition(ctx.tab_id(), SessionState::Closing);
                            root.close(ctx).await?;
                            core.transition(ctx.tab_id(), SessionState::NoSession);
                            true
                        }
                        other => {
                            core.root = other;
                            false
                        }
                    }
                };
                if stopped {
                    log::info!(
                        "[{}] Stopped session on request of tab {}",
                        ctx.tab_id(),
                        envelope.sender
                    );
                    ctx.comms
                        .reply(&envelope, DeputyMessage::SessionStopResponse { stopped: true })
                        .await?;
                    self.init().await?;
                }
            }
            DeputyMessage::PageStatusRequest { page } => {
                let listing = {
                    let core = self.inner.core.lock().await;
                    core.root.as_ref().map(|root| root.listing_for(ctx, page))
                };
                if let Some(listing) = listing {
                    ctx.comms
                        .reply(&envelope, DeputyMessage::PageStatusResponse { listing })
                        .await?;
                }
            }
            DeputyMessage::PageStatusUpdate {
                case_page_id,
                page,
                status,
            } => {
                let mut core = self.inner.core.lock().await;
                if let Some(root) = core.root.as_mut() {
                    if root.case_page_id() == *case_page_id {
                        root.record_status(ctx, page, *status);
                    }
                }
            }
            DeputyMessage::SessionStarted { session } => {
                self.on_session_started(&envelope.sender, session).await?;
            }
            DeputyMessage::SessionClosed { case_page_id } => {
                let reinit = {
                    let core = self.inner.core.lock().await;
                    match &core.state {
                        SessionState::Deferred { remote } => remote.case_page_id == *case_page_id,
                        SessionState::Declined { existing } => {
                            existing.case_page_id == *case_page_id
                        }
                        SessionState::PageSession(_) => core
                            .page_session
                            .as_ref()
                            .is_some_and(|page_session| page_session.is_bound_to(*case_page_id)),
                        _ => false,
                    }
                };
                if reinit {
                    log::info!(
                        "[{}] Session on case page {} closed elsewhere",
                        ctx.tab_id(),
                        case_page_id
                    );
                    self.init().await?;
                }
            }
            DeputyMessage::SessionResponse { .. }
            | DeputyMessage::SessionStopResponse { .. }
            | DeputyMessage::PageStatusResponse { .. } => {
                // Consumed by whichever send_and_wait is waiting for it.
            }
        }
        Ok(())
    }

    async fn on_session_started(&self, sender: &TabId, session: &SessionInformation) -> Result<()> {
        let ctx = self.context();
        let mut core = self.inner.core.lock().await;

        if core.root.is_some() {
            if sender < ctx.tab_id() {
                if let Some(root) = core.root.take() {
                    root.demote(ctx);
                }
                ctx.ui.clear();
                self.yield_to(&mut core, session.clone());
            } else if let Some(root) = core.root.as_ref() {
                log::warn!(
                    "[{}] Tab {} also claimed a session, keeping the root role",
                    ctx.tab_id(),
                    sender
                );
                // The other tab may have written last.
                ctx.storage.set_session_information(root.info()).await?;
            }
            return Ok(());
        }

        let same_case_page =
            ctx.page.is_case_page() && ctx.page.page_id() == session.case_page_id;
        match &core.state {
            SessionState::EntryOffered(_) if same_case_page => {
                ctx.ui.clear();
                self.yield_to(&mut core, session.clone());
            }
            SessionState::Deferred { .. } if same_case_page => {
                core.transition(
                    ctx.tab_id(),
                    SessionState::Deferred {
                        remote: session.clone(),
                    },
                );
            }
            _ => {}
        }
        Ok(())
    }
}
