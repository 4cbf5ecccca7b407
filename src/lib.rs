//! Deputy - cross-tab session coordinator for case page review.
//!
//! A reviewer works through a case page (a list of headings, each listing
//! pages to check) in one browser tab while opening the listed pages in
//! others. Every tab on the origin runs a [`Session`]; together they agree on
//! a single root tab that owns the persisted session for one case page.
//!
//! # Architecture
//!
//! ```text
//!  tab A (root)              tab B (same case page)       tab C (listed page)
//!  Session ──┐               Session ──┐                   Session ──┐
//!            │  sessionStarted         │ sessionRequest              │ pageStatusRequest
//!            ▼                         ▼                             ▼
//!  ═══════════════════════ Communications / Transport ═══════════════════════
//!            │                                                       ▲
//!            ▼                                                       │
//!  Storage (keys.session, casePageCache.<id>)        pageStatusUpdate ┘
//! ```
//!
//! # Modules
//!
//! - [`comms`] - Message bus: broadcast, correlated request/reply
//! - [`storage`] - Durable key-value store and typed records
//! - [`case_page`] - Per-case-page cache of recently active sections
//! - [`session`] - Bootstrapping, root state machine, page sessions
//! - [`ui`] - Rendering port and a recording implementation
//! - [`config`] - Configuration loading/saving
//! - [`commands`] - CLI subcommands

pub mod case_page;
pub mod commands;
pub mod comms;
pub mod config;
pub mod constants;
pub mod env;
pub mod page;
pub mod session;
pub mod storage;
pub mod ui;

// Re-export commonly used types
pub use case_page::CasePage;
pub use comms::{Communications, DeputyMessage, Envelope, LocalOrigin, RowStatus, TabId};
pub use config::Config;
pub use page::{Heading, PageContext, SectionId, StaticPage};
pub use session::{Session, SessionContext, SessionState};
pub use storage::{CasePageCacheRecord, SessionInformation, Storage};
pub use ui::{RecordingUi, SessionUi, UiEvent};
