//! Simulate command - walks three tabs through a review session.
//!
//! Everything runs in-process: one [`LocalOrigin`], one memory-backed
//! [`Storage`], and a [`RecordingUi`] per tab. Useful for watching the
//! protocol with `RUST_LOG=debug`.
//!
//! ```text
//! tab A  case page 42   start S1 ─────────────── close S1 ──► continue offered
//! tab B  case page 42        └─► deferred ─────────────────► continue offered
//! tab C  page "Foo"              └─► page session ─ status ─► no session
//! ```

use std::sync::Arc;

use anyhow::Result;

use crate::comms::{Communications, LocalOrigin, RowStatus};
use crate::config::Config;
use crate::constants::SIMULATION_STEP_DELAY;
use crate::page::{Heading, StaticPage};
use crate::session::{Session, SessionContext, SessionState};
use crate::storage::Storage;
use crate::ui::{RecordingUi, UiEvent};

/// Case page used by the walkthrough.
pub fn demo_case_page() -> StaticPage {
    StaticPage::case_page(
        42,
        "Case/Example",
        vec![
            Heading::new("S1", "Pages 1 to 10").with_pages(["Foo", "Bar"]),
            Heading::new("S2", "Pages 11 to 20").with_pages(["Baz"]),
        ],
    )
}

struct Tab {
    name: &'static str,
    session: Session,
    ui: Arc<RecordingUi>,
}

async fn open_tab(
    origin: &LocalOrigin,
    storage: &Storage,
    config: &Config,
    name: &'static str,
    page: StaticPage,
) -> Result<Tab> {
    let ui = Arc::new(RecordingUi::new());
    let ctx = SessionContext::new(
        Communications::new(Arc::new(origin.connect_as(name.into()))),
        storage.clone(),
        config.clone(),
        Arc::<RecordingUi>::clone(&ui),
        Arc::new(page),
    );
    let session = Session::start(ctx).await?;
    Ok(Tab { name, session, ui })
}

async fn report(step: &str, tabs: &[&Tab]) {
    println!("{step}");
    for tab in tabs {
        println!("  {:<6} {}", tab.name, tab.session.state().await);
    }
}

async fn settle() {
    tokio::time::sleep(SIMULATION_STEP_DELAY).await;
}

/// Run the walkthrough and return the final state of tabs A, B and C.
pub async fn run(config: &Config) -> Result<Vec<SessionState>> {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();

    let a = open_tab(&origin, &storage, config, "tab-a", demo_case_page()).await?;
    report("1. Tab A opens the case page", &[&a]).await;

    a.session.start_session(&"S1".into()).await?;
    settle().await;
    report("2. Tab A starts section S1", &[&a]).await;

    let b = open_tab(&origin, &storage, config, "tab-b", demo_case_page()).await?;
    report("3. Tab B opens the same case page", &[&a, &b]).await;

    let c = open_tab(&origin, &storage, config, "tab-c", StaticPage::plain(7, "Foo")).await?;
    report("4. Tab C opens listed page Foo", &[&a, &b, &c]).await;

    c.session.set_page_status(RowStatus::WithoutViolations).await?;
    settle().await;
    report("5. Tab C marks Foo without violations", &[&a, &b, &c]).await;
    if let Some(UiEvent::RowStatus { page, status, .. }) = a.ui.last() {
        println!("  tab-a  row {page} now {status:?}");
    }

    a.session.close_section(&"S1".into()).await?;
    settle().await;
    report("6. Tab A closes its last section", &[&a, &b, &c]).await;

    let mut states = Vec::new();
    for tab in [&a, &b, &c] {
        states.push(tab.session.state().await);
        tab.session.context().dispose();
    }
    Ok(states)
}
