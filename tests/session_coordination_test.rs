// Integration tests for multi-tab session coordination
// Run with: cargo test --test session_coordination_test
//
// Every tab runs on one in-process LocalOrigin and shares one memory store,
// the way tabs of a browser share a BroadcastChannel and localStorage.

use std::sync::Arc;
use std::time::Duration;

use deputy::comms::PageListing;
use deputy::commands::simulate::demo_case_page;
use deputy::session::EntryKind;
use deputy::{
    Communications, Config, DeputyMessage, Heading, LocalOrigin, RecordingUi, RowStatus, SectionId,
    Session, SessionContext, SessionInformation, SessionState, StaticPage, Storage, UiEvent,
};

const TIMEOUT: Duration = Duration::from_millis(100);

struct Tab {
    session: Session,
    ui: Arc<RecordingUi>,
}

impl Tab {
    async fn state(&self) -> SessionState {
        self.session.state().await
    }
}

fn test_config() -> Config {
    Config::default().with_message_timeout(TIMEOUT)
}

async fn open_tab(origin: &LocalOrigin, storage: &Storage, name: &str, page: StaticPage) -> Tab {
    let ui = Arc::new(RecordingUi::new());
    let ctx = SessionContext::new(
        Communications::new(Arc::new(origin.connect_as(name.into()))),
        storage.clone(),
        test_config(),
        Arc::<RecordingUi>::clone(&ui),
        Arc::new(page),
    );
    let session = Session::start(ctx).await.unwrap();
    Tab { session, ui }
}

/// Let listener tasks drain pending broadcasts.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn other_case_page() -> StaticPage {
    StaticPage::case_page(
        43,
        "Case/Other",
        vec![Heading::new("S9", "Pages 1 to 5").with_pages(["Qux"])],
    )
}

fn s1_session() -> SessionInformation {
    SessionInformation::new(42, vec!["S1".into()])
}

fn continue_with(sections: &[&str]) -> SessionState {
    SessionState::EntryOffered(EntryKind::Continue {
        sections: sections.iter().map(|s| SectionId::from(*s)).collect(),
    })
}

// ============================================================================
// One root per case page
// ============================================================================

#[tokio::test]
async fn test_second_tab_on_same_case_page_defers() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();

    let a = open_tab(&origin, &storage, "tab-a", demo_case_page()).await;
    assert!(a.session.start_session(&"S1".into()).await.unwrap());

    let b = open_tab(&origin, &storage, "tab-b", demo_case_page()).await;
    assert_eq!(b.state().await, SessionState::Deferred { remote: s1_session() });
    assert!(!b.session.is_root().await);
    assert!(b.ui.saw(|e| *e == UiEvent::ElsewhereNotice { session: s1_session() }));

    // B must not have competed for the stored record.
    assert_eq!(storage.session_information().await.unwrap(), Some(s1_session()));
    assert_eq!(a.state().await, SessionState::Active);
}

#[tokio::test]
async fn test_entry_offered_tab_defers_when_another_tab_starts() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();

    let a = open_tab(&origin, &storage, "tab-a", demo_case_page()).await;
    let b = open_tab(&origin, &storage, "tab-b", demo_case_page()).await;
    assert_eq!(b.state().await, SessionState::EntryOffered(EntryKind::Start));

    a.session.start_session(&"S1".into()).await.unwrap();
    settle().await;

    assert_eq!(b.state().await, SessionState::Deferred { remote: s1_session() });
    assert!(b.session.start_session(&"S2".into()).await.is_err());
}

#[tokio::test]
async fn test_simultaneous_claims_resolve_to_one_root() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();

    let a = open_tab(&origin, &storage, "tab-a", demo_case_page()).await;
    let b = open_tab(&origin, &storage, "tab-b", demo_case_page()).await;

    // Both claim before either listener runs.
    let (section_a, section_b): (SectionId, SectionId) = ("S1".into(), "S2".into());
    let (a_started, b_started) = tokio::join!(
        a.session.start_session(&section_a),
        b.session.start_session(&section_b)
    );
    assert!(a_started.unwrap());
    assert!(b_started.unwrap());
    settle().await;

    // The smaller tab id keeps the role and has the last word in storage.
    assert_eq!(a.state().await, SessionState::Active);
    assert_eq!(b.state().await, SessionState::Deferred { remote: s1_session() });
    assert_eq!(storage.session_information().await.unwrap(), Some(s1_session()));
    assert!(b.ui.saw(|e| *e == UiEvent::SectionTornDown("S2".into())));
}

#[tokio::test]
async fn test_simultaneous_claims_on_different_case_pages() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();

    let a = open_tab(&origin, &storage, "tab-a", demo_case_page()).await;
    let b = open_tab(&origin, &storage, "tab-b", other_case_page()).await;
    assert_eq!(b.state().await, SessionState::EntryOffered(EntryKind::Start));

    let (section_a, section_b): (SectionId, SectionId) = ("S1".into(), "S9".into());
    let (a_started, b_started) = tokio::join!(
        a.session.start_session(&section_a),
        b.session.start_session(&section_b)
    );
    assert!(a_started.unwrap());
    assert!(b_started.unwrap());
    settle().await;

    // The loser is on another case page, so it is asked before replacing.
    assert_eq!(a.state().await, SessionState::Active);
    assert_eq!(
        b.state().await,
        SessionState::OverwritePrompted { existing: s1_session() }
    );
    assert!(b.ui.saw(|e| *e == UiEvent::OverwritePrompt { existing: s1_session() }));
    assert!(!b.ui.saw(|e| matches!(e, UiEvent::ElsewhereNotice { .. })));
    assert!(b.ui.saw(|e| *e == UiEvent::SectionTornDown("S9".into())));
    assert_eq!(storage.session_information().await.unwrap(), Some(s1_session()));
}

// ============================================================================
// Closing
// ============================================================================

#[tokio::test]
async fn test_closing_last_section_clears_session_and_reinitializes_others() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();

    let a = open_tab(&origin, &storage, "tab-a", demo_case_page()).await;
    a.session.start_session(&"S1".into()).await.unwrap();
    let b = open_tab(&origin, &storage, "tab-b", demo_case_page()).await;

    a.session.close_section(&"S1".into()).await.unwrap();
    settle().await;

    assert!(storage.session_information().await.unwrap().is_none());
    assert!(!a.session.is_root().await);
    assert_eq!(a.state().await, continue_with(&["S1"]));
    assert_eq!(b.state().await, continue_with(&["S1"]));
}

#[tokio::test]
async fn test_closing_one_of_two_sections_keeps_session() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();

    let a = open_tab(&origin, &storage, "tab-a", demo_case_page()).await;
    a.session.start_session(&"S1".into()).await.unwrap();
    assert!(a.session.activate_section(&"S2".into()).await.unwrap());

    a.session.close_section(&"S1".into()).await.unwrap();
    assert_eq!(a.state().await, SessionState::Active);
    assert_eq!(
        storage.session_information().await.unwrap(),
        Some(SessionInformation::new(42, vec!["S2".into()]))
    );
    assert_eq!(a.ui.last(), Some(UiEvent::SectionOverlay("S1".into())));
}

// ============================================================================
// Continue and restore
// ============================================================================

#[tokio::test]
async fn test_continue_offered_for_cached_sections() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();
    deputy::CasePage::new(42, storage.clone())
        .save_to_cache(&["S2".into()])
        .await
        .unwrap();

    let a = open_tab(&origin, &storage, "tab-a", demo_case_page()).await;
    assert_eq!(a.state().await, continue_with(&["S2"]));
    assert!(a.ui.saw(|e| matches!(e, UiEvent::ContinueOffered { case_page_id: 42, .. })));

    assert!(a.session.continue_session().await.unwrap());
    assert_eq!(
        a.session.session_information().await,
        Some(SessionInformation::new(42, vec!["S2".into()]))
    );
}

#[tokio::test]
async fn test_cache_without_surviving_sections_offers_entry() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();
    deputy::CasePage::new(42, storage.clone())
        .save_to_cache(&["removed-heading".into()])
        .await
        .unwrap();

    let a = open_tab(&origin, &storage, "tab-a", demo_case_page()).await;
    assert_eq!(a.state().await, SessionState::EntryOffered(EntryKind::Start));
}

#[tokio::test]
async fn test_reload_restores_root_from_storage() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();

    let a = open_tab(&origin, &storage, "tab-a", demo_case_page()).await;
    a.session.start_session(&"S1".into()).await.unwrap();
    a.session.activate_section(&"S2".into()).await.unwrap();
    let before = storage.session_information().await.unwrap();

    // The tab goes away without closing its session.
    a.session.context().dispose();
    settle().await;

    let reloaded = open_tab(&origin, &storage, "tab-a2", demo_case_page()).await;
    assert_eq!(reloaded.state().await, SessionState::Active);
    assert_eq!(reloaded.session.session_information().await, before);
    assert_eq!(storage.session_information().await.unwrap(), before);

    // Initializing again is a no-op for a root.
    reloaded.session.init().await.unwrap();
    assert_eq!(reloaded.state().await, SessionState::Active);
    assert_eq!(storage.session_information().await.unwrap(), before);
}

#[tokio::test]
async fn test_restore_with_no_surviving_sections_closes_session() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();
    storage
        .set_session_information(&SessionInformation::new(42, vec!["removed-heading".into()]))
        .await
        .unwrap();

    let a = open_tab(&origin, &storage, "tab-a", demo_case_page()).await;
    assert!(!a.session.is_root().await);
    assert!(storage.session_information().await.unwrap().is_none());
    assert_eq!(a.state().await, SessionState::EntryOffered(EntryKind::Start));
}

// ============================================================================
// Overwrite
// ============================================================================

#[tokio::test]
async fn test_overwrite_stops_live_root() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();

    let a = open_tab(&origin, &storage, "tab-a", demo_case_page()).await;
    a.session.start_session(&"S1".into()).await.unwrap();

    let x = open_tab(&origin, &storage, "tab-x", other_case_page()).await;
    assert_eq!(
        x.state().await,
        SessionState::OverwritePrompted { existing: s1_session() }
    );

    x.session.resolve_overwrite(true).await.unwrap();
    settle().await;

    assert!(!a.session.is_root().await);
    assert_eq!(a.state().await, continue_with(&["S1"]));
    assert_eq!(x.state().await, SessionState::EntryOffered(EntryKind::Start));

    assert!(x.session.start_session(&"S9".into()).await.unwrap());
    assert_eq!(
        storage.session_information().await.unwrap(),
        Some(SessionInformation::new(43, vec!["S9".into()]))
    );
}

#[tokio::test]
async fn test_overwrite_without_responder_clears_stale_session() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();
    storage.set_session_information(&s1_session()).await.unwrap();

    let x = open_tab(&origin, &storage, "tab-x", other_case_page()).await;
    x.session.resolve_overwrite(true).await.unwrap();

    assert!(storage.session_information().await.unwrap().is_none());
    assert_eq!(x.state().await, SessionState::EntryOffered(EntryKind::Start));
}

#[tokio::test]
async fn test_declining_overwrite_keeps_existing_session() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();
    storage.set_session_information(&s1_session()).await.unwrap();

    let x = open_tab(&origin, &storage, "tab-x", other_case_page()).await;
    x.session.resolve_overwrite(false).await.unwrap();

    assert_eq!(x.state().await, SessionState::Declined { existing: s1_session() });
    assert_eq!(storage.session_information().await.unwrap(), Some(s1_session()));
}

#[tokio::test]
async fn test_start_after_declining_overwrite_is_rejected() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();

    // The root sorts after the declining tab, so a claim would win the tie-break.
    let z = open_tab(&origin, &storage, "tab-z", demo_case_page()).await;
    z.session.start_session(&"S1".into()).await.unwrap();

    let a = open_tab(&origin, &storage, "tab-a", other_case_page()).await;
    a.session.resolve_overwrite(false).await.unwrap();

    assert!(a.session.start_session(&"S9".into()).await.is_err());
    assert!(a.session.continue_session_with(&["S9".into()]).await.is_err());
    settle().await;

    assert_eq!(storage.session_information().await.unwrap(), Some(s1_session()));
    assert!(z.session.is_root().await);
    assert_eq!(z.state().await, SessionState::Active);
}

#[tokio::test]
async fn test_declined_tab_offers_entry_once_kept_session_closes() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();

    let z = open_tab(&origin, &storage, "tab-z", demo_case_page()).await;
    z.session.start_session(&"S1".into()).await.unwrap();
    let a = open_tab(&origin, &storage, "tab-a", other_case_page()).await;
    a.session.resolve_overwrite(false).await.unwrap();

    z.session.close_session().await.unwrap();
    settle().await;

    assert_eq!(a.state().await, SessionState::EntryOffered(EntryKind::Start));
    assert!(a.session.start_session(&"S9".into()).await.unwrap());
}

// ============================================================================
// Page sessions
// ============================================================================

#[tokio::test]
async fn test_page_session_forwards_status_to_root() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();

    let a = open_tab(&origin, &storage, "tab-a", demo_case_page()).await;
    a.session.start_session(&"S1".into()).await.unwrap();

    let c = open_tab(&origin, &storage, "tab-c", StaticPage::plain(7, "Bar")).await;
    let listing = PageListing {
        case_page_id: 42,
        section: "S1".into(),
        status: None,
    };
    assert_eq!(c.state().await, SessionState::PageSession(listing.clone()));
    assert_eq!(c.ui.last(), Some(UiEvent::PageToolbar { listing }));

    c.session.set_page_status(RowStatus::WithViolations).await.unwrap();
    settle().await;
    assert!(a.ui.saw(|e| *e
        == UiEvent::RowStatus {
            section: "S1".into(),
            page: "Bar".to_string(),
            status: RowStatus::WithViolations,
        }));

    // A second tab on the same page sees the recorded status.
    let d = open_tab(&origin, &storage, "tab-d", StaticPage::plain(7, "Bar")).await;
    match d.state().await {
        SessionState::PageSession(listing) => {
            assert_eq!(listing.status, Some(RowStatus::WithViolations));
        }
        other => panic!("expected a page session, got {other}"),
    }
}

#[tokio::test]
async fn test_unlisted_page_gets_no_page_session() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();

    let a = open_tab(&origin, &storage, "tab-a", demo_case_page()).await;
    a.session.start_session(&"S1".into()).await.unwrap();

    // Baz is listed under S2, which is not active.
    let c = open_tab(&origin, &storage, "tab-c", StaticPage::plain(8, "Baz")).await;
    assert_eq!(c.state().await, SessionState::NoSession);
    assert!(c.ui.events().iter().all(|e| *e == UiEvent::Cleared));
}

#[tokio::test]
async fn test_page_session_ends_when_root_closes() {
    let origin = LocalOrigin::new();
    let storage = Storage::memory();

    let a = open_tab(&origin, &storage, "tab-a", demo_case_page()).await;
    a.session.start_session(&"S1".into()).await.unwrap();
    let c = open_tab(&origin, &storage, "tab-c", StaticPage::plain(7, "Foo")).await;
    assert!(matches!(c.state().await, SessionState::PageSession(_)));

    a.session.close_session().await.unwrap();
    settle().await;

    assert_eq!(c.state().await, SessionState::NoSession);
    assert!(c.ui.saw(|e| *e == UiEvent::PageToolbarRemoved));
}

// ============================================================================
// Message bus
// ============================================================================

#[tokio::test]
async fn test_concurrent_requests_get_their_own_replies() {
    let origin = LocalOrigin::new();
    let asker = Communications::new(Arc::new(origin.connect_as("tab-a".into())));
    let responder = Communications::new(Arc::new(origin.connect_as("tab-b".into())));
    let mut inbox = responder.subscribe();

    let answering = tokio::spawn(async move {
        let first = inbox.recv().await.unwrap();
        let second = inbox.recv().await.unwrap();
        // Answer in reverse order.
        for request in [second, first] {
            let DeputyMessage::PageStatusRequest { page } = &request.message else {
                panic!("unexpected {:?}", request.message);
            };
            let listing = PageListing {
                case_page_id: 42,
                section: SectionId::from(page.as_str()),
                status: None,
            };
            responder
                .reply(&request, DeputyMessage::PageStatusResponse { listing: Some(listing) })
                .await
                .unwrap();
        }
    });

    let wait = Duration::from_secs(2);
    let (foo, bar) = tokio::join!(
        asker.send_and_wait(DeputyMessage::PageStatusRequest { page: "Foo".into() }, wait),
        asker.send_and_wait(DeputyMessage::PageStatusRequest { page: "Bar".into() }, wait)
    );

    let section_of = |reply: Option<deputy::Envelope>| match reply.map(|e| e.message) {
        Some(DeputyMessage::PageStatusResponse { listing: Some(listing) }) => listing.section,
        other => panic!("unexpected reply {other:?}"),
    };
    assert_eq!(section_of(foo.unwrap()), SectionId::from("Foo"));
    assert_eq!(section_of(bar.unwrap()), SectionId::from("Bar"));
    answering.await.unwrap();
}
