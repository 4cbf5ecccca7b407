// Integration tests for the file-backed store
// Run with: cargo test --test storage_test

use std::sync::Arc;
use std::time::Duration;

use deputy::commands::simulate::demo_case_page;
use deputy::session::EntryKind;
use deputy::{
    CasePage, CasePageCacheRecord, Communications, Config, LocalOrigin, RecordingUi, Session,
    SessionContext, SessionInformation, SessionState, Storage,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_session_survives_reopening_the_store() {
    let temp_dir = TempDir::new().unwrap();
    let info = SessionInformation::new(42, vec!["S1".into(), "S2".into()]);

    Storage::open(temp_dir.path())
        .unwrap()
        .set_session_information(&info)
        .await
        .unwrap();

    let reopened = Storage::open(temp_dir.path()).unwrap();
    assert_eq!(reopened.session_information().await.unwrap(), Some(info));
    assert!(temp_dir.path().join("keys.session.json").exists());
}

#[tokio::test]
async fn test_stored_session_uses_camel_case_keys() {
    let temp_dir = TempDir::new().unwrap();
    let storage = Storage::open(temp_dir.path()).unwrap();
    storage
        .set_session_information(&SessionInformation::new(42, vec!["S1".into()]))
        .await
        .unwrap();

    let raw = std::fs::read_to_string(temp_dir.path().join("keys.session.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["casePageId"], 42);
    assert_eq!(value["caseSections"], serde_json::json!(["S1"]));
}

#[tokio::test]
async fn test_malformed_session_file_is_discarded() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("keys.session.json");
    std::fs::write(&path, r#"{"casePageId": 0, "caseSections": []}"#).unwrap();

    let storage = Storage::open(temp_dir.path()).unwrap();
    assert!(storage.session_information().await.unwrap().is_none());
    assert!(!path.exists(), "malformed record should be deleted");
}

#[tokio::test]
async fn test_unparsable_cache_file_is_skipped_in_listing() {
    let temp_dir = TempDir::new().unwrap();
    let storage = Storage::open(temp_dir.path()).unwrap();
    CasePage::new(42, storage.clone()).bump().await.unwrap();
    std::fs::write(temp_dir.path().join("casePageCache.7.json"), "{not json").unwrap();

    let records = storage.case_pages().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].page_id, 42);
    assert!(!temp_dir.path().join("casePageCache.7.json").exists());
}

#[tokio::test]
async fn test_prune_removes_only_stale_records() {
    let temp_dir = TempDir::new().unwrap();
    let storage = Storage::open(temp_dir.path()).unwrap();

    let mut stale = CasePageCacheRecord::new(1);
    stale.last_active = chrono::Utc::now() - chrono::Duration::days(61);
    storage.put_case_page(&stale).await.unwrap();
    storage.put_case_page(&CasePageCacheRecord::new(2)).await.unwrap();

    let pruned = storage
        .prune_case_pages(Config::default().cache_retention())
        .await
        .unwrap();
    assert_eq!(pruned, 1);
    let remaining: Vec<u64> = storage
        .case_pages()
        .await
        .unwrap()
        .iter()
        .map(|r| r.page_id)
        .collect();
    assert_eq!(remaining, vec![2]);
}

#[tokio::test]
async fn test_session_over_file_store_offers_continue_after_restart() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::default().with_message_timeout(Duration::from_millis(50));

    let open = |origin: &LocalOrigin| {
        SessionContext::new(
            Communications::new(Arc::new(origin.connect())),
            Storage::open(temp_dir.path()).unwrap(),
            config.clone(),
            Arc::new(RecordingUi::new()),
            Arc::new(demo_case_page()),
        )
    };

    let first_run = LocalOrigin::new();
    let session = Session::start(open(&first_run)).await.unwrap();
    session.start_session(&"S2".into()).await.unwrap();
    session.close_session().await.unwrap();
    session.context().dispose();

    // A fresh origin stands in for a new browser session.
    let second_run = LocalOrigin::new();
    let session = Session::start(open(&second_run)).await.unwrap();
    assert_eq!(
        session.state().await,
        SessionState::EntryOffered(EntryKind::Continue {
            sections: vec!["S2".into()]
        })
    );
}
