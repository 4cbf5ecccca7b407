//! Durable origin-scoped key-value storage.
//!
//! All tabs of an origin share one store. It offers get/put/delete by key with
//! last-write-wins semantics and no transactions; the root session is the only
//! intended writer of the session key.
//!
//! # Storage structure
//!
//! ```text
//! keys.session              # SessionInformation of the active session
//! casePageCache.<page id>   # CasePageCacheRecord, one per case page
//! ```
//!
//! [`Storage`] is the typed facade the coordinator uses. It validates every
//! record it reads; malformed records are logged, deleted, and reported as
//! absent.

// Rust guideline compliant 2026-02

pub mod file;
pub mod memory;
pub mod records;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;

use crate::constants::{CASE_PAGE_CACHE_PREFIX, SESSION_KEY};

pub use file::FileStore;
pub use memory::MemoryStore;
pub use records::{CasePageCacheRecord, SessionInformation};

/// Raw key-value backend.
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// Remove `key`. Returns whether a value existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// All keys starting with `prefix`, sorted.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Typed access to session and case page records.
#[derive(Debug, Clone)]
pub struct Storage {
    store: Arc<dyn KeyValueStore>,
}

impl Storage {
    /// Wrap a backend.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Storage backed by a fresh in-memory store.
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Storage backed by JSON files under `dir`.
    pub fn open(dir: impl Into<std::path::PathBuf>) -> Result<Self> {
        let store = FileStore::open(dir)?;
        log::debug!("Opened storage at {}", store.dir().display());
        Ok(Self::new(Arc::new(store)))
    }

    // ========================================================================
    // Session information
    // ========================================================================

    /// The persisted session, if any and well-formed.
    pub async fn session_information(&self) -> Result<Option<SessionInformation>> {
        self.read_validated(SESSION_KEY, SessionInformation::validate)
            .await
    }

    /// Persist the session record.
    pub async fn set_session_information(&self, info: &SessionInformation) -> Result<()> {
        let value = serde_json::to_value(info).context("Failed to serialize session")?;
        self.store.put(SESSION_KEY, value).await?;
        log::debug!(
            "Saved session for case page {} ({} section(s))",
            info.case_page_id,
            info.case_sections.len()
        );
        Ok(())
    }

    /// Delete the session record.
    pub async fn clear_session_information(&self) -> Result<()> {
        if self.store.delete(SESSION_KEY).await? {
            log::debug!("Cleared stored session");
        }
        Ok(())
    }

    // ========================================================================
    // Case page cache
    // ========================================================================

    /// Cache record for a case page.
    pub async fn case_page(&self, page_id: u64) -> Result<Option<CasePageCacheRecord>> {
        self.read_validated(&case_page_key(page_id), CasePageCacheRecord::validate)
            .await
    }

    /// Create or replace a cache record.
    pub async fn put_case_page(&self, record: &CasePageCacheRecord) -> Result<()> {
        let value = serde_json::to_value(record).context("Failed to serialize case page cache")?;
        self.store.put(&case_page_key(record.page_id), value).await
    }

    /// Delete a cache record. Returns whether one existed.
    pub async fn delete_case_page(&self, page_id: u64) -> Result<bool> {
        self.store.delete(&case_page_key(page_id)).await
    }

    /// All valid cache records, most recently active first.
    pub async fn case_pages(&self) -> Result<Vec<CasePageCacheRecord>> {
        let mut records = Vec::new();
        for key in self.store.keys(CASE_PAGE_CACHE_PREFIX).await? {
            if let Some(record) = self
                .read_validated(&key, CasePageCacheRecord::validate)
                .await?
            {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.last_active.cmp(&a.last_active));
        Ok(records)
    }

    /// Delete cache records inactive for longer than `max_age`.
    ///
    /// Returns the number of deleted records.
    pub async fn prune_case_pages(&self, max_age: chrono::Duration) -> Result<usize> {
        // A retention reaching before the representable range keeps everything.
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            log::debug!("Retention of {} day(s) predates any record", max_age.num_days());
            return Ok(0);
        };
        let mut pruned = 0;
        for record in self.case_pages().await? {
            if record.last_active < cutoff && self.delete_case_page(record.page_id).await? {
                pruned += 1;
            }
        }
        if pruned > 0 {
            log::info!("Pruned {} stale case page cache record(s)", pruned);
        }
        Ok(pruned)
    }

    async fn read_validated<T, F>(&self, key: &str, validate: F) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        F: FnOnce(&T) -> Result<(), String>,
    {
        let Some(value) = self.store.get(key).await? else {
            return Ok(None);
        };

        let problem = match serde_json::from_value::<T>(value) {
            Ok(record) => match validate(&record) {
                Ok(()) => return Ok(Some(record)),
                Err(reason) => reason,
            },
            Err(e) => e.to_string(),
        };

        log::warn!("Discarding malformed record '{}': {}", key, problem);
        self.store.delete(key).await?;
        Ok(None)
    }
}

fn case_page_key(page_id: u64) -> String {
    format!("{CASE_PAGE_CACHE_PREFIX}{page_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_roundtrip_and_clear() {
        let storage = Storage::memory();
        assert!(storage.session_information().await.unwrap().is_none());

        let info = SessionInformation::new(42, vec!["S1".into(), "S2".into()]);
        storage.set_session_information(&info).await.unwrap();
        assert_eq!(storage.session_information().await.unwrap(), Some(info));

        storage.clear_session_information().await.unwrap();
        assert!(storage.session_information().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_session_is_discarded() {
        let store = Arc::new(MemoryStore::new());
        let storage = Storage::new(store.clone());

        store
            .put(SESSION_KEY, serde_json::json!({ "casePageId": 42, "caseSections": [] }))
            .await
            .unwrap();
        assert!(storage.session_information().await.unwrap().is_none());
        assert!(store.get(SESSION_KEY).await.unwrap().is_none());

        store
            .put(SESSION_KEY, serde_json::json!({ "casePageId": "not a number" }))
            .await
            .unwrap();
        assert!(storage.session_information().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_case_pages_sorted_and_pruned() {
        let storage = Storage::memory();

        let mut old = CasePageCacheRecord::new(1);
        old.last_active = Utc::now() - chrono::Duration::days(90);
        let recent = CasePageCacheRecord::new(2);
        storage.put_case_page(&old).await.unwrap();
        storage.put_case_page(&recent).await.unwrap();

        let pages = storage.case_pages().await.unwrap();
        assert_eq!(pages.iter().map(|p| p.page_id).collect::<Vec<_>>(), vec![2, 1]);

        let pruned = storage
            .prune_case_pages(chrono::Duration::days(60))
            .await
            .unwrap();
        assert_eq!(pruned, 1);
        assert!(storage.case_page(1).await.unwrap().is_none());
        assert!(storage.case_page(2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_prune_with_huge_retention_keeps_everything() {
        let storage = Storage::memory();
        let mut old = CasePageCacheRecord::new(1);
        old.last_active = Utc::now() - chrono::Duration::days(90);
        storage.put_case_page(&old).await.unwrap();

        let pruned = storage
            .prune_case_pages(chrono::Duration::days(100_000_000))
            .await
            .unwrap();
        assert_eq!(pruned, 0);
        assert!(storage.case_page(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_case_page_reports_existence() {
        let storage = Storage::memory();
        storage.put_case_page(&CasePageCacheRecord::new(5)).await.unwrap();
        assert!(storage.delete_case_page(5).await.unwrap());
        assert!(!storage.delete_case_page(5).await.unwrap());
    }
}
