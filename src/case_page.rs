//! Case page cache handle.
//!
//! A [`CasePage`] ties a case page id to its [`CasePageCacheRecord`]. Every
//! mutation refreshes `lastActive`, so "bumping" and editing the active
//! section list are the same write.

use anyhow::Result;
use chrono::Utc;

use crate::page::SectionId;
use crate::storage::{CasePageCacheRecord, Storage};

/// A case page and its cache record.
#[derive(Debug, Clone)]
pub struct CasePage {
    page_id: u64,
    storage: Storage,
}

impl CasePage {
    /// Handle for `page_id` backed by `storage`.
    pub fn new(page_id: u64, storage: Storage) -> Self {
        Self { page_id, storage }
    }

    /// Page id.
    pub fn page_id(&self) -> u64 {
        self.page_id
    }

    /// Whether a cache record exists.
    pub async fn is_cached(&self) -> Result<bool> {
        Ok(self.cache_info().await?.is_some())
    }

    /// The cache record, if any.
    pub async fn cache_info(&self) -> Result<Option<CasePageCacheRecord>> {
        self.storage.case_page(self.page_id).await
    }

    /// Create the record if missing and refresh `lastActive`.
    pub async fn bump(&self) -> Result<CasePageCacheRecord> {
        self.update(|_| {}).await
    }

    /// Record `section` as active.
    pub async fn add_active_section(&self, section: &SectionId) -> Result<()> {
        self.update(|record| {
            if !record.last_active_sections.contains(section) {
                record.last_active_sections.push(section.clone());
            }
        })
        .await?;
        Ok(())
    }

    /// Record `section` as no longer active.
    pub async fn remove_active_section(&self, section: &SectionId) -> Result<()> {
        self.update(|record| record.last_active_sections.retain(|s| s != section))
            .await?;
        Ok(())
    }

    /// Replace the active section list.
    pub async fn save_to_cache(&self, sections: &[SectionId]) -> Result<()> {
        self.update(|record| record.last_active_sections = sections.to_vec())
            .await?;
        log::debug!(
            "Cached {} active section(s) for case page {}",
            sections.len(),
            self.page_id
        );
        Ok(())
    }

    /// Delete the cache record. Returns whether one existed.
    pub async fn delete_cache(&self) -> Result<bool> {
        self.storage.delete_case_page(self.page_id).await
    }

    async fn update(&self, edit: impl FnOnce(&mut CasePageCacheRecord)) -> Result<CasePageCacheRecord> {
        let mut record = self
            .storage
            .case_page(self.page_id)
            .await?
            .unwrap_or_else(|| CasePageCacheRecord::new(self.page_id));
        edit(&mut record);
        record.last_active = Utc::now();
        self.storage.put_case_page(&record).await?;
        Ok(record)
    }
}
