//! Case page cache maintenance.
//!
//! # Examples
//!
//! ```bash
//! deputy cache list
//! deputy cache show 42
//! deputy cache delete 42
//! deputy cache prune
//! ```

use anyhow::{Context, Result};

use crate::case_page::CasePage;
use crate::storage::{CasePageCacheRecord, Storage};

/// Print every cache record, most recently active first.
pub async fn list(storage: &Storage) -> Result<()> {
    let records = storage.case_pages().await?;
    if records.is_empty() {
        println!("No cached case pages");
        return Ok(());
    }
    for record in &records {
        println!("{}", summary_line(record));
    }
    Ok(())
}

/// Print one cache record as JSON.
pub async fn show(storage: &Storage, page_id: u64) -> Result<()> {
    let record = CasePage::new(page_id, storage.clone())
        .cache_info()
        .await?
        .with_context(|| format!("Case page {} is not cached", page_id))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Delete one cache record.
pub async fn delete(storage: &Storage, page_id: u64) -> Result<()> {
    if CasePage::new(page_id, storage.clone()).delete_cache().await? {
        println!("Deleted cache for case page {}", page_id);
    } else {
        println!("Case page {} is not cached", page_id);
    }
    Ok(())
}

/// Delete records older than `retention`.
pub async fn prune(storage: &Storage, retention: chrono::Duration) -> Result<()> {
    let pruned = storage.prune_case_pages(retention).await?;
    println!(
        "Pruned {} case page cache record(s) older than {} day(s)",
        pruned,
        retention.num_days()
    );
    Ok(())
}

fn summary_line(record: &CasePageCacheRecord) -> String {
    let sections = if record.last_active_sections.is_empty() {
        "-".to_string()
    } else {
        record
            .last_active_sections
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "{:>10}  {}  {}",
        record.page_id,
        record.last_active.format("%Y-%m-%d %H:%M"),
        sections
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line_without_sections() {
        let record = CasePageCacheRecord::new(7);
        let line = summary_line(&record);
        assert!(line.trim_start().starts_with("7  "));
        assert!(line.ends_with("  -"));
    }

    #[tokio::test]
    async fn test_show_missing_record_fails() {
        let err = show(&Storage::memory(), 9).await.unwrap_err();
        assert!(err.to_string().contains("not cached"));
    }

    #[tokio::test]
    async fn test_prune_with_oversized_configured_retention() {
        let storage = Storage::memory();
        storage.put_case_page(&CasePageCacheRecord::new(3)).await.unwrap();
        let config = crate::config::Config {
            cache_retention_days: 100_000_000,
            ..crate::config::Config::default()
        };

        prune(&storage, config.cache_retention()).await.unwrap();
        assert!(storage.case_page(3).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_and_prune() {
        let storage = Storage::memory();
        let mut stale = CasePageCacheRecord::new(1);
        stale.last_active = chrono::Utc::now() - chrono::Duration::days(90);
        storage.put_case_page(&stale).await.unwrap();
        storage.put_case_page(&CasePageCacheRecord::new(2)).await.unwrap();

        prune(&storage, chrono::Duration::days(60)).await.unwrap();
        assert!(storage.case_page(1).await.unwrap().is_none());

        delete(&storage, 2).await.unwrap();
        assert!(storage.case_pages().await.unwrap().is_empty());
    }
}
