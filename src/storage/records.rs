//! Persisted record types.
//!
//! Both records are stored as JSON with camelCase field names. Every read goes
//! through `validate()`; a record that fails validation is treated as absent.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::page::SectionId;

/// The case page under active review and the sections opened on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInformation {
    /// Page id of the case page.
    pub case_page_id: u64,
    /// Active section ids, in activation order.
    pub case_sections: Vec<SectionId>,
}

impl SessionInformation {
    /// Create a session record.
    pub fn new(case_page_id: u64, case_sections: Vec<SectionId>) -> Self {
        Self {
            case_page_id,
            case_sections,
        }
    }

    /// Reject records that cannot describe a live session.
    pub fn validate(&self) -> Result<(), String> {
        if self.case_page_id == 0 {
            return Err("casePageId must be non-zero".to_string());
        }
        if self.case_sections.is_empty() {
            return Err("caseSections must not be empty".to_string());
        }
        validate_sections(&self.case_sections)
    }

    /// Whether `section` is active.
    pub fn has_section(&self, section: &SectionId) -> bool {
        self.case_sections.contains(section)
    }
}

/// Per-case-page record backing "continue where you left off".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CasePageCacheRecord {
    /// Page id of the case page.
    pub page_id: u64,
    /// Last time a session touched this page.
    pub last_active: DateTime<Utc>,
    /// Sections that were open when the page was last active.
    #[serde(default)]
    pub last_active_sections: Vec<SectionId>,
}

impl CasePageCacheRecord {
    /// A fresh record stamped now.
    pub fn new(page_id: u64) -> Self {
        Self {
            page_id,
            last_active: Utc::now(),
            last_active_sections: Vec::new(),
        }
    }

    /// Reject records with a zero page id or malformed section ids.
    pub fn validate(&self) -> Result<(), String> {
        if self.page_id == 0 {
            return Err("pageId must be non-zero".to_string());
        }
        validate_sections(&self.last_active_sections)
    }
}

fn validate_sections(sections: &[SectionId]) -> Result<(), String> {
    let mut seen = HashSet::with_capacity(sections.len());
    for section in sections {
        if section.as_str().is_empty() {
            return Err("section ids must not be empty".to_string());
        }
        if !seen.insert(section) {
            return Err(format!("duplicate section id {section}"));
        }
    }
    Ok(())
}
