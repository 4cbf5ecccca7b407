//! Host page abstraction.
//!
//! The coordinator never touches a document directly. It asks a
//! [`PageContext`] for the current page's identity and for the section
//! headings of a case page. [`StaticPage`] is an in-memory implementation
//! used by tests and the `simulate` command.

use serde::{Deserialize, Serialize};

/// Stable identifier of a case page section, derived from the heading anchor.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub String);

impl SectionId {
    /// Create a section id from an anchor string.
    pub fn new(anchor: impl Into<String>) -> Self {
        Self(anchor.into())
    }

    /// The anchor string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A subsection heading on a case page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Stable anchor id.
    pub id: SectionId,
    /// Visible heading text.
    pub title: String,
    /// Titles of the pages listed for review under this heading.
    pub pages: Vec<String>,
}

impl Heading {
    /// Create a heading with no listed pages.
    pub fn new(id: impl Into<SectionId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            pages: Vec::new(),
        }
    }

    /// Add listed pages.
    pub fn with_pages<I, S>(mut self, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pages.extend(pages.into_iter().map(Into::into));
        self
    }

    /// Whether `page` is listed under this heading.
    pub fn lists(&self, page: &str) -> bool {
        self.pages.iter().any(|p| p == page)
    }
}

/// The page currently loaded in a tab.
pub trait PageContext: Send + Sync + std::fmt::Debug {
    /// Numeric page id.
    fn page_id(&self) -> u64;

    /// Page title.
    fn title(&self) -> &str;

    /// Whether this page is a case page (has reviewable sections).
    fn is_case_page(&self) -> bool;

    /// Section headings in document order. Empty for non-case pages.
    fn headings(&self) -> &[Heading];

    /// Look up a heading by its anchor id.
    fn heading(&self, id: &SectionId) -> Option<&Heading> {
        self.headings().iter().find(|h| &h.id == id)
    }
}

/// In-memory page description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPage {
    page_id: u64,
    title: String,
    case_page: bool,
    headings: Vec<Heading>,
}

impl StaticPage {
    /// A case page with the given headings.
    pub fn case_page(page_id: u64, title: impl Into<String>, headings: Vec<Heading>) -> Self {
        Self {
            page_id,
            title: title.into(),
            case_page: true,
            headings,
        }
    }

    /// An ordinary page (possibly one listed on a case page).
    pub fn plain(page_id: u64, title: impl Into<String>) -> Self {
        Self {
            page_id,
            title: title.into(),
            case_page: false,
            headings: Vec::new(),
        }
    }
}

impl PageContext for StaticPage {
    fn page_id(&self) -> u64 {
        self.page_id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn is_case_page(&self) -> bool {
        self.case_page
    }

    fn headings(&self) -> &[Heading] {
        &self.headings
    }
}
