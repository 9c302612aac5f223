//! Fetch request and result types

use crate::dates::FetchWindow;
use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::types::JsonValue;

/// Parameters for one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchParams {
    /// Resolved date window
    pub window: FetchWindow,
    /// First page to request
    pub start_page: u32,
    /// Records per page
    pub page_size: u32,
}

impl FetchParams {
    /// Parameters for a full fetch of `window`
    pub fn new(window: FetchWindow) -> Self {
        Self {
            window,
            start_page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Resume from a given page
    #[must_use]
    pub fn from_page(mut self, page: u32) -> Self {
        self.start_page = page.max(1);
        self
    }

    /// Override the page size
    #[must_use]
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }
}

/// Statistics from a fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Requests that returned a page
    pub pages_fetched: u32,
    /// Records across all pages
    pub records: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// Records returned by a fetch, in page order then within-page order
#[derive(Debug, Clone, Default)]
pub struct FetchOutput {
    /// The records
    pub records: Vec<JsonValue>,
    /// Statistics
    pub stats: FetchStats,
}

impl FetchOutput {
    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing was fetched
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
