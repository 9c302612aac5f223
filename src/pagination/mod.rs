//! Page-numbered listings
//!
//! Freshdesk list endpoints take `page` and `per_page`. A [`PageCursor`]
//! tracks where a walk is and ends it at the first page that comes back
//! shorter than `per_page`.

/// Default page size requested from Freshdesk
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page Freshdesk serves; a larger `per_page` is cut down to this
pub const MAX_PAGE_SIZE: u32 = 100;

pub const PAGE_PARAM: &str = "page";
pub const PER_PAGE_PARAM: &str = "per_page";

/// Position in a page-numbered walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    page: u32,
    per_page: u32,
    pages_seen: u32,
    records_seen: u64,
    exhausted: bool,
}

impl PageCursor {
    /// Pages are numbered from 1; zero values are raised to 1
    pub fn new(start_page: u32, per_page: u32) -> Self {
        Self {
            page: start_page.max(1),
            per_page: per_page.max(1),
            pages_seen: 0,
            records_seen: 0,
            exhausted: false,
        }
    }

    /// Page the next request asks for
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn pages_seen(&self) -> u32 {
        self.pages_seen
    }

    pub fn records_seen(&self) -> u64 {
        self.records_seen
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Query parameters for the current page
    pub fn query(&self) -> [(&'static str, String); 2] {
        [
            (PAGE_PARAM, self.page.to_string()),
            (PER_PAGE_PARAM, self.per_page.to_string()),
        ]
    }

    /// Account for a page of `count` records
    ///
    /// Returns the next page to request, or `None` once a short (or empty)
    /// page has ended the listing.
    pub fn advance(&mut self, count: usize) -> Option<u32> {
        if self.exhausted {
            return None;
        }

        self.pages_seen += 1;
        self.records_seen += count as u64;

        if count < self.per_page as usize {
            self.exhausted = true;
            return None;
        }

        self.page += 1;
        Some(self.page)
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}
