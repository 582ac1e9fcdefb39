//! Pagination
//!
//! Page-number parsing and page math shared by the listing and search views.
//! Pages are 1-indexed and an empty result still has one (empty) page.

use serde::{Deserialize, Serialize};

/// Number of posts on one listing or search page
pub const PAGE_SIZE: u32 = 5;

/// Number of pages needed for `total` items, never less than one
pub fn num_pages(total: i64, per_page: u32) -> u32 {
    if total <= 0 || per_page == 0 {
        return 1;
    }
    let per_page = per_page as i64;
    ((total + per_page - 1) / per_page) as u32
}

/// Threshold the listing templates compare page numbers against.
///
/// Always computed over the whole post table: two less than its page count.
pub fn limit_for_listing(total_posts: i64) -> i64 {
    num_pages(total_posts, PAGE_SIZE) as i64 - 2
}

/// The requested page does not exist
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPage {
    #[error("Page '{0}' is not a number")]
    NotANumber(String),
    #[error("Page {0} is out of range")]
    OutOfRange(i64),
}

/// Resolve the raw `page` query value against a page count.
///
/// A missing value means the first page and the literal `last` means the
/// final one. Anything else must be an integer within `1..=num_pages`.
pub fn resolve_page(raw: Option<&str>, num_pages: u32) -> Result<u32, InvalidPage> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(1),
        Some("last") => return Ok(num_pages.max(1)),
        Some(raw) => raw,
    };

    let number: i64 = raw
        .parse()
        .map_err(|_| InvalidPage::NotANumber(raw.to_string()))?;
    if number < 1 || number > num_pages.max(1) as i64 {
        return Err(InvalidPage::OutOfRange(number));
    }
    Ok(number as u32)
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: PAGE_SIZE,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Total number of pages (at least one)
    pub fn total_pages(&self) -> u32 {
        num_pages(self.total, self.per_page)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Page metadata for templates
    pub fn info(&self) -> PageInfo {
        PageInfo {
            number: self.page,
            num_pages: self.total_pages(),
            total: self.total,
            has_prev: self.has_prev(),
            has_next: self.has_next(),
            previous_page_number: self.has_prev().then(|| self.page - 1),
            next_page_number: self.has_next().then(|| self.page + 1),
        }
    }
}

/// Serializable page metadata rendered next to a page of posts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub number: u32,
    pub num_pages: u32,
    pub total: i64,
    pub has_prev: bool,
    pub has_next: bool,
    pub previous_page_number: Option<u32>,
    pub next_page_number: Option<u32>,
}
