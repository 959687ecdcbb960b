//! JSON API envelope and list pagination.
//!
//! Every `/api/v1` endpoint answers with either
//! `{ "success": true, "data": ... }` or `{ "success": false, "error": "..." }`.

use serde::{Deserialize, Serialize};

/// The response envelope shared by the public and admin APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// A successful response carrying `data`.
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A failed response carrying a message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Default page size for list endpoints.
pub const DEFAULT_PER_PAGE: u32 = 20;
/// Largest page size a client may ask for.
pub const MAX_PER_PAGE: u32 = 100;

/// Common list parameters (`?q=&status=&page=&per_page=`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl ListQuery {
    /// Trimmed search term, `None` when blank.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Status filter, `None` when blank or `all`.
    #[must_use]
    pub fn status_filter(&self) -> Option<&str> {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "all")
    }

    /// 1-based page number.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size clamped to `1..=MAX_PER_PAGE`.
    #[must_use]
    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    /// SQL `LIMIT`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page())
    }

    /// SQL `OFFSET`.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.per_page())
    }

    /// Same filters, page `page`.
    #[must_use]
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page: Some(page),
            ..self.clone()
        }
    }

    /// Same filters with no paging, for exports.
    #[must_use]
    pub fn unpaged(&self) -> Self {
        Self {
            page: Some(1),
            per_page: Some(MAX_PER_PAGE),
            ..self.clone()
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: u32,
}

impl<T> Paginated<T> {
    /// Build a page from the rows fetched for `query` and the total count.
    #[must_use]
    pub fn new(items: Vec<T>, query: &ListQuery, total: i64) -> Self {
        let per_page = query.per_page();
        let total_pages = u32::try_from(total.max(0))
            .unwrap_or(u32::MAX)
            .div_ceil(per_page);
        Self {
            items,
            page: query.page(),
            per_page,
            total,
            total_pages,
        }
    }

    /// Map the items, keeping the paging numbers.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            total_pages: self.total_pages,
        }
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Outcome of a bulk action over many records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failed: usize,
    /// `"<id>: <message>"` for each failure.
    pub errors: Vec<String>,
}

impl BulkOutcome {
    /// Record one result.
    pub fn record<E: std::fmt::Display>(&mut self, id: impl std::fmt::Display, result: Result<(), E>) {
        match result {
            Ok(()) => self.succeeded += 1,
            Err(e) => {
                self.failed += 1;
                self.errors.push(format!("{id}: {e}"));
            }
        }
    }

    /// One-line summary for flash messages.
    #[must_use]
    pub fn summary(&self, action: &str) -> String {
        if self.failed == 0 {
            format!("{action}: {} succeeded", self.succeeded)
        } else {
            format!(
                "{action}: {} succeeded, {} failed",
                self.succeeded, self.failed
            )
        }
    }
}
