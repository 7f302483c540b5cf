//! Pagination and sort direction shared by listing queries.

use serde::{Deserialize, Serialize};

/// Default page size for listings.
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Largest page size a client may request.
pub const MAX_PER_PAGE: u32 = 100;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// SQL keyword for `ORDER BY`.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One page of a listing plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    /// Map the items of a page, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Clamp client paging input to `(page, per_page)` with a 1-based page.
#[must_use]
pub fn normalize_paging(page: Option<u32>, per_page: Option<u32>) -> (u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    (page, per_page)
}

/// Row offset for a normalized `(page, per_page)` pair.
#[must_use]
pub const fn offset(page: u32, per_page: u32) -> u64 {
    (page as u64 - 1) * per_page as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_defaults_and_limits() {
        assert_eq!(normalize_paging(None, None), (1, 10));
        assert_eq!(normalize_paging(Some(0), Some(0)), (1, 1));
        assert_eq!(normalize_paging(Some(3), Some(500)), (3, 100));
    }

    #[test]
    fn test_offset() {
        assert_eq!(offset(1, 10), 0);
        assert_eq!(offset(4, 25), 75);
    }
}
