//! Pagination, search options, and injected store limits.

use serde::{Deserialize, Serialize};

/// Immutable limits handed to every repository at construction.
///
/// Kept as plain data (not process globals) so tests can run with alternate
/// configurations.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StoreLimits {
    pub default_page_size: u64,
    pub max_page_size: u64,
    pub max_bulk_create: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            max_bulk_create: 1000,
        }
    }
}

/// Listing options accepted by `find_all`.
///
/// Explicit `limit`/`offset` win over `page`/`page_size` when both are
/// supplied.
#[derive(Debug, Copy, Clone, Default, Deserialize)]
pub struct FindAllOptions {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Resolved listing window.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: u64,
    pub offset: u64,
}

impl FindAllOptions {
    /// Resolve to a concrete window, clamping the page size to the
    /// configured maximum.
    pub fn resolve(&self, limits: &StoreLimits) -> PageWindow {
        if self.limit.is_some() || self.offset.is_some() {
            let limit = self
                .limit
                .unwrap_or(limits.default_page_size)
                .clamp(1, limits.max_page_size);
            return PageWindow {
                limit,
                offset: self.offset.unwrap_or(0),
            };
        }

        let page_size = self
            .page_size
            .unwrap_or(limits.default_page_size)
            .clamp(1, limits.max_page_size);
        let page = self.page.unwrap_or(1).max(1);
        PageWindow {
            limit: page_size,
            offset: (page - 1) * page_size,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn from_window(data: Vec<T>, total: u64, window: PageWindow) -> Self {
        Self {
            data,
            total,
            page: window.offset / window.limit + 1,
            page_size: window.limit,
            has_next: window.offset + window.limit < total,
            has_previous: window.offset > 0,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// Options accepted by `search_by_name`.
#[derive(Debug, Copy, Clone)]
pub struct SearchOptions {
    pub limit: u64,
    pub exclude_deleted: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            exclude_deleted: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> StoreLimits {
        StoreLimits::default()
    }

    #[test]
    fn default_window_is_first_page() {
        let w = FindAllOptions::default().resolve(&limits());
        assert_eq!(w, PageWindow { limit: 20, offset: 0 });
    }

    #[test]
    fn page_size_is_clamped_to_maximum() {
        let opts = FindAllOptions {
            page_size: Some(5000),
            ..Default::default()
        };
        assert_eq!(opts.resolve(&limits()).limit, 100);
    }

    #[test]
    fn explicit_limit_offset_wins_over_page() {
        let opts = FindAllOptions {
            page: Some(3),
            page_size: Some(10),
            limit: Some(7),
            offset: Some(2),
        };
        assert_eq!(opts.resolve(&limits()), PageWindow { limit: 7, offset: 2 });
    }

    #[test]
    fn page_math() {
        let opts = FindAllOptions {
            page: Some(2),
            page_size: Some(10),
            ..Default::default()
        };
        let w = opts.resolve(&limits());
        assert_eq!(w, PageWindow { limit: 10, offset: 10 });

        let page = Page::from_window(vec![0u8; 10], 25, w);
        assert_eq!(page.page, 2);
        assert!(page.has_next);
        assert!(page.has_previous);

        let last = Page::from_window(
            vec![0u8; 5],
            25,
            PageWindow { limit: 10, offset: 20 },
        );
        assert!(!last.has_next);
        assert!(last.has_previous);
    }
}
