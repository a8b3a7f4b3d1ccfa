use std::str::FromStr;

use serde::Serialize;

use crate::error::StoreError;

/// Page requested by a caller: a 1-based number or the last page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageRequest {
    #[default]
    First,
    Number(usize),
    Last,
}

impl FromStr for PageRequest {
    type Err = StoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw == "last" {
            return Ok(Self::Last);
        }
        raw.parse::<usize>()
            .map(Self::Number)
            .map_err(|_| StoreError::InvalidPage {
                reason: "that page number is not an integer".to_string(),
            })
    }
}

/// Rows to fetch for one page: bind `limit` and `offset` into the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: usize,
    pub limit: i64,
    pub offset: i64,
}

/// Splits a counted result set into fixed-size pages.
///
/// An empty result set still has one (empty) page.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: usize,
    per_page: usize,
}

impl Paginator {
    pub fn new(count: usize, per_page: usize) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
        }
    }

    /// Paginator over the result of a `SELECT COUNT(*)`.
    pub fn counted(count: i64, per_page: usize) -> Self {
        Self::new(usize::try_from(count).unwrap_or_default(), per_page)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn num_pages(&self) -> usize {
        self.count.div_ceil(self.per_page).max(1)
    }

    pub fn window(&self, request: PageRequest) -> Result<PageWindow, StoreError> {
        let num_pages = self.num_pages();
        let number = match request {
            PageRequest::First => 1,
            PageRequest::Last => num_pages,
            PageRequest::Number(0) => {
                return Err(StoreError::InvalidPage {
                    reason: "that page number is less than 1".to_string(),
                })
            }
            PageRequest::Number(n) if n > num_pages => {
                return Err(StoreError::InvalidPage {
                    reason: "that page contains no results".to_string(),
                })
            }
            PageRequest::Number(n) => n,
        };
        Ok(PageWindow {
            number,
            limit: self.per_page as i64,
            offset: ((number - 1) * self.per_page) as i64,
        })
    }

    /// Wrap the rows fetched for `window`.
    pub fn page<T>(&self, window: PageWindow, items: Vec<T>) -> Page<T> {
        let num_pages = self.num_pages();
        Page {
            items,
            number: window.number,
            num_pages,
            count: self.count,
            per_page: self.per_page,
            has_next: window.number < num_pages,
            has_previous: window.number > 1,
            is_paginated: num_pages > 1,
        }
    }
}

/// One page of results plus the navigation facts a list view needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    /// Total across all pages
    pub count: usize,
    pub per_page: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub is_paginated: bool,
}

impl<T> Page<T> {
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            per_page: self.per_page,
            has_next: self.has_next,
            has_previous: self.has_previous,
            is_paginated: self.is_paginated,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
