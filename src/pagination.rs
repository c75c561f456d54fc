//! Offset pagination for the listings.

use std::str::FromStr;

use crate::errors::BackendError;

/// The order of a listing by risk percentage. Ties are broken by
/// ascending id so that pages never overlap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    RiskAscending,
    RiskDescending,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::RiskDescending
    }
}

impl FromStr for SortOrder {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "risk_asc" => Ok(SortOrder::RiskAscending),
            "risk_desc" => Ok(SortOrder::RiskDescending),
            other => Err(BackendError::InvalidSortOrder(other.to_owned())),
        }
    }
}

/// A page request: 1-indexed page number and page size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub size: i64,
}

impl Page {
    /// Builds a page request, treating pages below 1 as the first page
    /// and clamping the size to `[1, max_size]`.
    ///
    /// ```
    /// use risk_backend::pagination::Page;
    ///
    /// let page = Page::new(0, 500, 100);
    /// assert_eq!((page.number, page.size), (1, 100));
    /// assert_eq!(Page::new(3, 20, 100).offset(), 40);
    /// ```
    pub fn new(number: i64, size: i64, max_size: i64) -> Self {
        Page {
            number: number.max(1),
            size: size.max(1).min(max_size.max(1)),
        }
    }

    /// The number of rows to skip.
    pub fn offset(&self) -> i64 {
        (self.number - 1).saturating_mul(self.size)
    }
}

/// Number of pages needed to show `total` rows, `size` at a time.
pub fn total_pages(total: i64, size: i64) -> i64 {
    let size = size.max(1);

    (total.max(0) + size - 1) / size
}
