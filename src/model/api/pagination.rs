use rocket::FromForm;
use serde::{Deserialize, Serialize};

/// Page selection from query parameters `page_num` (1-based) and `page_size`
/// (at most 100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromForm, Serialize, Deserialize)]
pub struct PaginationRequest {
    #[field(default = 1, validate = range(1..))]
    pub page_num: u32,
    #[field(default = 20, validate = range(1..=100))]
    pub page_size: u32,
}

impl PaginationRequest {
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of items before this page.
    pub fn skip(&self) -> u64 {
        u64::from(self.page_num.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// Wrap one page of items with its position in the whole.
    pub fn to_paginated<T>(self, total: u64, items: Vec<T>) -> Paginated<T> {
        Paginated {
            items,
            pagination: PaginationResult {
                page_num: self.page_num,
                page_size: self.page_size,
                total,
            },
        }
    }
}

impl Default for PaginationRequest {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: 20,
        }
    }
}

/// Where a page sits in the full result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResult {
    pub page_num: u32,
    pub page_size: u32,
    pub total: u64,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_counts_earlier_pages() {
        let first = PaginationRequest::default();
        assert_eq!(first.skip(), 0);
        let third = PaginationRequest {
            page_num: 3,
            page_size: 10,
        };
        assert_eq!(third.skip(), 20);
        let page = third.to_paginated(25, vec![1, 2, 3, 4, 5]);
        assert_eq!(page.pagination.total, 25);
        assert_eq!(page.items.len(), 5);
    }
}
