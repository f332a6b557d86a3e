use rocket::form::FromForm;
use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_SIZE: u64 = 50;

/// Page selection from the `page_num` and `page_size` query parameters.
/// Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromForm)]
pub struct Pagination {
    #[field(default = 1, validate = range(1..))]
    page_num: u64,
    #[field(default = DEFAULT_PAGE_SIZE, validate = range(1..=500))]
    page_size: u64,
}

impl Pagination {
    pub fn new(page_num: u64, page_size: u64) -> Self {
        Self {
            page_num,
            page_size,
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of rows before this page.
    pub fn skip(&self) -> u64 {
        (self.page_num - 1).saturating_mul(self.page_size)
    }

    /// Wrap one page of items together with its position.
    pub fn paginate<T>(self, items: Vec<T>, total: u64) -> Paginated<T> {
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

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResult {
    pub page_num: u64,
    pub page_size: u64,
    pub total: u64,
}

/// One page of a listing.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationResult,
}
