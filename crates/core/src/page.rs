//! Offset pagination shared by every list query.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Offset/limit window requested by a caller (`skip >= 0`, `limit > 0`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    skip: u64,
    limit: u64,
}

impl ValueObject for PageRequest {}

impl PageRequest {
    pub const DEFAULT_LIMIT: u64 = 100;

    pub fn new(skip: u64, limit: u64) -> DomainResult<Self> {
        if limit == 0 {
            return Err(DomainError::validation("limit must be greater than zero"));
        }
        Ok(Self { skip, limit })
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// One page of results plus navigation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    /// 1-based: `floor(skip / limit) + 1`.
    pub page: u64,
    pub per_page: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.skip / request.limit + 1,
            per_page: request.limit,
            has_next: request.skip.saturating_add(request.limit) < total,
            has_prev: request.skip > 0,
        }
    }

    /// Slice an already filtered and ordered collection.
    pub fn from_sorted(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(usize::try_from(request.skip).unwrap_or(usize::MAX))
            .take(usize::try_from(request.limit).unwrap_or(usize::MAX))
            .collect();
        Self::new(items, total, request)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}
