// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pagination envelopes shared by the gateway surface and the vendor
//! clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical paginated response shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    /// Page items.
    pub data: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    /// Requested page size.
    pub page_size: u32,
    /// Total item count across all pages, where the vendor reports one.
    pub total_count: u64,
    /// Total page count, where the vendor reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    /// Whether another page exists.
    pub has_more: bool,
}

impl<T> PaginatedResponse<T> {
    /// Map the items while keeping the envelope.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResponse<U> {
        PaginatedResponse {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_count: self.total_count,
            total_pages: self.total_pages,
            has_more: self.has_more,
        }
    }
}

/// Normalized list-query options translated into each vendor's pagination
/// dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub page_size: u32,
    /// Only records modified at or after this instant (vendors that support
    /// it).
    pub modified_since: Option<DateTime<Utc>>,
    /// Fiscal year for year-scoped resources.
    pub fiscal_year: Option<i32>,
    /// Hydrate child rows on list results (entry hydration).
    pub include_entries: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 50,
            modified_since: None,
            fiscal_year: None,
            include_entries: false,
        }
    }
}
