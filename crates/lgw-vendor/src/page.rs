// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pagination dialects: query-parameter translation and envelope parsing
//! per vendor.

use lgw_core::{ListQuery, Provider};
use lgw_error::{ErrorCode, GatewayError};
use serde_json::Value;

// ---------------------------------------------------------------------------
// PaginationDialect
// ---------------------------------------------------------------------------

/// How a vendor expresses paging on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaginationDialect {
    /// `?page=N&limit=M`, meta under `MetaInformation.@…`.
    Fortnox,
    /// OData `$top`/`$skip`, envelope `{ Meta, Data }`.
    Visma,
    /// `pageRequested`/`rowsRequested`, envelope `{ …, data: { key: [] } }`.
    Briox,
    /// Like Briox, but also accepts a `rows` alias and may return a bare
    /// array.
    Bjornlunden,
    /// Company-scoped paths with opaque `page`/`pageSize`.
    Bokio,
}

impl PaginationDialect {
    /// The dialect a vendor speaks.
    pub fn for_provider(provider: Provider) -> Self {
        match provider {
            Provider::Fortnox => Self::Fortnox,
            Provider::Visma => Self::Visma,
            Provider::Briox => Self::Briox,
            Provider::Bjornlunden => Self::Bjornlunden,
            Provider::Bokio | Provider::SieUpload => Self::Bokio,
        }
    }

    /// Translate normalized list options into this dialect's query pairs.
    pub fn page_params(&self, query: &ListQuery) -> Vec<(String, String)> {
        let page = query.page.max(1);
        let size = query.page_size.max(1);
        let mut params = match self {
            Self::Fortnox => vec![
                ("page".into(), page.to_string()),
                ("limit".into(), size.to_string()),
            ],
            Self::Visma => vec![
                ("$top".into(), size.to_string()),
                ("$skip".into(), ((page - 1) * size).to_string()),
            ],
            Self::Briox | Self::Bjornlunden => vec![
                ("pageRequested".into(), page.to_string()),
                ("rowsRequested".into(), size.to_string()),
            ],
            Self::Bokio => vec![
                ("page".into(), page.to_string()),
                ("pageSize".into(), size.to_string()),
            ],
        };
        if let Some(since) = query.modified_since {
            match self {
                Self::Fortnox => params.push((
                    "lastmodified".into(),
                    since.format("%Y-%m-%d %H:%M").to_string(),
                )),
                Self::Visma => params.push((
                    "$filter".into(),
                    format!("ModifiedUtc gt {}", since.format("%Y-%m-%dT%H:%M:%SZ")),
                )),
                Self::Briox | Self::Bjornlunden => params.push((
                    "modifiedSince".into(),
                    since.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                )),
                Self::Bokio => params.push((
                    "modifiedAfter".into(),
                    since.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                )),
            }
        }
        params
    }

    /// Parse a vendor page envelope into a [`RawPage`].
    ///
    /// `list_key` is the JSON key the collection lives under, where the
    /// dialect needs one (Fortnox top-level, Briox/Björn Lundén inside
    /// `data`).
    pub fn parse_page(
        &self,
        body: &Value,
        list_key: Option<&str>,
        query: &ListQuery,
    ) -> Result<RawPage, GatewayError> {
        let page = query.page.max(1);
        let size = query.page_size.max(1);
        match self {
            Self::Fortnox => {
                let items = list_key
                    .and_then(|k| body.get(k))
                    .and_then(Value::as_array)
                    .cloned()
                    .ok_or_else(|| decode_error("fortnox", list_key))?;
                let meta = body.get("MetaInformation");
                let total_pages = meta
                    .and_then(|m| m.get("@TotalPages"))
                    .and_then(Value::as_u64)
                    .map(|v| v as u32);
                let current = meta
                    .and_then(|m| m.get("@CurrentPage"))
                    .and_then(Value::as_u64)
                    .map(|v| v as u32)
                    .unwrap_or(page);
                let total_count = meta
                    .and_then(|m| m.get("@TotalResources"))
                    .and_then(Value::as_u64);
                Ok(RawPage {
                    page: current,
                    total_pages,
                    total_count,
                    has_more: total_pages.is_some_and(|tp| current < tp),
                    items,
                })
            }
            Self::Visma => {
                let items = body
                    .get("Data")
                    .and_then(Value::as_array)
                    .cloned()
                    .ok_or_else(|| decode_error("visma", Some("Data")))?;
                let meta = body.get("Meta");
                let current = meta
                    .and_then(|m| m.get("CurrentPage"))
                    .and_then(Value::as_u64)
                    .map(|v| v as u32)
                    .unwrap_or(page);
                let total_pages = meta
                    .and_then(|m| m.get("TotalNumberOfPages"))
                    .and_then(Value::as_u64)
                    .map(|v| v as u32);
                let total_count = meta
                    .and_then(|m| m.get("TotalNumberOfResults"))
                    .and_then(Value::as_u64);
                Ok(RawPage {
                    page: current,
                    total_pages,
                    total_count,
                    has_more: total_pages.is_some_and(|tp| current < tp),
                    items,
                })
            }
            Self::Briox | Self::Bjornlunden => {
                // Björn Lundén may answer with a bare array.
                if let Value::Array(items) = body {
                    if *self == Self::Bjornlunden {
                        return Ok(RawPage {
                            page,
                            total_pages: None,
                            total_count: None,
                            has_more: items.len() as u32 >= size,
                            items: items.clone(),
                        });
                    }
                }
                let data = body.get("data").ok_or_else(|| decode_error("briox", Some("data")))?;
                let items = match data {
                    Value::Array(items) => items.clone(),
                    Value::Object(map) => list_key
                        .and_then(|k| map.get(k))
                        .and_then(Value::as_array)
                        .cloned()
                        .or_else(|| {
                            // Single-collection envelopes: take the only
                            // array value.
                            let arrays: Vec<&Vec<Value>> =
                                map.values().filter_map(Value::as_array).collect();
                            (arrays.len() == 1).then(|| arrays[0].clone())
                        })
                        .ok_or_else(|| decode_error("briox", list_key))?,
                    _ => return Err(decode_error("briox", list_key)),
                };
                let current = body
                    .get("pageRequested")
                    .and_then(Value::as_u64)
                    .map(|v| v as u32)
                    .unwrap_or(page);
                let total_pages = body
                    .get("totalPages")
                    .and_then(Value::as_u64)
                    .map(|v| v as u32);
                let total_count = body.get("totalRows").and_then(Value::as_u64);
                Ok(RawPage {
                    page: current,
                    total_pages,
                    total_count,
                    has_more: total_pages.is_some_and(|tp| current < tp),
                    items,
                })
            }
            Self::Bokio => {
                let items = body
                    .get("items")
                    .or_else(|| body.get("data"))
                    .and_then(Value::as_array)
                    .cloned()
                    .ok_or_else(|| decode_error("bokio", Some("items")))?;
                let total_pages = body
                    .get("totalPages")
                    .and_then(Value::as_u64)
                    .map(|v| v as u32);
                let total_count = body.get("totalItems").and_then(Value::as_u64);
                let has_more = match total_pages {
                    Some(tp) => page < tp,
                    // Opaque paging: a full page implies there may be more.
                    None => items.len() as u32 >= size,
                };
                Ok(RawPage {
                    page,
                    total_pages,
                    total_count,
                    has_more,
                    items,
                })
            }
        }
    }
}

fn decode_error(dialect: &str, key: Option<&str>) -> GatewayError {
    GatewayError::new(
        ErrorCode::UpstreamDecode,
        format!("unexpected {dialect} page envelope"),
    )
    .with_context("list_key", key)
}

// ---------------------------------------------------------------------------
// RawPage
// ---------------------------------------------------------------------------

/// One decoded page of raw vendor items.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    /// 1-based page number as the vendor reports it.
    pub page: u32,
    /// Total pages, where reported.
    pub total_pages: Option<u32>,
    /// Total items, where reported.
    pub total_count: Option<u64>,
    /// Whether another page exists.
    pub has_more: bool,
    /// The raw items.
    pub items: Vec<Value>,
}
