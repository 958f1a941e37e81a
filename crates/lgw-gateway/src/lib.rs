// SPDX-License-Identifier: MIT OR Apache-2.0
//! The gateway handler: one entry point from canonical `(vendor, resource,
//! operation)` onto the vendor clients and the mapper registry.
//!
//! Dispatch, per operation:
//!
//! 1. Look up the `(vendor, resource)` descriptor; absence is a
//!    *not-supported* error.
//! 2. Singletons issue one GET and map.
//! 3. Lists translate paging and modified-since into the vendor dialect,
//!    fetch one page, and map each item.
//! 4. Detail fetches apply the composite-id resolver when the descriptor
//!    carries one; a vendor 404 becomes `None`.
//! 5. Every other non-2xx propagates with status and body.
//!
//! DTOs leave this crate with `_raw` still attached; the HTTP boundary
//! strips it before serialising.

#![deny(unsafe_code)]

use futures::future::join_all;
use lgw_core::{CanonicalDto, ListQuery, PaginatedResponse, Provider, ResourceType};
use lgw_error::{ErrorCode, GatewayError};
use lgw_mapper::{ResourceDescriptor, descriptor};
use lgw_ratelimit::RateLimiterRegistry;
use lgw_retry::RetryPolicy;
use lgw_vendor::{AccessCredentials, VendorClient, VendorTransport, default_base_url};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The resource gateway.
///
/// Holds one [`VendorClient`] per vendor, all sharing the transport and the
/// process-wide rate-limiter registry.
pub struct Gateway {
    clients: HashMap<Provider, VendorClient>,
}

impl Gateway {
    /// Build with production base URLs.
    pub fn new(
        transport: Arc<dyn VendorTransport>,
        limits: Arc<RateLimiterRegistry>,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self::with_base_urls(transport, limits, retry, timeout, &HashMap::new())
    }

    /// Build with per-vendor base-URL overrides (tests, staging).
    pub fn with_base_urls(
        transport: Arc<dyn VendorTransport>,
        limits: Arc<RateLimiterRegistry>,
        retry: RetryPolicy,
        timeout: Duration,
        overrides: &HashMap<Provider, String>,
    ) -> Self {
        let mut clients = HashMap::new();
        for provider in Provider::ALL {
            if *provider == Provider::SieUpload {
                continue;
            }
            let base = overrides
                .get(provider)
                .cloned()
                .unwrap_or_else(|| default_base_url(*provider).to_owned());
            clients.insert(
                *provider,
                VendorClient::new(
                    *provider,
                    base,
                    Arc::clone(&transport),
                    limits.bucket(*provider).clone(),
                    retry,
                    timeout,
                ),
            );
        }
        Self { clients }
    }

    fn client(&self, provider: Provider) -> Result<&VendorClient, GatewayError> {
        self.clients.get(&provider).ok_or_else(|| {
            GatewayError::new(
                ErrorCode::ResourceNotSupported,
                format!("no API client for vendor '{provider}'"),
            )
        })
    }

    fn descriptor(
        provider: Provider,
        resource: ResourceType,
    ) -> Result<&'static ResourceDescriptor, GatewayError> {
        descriptor(provider, resource).ok_or_else(|| {
            GatewayError::new(
                ErrorCode::ResourceNotSupported,
                format!("vendor '{provider}' does not support '{resource}'"),
            )
        })
    }

    // -- Operations --------------------------------------------------------

    /// List one page of a resource as canonical DTOs.
    pub async fn list(
        &self,
        provider: Provider,
        credentials: &AccessCredentials,
        resource: ResourceType,
        query: &ListQuery,
    ) -> Result<PaginatedResponse<CanonicalDto>, GatewayError> {
        let desc = Self::descriptor(provider, resource)?;
        let client = self.client(provider)?;

        if desc.singleton {
            let dto = self.singleton(provider, credentials, resource).await?;
            return Ok(PaginatedResponse {
                data: vec![dto],
                page: 1,
                page_size: 1,
                total_count: 1,
                total_pages: Some(1),
                has_more: false,
            });
        }

        let path = desc.list_path_for(query.fiscal_year);
        let mut effective = query.clone();
        if !desc.supports_last_modified {
            effective.modified_since = None;
        }
        let raw_page = client
            .get_page(credentials, &path, desc.list_key, &effective)
            .await?;

        let mut items = Vec::with_capacity(raw_page.items.len());
        for raw in &raw_page.items {
            items.push((desc.map)(raw)?);
        }
        let item_count = raw_page.items.len() as u64;

        if desc.supports_entry_hydration && query.include_entries {
            items = self
                .hydrate_entries(client, credentials, desc, raw_page.items, items)
                .await;
        }

        Ok(PaginatedResponse {
            data: items,
            page: raw_page.page,
            page_size: query.page_size,
            total_count: raw_page.total_count.unwrap_or(item_count),
            total_pages: raw_page.total_pages,
            has_more: raw_page.has_more,
        })
    }

    /// Fetch one resource by id; a vendor 404 is `Ok(None)`.
    pub async fn get(
        &self,
        provider: Provider,
        credentials: &AccessCredentials,
        resource: ResourceType,
        id: &str,
    ) -> Result<Option<CanonicalDto>, GatewayError> {
        let desc = Self::descriptor(provider, resource)?;
        let client = self.client(provider)?;

        if desc.singleton {
            return Ok(Some(self.singleton(provider, credentials, resource).await?));
        }

        let Some(path) = desc.detail_path_for(id) else {
            return Err(GatewayError::validation(format!(
                "malformed id '{id}' for '{resource}'"
            )));
        };
        match client.get_value(credentials, &path).await {
            Ok(body) => {
                let raw = unwrap_detail(&body, desc);
                Ok(Some((desc.map)(raw)?))
            }
            Err(err) if err.upstream_status() == Some(404) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Fetch a singleton resource (company information, report
    /// aggregates).
    pub async fn singleton(
        &self,
        provider: Provider,
        credentials: &AccessCredentials,
        resource: ResourceType,
    ) -> Result<CanonicalDto, GatewayError> {
        let desc = Self::descriptor(provider, resource)?;
        let client = self.client(provider)?;
        let body = client.get_value(credentials, desc.list_path).await?;
        let raw = unwrap_detail(&body, desc);
        (desc.map)(raw)
    }

    /// Create a resource, for vendors that permit the write.
    pub async fn create(
        &self,
        provider: Provider,
        credentials: &AccessCredentials,
        resource: ResourceType,
        body: &Value,
    ) -> Result<CanonicalDto, GatewayError> {
        let desc = Self::descriptor(provider, resource)?;
        if !desc.supports_create {
            return Err(GatewayError::new(
                ErrorCode::WriteNotSupported,
                format!("vendor '{provider}' does not permit creating '{resource}'"),
            ));
        }
        let client = self.client(provider)?;
        let response = client.post(credentials, desc.list_path, body).await?;
        let raw = unwrap_detail(&response, desc);
        (desc.map)(raw)
    }

    /// List a sub-resource under a parent item.
    pub async fn list_sub(
        &self,
        provider: Provider,
        credentials: &AccessCredentials,
        parent: ResourceType,
        parent_id: &str,
        segment: &str,
        query: &ListQuery,
    ) -> Result<PaginatedResponse<CanonicalDto>, GatewayError> {
        let desc = Self::descriptor(provider, parent)?;
        let sub = desc.sub_resource(segment).ok_or_else(|| {
            GatewayError::new(
                ErrorCode::ResourceNotSupported,
                format!("'{parent}' has no sub-resource '{segment}' on '{provider}'"),
            )
        })?;
        let client = self.client(provider)?;
        let path = sub.path_template.replace("{id}", parent_id);
        let page = client
            .get_page(credentials, &path, sub.list_key, query)
            .await?;
        let mut items = Vec::with_capacity(page.items.len());
        for raw in &page.items {
            items.push((sub.map)(raw)?);
        }
        Ok(PaginatedResponse {
            data: items,
            page: page.page,
            page_size: query.page_size,
            total_count: page.total_count.unwrap_or(page.items.len() as u64),
            total_pages: page.total_pages,
            has_more: page.has_more,
        })
    }

    /// Create a sub-resource under a parent item.
    pub async fn create_sub(
        &self,
        provider: Provider,
        credentials: &AccessCredentials,
        parent: ResourceType,
        parent_id: &str,
        segment: &str,
        body: &Value,
    ) -> Result<CanonicalDto, GatewayError> {
        let desc = Self::descriptor(provider, parent)?;
        let sub = desc.sub_resource(segment).ok_or_else(|| {
            GatewayError::new(
                ErrorCode::ResourceNotSupported,
                format!("'{parent}' has no sub-resource '{segment}' on '{provider}'"),
            )
        })?;
        if !sub.supports_create {
            return Err(GatewayError::new(
                ErrorCode::WriteNotSupported,
                format!("sub-resource '{segment}' is read-only on '{provider}'"),
            ));
        }
        let client = self.client(provider)?;
        // Creates go to the collection path, not the filtered list template.
        let path = sub
            .path_template
            .split('?')
            .next()
            .unwrap_or(sub.path_template)
            .replace("{id}", parent_id);
        let response = client.post(credentials, &path, body).await?;
        (sub.map)(unwrap_detail_sub(&response, sub.list_key))
    }

    /// Pull a binary payload from the vendor (SIE exports).
    pub async fn fetch_binary(
        &self,
        provider: Provider,
        credentials: &AccessCredentials,
        path: &str,
    ) -> Result<Vec<u8>, GatewayError> {
        self.client(provider)?.get_binary(credentials, path).await
    }

    /// Fetch every page of an explicit vendor path (sync engine: entity
    /// types that exist in the canonical store without a data-plane
    /// resource).
    pub async fn fetch_all_path(
        &self,
        provider: Provider,
        credentials: &AccessCredentials,
        path: &str,
        list_key: Option<&str>,
        query: &ListQuery,
    ) -> Result<Vec<Value>, GatewayError> {
        self.client(provider)?
            .get_all(credentials, path, list_key, query)
            .await
    }

    /// Fetch one explicit vendor path as raw JSON.
    pub async fn fetch_value_path(
        &self,
        provider: Provider,
        credentials: &AccessCredentials,
        path: &str,
    ) -> Result<Value, GatewayError> {
        self.client(provider)?.get_value(credentials, path).await
    }

    // -- Entry hydration ---------------------------------------------------

    /// Issue detail fetches per item and graft the full DTO in; individual
    /// failures keep the unhydrated item.
    async fn hydrate_entries(
        &self,
        client: &VendorClient,
        credentials: &AccessCredentials,
        desc: &'static ResourceDescriptor,
        raw_items: Vec<Value>,
        mapped: Vec<CanonicalDto>,
    ) -> Vec<CanonicalDto> {
        let fetches = raw_items.iter().map(|raw| async move {
            let id = raw
                .get(desc.id_field)
                .and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })?;
            // Composite ids are joined the same way the mapper joins them.
            let id = match (desc.resolve_detail_path, raw.get("VoucherSeries")) {
                (Some(_), Some(series)) => {
                    format!("{}-{}", series.as_str().unwrap_or_default(), id)
                }
                _ => id,
            };
            let path = desc.detail_path_for(&id)?;
            match client.get_value(credentials, &path).await {
                Ok(body) => (desc.map)(unwrap_detail(&body, desc)).ok(),
                Err(err) => {
                    debug!(id, error = %err, "entry hydration fetch failed");
                    None
                }
            }
        });
        let hydrated = join_all(fetches).await;
        mapped
            .into_iter()
            .zip(hydrated)
            .map(|(original, detail)| detail.unwrap_or(original))
            .collect()
    }
}

fn unwrap_detail<'a>(body: &'a Value, desc: &ResourceDescriptor) -> &'a Value {
    match desc.detail_key {
        Some(key) => body.get(key).unwrap_or(body),
        None => body,
    }
}

fn unwrap_detail_sub<'a>(body: &'a Value, list_key: Option<&str>) -> &'a Value {
    // Vendors wrap created sub-resources under the singular of the list
    // key; fall back to the body itself.
    match list_key {
        Some(key) => body
            .get(key.trim_end_matches('s'))
            .or_else(|| body.get(key))
            .unwrap_or(body),
        None => body,
    }
}
