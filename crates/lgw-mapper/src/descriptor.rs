// SPDX-License-Identifier: MIT OR Apache-2.0
//! The resource-descriptor table.

use lgw_core::{CanonicalDto, Provider, ResourceType};
use lgw_error::GatewayError;
use serde_json::Value;

/// Maps one raw vendor payload into the canonical DTO.
pub type MapFn = fn(&Value) -> Result<CanonicalDto, GatewayError>;

/// Resolves a composite id into a detail path (Fortnox vouchers are
/// addressed by `series/number` joined from a dash-separated id).
pub type DetailPathFn = fn(&str) -> Option<String>;

/// One sub-resource rule under a parent resource.
pub struct SubResource {
    /// URL segment the gateway matches (`payments`, `rows`).
    pub segment: &'static str,
    /// Vendor path template with `{id}` for the parent id.
    pub path_template: &'static str,
    /// JSON key the collection lives under, where the envelope needs one.
    pub list_key: Option<&'static str>,
    /// Mapper for each item.
    pub map: MapFn,
    /// Whether the vendor permits creating this sub-resource.
    pub supports_create: bool,
}

/// Static description of one `(vendor, resource)` mapping.
pub struct ResourceDescriptor {
    /// Resource this entry serves.
    pub resource: ResourceType,
    /// List endpoint path.
    pub list_path: &'static str,
    /// Detail endpoint template with an `{id}` placeholder.
    pub detail_path: &'static str,
    /// JSON key the list collection lives under.
    pub list_key: Option<&'static str>,
    /// JSON key a detail object lives under (Fortnox wraps singles).
    pub detail_key: Option<&'static str>,
    /// Field carrying the vendor identifier.
    pub id_field: &'static str,
    /// One object, no list/detail split (company information, reports).
    pub singleton: bool,
    /// Whether the list endpoint pages.
    pub paginated: bool,
    /// Whether modified-since filtering is honored.
    pub supports_last_modified: bool,
    /// The list path carries a `{year}` fiscal-year segment (Briox
    /// journals); the gateway resolves the current year when the caller
    /// omits one.
    pub year_scoped: bool,
    /// List rows lack child rows the DTO needs; the gateway issues detail
    /// fetches per item when entries are requested (Fortnox vouchers).
    pub supports_entry_hydration: bool,
    /// Whether the vendor permits creates on this resource.
    pub supports_create: bool,
    /// Composite-id resolver; wins over `detail_path` when present.
    pub resolve_detail_path: Option<DetailPathFn>,
    /// Mapper into the canonical DTO.
    pub map: MapFn,
    /// Sub-resource rules.
    pub sub_resources: &'static [SubResource],
}

impl ResourceDescriptor {
    /// The detail path for `id`, applying the resolver when present.
    pub fn detail_path_for(&self, id: &str) -> Option<String> {
        if let Some(resolve) = self.resolve_detail_path {
            resolve(id)
        } else {
            Some(self.detail_path.replace("{id}", id))
        }
    }

    /// The list path with the fiscal-year segment resolved.
    pub fn list_path_for(&self, fiscal_year: Option<i32>) -> String {
        if self.year_scoped {
            let year = fiscal_year.unwrap_or_else(current_year);
            self.list_path.replace("{year}", &year.to_string())
        } else {
            self.list_path.to_owned()
        }
    }

    /// The sub-resource rule for `segment`, if any.
    pub fn sub_resource(&self, segment: &str) -> Option<&'static SubResource> {
        self.sub_resources.iter().find(|s| s.segment == segment)
    }
}

fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Utc::now().year()
}

/// Look up the descriptor for `(provider, resource)`.
///
/// `None` means the vendor does not support the resource; the gateway
/// answers *not-supported*.
pub fn descriptor(
    provider: Provider,
    resource: ResourceType,
) -> Option<&'static ResourceDescriptor> {
    match provider {
        Provider::Fortnox => crate::fortnox::descriptor(resource),
        Provider::Visma => crate::visma::descriptor(resource),
        Provider::Briox => crate::briox::descriptor(resource),
        Provider::Bokio => crate::bokio::descriptor(resource),
        Provider::Bjornlunden => crate::bjornlunden::descriptor(resource),
        Provider::SieUpload => None,
    }
}

/// Every resource a vendor has a descriptor for.
pub fn supported_resources(provider: Provider) -> Vec<ResourceType> {
    ResourceType::ALL
        .iter()
        .copied()
        .filter(|r| descriptor(provider, *r).is_some())
        .collect()
}
