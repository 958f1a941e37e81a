// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-vendor resource descriptors and canonical DTO mappers.
//!
//! The registry is a static table keyed by `(Provider, ResourceType)`: each
//! entry names the vendor endpoints, the JSON key the collection lives
//! under, flags for pagination and hydration quirks, and a function value
//! mapping the raw vendor payload into the canonical DTO.  The table is
//! immutable after start; the gateway handler dispatches over it.

#![deny(unsafe_code)]

pub mod bjornlunden;
pub mod bokio;
pub mod briox;
pub mod descriptor;
pub mod fortnox;
pub mod util;
pub mod visma;

pub use descriptor::{MapFn, ResourceDescriptor, SubResource, descriptor, supported_resources};
