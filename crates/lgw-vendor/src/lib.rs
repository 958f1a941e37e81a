// SPDX-License-Identifier: MIT OR Apache-2.0
//! Low-level HTTP clients for the bookkeeping vendors.
//!
//! One [`VendorClient`] per vendor, all funneled through the vendor's token
//! bucket and the shared retry driver.  Outbound I/O goes through the
//! [`VendorTransport`] trait object: the default is a [`reqwest`] client,
//! and deployments whose TLS stack cannot reach a vendor (Björn Lundén
//! presents a cipher set some stacks reject) plug an out-of-process
//! executor into the same seam.

#![deny(unsafe_code)]

pub mod client;
pub mod page;
pub mod transport;

pub use client::{AccessCredentials, VendorClient, default_base_url};
pub use page::{PaginationDialect, RawPage};
pub use transport::{ReqwestTransport, TransportRequest, TransportResponse, VendorTransport};
