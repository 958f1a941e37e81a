// SPDX-License-Identifier: MIT OR Apache-2.0
//! Consent lifecycle: CRUD with ETag optimistic concurrency, the status
//! state machine, one-time-code handoff, token exchange, SIE-upload
//! consents, and the scheduled sweeps (token refresh, inactivity, purge).
//!
//! Tenant isolation is enforced here: a consent belonging to another
//! tenant is indistinguishable from a missing one — both answer
//! *not-found*.

#![deny(unsafe_code)]

mod requests;
mod service;

pub use requests::{CreateConsentRequest, ExchangeTokenRequest, PatchConsentRequest};
pub use service::{ConsentService, ResolvedAccess};
