//! Bounded HTTP client module.
//!
//! This module provides the `ApiClient` used by the shell and by mounted
//! modules to talk to the site backend. Every call carries a hard deadline
//! and fails with one error taxonomy (`ApiError`).

pub mod client;
pub mod error;

pub use client::{ApiClient, Payload, PendingRequest, RequestRecord};
pub use error::ApiError;
