//! HTTP client for the Ziti edge management API.
//!
//! [`ManagementClient`] implements the core's `ManagementApi` over reqwest,
//! sending the `zt-session` header and normalizing `{ data, meta }` envelopes.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod envelope;
pub mod error;

pub use client::{ManagementClient, SESSION_HEADER, query_params};
pub use error::{ClientError, ClientResult};
