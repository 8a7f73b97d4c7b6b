//! HTTP transport for the modeling API

pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{ApiClient, Transport};
pub use types::{ApiRequest, EndpointResult, Method, Query, ResponseShape};
