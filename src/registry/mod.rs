//! Registry module for GloPM registry interactions
//!
//! The [`client`] dispatches every HTTP request and classifies responses,
//! [`types`] holds the typed payloads, and [`operations`] wraps the
//! individual endpoints.

pub mod client;
pub mod operations;
pub mod types;

pub use client::{ApiClient, ApiClientBuilder, ApiRequest, Endpoint, Method};
pub use operations::{AuthOperations, PackageOperations, PublishRequest};
pub use types::{LatestVersion, PackageVersionInfo, SearchHit};
