//! GloPM registry client library
//!
//! The client engine behind the `glopm` command: an authenticated API
//! client, a local response cache, version resolution, atomic streaming
//! downloads and a bounded batch executor.

pub mod cache;
pub mod cli;
pub mod common;
pub mod concurrency;
pub mod config;
pub mod download;
pub mod error;
pub mod logging;
pub mod registry;
pub mod resolver;
pub mod session;

pub use cache::ResponseCache;
pub use concurrency::{BatchExecutor, BatchResult, BatchSummary, CancelFlag};
pub use config::{AppConfig, ConfigPaths, Credentials};
pub use download::{DownloadPipeline, DownloadProgress};
pub use error::{RegistryError, Result};
pub use logging::Logger;
pub use registry::{ApiClient, ApiClientBuilder};
pub use resolver::VersionResolver;
pub use session::{Session, SessionOptions};
