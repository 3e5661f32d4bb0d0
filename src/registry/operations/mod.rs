//! Registry operations - one wrapper per endpoint family
//!
//! These translate typed calls into [`ApiRequest`](crate::registry::client::ApiRequest)s
//! and typed responses; they hold no state beyond a cloned client.

pub mod auth_operations;
pub mod package_operations;

pub use auth_operations::AuthOperations;
pub use package_operations::{PackageOperations, PublishRequest};
