//! Version resolution on top of the response cache
//!
//! Turns a version token into a concrete version. `latest` (any case) goes
//! through the cache and then the registry; every other token is returned
//! verbatim without touching either.

use crate::cache::{LATEST_VERSION_FIELD, ResponseCache, VERSIONS_FIELD};
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::operations::PackageOperations;
use crate::registry::types::{LatestVersion, PackageVersionInfo};
use serde::Serialize;
use serde_json::Value;

pub const LATEST_TOKEN: &str = "latest";
pub const DEFAULT_MAX_AGE_SECS: u64 = 3600;

/// Where a lookup was answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: Source,
}

impl<T> Resolved<T> {
    fn cached(value: T) -> Self {
        Self {
            value,
            source: Source::Cache,
        }
    }

    fn fetched(value: T) -> Self {
        Self {
            value,
            source: Source::Network,
        }
    }

    pub fn is_cached(&self) -> bool {
        self.source == Source::Cache
    }
}

#[derive(Clone)]
pub struct VersionResolver {
    packages: PackageOperations,
    cache: ResponseCache,
    output: Logger,
}

impl VersionResolver {
    pub fn new(packages: PackageOperations, cache: ResponseCache, output: Logger) -> Self {
        Self {
            packages,
            cache,
            output,
        }
    }

    pub fn is_latest_token(token: &str) -> bool {
        token.trim().eq_ignore_ascii_case(LATEST_TOKEN)
    }

    /// Concrete version for `token`.
    pub async fn resolve(&self, package_name: &str, token: &str, use_cache: bool) -> Result<String> {
        if !Self::is_latest_token(token) {
            return Ok(token.to_string());
        }

        let latest = self.latest_version(package_name, use_cache).await?;
        self.output.detail(&format!(
            "Resolved {}@latest to {}{}",
            package_name,
            latest.value.version,
            if latest.is_cached() { " (cached)" } else { "" }
        ));
        Ok(latest.value.version)
    }

    pub async fn latest_version(
        &self,
        package_name: &str,
        use_cache: bool,
    ) -> Result<Resolved<PackageVersionInfo>> {
        if use_cache {
            if let Some(info) = self
                .cached_field(package_name, LATEST_VERSION_FIELD)
                .await
                .and_then(|value| PackageVersionInfo::from_value(value).ok())
            {
                return Ok(Resolved::cached(info));
            }
        }

        let latest = self
            .packages
            .fetch_latest_version(package_name)
            .await
            .map_err(Self::resolution_error)?;

        match latest {
            LatestVersion::Found(info) => {
                self.store(package_name, LATEST_VERSION_FIELD, &info).await;
                Ok(Resolved::fetched(info))
            }
            LatestVersion::NoVersions => {
                Err(RegistryError::NoVersionsAvailable(package_name.to_string()))
            }
        }
    }

    /// Full version list, cached independently of the latest version.
    pub async fn list_versions(
        &self,
        package_name: &str,
        use_cache: bool,
    ) -> Result<Resolved<Vec<PackageVersionInfo>>> {
        if use_cache {
            if let Some(Value::Array(items)) = self.cached_field(package_name, VERSIONS_FIELD).await {
                let parsed: Result<Vec<_>> =
                    items.into_iter().map(PackageVersionInfo::from_value).collect();
                if let Ok(versions) = parsed {
                    return Ok(Resolved::cached(versions));
                }
            }
        }

        let versions = self
            .packages
            .fetch_versions(package_name)
            .await
            .map_err(Self::resolution_error)?;
        self.store(package_name, VERSIONS_FIELD, &versions).await;
        Ok(Resolved::fetched(versions))
    }

    async fn cached_field(&self, package_name: &str, field: &str) -> Option<Value> {
        let mut document = self.cache.get(package_name, DEFAULT_MAX_AGE_SECS).await?;
        document.get_mut(field).map(Value::take)
    }

    // Cache writes never fail a lookup.
    async fn store<T: Serialize>(&self, package_name: &str, field: &str, value: &T) {
        let result = match serde_json::to_value(value) {
            Ok(value) => self.cache.merge(package_name, field, value).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            self.output
                .warning(&format!("Could not cache {} for {}: {}", field, package_name, e));
        }
    }

    // Registry refusals become resolution failures; transport errors stay as they are.
    fn resolution_error(err: RegistryError) -> RegistryError {
        match err {
            RegistryError::Api { message, .. } => RegistryError::Resolution(message),
            other => other,
        }
    }
}
