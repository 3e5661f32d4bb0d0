//! Package operations: publish, search, version queries, deletion
//!
//! All package names and versions travel as single encoded path segments.

use crate::error::handlers::ValidationErrorHandler;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::client::{ApiClient, ApiRequest, Endpoint};
use crate::registry::types::{LatestVersion, PackageVersionInfo, SearchHit};
use reqwest::Body;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Everything needed to publish one archive
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub name: String,
    pub version: String,
    pub description: String,
    pub file: PathBuf,
}

#[derive(Clone)]
pub struct PackageOperations {
    client: ApiClient,
    output: Logger,
}

impl PackageOperations {
    pub fn new(client: ApiClient, output: Logger) -> Self {
        Self { client, output }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Upload an archive as a multipart PUT to `packages/publish`.
    pub async fn publish(&self, request: &PublishRequest) -> Result<()> {
        ValidationErrorHandler::validate_package_name(&request.name)?;
        if request.version.trim().is_empty() {
            return Err(RegistryError::Validation("Version cannot be empty".to_string()));
        }
        // Auth is checked before the file is even opened.
        self.client.require_credentials()?;

        let form = Self::publish_form(request).await?;
        let api_request = ApiRequest::put(Endpoint::path("packages/publish"))
            .multipart(form)
            .authenticated();
        self.client.execute(api_request).await?;

        self.output.detail(&format!(
            "Published {}@{} from {}",
            request.name,
            request.version,
            request.file.display()
        ));
        Ok(())
    }

    async fn publish_form(request: &PublishRequest) -> Result<Form> {
        let metadata = tokio::fs::metadata(&request.file).await.map_err(|_| {
            RegistryError::Validation(format!(
                "File {} does not exist. Check the file path",
                request.file.display()
            ))
        })?;
        if !metadata.is_file() {
            return Err(RegistryError::Validation(format!(
                "{} is not a regular file",
                request.file.display()
            )));
        }

        let file = tokio::fs::File::open(&request.file).await?;
        let file_name = file_name_of(&request.file);
        let part = Part::stream_with_length(Body::from(file), metadata.len())
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| RegistryError::Validation(format!("Invalid upload content type: {}", e)))?;

        Ok(Form::new()
            .text("packageName", request.name.clone())
            .text("name", request.name.clone())
            .text("version", request.version.clone())
            .text("description", request.description.clone())
            .part("file", part))
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let request = ApiRequest::get(Endpoint::path("packages/search")).query("query", query);
        self.client.execute_json(request).await
    }

    /// Raw latest-version lookup; no caching at this layer
    pub async fn fetch_latest_version(&self, name: &str) -> Result<LatestVersion> {
        ValidationErrorHandler::validate_package_name(name)?;
        let request = ApiRequest::get(Endpoint::segments(["packages", name, "latestVersion"]));
        let body: Value = self.client.execute_json(request).await?;
        LatestVersion::from_value(body)
    }

    /// Raw version list lookup; no caching at this layer
    pub async fn fetch_versions(&self, name: &str) -> Result<Vec<PackageVersionInfo>> {
        ValidationErrorHandler::validate_package_name(name)?;
        let request = ApiRequest::get(Endpoint::segments(["packages", name, "versions"]));
        let body: Vec<Value> = self.client.execute_json(request).await?;
        body.into_iter().map(PackageVersionInfo::from_value).collect()
    }

    /// Delete every version of a package
    pub async fn delete_package(&self, name: &str) -> Result<()> {
        ValidationErrorHandler::validate_package_name(name)?;
        let request = ApiRequest::delete(Endpoint::segments(["packages", name])).authenticated();
        self.client.execute(request).await?;
        Ok(())
    }

    pub async fn delete_version(&self, name: &str, version: &str) -> Result<()> {
        ValidationErrorHandler::validate_package_name(name)?;
        let request = ApiRequest::delete(Endpoint::segments(["packages", name, "versions", version]))
            .authenticated();
        self.client.execute(request).await?;
        Ok(())
    }

    /// Streaming GET for one concrete version's archive
    pub fn download_request(name: &str, version: &str) -> ApiRequest {
        ApiRequest::get(Endpoint::segments(["packages", name, "download", version])).optional_auth()
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "package".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use httpmock::prelude::*;
    use serde_json::json;

    fn ops(server: &MockServer, logged_in: bool) -> PackageOperations {
        let credentials = logged_in.then(|| Credentials::new("1", "key", "alice"));
        let client = ApiClient::builder(server.url("/api"))
            .with_credentials(credentials)
            .with_logger(Logger::new_quiet())
            .build()
            .unwrap();
        PackageOperations::new(client, Logger::new_quiet())
    }

    #[tokio::test]
    async fn test_publish_uploads_multipart_with_put() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("foo-1.0.0.tgz");
        std::fs::write(&archive, b"archive-bytes").unwrap();

        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/api/packages/publish")
                    .header("x-user-id", "1")
                    .body_contains("name=\"packageName\"")
                    .body_contains("archive-bytes")
                    .body_contains("filename=\"foo-1.0.0.tgz\"");
                then.status(201).json_body(json!({"ok": true}));
            })
            .await;

        let request = PublishRequest {
            name: "foo".to_string(),
            version: "1.0.0".to_string(),
            description: "a package".to_string(),
            file: archive,
        };
        ops(&server, true).publish(&request).await.unwrap();
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_publish_missing_file_is_validation_error() {
        let server = MockServer::start_async().await;
        let request = PublishRequest {
            name: "foo".to_string(),
            version: "1.0.0".to_string(),
            description: String::new(),
            file: PathBuf::from("/definitely/not/here.tgz"),
        };
        let err = ops(&server, true).publish(&request).await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
    }

    #[tokio::test]
    async fn test_fetch_latest_version_sentinel() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/packages/empty/latestVersion");
                then.status(200).json_body(json!({"message": "no versions"}));
            })
            .await;

        let latest = ops(&server, false).fetch_latest_version("empty").await.unwrap();
        assert_eq!(latest, LatestVersion::NoVersions);
    }

    #[tokio::test]
    async fn test_fetch_versions_keeps_registry_order() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/packages/foo/versions");
                then.status(200).json_body(json!([
                    {"version": "2.0.0", "fileSize": 10},
                    {"version": "1.0.0", "fileSize": 5}
                ]));
            })
            .await;

        let versions = ops(&server, false).fetch_versions("foo").await.unwrap();
        let names: Vec<_> = versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(names, ["2.0.0", "1.0.0"]);
    }

    #[tokio::test]
    async fn test_search_hits() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/packages/search").query_param("query", "fo");
                then.status(200).json_body(json!([
                    {"name": "foo", "description": "Foo lib", "updatedAt": "2024-02-03T04:05:06Z"},
                    {"name": "fob"}
                ]));
            })
            .await;

        let hits = ops(&server, false).search("fo").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].updated_at_display(), "2024-02-03 04:05:06");
        assert_eq!(hits[1].description_or_na(), "N/A");
    }

    #[tokio::test]
    async fn test_delete_version_path() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/api/packages/foo/versions/1.0.0");
                then.status(200).json_body(json!({"message": "deleted"}));
            })
            .await;

        ops(&server, true).delete_version("foo", "1.0.0").await.unwrap();
        mock.assert_hits_async(1).await;
    }
}
