//! Typed registry payloads
//!
//! Field names follow the registry's camelCase JSON. Optional fields carry
//! an explicit display fallback decided here, so callers never inspect raw
//! JSON.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Placeholder shown for any field the registry omitted
pub const NOT_AVAILABLE: &str = "N/A";

/// One published version of a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersionInfo {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub download_count: u64,
}

impl PackageVersionInfo {
    /// Parse a registry document, rejecting entries without a version.
    pub fn from_value(value: Value) -> Result<Self> {
        let info: PackageVersionInfo = serde_json::from_value(value)?;
        if info.version.trim().is_empty() {
            return Err(RegistryError::Parse(
                "version entry has an empty version field".to_string(),
            ));
        }
        Ok(info)
    }

    pub fn description_or_na(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn published_at_display(&self) -> String {
        self.published_at
            .as_deref()
            .map(crate::common::FormatUtils::format_timestamp)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }
}

/// Outcome of the latest-version endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum LatestVersion {
    Found(PackageVersionInfo),
    /// The registry answered with its "no versions" sentinel
    NoVersions,
}

impl LatestVersion {
    /// Interpret the latest-version body.
    ///
    /// A document without a `version` field is the registry's
    /// `{"message": "..."}` sentinel for a package with nothing published.
    pub fn from_value(value: Value) -> Result<Self> {
        let has_version = value
            .get("version")
            .and_then(Value::as_str)
            .is_some_and(|v| !v.trim().is_empty());
        if !has_version {
            return Ok(LatestVersion::NoVersions);
        }
        PackageVersionInfo::from_value(value).map(LatestVersion::Found)
    }
}

/// A search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl SearchHit {
    pub fn name_or_na(&self) -> &str {
        if self.name.is_empty() { NOT_AVAILABLE } else { &self.name }
    }

    pub fn description_or_na(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn updated_at_display(&self) -> String {
        self.updated_at
            .as_deref()
            .map(crate::common::FormatUtils::format_timestamp)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }
}

/// Body returned by `auth/register` and `auth/login`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthResponse {
    #[serde(alias = "userId", deserialize_with = "string_or_number")]
    pub user_id: String,
    #[serde(alias = "apiKey")]
    pub api_key: String,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

// Sizes and counts sometimes arrive as strings or null.
fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}
