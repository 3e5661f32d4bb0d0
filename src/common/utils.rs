//! Common utilities and helper functions

use crate::error::{RegistryError, Result};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// File and path utilities
pub struct PathUtils;

impl PathUtils {
    /// Ensure the parent directory of `path` exists, creating it as needed
    pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                RegistryError::Io(format!("Failed to create directory {}: {}", parent.display(), e))
            })?;
        }
        Ok(())
    }

    /// Hidden temp sibling for `path`, e.g. `dir/.name.<uuid>.part`
    pub fn temp_sibling(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());
        let tmp_name = format!(".{}.{}.part", name, uuid::Uuid::new_v4().simple());
        match path.parent() {
            Some(parent) => parent.join(tmp_name),
            None => PathBuf::from(tmp_name),
        }
    }

    /// Final path component of an untrusted file name, if any remains
    pub fn sanitize_file_name(name: &str) -> Option<String> {
        let trimmed = name.trim().trim_matches(|c| c == '"' || c == '\'');
        let last = trimmed.rsplit(['/', '\\']).next()?.trim();
        if last.is_empty() || last == "." || last == ".." {
            None
        } else {
            Some(last.to_string())
        }
    }
}

/// Format utilities
pub struct FormatUtils;

impl FormatUtils {
    /// Render an ISO-8601 timestamp as `YYYY-MM-DD HH:MM:SS`.
    ///
    /// Anything that does not look like one is returned unchanged.
    pub fn format_timestamp(raw: &str) -> String {
        let bytes = raw.as_bytes();
        let looks_iso = bytes.len() >= 19
            && bytes[4] == b'-'
            && bytes[7] == b'-'
            && (bytes[10] == b'T' || bytes[10] == b' ')
            && bytes[13] == b':'
            && bytes[16] == b':';
        if looks_iso && raw.is_char_boundary(19) {
            format!("{} {}", &raw[..10], &raw[11..19])
        } else {
            raw.to_string()
        }
    }

    pub fn unix_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(FormatUtils::format_timestamp("2024-01-02T03:04:05.678Z"), "2024-01-02 03:04:05");
        assert_eq!(FormatUtils::format_timestamp("2024-01-02T03:04:05+00:00"), "2024-01-02 03:04:05");
        assert_eq!(FormatUtils::format_timestamp("yesterday"), "yesterday");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(PathUtils::sanitize_file_name("\"pkg-1.0.tgz\""), Some("pkg-1.0.tgz".to_string()));
        assert_eq!(PathUtils::sanitize_file_name("../../etc/passwd"), Some("passwd".to_string()));
        assert_eq!(PathUtils::sanitize_file_name("C:\\temp\\a.zip"), Some("a.zip".to_string()));
        assert_eq!(PathUtils::sanitize_file_name(".."), None);
        assert_eq!(PathUtils::sanitize_file_name("  "), None);
    }

    #[test]
    fn test_temp_sibling_stays_in_directory() {
        let tmp = PathUtils::temp_sibling(Path::new("out/dir/pkg.tgz"));
        assert_eq!(tmp.parent(), Some(Path::new("out/dir")));
        let name = tmp.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".pkg.tgz."));
        assert!(name.ends_with(".part"));
    }
}
