//! Standardized error handling patterns for registry responses

use crate::error::{RegistryError, Result};
use reqwest::StatusCode;
use serde_json::Value;

/// Turns non-2xx responses into [`RegistryError::Api`].
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Build the API error for a failed response body.
    ///
    /// The registry reports failures as `{"error": "..."}`. Older endpoints
    /// use `{"message": "..."}`. Anything else gets a message synthesized
    /// from the status code alone.
    pub fn api_error(status: StatusCode, body: &[u8]) -> RegistryError {
        let message = serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|value| Self::extract_message(&value))
            .unwrap_or_else(|| Self::status_message(status));

        RegistryError::Api {
            status: status.as_u16(),
            message,
        }
    }

    fn extract_message(value: &Value) -> Option<String> {
        ["error", "message"]
            .iter()
            .filter_map(|key| value.get(*key))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|msg| !msg.is_empty())
            .map(str::to_string)
    }

    pub fn status_message(status: StatusCode) -> String {
        match status.canonical_reason() {
            Some(reason) => format!("request failed with status {} {}", status.as_u16(), reason),
            None => format!("request failed with status {}", status.as_u16()),
        }
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize a reqwest failure into a one-line actionable message
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> RegistryError {
        let text = error.to_string();
        if error.is_timeout() {
            RegistryError::Transport(format!("{} timed out: {}", context, text))
        } else if error.is_connect() {
            RegistryError::Transport(format!(
                "Could not connect to the registry during {}: {}. Check your network connection and API URL",
                context, text
            ))
        } else if text.contains("dns") {
            RegistryError::Transport(format!("DNS resolution failed for {}: {}", context, text))
        } else if text.contains("certificate") {
            RegistryError::Transport(format!("TLS certificate error during {}: {}", context, text))
        } else if error.is_decode() {
            RegistryError::Parse(format!("Malformed response to {}: {}", context, text))
        } else {
            RegistryError::Transport(format!("{} network error: {}", context, text))
        }
    }
}

/// Validation error utilities
pub struct ValidationErrorHandler;

impl ValidationErrorHandler {
    pub fn validate_api_url(url: &str) -> Result<url::Url> {
        if url.trim().is_empty() {
            return Err(RegistryError::Validation("API URL cannot be empty".to_string()));
        }

        let parsed = url::Url::parse(url.trim())
            .map_err(|e| RegistryError::Validation(format!("Invalid API URL {}: {}", url, e)))?;

        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(RegistryError::Validation(format!(
                "API URL must use http:// or https://, got {}://",
                other
            ))),
        }
    }

    pub fn validate_package_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(RegistryError::Validation(
                "Package name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_credentials(username: &str, password: &str) -> Result<()> {
        match (username.is_empty(), password.is_empty()) {
            (true, _) => Err(RegistryError::Validation(
                "Username cannot be empty".to_string(),
            )),
            (false, true) => Err(RegistryError::Validation(
                "Password cannot be empty".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn validate_workers(workers: usize) -> Result<()> {
        if workers == 0 {
            return Err(RegistryError::Validation(
                "Worker count must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_prefers_error_field() {
        let err = HttpErrorHandler::api_error(
            StatusCode::CONFLICT,
            br#"{"error": "version already exists", "message": "ignored"}"#,
        );
        assert_eq!(
            err,
            RegistryError::Api {
                status: 409,
                message: "version already exists".to_string()
            }
        );
    }

    #[test]
    fn test_api_error_falls_back_to_message_field() {
        let err = HttpErrorHandler::api_error(
            StatusCode::FORBIDDEN,
            br#"{"message": "You do not own this package"}"#,
        );
        assert_eq!(err.to_string(), "You do not own this package");
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn test_api_error_synthesized_from_status() {
        let err = HttpErrorHandler::api_error(StatusCode::NOT_FOUND, b"<html>nope</html>");
        assert_eq!(err.to_string(), "request failed with status 404 Not Found");

        let err = HttpErrorHandler::api_error(StatusCode::BAD_GATEWAY, br#"{"error": 12}"#);
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_validate_api_url() {
        assert!(ValidationErrorHandler::validate_api_url("http://127.0.0.1:3000/api").is_ok());
        assert!(ValidationErrorHandler::validate_api_url("https://registry.example.com").is_ok());
        assert!(ValidationErrorHandler::validate_api_url("").is_err());
        assert!(ValidationErrorHandler::validate_api_url("ftp://example.com").is_err());
        assert!(ValidationErrorHandler::validate_api_url("not a url").is_err());
    }

    #[test]
    fn test_validate_credentials() {
        assert!(ValidationErrorHandler::validate_credentials("alice", "secret").is_ok());
        assert!(ValidationErrorHandler::validate_credentials("", "secret").is_err());
        assert!(ValidationErrorHandler::validate_credentials("alice", "").is_err());
    }
}
