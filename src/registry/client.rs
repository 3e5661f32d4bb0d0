//! Authenticated request dispatcher for the package registry API
//!
//! Every HTTP call the client makes goes through [`ApiClient::send`]. The
//! success / API-error / transport-error decision is made once, in
//! [`ApiResponse::into_success`]; callers branch on the `Result` and never
//! look at status codes themselves.

use crate::config::Credentials;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler, ValidationErrorHandler};
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use futures::Stream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH};
use reqwest::multipart::Form;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const API_KEY_HEADER: &str = "x-api-key";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Body chunks as produced by [`SuccessResponse::into_stream`]
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl FromStr for Method {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            _ => Err(RegistryError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Path relative to the configured base URL, kept as raw segments so
/// package names are percent-encoded exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    segments: Vec<String>,
}

impl Endpoint {
    /// A literal path such as `auth/login`; a trailing `/` is kept.
    pub fn path(path: &str) -> Self {
        Self {
            segments: path.trim_start_matches('/').split('/').map(str::to_string).collect(),
        }
    }

    /// A path built from untrusted segments, each encoded on its own.
    pub fn segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Whether a request carries the `x-user-id` / `x-api-key` headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    None,
    /// Fail with `NotLoggedIn` before any network I/O if credentials are missing
    Required,
    /// Attach credentials when present
    Optional,
}

/// Request payload; at most one kind of body can be set
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Form),
}

pub struct ApiRequest {
    method: Method,
    endpoint: Endpoint,
    query: Vec<(String, String)>,
    body: RequestBody,
    headers: HeaderMap,
    auth: AuthMode,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: Endpoint) -> Self {
        Self {
            method,
            endpoint,
            query: Vec::new(),
            body: RequestBody::Empty,
            headers: HeaderMap::new(),
            auth: AuthMode::None,
        }
    }

    pub fn get(endpoint: Endpoint) -> Self {
        Self::new(Method::Get, endpoint)
    }

    pub fn post(endpoint: Endpoint) -> Self {
        Self::new(Method::Post, endpoint)
    }

    pub fn put(endpoint: Endpoint) -> Self {
        Self::new(Method::Put, endpoint)
    }

    pub fn delete(endpoint: Endpoint) -> Self {
        Self::new(Method::Delete, endpoint)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, form: Form) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| RegistryError::Validation(format!("Invalid header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| RegistryError::Validation(format!("Invalid header value for {}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn authenticated(mut self) -> Self {
        self.auth = AuthMode::Required;
        self
    }

    pub fn optional_auth(mut self) -> Self {
        self.auth = AuthMode::Optional;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

pub struct ApiClientBuilder {
    base_url: String,
    credentials: Option<Credentials>,
    read_timeout: Option<Duration>,
    output: Logger,
}

impl ApiClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: None,
            read_timeout: None,
            output: Logger::default(),
        }
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Idle limit for each read from the connection.
    ///
    /// There is no limit on a whole exchange, so a download that keeps
    /// receiving bytes runs as long as it needs to.
    pub fn with_read_timeout(mut self, timeout_secs: u64) -> Self {
        self.read_timeout = Some(Duration::from_secs(timeout_secs));
        self
    }

    pub fn with_logger(mut self, output: Logger) -> Self {
        self.output = output;
        self
    }

    pub fn build(self) -> Result<ApiClient> {
        let base_url = ValidationErrorHandler::validate_api_url(&self.base_url)?;

        let mut builder = Client::builder().connect_timeout(DEFAULT_CONNECT_TIMEOUT);
        if let Some(timeout) = self.read_timeout {
            builder = builder.read_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RegistryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(ApiClient {
            client,
            base_url,
            credentials: self.credentials.filter(Credentials::is_complete),
            output: self.output,
        })
    }
}

/// HTTP client bound to one registry and one (read-only) identity
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    credentials: Option<Credentials>,
    output: Logger,
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Credentials for an authenticated endpoint, or `NotLoggedIn`
    pub fn require_credentials(&self) -> Result<&Credentials> {
        self.credentials.as_ref().ok_or(RegistryError::NotLoggedIn)
    }

    pub fn url_for(&self, endpoint: &Endpoint) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                RegistryError::Config(format!("API URL {} cannot be a base", self.base_url))
            })?;
            segments.pop_if_empty();
            segments.extend(endpoint.segments.iter());
        }
        Ok(url)
    }

    /// Issue a request. Non-2xx responses are *not* errors at this level;
    /// call [`ApiResponse::into_success`] (or use [`ApiClient::execute`]).
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request.endpoint)?;

        let auth_headers = match request.auth {
            AuthMode::None => None,
            AuthMode::Required => Some(self.require_credentials()?),
            AuthMode::Optional => self.credentials.as_ref(),
        };

        let mut builder = self
            .client
            .request(request.method.into(), url)
            .headers(request.headers);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(credentials) = auth_headers {
            builder = builder
                .header(USER_ID_HEADER, &credentials.user_id)
                .header(API_KEY_HEADER, &credentials.api_key);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        let context = format!("{} {}", request.method, request.endpoint);
        self.output.detail(&format!("→ {}", context));

        let response = builder
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, &context))?;

        self.output
            .detail(&format!("← {} {}", response.status().as_u16(), context));

        Ok(ApiResponse { context, inner: response })
    }

    /// `send` followed by success classification
    pub async fn execute(&self, request: ApiRequest) -> Result<SuccessResponse> {
        self.send(request).await?.into_success().await
    }

    pub async fn execute_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.execute(request).await?.json().await
    }
}

/// A completed HTTP exchange, not yet classified
pub struct ApiResponse {
    context: String,
    inner: reqwest::Response,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// The single success / API-error decision point.
    pub async fn into_success(self) -> Result<SuccessResponse> {
        let status = self.status();
        if status.is_success() {
            return Ok(SuccessResponse {
                context: self.context,
                inner: self.inner,
            });
        }

        // An unreadable error body still yields a status-derived message.
        let body = self.inner.bytes().await.unwrap_or_default();
        Err(HttpErrorHandler::api_error(status, &body))
    }
}

/// A 2xx response whose body has not been consumed
pub struct SuccessResponse {
    context: String,
    inner: reqwest::Response,
}

impl SuccessResponse {
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// Declared body length, 0 when the server did not send one
    pub fn content_length(&self) -> u64 {
        self.header_str(CONTENT_LENGTH.as_str())
            .and_then(|v| v.trim().parse().ok())
            .or_else(|| self.inner.content_length())
            .unwrap_or(0)
    }

    pub async fn bytes(self) -> Result<Vec<u8>> {
        let context = self.context;
        self.inner
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, &context))
    }

    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let context = self.context.clone();
        let body = self.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| RegistryError::Parse(format!("Invalid JSON in response to {}: {}", context, e)))
    }

    /// Raw body as a stream of chunks
    pub fn into_stream(self) -> ByteStream {
        let context = self.context;
        Box::pin(self.inner.bytes_stream().map(move |chunk| {
            chunk
                .map(|b| b.to_vec())
                .map_err(|e| NetworkErrorHandler::handle_network_error(&e, &context))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer, credentials: Option<Credentials>) -> ApiClient {
        ApiClient::builder(server.url("/api"))
            .with_credentials(credentials)
            .with_logger(Logger::new_quiet())
            .build()
            .unwrap()
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        assert_eq!(
            "PATCH".parse::<Method>(),
            Err(RegistryError::UnsupportedMethod("PATCH".to_string()))
        );
    }

    #[test]
    fn test_url_for_encodes_segments() {
        let client = ApiClient::builder("http://localhost:3000/api").build().unwrap();
        let url = client
            .url_for(&Endpoint::segments(["packages", "my pkg", "download", "1.0/beta"]))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/api/packages/my%20pkg/download/1.0%2Fbeta"
        );

        let url = client.url_for(&Endpoint::path("auth/")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/auth/");
    }

    #[tokio::test]
    async fn test_auth_headers_attached() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/api/packages/foo")
                    .header("x-user-id", "42")
                    .header("x-api-key", "secret");
                then.status(200).json_body(json!({"ok": true}));
            })
            .await;

        let client = client_for(&server, Some(Credentials::new("42", "secret", "alice")));
        let request = ApiRequest::delete(Endpoint::segments(["packages", "foo"])).authenticated();
        client.execute(request).await.unwrap();
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_network() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.path("/api/auth/");
                then.status(200);
            })
            .await;

        let client = client_for(&server, None);
        let request = ApiRequest::delete(Endpoint::path("auth/")).authenticated();
        let err = client.send(request).await.err().unwrap();
        assert_eq!(err, RegistryError::NotLoggedIn);
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_error_body_classification() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/packages/missing/versions");
                then.status(404).json_body(json!({"error": "package does not exist"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/packages/broken/versions");
                then.status(500).body("internal explosion");
            })
            .await;

        let client = client_for(&server, None);

        let err = client
            .execute(ApiRequest::get(Endpoint::segments(["packages", "missing", "versions"])))
            .await
            .err()
            .unwrap();
        assert_eq!(
            err,
            RegistryError::Api {
                status: 404,
                message: "package does not exist".to_string()
            }
        );

        let err = client
            .execute(ApiRequest::get(Endpoint::segments(["packages", "broken", "versions"])))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_query_and_json_body() {
        let server = MockServer::start_async().await;
        let search = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/packages/search")
                    .query_param("query", "a b&c");
                then.status(200).json_body(json!([]));
            })
            .await;
        let login = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/auth/login")
                    .json_body(json!({"username": "u", "password": "p"}));
                then.status(200).json_body(json!({"user_id": 1, "apiKey": "k"}));
            })
            .await;

        let client = client_for(&server, None);
        let hits: Vec<Value> = client
            .execute_json(ApiRequest::get(Endpoint::path("packages/search")).query("query", "a b&c"))
            .await
            .unwrap();
        assert!(hits.is_empty());

        let body: Value = client
            .execute_json(
                ApiRequest::post(Endpoint::path("auth/login"))
                    .json(json!({"username": "u", "password": "p"})),
            )
            .await
            .unwrap();
        assert_eq!(body["apiKey"], "k");

        search.assert_hits_async(1).await;
        login.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_transport_error() {
        // Nothing listens on port 9 of localhost in test environments.
        let client = ApiClient::builder("http://127.0.0.1:9/api")
            .with_read_timeout(5)
            .with_logger(Logger::new_quiet())
            .build()
            .unwrap();
        let err = client
            .send(ApiRequest::get(Endpoint::path("packages/search")))
            .await
            .err()
            .unwrap();
        assert!(err.is_transport());
    }
}
