//! Account operations: register, login, delete account
//!
//! Successful register/login return fresh [`Credentials`]; persisting them
//! is left to the caller's config layer.

use crate::config::Credentials;
use crate::error::handlers::ValidationErrorHandler;
use crate::error::Result;
use crate::logging::Logger;
use crate::registry::client::{ApiClient, ApiRequest, Endpoint};
use crate::registry::types::AuthResponse;
use serde_json::json;

#[derive(Clone)]
pub struct AuthOperations {
    client: ApiClient,
    output: Logger,
}

impl AuthOperations {
    pub fn new(client: ApiClient, output: Logger) -> Self {
        Self { client, output }
    }

    /// Create an account; the registry logs the new user in directly
    pub async fn register(&self, username: &str, password: &str) -> Result<Credentials> {
        self.exchange("auth/register", username, password).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Credentials> {
        self.exchange("auth/login", username, password).await
    }

    /// Delete the authenticated account
    pub async fn delete_account(&self) -> Result<()> {
        let request = ApiRequest::delete(Endpoint::path("auth/")).authenticated();
        self.client.execute(request).await?;
        self.output.detail("Account deleted on the registry");
        Ok(())
    }

    async fn exchange(&self, path: &str, username: &str, password: &str) -> Result<Credentials> {
        ValidationErrorHandler::validate_credentials(username, password)?;

        let request = ApiRequest::post(Endpoint::path(path))
            .json(json!({ "username": username, "password": password }));
        let response: AuthResponse = self.client.execute_json(request).await?;

        self.output
            .detail(&format!("Authenticated as {} (user id {})", username, response.user_id));
        Ok(Credentials::new(response.user_id, response.api_key, username))
    }
}
