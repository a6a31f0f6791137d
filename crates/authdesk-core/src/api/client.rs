//! Typed client for the authdesk REST API.
//!
//! Every request goes through the `RequestAuthenticator`, so callers never
//! touch the bearer header or 401 handling themselves.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;
use url::Url;

use crate::models::{
    Message, PasswordChange, PasswordRecoveryRequest, PasswordReset, Token, UserCreate, UserRead,
    UserUpdate,
};

use super::{ApiError, RequestAuthenticator};

// ============================================================================
// Constants
// ============================================================================

/// Default API base URL for a local development server
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for the authdesk server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    auth: RequestAuthenticator,
}

impl ApiClient {
    pub(crate) fn new(base_url: Url, auth: RequestAuthenticator) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            auth,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn authenticator(&self) -> &RequestAuthenticator {
        &self.auth
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// Send through the authenticator and turn non-2xx answers into `ApiError`.
    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = self.auth.authorize(request).send().await?;
        let status = response.status();
        self.auth.inspect(path, status);

        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            debug!(path, %status, "Request failed");
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(path, self.client.get(self.url(path))).await?;
        Self::parse(path, response).await
    }

    async fn get_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T, ApiError> {
        let request = self.client.get(self.url(path)).query(query);
        let response = self.send(path, request).await?;
        Self::parse(path, response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let response = self.send(path, self.client.post(self.url(path)).json(body)).await?;
        Self::parse(path, response).await
    }

    async fn patch<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let response = self.send(path, self.client.patch(self.url(path)).json(body)).await?;
        Self::parse(path, response).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let response = self.send(path, self.client.put(self.url(path)).json(body)).await?;
        Self::parse(path, response).await
    }

    /// For endpoints answering 204; any body is ignored
    async fn send_no_content(&self, path: &str, request: RequestBuilder) -> Result<(), ApiError> {
        let response = self.send(path, request).await?;
        if response.status() != StatusCode::NO_CONTENT {
            debug!(path, status = %response.status(), "Ignoring response body");
        }
        Ok(())
    }

    // ===== Authentication =====

    /// Exchange username and password for a token (form-urlencoded)
    pub async fn login(&self, username: &str, password: &str) -> Result<Token, ApiError> {
        let path = "/auth/login";
        let request = self
            .client
            .post(self.url(path))
            .form(&[("username", username), ("password", password)]);
        let response = self.send(path, request).await?;
        Self::parse(path, response).await
    }

    pub async fn register(&self, new_user: &UserCreate) -> Result<UserRead, ApiError> {
        self.post("/auth/register", new_user).await
    }

    pub async fn current_user(&self) -> Result<UserRead, ApiError> {
        self.get("/auth/me").await
    }

    pub async fn update_current_user(&self, update: &UserUpdate) -> Result<UserRead, ApiError> {
        self.patch("/auth/me", update).await
    }

    pub async fn delete_current_user(&self) -> Result<(), ApiError> {
        let path = "/auth/me";
        self.send_no_content(path, self.client.delete(self.url(path))).await
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Result<(), ApiError> {
        let path = "/auth/me/password";
        self.send_no_content(path, self.client.put(self.url(path)).json(change))
            .await
    }

    pub async fn request_password_recovery(&self, email: &str) -> Result<Message, ApiError> {
        let body = PasswordRecoveryRequest {
            email: email.to_string(),
        };
        self.post("/auth/password-recovery", &body).await
    }

    pub async fn reset_password(&self, reset: &PasswordReset) -> Result<(), ApiError> {
        let path = "/auth/reset-password";
        self.send_no_content(path, self.client.post(self.url(path)).json(reset))
            .await
    }

    // ===== User Administration =====

    pub async fn list_users(&self, skip: u32, limit: u32) -> Result<Vec<UserRead>, ApiError> {
        self.get_with_query("/users/", &[("skip", skip), ("limit", limit)])
            .await
    }

    pub async fn get_user(&self, user_id: i64) -> Result<UserRead, ApiError> {
        self.get(&format!("/users/{}", user_id)).await
    }

    pub async fn create_user(&self, new_user: &UserCreate) -> Result<UserRead, ApiError> {
        self.post("/users/", new_user).await
    }

    pub async fn update_user(&self, user_id: i64, update: &UserUpdate) -> Result<UserRead, ApiError> {
        self.put(&format!("/users/{}", user_id), update).await
    }

    pub async fn delete_user(&self, user_id: i64) -> Result<(), ApiError> {
        let path = format!("/users/{}", user_id);
        self.send_no_content(&path, self.client.delete(self.url(&path)))
            .await
    }
}
