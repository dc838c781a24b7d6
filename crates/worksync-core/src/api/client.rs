//! API client for the worksync REST backend.
//!
//! `ApiClient` serves two roles: the [`SessionApi`] endpoints used by the
//! session lifecycle, and typed JSON helpers for the rest of the application.
//! Only the helpers are routed through an attached [`AuthInterceptor`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::session::{SessionApi, SessionGrant};
use super::ApiError;
use crate::auth::AuthInterceptor;

const LOGIN_PATH: &str = "/auth/login";
const REFRESH_TOKEN_PATH: &str = "/auth/refresh-token";
const CURRENT_USER_PATH: &str = "/auth/me";

/// API client for the worksync backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    interceptor: Option<Arc<AuthInterceptor>>,
}

impl ApiClient {
    /// Create a new API client. Every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            interceptor: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            token: Some(token),
            ..self.clone()
        }
    }

    /// Create a new ApiClient whose helper calls report to `interceptor`.
    pub fn with_interceptor(&self, interceptor: Arc<AuthInterceptor>) -> Self {
        Self {
            interceptor: Some(interceptor),
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
    }

    async fn intercepted<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        match self.interceptor {
            Some(ref interceptor) => interceptor.observe(result).await,
            None => result,
        }
    }

    /// Authenticated GET decoding a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let request = self.authorize(self.client.get(&url));
        let result = Self::send_json(request).await;
        self.intercepted(result).await
    }

    /// Authenticated POST with a JSON body, decoding a JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(url = %url, "POST");
        let request = self.authorize(self.client.post(&url)).json(body);
        let result = Self::send_json(request).await;
        self.intercepted(result).await
    }

    fn validate_grant(grant: SessionGrant) -> Result<SessionGrant, ApiError> {
        if grant.token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Response did not include a token".to_string(),
            ));
        }
        Ok(grant)
    }
}

#[async_trait]
impl SessionApi for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<SessionGrant, ApiError> {
        let request = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(&json!({ "email": email, "password": password }));
        Self::validate_grant(Self::send_json(request).await?)
    }

    async fn renew_token(&self, token: &str) -> Result<SessionGrant, ApiError> {
        let request = self
            .client
            .post(self.url(REFRESH_TOKEN_PATH))
            .bearer_auth(token);
        Self::validate_grant(Self::send_json(request).await?)
    }

    async fn current_user(&self, token: &str) -> Result<Value, ApiError> {
        let request = self.client.get(self.url(CURRENT_USER_PATH)).bearer_auth(token);
        Self::send_json(request).await
    }
}
