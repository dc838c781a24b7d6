use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::ApiError;

/// Token issued by the login or renewal endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionGrant {
    pub token: String,
    #[serde(default)]
    pub user: Option<Value>,
}

/// Session endpoints used by the lifecycle components.
///
/// Results of these calls are never routed through the interceptor.
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<SessionGrant, ApiError>;

    /// Exchange the current token for a fresh one.
    async fn renew_token(&self, token: &str) -> Result<SessionGrant, ApiError>;

    /// Lightweight "who am I" probe.
    async fn current_user(&self, token: &str) -> Result<Value, ApiError>;
}
