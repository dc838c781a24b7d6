use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::warn;

use super::storage::KeyValueStore;

const TOKEN_KEY: &str = "token";
const USER_PROFILE_KEY: &str = "user_profile";
const ONBOARDING_COMPLETED_KEY: &str = "onboarding_completed";
const LOGIN_COMPLETED_KEY: &str = "login_completed";

/// Persistent session fields on top of a [`KeyValueStore`].
///
/// Every operation maps to independent backend calls. The combined helpers
/// do not roll back when a later write fails.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub async fn set_token(&self, token: &str) -> Result<()> {
        self.backend
            .set(TOKEN_KEY, token)
            .await
            .context("Failed to store session token")
    }

    /// Stored token, or `None` when absent. An empty string counts as absent.
    pub async fn get_token(&self) -> Result<Option<String>> {
        let token = self
            .backend
            .get(TOKEN_KEY)
            .await
            .context("Failed to read session token")?;
        Ok(token.filter(|t| !t.is_empty()))
    }

    pub async fn set_user_profile(&self, profile: &Value) -> Result<()> {
        let encoded = serde_json::to_string(profile)?;
        self.backend
            .set(USER_PROFILE_KEY, &encoded)
            .await
            .context("Failed to store user profile")
    }

    /// Cached profile. A blob that no longer parses reads as absent.
    pub async fn get_user_profile(&self) -> Result<Option<Value>> {
        let raw = self
            .backend
            .get(USER_PROFILE_KEY)
            .await
            .context("Failed to read user profile")?;
        match raw {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(profile) => Ok(Some(profile)),
                Err(e) => {
                    warn!(error = %e, "Discarding unparsable cached user profile");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn set_session_data(&self, token: &str, profile: &Value) -> Result<()> {
        self.set_token(token).await?;
        self.set_user_profile(profile).await
    }

    /// Remove token, profile and the login flag. Onboarding is kept.
    pub async fn clear_session_data(&self) -> Result<()> {
        for key in [TOKEN_KEY, USER_PROFILE_KEY, LOGIN_COMPLETED_KEY] {
            self.backend
                .remove(key)
                .await
                .with_context(|| format!("Failed to clear {}", key))?;
        }
        Ok(())
    }

    /// Logout-time clear. Same as [`Self::clear_session_data`]; the
    /// onboarding flag survives.
    pub async fn clear_all_data(&self) -> Result<()> {
        self.clear_session_data().await
    }

    pub async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.get_token().await?.is_some())
    }

    pub async fn set_onboarding_completed(&self, completed: bool) -> Result<()> {
        self.set_flag(ONBOARDING_COMPLETED_KEY, completed).await
    }

    pub async fn has_completed_onboarding(&self) -> Result<bool> {
        self.get_flag(ONBOARDING_COMPLETED_KEY).await
    }

    pub async fn set_login_completed(&self, completed: bool) -> Result<()> {
        self.set_flag(LOGIN_COMPLETED_KEY, completed).await
    }

    pub async fn has_completed_login(&self) -> Result<bool> {
        self.get_flag(LOGIN_COMPLETED_KEY).await
    }

    async fn set_flag(&self, key: &str, value: bool) -> Result<()> {
        self.backend
            .set(key, if value { "true" } else { "false" })
            .await
            .with_context(|| format!("Failed to store {}", key))
    }

    async fn get_flag(&self, key: &str) -> Result<bool> {
        let raw = self
            .backend
            .get(key)
            .await
            .with_context(|| format!("Failed to read {}", key))?;
        Ok(raw.as_deref() == Some("true"))
    }
}
