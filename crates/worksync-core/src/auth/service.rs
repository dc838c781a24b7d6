use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use super::credentials::CredentialStore;
use super::session::AuthState;
use crate::api::SessionApi;

/// User-driven session lifecycle: login, startup restore, explicit logout.
pub struct SessionService {
    api: Arc<dyn SessionApi>,
    store: CredentialStore,
    state: AuthState,
}

impl SessionService {
    pub fn new(api: Arc<dyn SessionApi>, store: CredentialStore, state: AuthState) -> Self {
        Self { api, store, state }
    }

    /// Authenticate and persist the new session.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let grant = self.api.login(email, password).await?;
        if grant.token.is_empty() {
            anyhow::bail!("Login response did not include a token");
        }

        match grant.user {
            Some(ref user) => self.store.set_session_data(&grant.token, user).await?,
            None => self.store.set_token(&grant.token).await?,
        }
        self.store.set_login_completed(true).await?;

        self.state.set_logged_in(grant.token, grant.user);
        info!(email, "Logged in");
        Ok(())
    }

    /// Load the persisted session into the in-memory auth state.
    /// Returns whether a token was found.
    pub async fn restore(&self) -> Result<bool> {
        match self.store.get_token().await? {
            Some(token) => {
                let profile = self.store.get_user_profile().await?;
                self.state.set_logged_in(token, profile);
                Ok(true)
            }
            None => {
                self.state.set_logged_out();
                Ok(false)
            }
        }
    }

    /// Explicit user logout. The caller handles navigation.
    pub async fn logout(&self) -> Result<()> {
        self.store.clear_all_data().await?;
        self.state.set_logged_out();
        info!("Logged out");
        Ok(())
    }
}
