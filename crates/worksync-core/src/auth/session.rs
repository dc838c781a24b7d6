use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use super::credentials::CredentialStore;
use super::redirect::LoginRedirect;

/// In-memory authentication status of the running application.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStatus {
    LoggedOut,
    LoggedIn {
        token: String,
        profile: Option<Value>,
    },
}

impl AuthStatus {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, AuthStatus::LoggedIn { .. })
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            AuthStatus::LoggedIn { token, .. } => Some(token.as_str()),
            AuthStatus::LoggedOut => None,
        }
    }
}

/// Shared, observable auth status.
/// Clone is cheap - all clones publish to and read from the same channel.
#[derive(Clone)]
pub struct AuthState {
    tx: watch::Sender<AuthStatus>,
}

impl AuthState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthStatus::LoggedOut);
        Self { tx }
    }

    pub fn current(&self) -> AuthStatus {
        self.tx.borrow().clone()
    }

    pub fn current_token(&self) -> Option<String> {
        self.tx.borrow().token().map(str::to_string)
    }

    pub fn is_logged_in(&self) -> bool {
        self.tx.borrow().is_logged_in()
    }

    /// Receiver for route guards and other observers of logout.
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.tx.subscribe()
    }

    pub fn set_logged_in(&self, token: String, profile: Option<Value>) {
        self.tx.send_replace(AuthStatus::LoggedIn { token, profile });
    }

    pub fn set_logged_out(&self) {
        self.tx.send_replace(AuthStatus::LoggedOut);
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

/// Clear credentials, publish logged-out and send the user to login.
///
/// The redirect is issued even when clearing storage fails; the error is
/// returned so the caller can log it.
pub(crate) async fn force_logout(
    store: &CredentialStore,
    state: &AuthState,
    redirect: &dyn LoginRedirect,
    reason: &str,
) -> anyhow::Result<()> {
    info!(reason, "Forcing logout");
    let cleared = store.clear_all_data().await;
    if let Err(ref e) = cleared {
        warn!(error = %e, "Failed to clear credentials during forced logout");
    }
    state.set_logged_out();
    redirect.redirect_to_login();
    cleared
}
