//! Global hook on application API results.
//!
//! A 401 from any call routed through [`AuthInterceptor::observe`] forces a
//! logout. Concurrent 401s collapse into a single logout sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::credentials::CredentialStore;
use super::guard::FlagGuard;
use super::redirect::LoginRedirect;
use super::session::{force_logout, AuthState};
use crate::api::ApiError;

pub struct AuthInterceptor {
    store: CredentialStore,
    state: AuthState,
    redirect: Arc<dyn LoginRedirect>,
    logging_out: AtomicBool,
}

impl AuthInterceptor {
    pub fn new(store: CredentialStore, state: AuthState, redirect: Arc<dyn LoginRedirect>) -> Self {
        Self {
            store,
            state,
            redirect,
            logging_out: AtomicBool::new(false),
        }
    }

    /// Inspect a call result and hand it back unchanged.
    pub async fn observe<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        let unauthorized = matches!(&result, Err(e) if e.is_auth_failure());
        if unauthorized {
            self.handle_unauthorized().await;
        }
        result
    }

    pub fn is_logging_out(&self) -> bool {
        self.logging_out.load(Ordering::Acquire)
    }

    async fn handle_unauthorized(&self) {
        let Some(_guard) = FlagGuard::try_acquire(&self.logging_out) else {
            debug!("Forced logout already in progress, ignoring 401");
            return;
        };
        // Failure is already logged by force_logout; the guard resets either way.
        let _ = force_logout(
            &self.store,
            &self.state,
            self.redirect.as_ref(),
            "request rejected with 401",
        )
        .await;
    }
}
