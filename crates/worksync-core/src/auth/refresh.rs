//! Session token refresh.
//!
//! `RefreshManager` keeps the stored token valid in two ways:
//! - a recurring timer that renews the token well before it expires
//! - an on-demand validity probe for application startup
//!
//! A failed renewal always ends the session (clear credentials, publish
//! logged-out, redirect to login). A failed probe only does so when the
//! server explicitly rejected the token.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::credentials::CredentialStore;
use super::guard::FlagGuard;
use super::redirect::LoginRedirect;
use super::session::{force_logout, AuthState};
use crate::api::{ApiError, SessionApi, SessionGrant};
use crate::config::{Config, DEFAULT_REFRESH_INTERVAL_DAYS, DEFAULT_REQUEST_TIMEOUT_SECS};

/// Timer and timeout settings for a [`RefreshManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSettings {
    pub interval: Duration,
    pub request_timeout: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_DAYS * 24 * 60 * 60),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl From<&Config> for RefreshSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.refresh_interval(),
            request_timeout: config.request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// No timer armed
    Idle,
    /// Timer armed, no renewal in flight
    Scheduled,
    /// A renewal call is in flight
    Refreshing,
}

pub struct RefreshManager {
    api: Arc<dyn SessionApi>,
    store: CredentialStore,
    state: AuthState,
    redirect: Arc<dyn LoginRedirect>,
    settings: RefreshSettings,
    refreshing: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
    last_refreshed_at: Mutex<Option<DateTime<Utc>>>,
}

impl RefreshManager {
    pub fn new(
        api: Arc<dyn SessionApi>,
        store: CredentialStore,
        state: AuthState,
        redirect: Arc<dyn LoginRedirect>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            api,
            store,
            state,
            redirect,
            settings,
            refreshing: AtomicBool::new(false),
            timer: Mutex::new(None),
            last_refreshed_at: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> RefreshSettings {
        self.settings
    }

    pub fn state(&self) -> RefreshState {
        if self.refreshing.load(Ordering::Acquire) {
            return RefreshState::Refreshing;
        }
        let armed = self
            .lock_timer()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        if armed {
            RefreshState::Scheduled
        } else {
            RefreshState::Idle
        }
    }

    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        *lock(&self.last_refreshed_at)
    }

    /// Arm the recurring renewal timer, replacing any existing one.
    ///
    /// Must be called from within a tokio runtime. The timer holds only a
    /// weak reference, so dropping the last `Arc` stops it.
    pub fn start_auto_refresh(self: &Arc<Self>) {
        let mut timer = self.lock_timer();
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        let period = self.settings.interval;
        let weak = Arc::downgrade(self);
        *timer = Some(tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                debug!("Scheduled token refresh firing");
                // Own task so stopping the timer never cancels a renewal mid-flight
                tokio::spawn(async move {
                    manager.refresh_token().await;
                });
            }
        }));
        info!(interval_secs = period.as_secs(), "Auto refresh started");
    }

    /// Cancel the renewal timer. No-op when idle.
    pub fn stop_auto_refresh(&self) {
        if let Some(handle) = self.lock_timer().take() {
            handle.abort();
            info!("Auto refresh stopped");
        }
    }

    /// Renew the stored token. Returns `true` only if a new token was stored.
    ///
    /// Returns `false` without any side effect when another renewal is in
    /// flight or no token is stored. Any renewal failure forces logout.
    pub async fn refresh_token(&self) -> bool {
        let Some(_guard) = FlagGuard::try_acquire(&self.refreshing) else {
            debug!("Token refresh already in progress");
            return false;
        };

        let token = match self.store.get_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No stored token to refresh");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                return false;
            }
        };

        let renewed = match self.bounded(self.api.renew_token(&token)).await {
            Ok(grant) => self.store_grant(grant).await,
            Err(e) => Err(e.into()),
        };

        match renewed {
            Ok(()) => {
                info!("Session token refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                let _ = force_logout(
                    &self.store,
                    &self.state,
                    self.redirect.as_ref(),
                    "token refresh failed",
                )
                .await;
                false
            }
        }
    }

    /// Probe the stored token and renew it if the server rejects it.
    ///
    /// Network and server errors leave the session untouched and return
    /// `false`.
    pub async fn check_and_refresh_if_needed(&self) -> bool {
        let token = match self.store.get_token().await {
            Ok(Some(token)) => token,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                return false;
            }
        };

        match self.bounded(self.api.current_user(&token)).await {
            Ok(_) => {
                debug!("Session token still valid");
                true
            }
            Err(e) if e.is_auth_failure() => {
                info!("Session token rejected, attempting refresh");
                self.refresh_token().await
            }
            Err(e) => {
                warn!(error = %e, "Could not validate session token, leaving session intact");
                false
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, ApiError> {
        tokio::time::timeout(self.settings.request_timeout, call)
            .await
            .unwrap_or_else(|_| Err(ApiError::Timeout))
    }

    /// Replace the stored token, and the profile when the server sent one.
    async fn store_grant(&self, grant: SessionGrant) -> anyhow::Result<()> {
        if grant.token.is_empty() {
            anyhow::bail!(ApiError::InvalidResponse(
                "Renewal response did not include a token".to_string()
            ));
        }
        self.store.set_token(&grant.token).await?;
        let profile = match grant.user {
            Some(user) => {
                self.store.set_user_profile(&user).await?;
                Some(user)
            }
            None => self.store.get_user_profile().await?,
        };
        self.state.set_logged_in(grant.token, profile);
        *lock(&self.last_refreshed_at) = Some(Utc::now());
        Ok(())
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        lock(&self.timer)
    }
}

impl Drop for RefreshManager {
    fn drop(&mut self) {
        self.stop_auto_refresh();
    }
}

/// Guarded values here stay consistent even if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
