//! Authentication module for managing the client-side session lifecycle.
//!
//! This module provides:
//! - `CredentialStore`: persistent token, profile and completion flags
//! - `AuthInterceptor`: forced logout when any API call returns 401
//! - `RefreshManager`: scheduled and on-demand token renewal
//! - `SessionService`: login, startup restore and explicit logout
//!
//! Tokens are renewed every 20 days by default. Forced logout clears the
//! session but never the onboarding flag.

pub mod credentials;
mod guard;
pub mod interceptor;
pub mod redirect;
pub mod refresh;
pub mod service;
pub mod session;
pub mod storage;

pub use credentials::CredentialStore;
pub use interceptor::AuthInterceptor;
pub use redirect::LoginRedirect;
pub use refresh::{RefreshManager, RefreshSettings, RefreshState};
pub use service::SessionService;
pub use session::{AuthState, AuthStatus};
pub use storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore};
