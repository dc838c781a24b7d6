//! Client-side session lifecycle for the worksync productivity app.
//!
//! The backend owns all business logic; this crate keeps the bearer token
//! valid, persists the session between launches and ends it when the server
//! stops accepting it.

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError, SessionApi, SessionGrant};
pub use auth::{
    AuthInterceptor, AuthState, AuthStatus, CredentialStore, LoginRedirect, RefreshManager,
    RefreshSettings, RefreshState, SessionService,
};
pub use config::Config;
