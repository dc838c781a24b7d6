//! REST API client module for the worksync backend.
//!
//! This module provides the `ApiClient` for communicating with the
//! backend, the `SessionApi` seam used by the session lifecycle, and the
//! `ApiError` taxonomy shared by both.
//!
//! The API uses bearer token authentication obtained through the
//! `/auth/login` and `/auth/refresh-token` endpoints.

pub mod client;
pub mod error;
pub mod session;

pub use client::ApiClient;
pub use error::ApiError;
pub use session::{SessionApi, SessionGrant};
