//! Client-side session and authentication core for the authdesk user-management API.
//!
//! - [`auth::SessionStore`]: owns the credential and identity, persists them,
//!   performs login, logout, registration and password operations
//! - [`api::ApiClient`] and [`api::RequestAuthenticator`]: typed endpoints with
//!   bearer attachment and 401 detection on every call
//! - [`navigation::Navigator`] and [`navigation::NavigationGuard`]: route gating
//!   against the current session
//! - [`admin::AdminUsers`]: admin user-management console state

pub mod admin;
pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod navigation;
pub mod notice;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, ApiError, RequestAuthenticator};
pub use auth::{Credential, ErrorKind, SessionError, SessionEvent, SessionStatus, SessionStore};
pub use config::Config;
