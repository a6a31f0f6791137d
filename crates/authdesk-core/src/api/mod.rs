//! REST API client for the authdesk user-management server.
//!
//! The API uses bearer token authentication obtained from `POST /auth/login`.
//! `RequestAuthenticator` attaches the token and reacts to 401 answers.

pub mod authenticator;
pub mod client;
pub mod error;

pub use authenticator::RequestAuthenticator;
pub use client::{ApiClient, DEFAULT_BASE_URL};
pub use error::{ApiError, ErrorDetail, FieldError};
