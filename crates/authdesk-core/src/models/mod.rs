//! Wire models for the user-management API.
//!
//! This module contains the request and response bodies exchanged with
//! the remote API:
//!
//! - `UserRead`: the user profile returned by every user endpoint
//! - `UserCreate`, `UserUpdate`: registration and profile/admin edits
//! - `PasswordChange`, `PasswordRecoveryRequest`, `PasswordReset`: password flows
//! - `Token`, `Message`: login and recovery responses

pub mod token;
pub mod user;

pub use token::{Message, Token};
pub use user::{
    PasswordChange, PasswordRecoveryRequest, PasswordReset, UserCreate, UserRead, UserUpdate,
};
