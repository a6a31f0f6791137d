use crate::models::UserRead;

/// Session lifecycle notifications.
///
/// Published by the session store so the navigation layer can react to
/// logout and invalidation without the store knowing about routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Login completed: credential and identity are both held
    LoggedIn(UserRead),
    /// Identity (re)fetched for an already held credential
    IdentityLoaded(UserRead),
    /// Explicit logout or account deletion
    LoggedOut,
    /// The server rejected the credential with a 401
    Invalidated,
}
