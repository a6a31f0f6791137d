//! Session store: the single owner of the credential and the identity.
//!
//! State lives in a shared `SessionCell` so the request authenticator can
//! read the token and clear it on a 401 without owning the store itself.
//! Every mutation writes through to durable storage before returning.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::api::{ApiClient, ApiError, RequestAuthenticator};
use crate::config::Config;
use crate::models::{PasswordChange, PasswordReset, UserCreate, UserRead, UserUpdate};
use crate::notice::Notifier;

use super::error::{ErrorKind, SessionError};
use super::storage::{DurableStorage, StorageKey};
use super::{Credential, SessionEvent};

/// Buffer size for session lifecycle events.
/// Events are rare (login, logout, invalidation), 16 leaves plenty of headroom.
const EVENT_BUFFER_SIZE: usize = 16;

const LOGIN_FAILED: &str = "Login failed. Check your credentials.";
const REGISTER_FAILED: &str = "Registration failed. Please try again.";
const IDENTITY_FAILED: &str = "Failed to load your profile.";
const CHANGE_PASSWORD_FAILED: &str = "Failed to change password. Check the data provided.";
const RECOVERY_FAILED: &str = "An error occurred while requesting password recovery.";
const RESET_FAILED: &str = "Failed to reset password. Try again or request a new link.";
const UPDATE_PROFILE_FAILED: &str = "Failed to update profile.";
const DELETE_ACCOUNT_FAILED: &str = "Failed to delete account. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No credential, no identity
    Anonymous,
    /// Credential held, identity not yet fetched (after restart or mid-login)
    CredentialOnly,
    /// Credential and identity both held
    Authenticated,
}

/// Point-in-time copy of the session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub credential: Option<Credential>,
    pub identity: Option<UserRead>,
    pub last_error: Option<SessionError>,
}

impl Session {
    pub fn status(&self) -> SessionStatus {
        match (&self.credential, &self.identity) {
            (None, _) => SessionStatus::Anonymous,
            (Some(_), None) => SessionStatus::CredentialOnly,
            (Some(_), Some(_)) => SessionStatus::Authenticated,
        }
    }

    /// Credential present; the identity may still be missing
    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub fn is_superuser(&self) -> bool {
        self.identity.as_ref().map(|u| u.is_superuser).unwrap_or(false)
    }
}

// ============================================================================
// Shared state
// ============================================================================

pub(crate) struct SessionCell {
    state: RwLock<Session>,
    busy: AtomicUsize,
    /// Login attempts in flight; a 401 during one is a login failure
    logging_in: AtomicUsize,
    storage: Arc<dyn DurableStorage>,
    events: broadcast::Sender<SessionEvent>,
}

/// Releases one counter slot when dropped, on every exit path.
pub(crate) struct CounterGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> CounterGuard<'a> {
    fn acquire(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SessionCell {
    /// Rebuild the session left behind by a previous process.
    /// Unreadable or corrupt entries degrade to absent.
    fn restore(storage: Arc<dyn DurableStorage>) -> Self {
        let token = match storage.read(StorageKey::Token) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read stored token, starting anonymous");
                None
            }
        };

        let identity = match token {
            Some(_) => Self::restore_identity(storage.as_ref()),
            None => {
                // A user record without a token would break the invariant
                if let Err(e) = storage.erase(StorageKey::User) {
                    warn!(error = %e, "Failed to erase orphaned user record");
                }
                None
            }
        };

        let session = Session {
            credential: token.map(Credential::new),
            identity,
            last_error: None,
        };
        debug!(status = ?session.status(), "Session restored");

        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            state: RwLock::new(session),
            busy: AtomicUsize::new(0),
            logging_in: AtomicUsize::new(0),
            storage,
            events,
        }
    }

    fn restore_identity(storage: &dyn DurableStorage) -> Option<UserRead> {
        let raw = match storage.read(StorageKey::User) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read stored user record");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Stored user record is corrupt, ignoring it");
                None
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn access_token(&self) -> Option<String> {
        self.read().credential.as_ref().map(|c| c.access_token().to_string())
    }

    fn snapshot(&self) -> Session {
        self.read().clone()
    }

    fn set_credential(&self, credential: Option<Credential>) {
        let mut state = self.write();
        match credential {
            Some(credential) => {
                self.persist(StorageKey::Token, credential.access_token());
                state.credential = Some(credential);
            }
            None => {
                state.credential = None;
                state.identity = None;
                self.erase(StorageKey::Token);
                self.erase(StorageKey::User);
            }
        }
    }

    fn set_identity(&self, identity: Option<UserRead>) {
        let mut state = self.write();
        match identity {
            Some(user) => {
                if state.credential.is_none() {
                    warn!(user_id = user.id, "Refusing to set identity without a credential");
                    return;
                }
                match serde_json::to_string(&user) {
                    Ok(json) => self.persist(StorageKey::User, &json),
                    Err(e) => warn!(error = %e, "Failed to serialize user record"),
                }
                state.identity = Some(user);
            }
            None => {
                state.identity = None;
                self.erase(StorageKey::User);
            }
        }
    }

    /// Reset to anonymous and erase both entries. Returns whether a
    /// credential was held.
    fn clear(&self) -> bool {
        let mut state = self.write();
        let had_credential = state.credential.is_some();
        state.credential = None;
        state.identity = None;
        self.erase(StorageKey::Token);
        self.erase(StorageKey::User);
        had_credential
    }

    /// Credential rejected by the server. Publishes `Invalidated` once per
    /// credential, whoever notices first. While a login is in flight the
    /// session is cleared silently and the login reports the failure.
    pub(crate) fn invalidate(&self) {
        if self.logging_in.load(Ordering::SeqCst) > 0 {
            debug!("Credential rejected during login");
            self.clear();
            return;
        }
        if self.clear() {
            warn!("Credential rejected by server, session cleared");
            self.emit(SessionEvent::Invalidated);
        }
    }

    fn logout(&self) {
        self.clear();
        debug!("Logged out");
        self.emit(SessionEvent::LoggedOut);
    }

    fn set_error(&self, error: Option<SessionError>) {
        self.write().last_error = error;
    }

    fn busy(&self) -> CounterGuard<'_> {
        CounterGuard::acquire(&self.busy)
    }

    fn login_attempt(&self) -> CounterGuard<'_> {
        CounterGuard::acquire(&self.logging_in)
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst) > 0
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    fn persist(&self, key: StorageKey, value: &str) {
        if let Err(e) = self.storage.write(key, value) {
            warn!(error = %e, %key, "Failed to persist session entry");
        }
    }

    fn erase(&self, key: StorageKey) {
        if let Err(e) = self.storage.erase(key) {
            warn!(error = %e, %key, "Failed to erase session entry");
        }
    }
}

// ============================================================================
// Session store
// ============================================================================

/// Owner of the session. Clone is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct SessionStore {
    cell: Arc<SessionCell>,
    api: ApiClient,
    notifier: Notifier,
}

impl SessionStore {
    /// Restore the session from `storage` and build the API client for `base_url`.
    pub fn new(base_url: Url, storage: Arc<dyn DurableStorage>) -> Result<Self> {
        let cell = Arc::new(SessionCell::restore(storage));
        let api = ApiClient::new(base_url, RequestAuthenticator::new(cell.clone()))?;
        Ok(Self {
            cell,
            api,
            notifier: Notifier::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.api_base_url()?, config.open_storage()?)
    }

    /// API client sharing this session's credential and 401 handling
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.cell.events.subscribe()
    }

    // ===== Queries =====

    pub fn snapshot(&self) -> Session {
        self.cell.snapshot()
    }

    pub fn status(&self) -> SessionStatus {
        self.cell.read().status()
    }

    pub fn is_authenticated(&self) -> bool {
        self.cell.read().is_authenticated()
    }

    pub fn is_superuser(&self) -> bool {
        self.cell.read().is_superuser()
    }

    pub fn current_user(&self) -> Option<UserRead> {
        self.cell.read().identity.clone()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.cell.read().credential.clone()
    }

    pub fn last_error(&self) -> Option<SessionError> {
        self.cell.read().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.cell.set_error(None);
    }

    /// An operation is in flight; callers should hold off duplicate submissions
    pub fn is_busy(&self) -> bool {
        self.cell.is_busy()
    }

    // ===== Mutations =====

    /// Replace the credential. `None` also drops the identity.
    pub fn set_credential(&self, credential: Option<Credential>) {
        self.cell.set_credential(credential);
    }

    /// Replace the identity. Ignored when no credential is held.
    pub fn set_identity(&self, identity: Option<UserRead>) {
        self.cell.set_identity(identity);
    }

    /// Drop credential and identity and erase both stored entries.
    pub fn logout(&self) {
        self.cell.logout();
    }

    // ===== Remote operations =====

    /// Exchange username and password for a credential, then load the identity.
    ///
    /// Any failure leaves the session anonymous without publishing `Invalidated`.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserRead, SessionError> {
        let _busy = self.cell.busy();
        let _attempt = self.cell.login_attempt();
        self.cell.set_error(None);

        let result = match self.api.login(username, password).await {
            Ok(token) => {
                // Persisted before the identity fetch starts
                self.cell.set_credential(Some(Credential::from(token)));
                match self.load_identity().await {
                    Ok(Some(user)) => Ok(user),
                    Ok(None) => Err(SessionError::new(ErrorKind::Other, LOGIN_FAILED)),
                    Err(e) => Err(SessionError::from_api(&e, LOGIN_FAILED).into_login_failure()),
                }
            }
            Err(e) => Err(SessionError::from_api(&e, LOGIN_FAILED).into_login_failure()),
        };

        match result {
            Ok(user) => {
                info!(user_id = user.id, "Login successful");
                self.cell.emit(SessionEvent::LoggedIn(user.clone()));
                Ok(user)
            }
            Err(err) => {
                error!(kind = %err.kind, error = %err, "Login failed");
                self.cell.set_credential(None);
                Err(self.record(err))
            }
        }
    }

    /// Fetch `/auth/me` for the held credential.
    ///
    /// Without a credential this only clears the identity and returns `Ok(None)`.
    /// A 401 drops the credential too; any other failure keeps it so the
    /// fetch can be retried without logging in again.
    pub async fn fetch_current_identity(&self) -> Result<Option<UserRead>, SessionError> {
        let _busy = self.cell.busy();
        self.cell.set_error(None);
        match self.load_identity().await {
            Ok(Some(user)) => {
                self.cell.emit(SessionEvent::IdentityLoaded(user.clone()));
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(self.record(SessionError::from_api(&e, IDENTITY_FAILED))),
        }
    }

    /// Reconcile a restored credential with its identity. No-op when anonymous.
    pub async fn try_auto_login(&self) -> Result<Option<UserRead>, SessionError> {
        if !self.is_authenticated() {
            return Ok(None);
        }
        debug!("Credential without identity, fetching current user");
        self.fetch_current_identity().await
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, new_user: &UserCreate) -> Result<UserRead, SessionError> {
        let _busy = self.cell.busy();
        self.cell.set_error(None);
        match self.api.register(new_user).await {
            Ok(user) => {
                info!(user_id = user.id, "Registration successful");
                self.notifier.success("Registration successful! Please log in.");
                Ok(user)
            }
            Err(e) => Err(self.record_failure("register", &e, REGISTER_FAILED)),
        }
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Result<(), SessionError> {
        let _busy = self.cell.busy();
        self.cell.set_error(None);
        match self.api.change_password(change).await {
            Ok(()) => {
                info!("Password changed");
                self.notifier.success("Password changed successfully.");
                Ok(())
            }
            Err(e) => Err(self.record_failure("change_password", &e, CHANGE_PASSWORD_FAILED)),
        }
    }

    /// Ask the server to email a recovery token. Returns the server's message.
    pub async fn request_password_recovery(&self, email: &str) -> Result<String, SessionError> {
        let _busy = self.cell.busy();
        self.cell.set_error(None);
        match self.api.request_password_recovery(email).await {
            Ok(response) => Ok(response.message),
            Err(e) => Err(self.record_failure("request_password_recovery", &e, RECOVERY_FAILED)),
        }
    }

    pub async fn reset_password(&self, reset: &PasswordReset) -> Result<(), SessionError> {
        let _busy = self.cell.busy();
        self.cell.set_error(None);
        match self.api.reset_password(reset).await {
            Ok(()) => {
                info!("Password reset");
                self.notifier
                    .success("Password reset successfully! Please log in with your new password.");
                Ok(())
            }
            Err(e) => Err(self.record_failure("reset_password", &e, RESET_FAILED)),
        }
    }

    /// Update the current user's profile; the response replaces the identity.
    pub async fn update_profile(&self, update: &UserUpdate) -> Result<UserRead, SessionError> {
        let _busy = self.cell.busy();
        self.cell.set_error(None);
        match self.api.update_current_user(update).await {
            Ok(user) => {
                self.cell.set_identity(Some(user.clone()));
                self.cell.emit(SessionEvent::IdentityLoaded(user.clone()));
                self.notifier.success("Profile updated.");
                Ok(user)
            }
            Err(e) => Err(self.record_failure("update_profile", &e, UPDATE_PROFILE_FAILED)),
        }
    }

    /// Delete the current account and log out.
    pub async fn delete_account(&self) -> Result<(), SessionError> {
        let _busy = self.cell.busy();
        self.cell.set_error(None);
        match self.api.delete_current_user().await {
            Ok(()) => {
                info!("Account deleted");
                self.cell.logout();
                self.notifier.success("Your account was deleted successfully.");
                Ok(())
            }
            Err(e) => Err(self.record_failure("delete_account", &e, DELETE_ACCOUNT_FAILED)),
        }
    }

    // ===== Helpers =====

    async fn load_identity(&self) -> Result<Option<UserRead>, ApiError> {
        if !self.is_authenticated() {
            self.cell.set_identity(None);
            return Ok(None);
        }
        match self.api.current_user().await {
            Ok(user) => {
                self.cell.set_identity(Some(user.clone()));
                Ok(Some(user))
            }
            Err(e) if e.is_unauthorized() => {
                self.cell.invalidate();
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch current user, keeping credential");
                self.cell.set_identity(None);
                Err(e)
            }
        }
    }

    fn record_failure(&self, operation: &str, err: &ApiError, fallback: &str) -> SessionError {
        error!(operation, error = %err, "Session operation failed");
        self.record(SessionError::from_api(err, fallback))
    }

    fn record(&self, err: SessionError) -> SessionError {
        self.cell.set_error(Some(err.clone()));
        self.notifier.error(err.message.clone());
        err
    }
}
