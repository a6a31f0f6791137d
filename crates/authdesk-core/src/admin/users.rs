//! Admin console state: the user list, the user under edit and their errors.
//!
//! Every call goes through the session's `ApiClient`, so a 401 here ends the
//! session like anywhere else. Failures are recorded in the state and
//! published as notices.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info};

use crate::api::{ApiClient, ApiError};
use crate::auth::{SessionError, SessionStore};
use crate::models::{UserCreate, UserRead, UserUpdate};
use crate::notice::Notifier;

/// Page size for the user list.
/// 100 covers a small deployment on one screen.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct AdminUsersState {
    pub users: Vec<UserRead>,
    pub user_for_edit: Option<UserRead>,
    pub loading: bool,
    pub loading_single_user: bool,
    pub error: Option<SessionError>,
    pub single_user_error: Option<SessionError>,
    pub total_users: usize,
    pub current_page: u32,
    pub items_per_page: u32,
}

impl Default for AdminUsersState {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            user_for_edit: None,
            loading: false,
            loading_single_user: false,
            error: None,
            single_user_error: None,
            total_users: 0,
            current_page: 1,
            items_per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Clears a loading flag on every exit path
struct LoadingFlag<'a> {
    state: &'a RwLock<AdminUsersState>,
    single_user: bool,
}

impl<'a> LoadingFlag<'a> {
    fn raise(state: &'a RwLock<AdminUsersState>, single_user: bool) -> Self {
        let mut guard = state.write().unwrap_or_else(PoisonError::into_inner);
        if single_user {
            guard.loading_single_user = true;
        } else {
            guard.loading = true;
        }
        Self { state, single_user }
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if self.single_user {
            guard.loading_single_user = false;
        } else {
            guard.loading = false;
        }
    }
}

/// Cloneable handle; clones share state.
#[derive(Clone)]
pub struct AdminUsers {
    api: ApiClient,
    notifier: Notifier,
    state: Arc<RwLock<AdminUsersState>>,
}

impl AdminUsers {
    pub fn new(session: &SessionStore) -> Self {
        Self {
            api: session.api().clone(),
            notifier: session.notifier().clone(),
            state: Arc::new(RwLock::new(AdminUsersState::default())),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, AdminUsersState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AdminUsersState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> AdminUsersState {
        self.read().clone()
    }

    pub fn users(&self) -> Vec<UserRead> {
        self.read().users.clone()
    }

    pub fn user_for_edit(&self) -> Option<UserRead> {
        self.read().user_for_edit.clone()
    }

    pub fn error(&self) -> Option<SessionError> {
        self.read().error.clone()
    }

    pub fn single_user_error(&self) -> Option<SessionError> {
        self.read().single_user_error.clone()
    }

    pub fn is_loading(&self) -> bool {
        let state = self.read();
        state.loading || state.loading_single_user
    }

    /// Load one page of users. Failures empty the list and are recorded.
    pub async fn fetch_users(&self, skip: u32, limit: u32) {
        let _loading = LoadingFlag::raise(&self.state, false);
        self.write().error = None;

        match self.api.list_users(skip, limit).await {
            Ok(users) => {
                debug!(count = users.len(), skip, limit, "Fetched users");
                let mut state = self.write();
                state.total_users = users.len();
                state.items_per_page = limit;
                state.current_page = skip.checked_div(limit).unwrap_or(0) + 1;
                state.users = users;
            }
            Err(e) => {
                let err = self.record(&e, "Failed to load users.".to_string());
                error!(error = %e, kind = %err.kind, "Failed to fetch users");
                self.write().users.clear();
            }
        }
    }

    /// Load a user for editing. Clears any previous one first.
    pub async fn fetch_user_by_id(&self, user_id: i64) -> Result<UserRead, SessionError> {
        let _loading = LoadingFlag::raise(&self.state, true);
        {
            let mut state = self.write();
            state.single_user_error = None;
            state.user_for_edit = None;
        }

        match self.api.get_user(user_id).await {
            Ok(user) => {
                self.write().user_for_edit = Some(user.clone());
                Ok(user)
            }
            Err(e) => {
                error!(error = %e, user_id, "Failed to fetch user");
                let err = SessionError::from_api(&e, &format!("Failed to load user with ID {}.", user_id));
                self.write().single_user_error = Some(err.clone());
                self.notifier.error(err.message.clone());
                Err(err)
            }
        }
    }

    /// Delete a user and drop them from the list. Failures are recorded only.
    pub async fn delete_user(&self, user_id: i64) {
        let _loading = LoadingFlag::raise(&self.state, false);
        self.write().error = None;

        match self.api.delete_user(user_id).await {
            Ok(()) => {
                info!(user_id, "User deleted");
                self.write().users.retain(|u| u.id != user_id);
                self.notifier
                    .success(format!("User with ID {} deleted successfully.", user_id));
            }
            Err(e) => {
                error!(error = %e, user_id, "Failed to delete user");
                self.record(&e, format!("Failed to delete user with ID {}.", user_id));
            }
        }
    }

    /// Update a user; the response replaces the list entry and the user under edit.
    pub async fn update_user(&self, user_id: i64, update: &UserUpdate) -> Result<UserRead, SessionError> {
        let _loading = LoadingFlag::raise(&self.state, false);
        self.write().error = None;

        match self.api.update_user(user_id, update).await {
            Ok(user) => {
                info!(user_id, "User updated");
                {
                    let mut state = self.write();
                    if let Some(entry) = state.users.iter_mut().find(|u| u.id == user_id) {
                        *entry = user.clone();
                    }
                    if state.user_for_edit.as_ref().is_some_and(|u| u.id == user_id) {
                        state.user_for_edit = Some(user.clone());
                    }
                }
                self.notifier
                    .success(format!("User ID {} updated successfully.", user_id));
                Ok(user)
            }
            Err(e) => {
                error!(error = %e, user_id, "Failed to update user");
                Err(self.record(&e, format!("Failed to update user ID {}.", user_id)))
            }
        }
    }

    /// Create a user and put them at the top of the list.
    pub async fn create_user(&self, new_user: &UserCreate) -> Result<UserRead, SessionError> {
        let _loading = LoadingFlag::raise(&self.state, false);
        self.write().error = None;

        match self.api.create_user(new_user).await {
            Ok(user) => {
                info!(user_id = user.id, "User created");
                self.write().users.insert(0, user.clone());
                self.notifier
                    .success(format!("User {} created successfully.", user.email));
                Ok(user)
            }
            Err(e) => {
                error!(error = %e, "Failed to create user");
                Err(self.record(&e, "Failed to create user.".to_string()))
            }
        }
    }

    fn record(&self, e: &ApiError, fallback: String) -> SessionError {
        let err = SessionError::from_api(e, &fallback);
        self.write().error = Some(err.clone());
        self.notifier.error(err.message.clone());
        err
    }
}
