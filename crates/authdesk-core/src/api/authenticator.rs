use std::sync::Arc;

use reqwest::{RequestBuilder, StatusCode};
use tracing::debug;

use crate::auth::SessionCell;

/// Path suffix of the credential exchange endpoint. A 401 there means a bad
/// password, not a rejected session.
const LOGIN_PATH_SUFFIX: &str = "/auth/login";

/// Attaches the held credential to outgoing requests and clears the session
/// when the server answers 401.
#[derive(Clone)]
pub struct RequestAuthenticator {
    session: Arc<SessionCell>,
}

impl RequestAuthenticator {
    pub(crate) fn new(session: Arc<SessionCell>) -> Self {
        Self { session }
    }

    /// Add `Authorization: Bearer <token>` when a credential is held.
    /// The token is read at send time, so a request built before logout goes
    /// out without it.
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.access_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Look at a response status; invalidate the session on a 401 from any
    /// endpoint other than login.
    pub fn inspect(&self, path: &str, status: StatusCode) {
        if status != StatusCode::UNAUTHORIZED {
            return;
        }
        if path.ends_with(LOGIN_PATH_SUFFIX) {
            debug!(path, "401 from login endpoint, session left alone");
            return;
        }
        debug!(path, "401 response, invalidating session");
        self.session.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reqwest::header::AUTHORIZATION;

    use crate::auth::{MemoryStorage, SessionEvent, SessionStatus, SessionStore, StorageKey};
    use crate::test_support::{offline_url, user_json, TEST_TOKEN};

    use super::*;

    fn store_with(entries: &[(StorageKey, &str)]) -> (SessionStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::with_entries(entries.iter().copied()));
        let store = SessionStore::new(offline_url(), storage.clone()).unwrap();
        (store, storage)
    }

    fn authorization_of(auth: &RequestAuthenticator) -> Option<String> {
        let request = auth
            .authorize(reqwest::Client::new().get("http://localhost/api/v1/users/"))
            .build()
            .unwrap();
        request
            .headers()
            .get(AUTHORIZATION)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[test]
    fn test_no_header_without_credential() {
        let (store, _) = store_with(&[]);
        assert_eq!(authorization_of(store.api().authenticator()), None);
    }

    #[test]
    fn test_bearer_header_with_credential() {
        let (store, _) = store_with(&[(StorageKey::Token, TEST_TOKEN)]);
        assert_eq!(
            authorization_of(store.api().authenticator()),
            Some(format!("Bearer {}", TEST_TOKEN))
        );

        // Follows the session, not the moment the client was built
        store.logout();
        assert_eq!(authorization_of(store.api().authenticator()), None);
    }

    #[test]
    fn test_401_on_resource_logs_out() {
        let user = user_json(5, true).to_string();
        let (store, storage) = store_with(&[(StorageKey::Token, TEST_TOKEN), (StorageKey::User, user.as_str())]);
        let mut events = store.subscribe();

        store.api().authenticator().inspect("/api/v1/users/5", StatusCode::UNAUTHORIZED);

        assert_eq!(store.status(), SessionStatus::Anonymous);
        assert!(storage.is_empty());
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Invalidated);
    }

    #[test]
    fn test_401_on_login_is_ignored() {
        let (store, storage) = store_with(&[(StorageKey::Token, TEST_TOKEN)]);
        let mut events = store.subscribe();

        store.api().authenticator().inspect("/api/v1/auth/login", StatusCode::UNAUTHORIZED);

        assert_eq!(store.status(), SessionStatus::CredentialOnly);
        assert_eq!(storage.get(StorageKey::Token).as_deref(), Some(TEST_TOKEN));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_other_statuses_are_ignored() {
        let (store, _) = store_with(&[(StorageKey::Token, TEST_TOKEN)]);
        let auth = store.api().authenticator();
        for status in [StatusCode::OK, StatusCode::FORBIDDEN, StatusCode::INTERNAL_SERVER_ERROR] {
            auth.inspect("/api/v1/users/5", status);
        }
        assert!(store.is_authenticated());
    }

    #[test]
    fn test_repeated_401_invalidates_once() {
        let (store, _) = store_with(&[(StorageKey::Token, TEST_TOKEN)]);
        let mut events = store.subscribe();
        let auth = store.api().authenticator();

        auth.inspect("/api/v1/users/", StatusCode::UNAUTHORIZED);
        auth.inspect("/api/v1/auth/me", StatusCode::UNAUTHORIZED);

        assert_eq!(events.try_recv().unwrap(), SessionEvent::Invalidated);
        assert!(events.try_recv().is_err());
    }
}
