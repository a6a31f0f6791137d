use tracing::{debug, warn};

use crate::auth::{SessionStatus, SessionStore};

use super::routes::Location;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect(Location),
}

/// Decides, before each transition, whether the session may enter a route.
#[derive(Clone)]
pub struct NavigationGuard {
    session: SessionStore,
}

impl NavigationGuard {
    pub fn new(session: SessionStore) -> Self {
        Self { session }
    }

    /// Reconcile a restored credential if needed, then decide.
    ///
    /// A failed auto-login is not fatal here: a 401 has already cleared the
    /// session and any other failure keeps the credential.
    pub async fn check(&self, to: &Location) -> GuardDecision {
        if self.session.status() == SessionStatus::CredentialOnly && !to.route().is_credential_agnostic() {
            if let Err(e) = self.session.try_auto_login().await {
                debug!(error = %e, kind = %e.kind, "Auto-login before navigation failed");
            }
        }

        self.check_settled(to)
    }

    /// Decide from the session as it stands, without contacting the server.
    pub fn check_settled(&self, to: &Location) -> GuardDecision {
        decide(to, self.session.is_authenticated(), self.session.is_superuser())
    }
}

/// Access rules in priority order: sign-in required, then admin, then guest-only.
pub fn decide(to: &Location, authenticated: bool, superuser: bool) -> GuardDecision {
    let meta = to.meta();

    if meta.requires_auth && !authenticated {
        return GuardDecision::Redirect(Location::login_with_redirect(to.full_path()));
    }

    if meta.requires_admin && !(authenticated && superuser) {
        warn!(path = to.full_path(), "Admin route denied, user is not a superuser");
        return GuardDecision::Redirect(Location::home());
    }

    if meta.guest_only && authenticated {
        return GuardDecision::Redirect(Location::home());
    }

    GuardDecision::Proceed
}
