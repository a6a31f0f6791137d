use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::auth::{SessionEvent, SessionStore};

use super::guard::{GuardDecision, NavigationGuard};
use super::routes::{Location, RouteName, REDIRECT_PARAM};

/// Maximum guard redirects followed for one navigation.
/// The route table needs at most two (protected -> login -> home).
const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Reached the requested location
    Arrived(Location),
    /// The guard sent us elsewhere
    Redirected { requested: String, location: Location },
    /// No route matches the path; the current location is unchanged
    NotFound(String),
    /// Redirects did not settle
    Aborted(String),
}

impl NavigationOutcome {
    /// Where navigation ended, if it ended anywhere
    pub fn location(&self) -> Option<&Location> {
        match self {
            NavigationOutcome::Arrived(location) | NavigationOutcome::Redirected { location, .. } => {
                Some(location)
            }
            NavigationOutcome::NotFound(_) | NavigationOutcome::Aborted(_) => None,
        }
    }
}

/// Tracks the current location and runs the guard on every transition.
pub struct Navigator {
    guard: NavigationGuard,
    events: broadcast::Receiver<SessionEvent>,
    current: Option<Location>,
}

impl Navigator {
    pub fn new(session: SessionStore) -> Self {
        Self {
            events: session.subscribe(),
            guard: NavigationGuard::new(session),
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Location> {
        self.current.as_ref()
    }

    pub async fn navigate(&mut self, target: &str) -> NavigationOutcome {
        let Some(mut location) = Location::resolve(target) else {
            debug!(path = target, "No route matches");
            return NavigationOutcome::NotFound(target.to_string());
        };
        let requested = location.full_path().to_string();
        let mut redirected = false;

        for _ in 0..=MAX_REDIRECTS {
            // Reconcile once; redirect hops reuse the outcome
            let decision = if redirected {
                self.guard.check_settled(&location)
            } else {
                self.guard.check(&location).await
            };
            match decision {
                GuardDecision::Proceed => {
                    debug!(path = location.full_path(), route = %location.route(), "Navigated");
                    self.current = Some(location.clone());
                    return if redirected {
                        NavigationOutcome::Redirected { requested, location }
                    } else {
                        NavigationOutcome::Arrived(location)
                    };
                }
                GuardDecision::Redirect(next) => {
                    debug!(from = location.full_path(), to = next.full_path(), "Navigation redirected");
                    location = next;
                    redirected = true;
                }
            }
        }

        warn!(path = %requested, "Too many redirects, navigation aborted");
        NavigationOutcome::Aborted(requested)
    }

    /// After a successful login, go to the path preserved in `redirect`, or home.
    /// Only same-site paths are honored.
    pub async fn resume_after_login(&mut self) -> NavigationOutcome {
        let target = self
            .current
            .as_ref()
            .and_then(|location| location.query(REDIRECT_PARAM))
            .filter(|target| target.starts_with('/') && !target.starts_with("//"))
            .unwrap_or("/")
            .to_string();
        self.navigate(&target).await
    }

    /// React to a session event. Logout goes to plain login; invalidation
    /// goes to login remembering the protected page the user was on, and
    /// leaves a login page alone so its `redirect` survives.
    pub async fn handle_event(&mut self, event: &SessionEvent) -> Option<NavigationOutcome> {
        let target = match event {
            SessionEvent::LoggedOut => Location::named(RouteName::Login),
            SessionEvent::Invalidated => match self.current.as_ref() {
                Some(current) if current.route() == RouteName::Login => return None,
                Some(current) if current.meta().requires_auth => {
                    Location::login_with_redirect(current.full_path())
                }
                _ => Location::named(RouteName::Login),
            },
            SessionEvent::LoggedIn(_) | SessionEvent::IdentityLoaded(_) => return None,
        };
        Some(self.navigate(target.full_path()).await)
    }

    /// Drain pending session events and apply them in order.
    pub async fn process_session_events(&mut self) -> Vec<NavigationOutcome> {
        let mut outcomes = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if let Some(outcome) = self.handle_event(&event).await {
                        outcomes.push(outcome);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session events lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        outcomes
    }
}
