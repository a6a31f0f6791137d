//! Route gating against the current session.
//!
//! `Navigator` resolves paths against the route table, runs the
//! `NavigationGuard` before each transition and follows its redirects. It
//! listens for session events so logout and invalidation land on login.

pub mod guard;
pub mod navigator;
pub mod routes;

pub use guard::{decide, GuardDecision, NavigationGuard};
pub use navigator::{NavigationOutcome, Navigator};
pub use routes::{Location, Route, RouteMeta, RouteName, REDIRECT_PARAM, ROUTES};
