//! Route table and location resolution.

use std::fmt;

use url::form_urlencoded;

/// Query parameter carrying the path to resume after login
pub const REDIRECT_PARAM: &str = "redirect";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteName {
    Home,
    About,
    Login,
    Register,
    ChangePassword,
    ForgotPassword,
    ResetPassword,
    Profile,
    AdminUsers,
    AdminEditUser,
    AdminCreateUser,
}

impl RouteName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteName::Home => "home",
            RouteName::About => "about",
            RouteName::Login => "login",
            RouteName::Register => "register",
            RouteName::ChangePassword => "change-password",
            RouteName::ForgotPassword => "forgot-password",
            RouteName::ResetPassword => "reset-password",
            RouteName::Profile => "profile",
            RouteName::AdminUsers => "admin-users",
            RouteName::AdminEditUser => "admin-edit-user",
            RouteName::AdminCreateUser => "admin-create-user",
        }
    }

    /// Routes reachable without first reconciling a restored credential
    pub fn is_credential_agnostic(&self) -> bool {
        matches!(
            self,
            RouteName::Login | RouteName::Register | RouteName::ForgotPassword | RouteName::ResetPassword
        )
    }

    pub fn route(&self) -> &'static Route {
        ROUTES
            .iter()
            .find(|r| r.name == *self)
            .unwrap_or(&ROUTES[0])
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access requirements attached to a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_admin: bool,
    pub guest_only: bool,
}

const AUTH: RouteMeta = RouteMeta {
    requires_auth: true,
    requires_admin: false,
    guest_only: false,
};

const ADMIN: RouteMeta = RouteMeta {
    requires_auth: true,
    requires_admin: true,
    guest_only: false,
};

const GUEST: RouteMeta = RouteMeta {
    requires_auth: false,
    requires_admin: false,
    guest_only: true,
};

#[derive(Debug)]
pub struct Route {
    pub name: RouteName,
    /// Pattern; `:name` segments match any single non-empty segment
    pub path: &'static str,
    pub meta: RouteMeta,
}

/// Every navigable screen. Home comes first.
pub static ROUTES: &[Route] = &[
    Route { name: RouteName::Home, path: "/", meta: AUTH },
    Route { name: RouteName::About, path: "/about", meta: AUTH },
    Route { name: RouteName::Login, path: "/login", meta: GUEST },
    Route { name: RouteName::Register, path: "/register", meta: GUEST },
    Route { name: RouteName::ChangePassword, path: "/change-password", meta: AUTH },
    Route { name: RouteName::ForgotPassword, path: "/forgot-password", meta: GUEST },
    Route { name: RouteName::ResetPassword, path: "/reset-password", meta: GUEST },
    Route { name: RouteName::Profile, path: "/profile", meta: AUTH },
    Route { name: RouteName::AdminUsers, path: "/admin/users", meta: ADMIN },
    Route { name: RouteName::AdminEditUser, path: "/admin/users/edit/:id", meta: ADMIN },
    Route { name: RouteName::AdminCreateUser, path: "/admin/users/create", meta: ADMIN },
];

impl Route {
    /// Match a normalized path, returning captured `:param` values
    fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let pattern: Vec<&str> = segments(self.path).collect();
        let actual: Vec<&str> = segments(path).collect();
        if pattern.len() != actual.len() {
            return None;
        }

        let mut params = Vec::new();
        for (expected, got) in pattern.iter().zip(actual.iter()) {
            match expected.strip_prefix(':') {
                Some(name) => params.push((name.to_string(), got.to_string())),
                None if expected == got => {}
                None => return None,
            }
        }
        Some(params)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// A resolved navigation target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    route: RouteName,
    path: String,
    full_path: String,
    params: Vec<(String, String)>,
    query: Vec<(String, String)>,
}

impl Location {
    /// Resolve `path[?query][#fragment]` against the route table.
    /// Trailing slashes are ignored; unknown paths yield `None`.
    pub fn resolve(target: &str) -> Option<Self> {
        let target = target.split('#').next().unwrap_or_default();
        let (raw_path, raw_query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        let path = normalize(raw_path);
        let (route, params) = ROUTES
            .iter()
            .find_map(|route| route.captures(&path).map(|params| (route.name, params)))?;

        let query = raw_query
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Some(Self::build(route, path, params, query))
    }

    /// Location of a route without parameters
    pub fn named(route: RouteName) -> Self {
        Self::build(route, route.route().path.to_string(), Vec::new(), Vec::new())
    }

    pub fn home() -> Self {
        Self::named(RouteName::Home)
    }

    /// Login, remembering `target` (a full path) to resume afterwards
    pub fn login_with_redirect(target: &str) -> Self {
        let query = vec![(REDIRECT_PARAM.to_string(), target.to_string())];
        Self::build(RouteName::Login, RouteName::Login.route().path.to_string(), Vec::new(), query)
    }

    fn build(
        route: RouteName,
        path: String,
        params: Vec<(String, String)>,
        query: Vec<(String, String)>,
    ) -> Self {
        let full_path = if query.is_empty() {
            path.clone()
        } else {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query.iter())
                .finish();
            format!("{}?{}", path, encoded)
        };
        Self {
            route,
            path,
            full_path,
            params,
            query,
        }
    }

    pub fn route(&self) -> RouteName {
        self.route
    }

    pub fn meta(&self) -> RouteMeta {
        self.route.route().meta
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path plus query string
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        lookup(&self.params, name)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        lookup(&self.query, name)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path)
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn normalize(path: &str) -> String {
    let joined = segments(path).collect::<Vec<_>>().join("/");
    format!("/{}", joined)
}
