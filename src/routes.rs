//! Screen table: paths and static access requirements.
//!
//! DESIGN
//! ======
//! Screens are a closed enum so the guard and the landing table match
//! exhaustively. Each screen declares its `RouteAccess` once, here.

#[cfg(test)]
#[path = "routes_test.rs"]
mod routes_test;

use crate::types::Role;

const COLLECTOR_ONLY: &[Role] = &[Role::Collector];
const MEMBER_ONLY: &[Role] = &[Role::Member];
const ANY_PARTICIPANT: &[Role] = &[Role::Collector, Role::Member];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("no screen at path {0}")]
    NotFound(String),
}

/// Static metadata attached to each navigable screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteAccess {
    pub requires_auth: bool,
    /// `None` admits any authenticated role.
    pub roles: Option<&'static [Role]>,
}

impl RouteAccess {
    pub const PUBLIC: Self = Self { requires_auth: false, roles: None };
    pub const AUTHENTICATED: Self = Self { requires_auth: true, roles: None };

    #[must_use]
    pub const fn restricted(roles: &'static [Role]) -> Self {
        Self { requires_auth: true, roles: Some(roles) }
    }

    #[must_use]
    pub fn admits(&self, role: Role) -> bool {
        self.roles.is_none_or(|roles| roles.contains(&role))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Screen {
    Onboarding,
    Home,
    Login,
    Signup,
    About,
    CollectorDashboard,
    MemberDashboard,
    MyIqubs,
    CreateIqub,
    IqubDetail { id: String },
    JoinedIqubs,
}

impl Screen {
    #[must_use]
    pub fn access(&self) -> RouteAccess {
        match self {
            Self::Onboarding | Self::Home | Self::Login | Self::Signup | Self::About => RouteAccess::PUBLIC,
            Self::CollectorDashboard | Self::MyIqubs | Self::CreateIqub => RouteAccess::restricted(COLLECTOR_ONLY),
            Self::MemberDashboard | Self::JoinedIqubs => RouteAccess::restricted(MEMBER_ONLY),
            Self::IqubDetail { .. } => RouteAccess::restricted(ANY_PARTICIPANT),
        }
    }

    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Onboarding => "/onboarding".to_owned(),
            Self::Home => "/home".to_owned(),
            Self::Login => "/login".to_owned(),
            Self::Signup => "/signup".to_owned(),
            Self::About => "/about".to_owned(),
            Self::CollectorDashboard => "/collector-dashboard".to_owned(),
            Self::MemberDashboard => "/member-dashboard".to_owned(),
            Self::MyIqubs => "/my-iqubs".to_owned(),
            Self::CreateIqub => "/create-iqub".to_owned(),
            Self::IqubDetail { id } => format!("/iqub/{id}"),
            Self::JoinedIqubs => "/joined-iqubs".to_owned(),
        }
    }

    /// Resolve a path (no query string) to a screen. `/` lands on onboarding.
    ///
    /// # Errors
    ///
    /// Returns `RouteError::NotFound` for any path outside the table.
    pub fn from_path(path: &str) -> Result<Self, RouteError> {
        let trimmed = path.trim_end_matches('/');
        let screen = match trimmed {
            "" | "/onboarding" => Self::Onboarding,
            "/home" => Self::Home,
            "/login" => Self::Login,
            "/signup" => Self::Signup,
            "/about" => Self::About,
            "/collector-dashboard" => Self::CollectorDashboard,
            "/member-dashboard" => Self::MemberDashboard,
            "/my-iqubs" => Self::MyIqubs,
            "/create-iqub" => Self::CreateIqub,
            "/joined-iqubs" => Self::JoinedIqubs,
            other => match other.strip_prefix("/iqub/") {
                Some(id) if !id.is_empty() && !id.contains('/') => Self::IqubDetail { id: id.to_owned() },
                _ => return Err(RouteError::NotFound(path.to_owned())),
            },
        };
        Ok(screen)
    }

    /// Default screen for an authenticated user of `role`.
    #[must_use]
    pub fn landing_for(role: Role) -> Self {
        match role {
            Role::Collector => Self::CollectorDashboard,
            Role::Member => Self::MemberDashboard,
            Role::Unrecognized => Self::About,
        }
    }
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

/// One navigation attempt: where to go, plus an optional `?role=` selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub target: Screen,
    pub role_selector: Option<Role>,
}

impl NavigationRequest {
    #[must_use]
    pub fn to(target: Screen) -> Self {
        Self { target, role_selector: None }
    }

    /// Parse `path[?query]`. Only the `role` query key is read.
    ///
    /// # Errors
    ///
    /// Returns `RouteError::NotFound` if the path is not in the table.
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let (path, query) = raw.split_once('?').unwrap_or((raw, ""));
        let target = Screen::from_path(path)?;
        let role_selector = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "role")
            .and_then(|(_, value)| Role::from_selector(value));
        Ok(Self { target, role_selector })
    }
}
