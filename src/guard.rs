//! Navigation guard: allow, redirect, or force a logout before a screen renders.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every navigation attempt passes through `NavigationGuard::check`, which
//! reads one snapshot of the session store and never touches the network.
//! A redirect is not retried here; the caller issues it as a new attempt.
//!
//! DESIGN
//! ======
//! The decision table is a pure function (`evaluate`). Strategies wrap it: the
//! standard strategy performs the side effects the table calls for (logging,
//! forced logout), and the `dev-bypass` feature adds a strategy that can
//! fabricate a session first. The strategy is picked when the app is composed.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use std::sync::Arc;

use crate::routes::{NavigationRequest, RouteAccess, Screen};
use crate::session::{SessionSnapshot, SessionStore};
#[cfg(feature = "dev-bypass")]
use crate::{
    session::AuthStatus,
    types::{Role, User},
};

/// Outcome of one navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Not logged in.
    RedirectLogin,
    /// Logged in, but the role is not admitted; go to the role's landing screen.
    RedirectRoleDefault(Screen),
    /// Token without user. The session was cleared; go to login.
    ForcedLogout,
}

impl Decision {
    /// Where the caller should navigate next, if anywhere.
    #[must_use]
    pub fn redirect(&self) -> Option<Screen> {
        match self {
            Self::Allow => None,
            Self::RedirectLogin | Self::ForcedLogout => Some(Screen::Login),
            Self::RedirectRoleDefault(landing) => Some(landing.clone()),
        }
    }
}

/// The guard's decision table, without side effects.
#[must_use]
pub fn evaluate(access: RouteAccess, session: &SessionSnapshot) -> Decision {
    if !access.requires_auth {
        return Decision::Allow;
    }
    if session.token.is_none() {
        return Decision::RedirectLogin;
    }
    let Some(user) = &session.user else {
        return Decision::ForcedLogout;
    };
    if access.admits(user.role) {
        Decision::Allow
    } else {
        Decision::RedirectRoleDefault(Screen::landing_for(user.role))
    }
}

/// Decides one navigation attempt against the session store.
pub trait AuthorizationStrategy: Send + Sync {
    fn authorize(&self, session: &SessionStore, request: &NavigationRequest) -> Decision;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// Production strategy: the decision table plus its side effects.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardAuthorization;

impl AuthorizationStrategy for StandardAuthorization {
    fn authorize(&self, session: &SessionStore, request: &NavigationRequest) -> Decision {
        let snapshot = session.snapshot();
        let access = request.target.access();
        let decision = evaluate(access, &snapshot);

        match &decision {
            Decision::ForcedLogout => {
                tracing::error!(target_screen = %request.target, "token present without user; forcing logout");
                session.logout();
            }
            Decision::RedirectRoleDefault(landing) => {
                let role = snapshot.user.as_ref().map(|u| u.role);
                tracing::warn!(
                    role = ?role,
                    required = ?access.roles,
                    target_screen = %request.target,
                    landing = %landing,
                    "role not admitted; redirecting to landing screen"
                );
            }
            Decision::Allow | Decision::RedirectLogin => {}
        }
        decision
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}

/// Development strategy: a `?role=` selector on a protected route logs in a
/// synthetic user of that role. Not a security boundary.
#[cfg(feature = "dev-bypass")]
#[derive(Debug, Default, Clone, Copy)]
pub struct DevBypassAuthorization {
    fallback: StandardAuthorization,
}

#[cfg(feature = "dev-bypass")]
impl DevBypassAuthorization {
    /// Fixture user for a bypass role. `None` for roles without a fixture.
    #[must_use]
    pub fn sample_user(role: Role) -> Option<User> {
        let (id, name, email) = match role {
            Role::Collector => ("dev-collector-001", "Dev Collector", "collector@dev.local"),
            Role::Member => ("dev-member-001", "Dev Member", "member@dev.local"),
            Role::Unrecognized => return None,
        };
        Some(User {
            id: id.to_owned(),
            name: name.to_owned(),
            email: Some(email.to_owned()),
            phone: "000-000-0000".to_owned(),
            role,
            gender: "other".to_owned(),
        })
    }
}

#[cfg(feature = "dev-bypass")]
impl AuthorizationStrategy for DevBypassAuthorization {
    fn authorize(&self, session: &SessionStore, request: &NavigationRequest) -> Decision {
        let fixture = request
            .role_selector
            .filter(|_| request.target.access().requires_auth && !session.is_logged_in())
            .and_then(Self::sample_user);
        let Some(user) = fixture else {
            return self.fallback.authorize(session, request);
        };

        tracing::warn!(role = %user.role, target_screen = %request.target, "dev bypass: simulating login");
        session.set_session(&format!("dev_mock_token_{}", user.role), &user);
        session.set_status(AuthStatus::Success);
        Decision::Allow
    }

    fn name(&self) -> &'static str {
        "dev-bypass"
    }
}

pub struct NavigationGuard {
    session: Arc<SessionStore>,
    strategy: Arc<dyn AuthorizationStrategy>,
}

impl NavigationGuard {
    pub fn new(session: Arc<SessionStore>, strategy: Arc<dyn AuthorizationStrategy>) -> Self {
        Self { session, strategy }
    }

    /// Guard backed by `StandardAuthorization`.
    pub fn standard(session: Arc<SessionStore>) -> Self {
        Self::new(session, Arc::new(StandardAuthorization))
    }

    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Decide one navigation attempt.
    pub fn check(&self, request: &NavigationRequest) -> Decision {
        let decision = self.strategy.authorize(&self.session, request);
        tracing::debug!(
            strategy = self.strategy.name(),
            target_screen = %request.target,
            decision = ?decision,
            "navigation checked"
        );
        decision
    }
}
