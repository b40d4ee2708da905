//! Composition root: API client, storage, session store and guard.
//!
//! SYSTEM CONTEXT
//! ==============
//! `App` owns one instance of each collaborator and hands the session store to
//! the guard by reference. It also installs the 401 hook: any authenticated
//! call the server rejects expires the session, empties the iqub store and
//! parks the current screen on login.

#[cfg(test)]
#[path = "app_test.rs"]
mod app_test;

use std::sync::{Arc, Mutex, PoisonError};

use crate::api::{ApiClient, ApiError};
use crate::config::ClientConfig;
#[cfg(feature = "dev-bypass")]
use crate::guard::DevBypassAuthorization;
use crate::guard::{AuthorizationStrategy, Decision, NavigationGuard, StandardAuthorization};
use crate::iqubs::{IqubError, IqubStore};
use crate::routes::{NavigationRequest, RouteError, Screen};
use crate::session::SessionStore;
use crate::storage::{FileStorage, KeyValueStore};

/// Upper bound on guard redirects followed for one `navigate` call.
pub const MAX_REDIRECTS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Iqub(#[from] IqubError),
    #[error("redirect loop navigating to {0}")]
    RedirectLoop(String),
}

/// Where a navigation ended up and the guard decisions along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub screen: Screen,
    pub decisions: Vec<Decision>,
}

impl Navigation {
    #[must_use]
    pub fn was_redirected(&self) -> bool {
        self.decisions.len() > 1
    }
}

pub struct App {
    api: Arc<ApiClient>,
    session: Arc<SessionStore>,
    iqubs: Arc<IqubStore>,
    guard: NavigationGuard,
    current: Arc<Mutex<Screen>>,
}

impl App {
    /// Build the app with a file-backed session at `config.storage_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: &ClientConfig) -> Result<Self, AppError> {
        let api = Arc::new(ApiClient::from_config(config)?);
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStorage::open(&config.storage_path));
        Ok(Self::assemble(config, api, storage))
    }

    /// Wire pre-built collaborators together.
    pub fn assemble(config: &ClientConfig, api: Arc<ApiClient>, storage: Arc<dyn KeyValueStore>) -> Self {
        let session = Arc::new(SessionStore::new(storage, api.clone(), config.signup_mode));
        let iqubs = Arc::new(IqubStore::new(api.clone()));
        let guard = NavigationGuard::new(session.clone(), select_strategy(config));
        let current = Arc::new(Mutex::new(Screen::Onboarding));
        install_unauthorized_redirect(&api, &session, &iqubs, &current);
        tracing::info!(
            base_url = api.base_url(),
            signup_mode = ?config.signup_mode,
            strategy = guard.strategy_name(),
            "app assembled"
        );
        Self { api, session, iqubs, guard, current }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    #[must_use]
    pub fn iqubs(&self) -> &Arc<IqubStore> {
        &self.iqubs
    }

    #[must_use]
    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    #[must_use]
    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    /// The last screen a navigation settled on.
    #[must_use]
    pub fn current_screen(&self) -> Screen {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Load the profile for a token restored from storage without a user.
    pub async fn restore(&self) {
        self.session.fetch_user().await;
    }

    /// End the session and drop everything loaded under it.
    pub fn logout(&self) {
        self.session.logout();
        self.iqubs.clear();
    }

    /// Navigate to an iqub's detail screen and select it.
    ///
    /// The selection only happens when the guard lets the detail screen
    /// render; a redirect leaves the iqub store untouched.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Iqub` when the id is not in the loaded list, and
    /// the `navigate` errors otherwise.
    pub fn open_iqub(&self, id: &str) -> Result<Navigation, AppError> {
        let navigation = self.navigate_request(NavigationRequest::to(Screen::IqubDetail { id: id.to_owned() }))?;
        if matches!(navigation.screen, Screen::IqubDetail { .. }) {
            self.iqubs.select(id)?;
        }
        Ok(navigation)
    }

    /// Navigate to `raw` (`path[?query]`), following guard redirects.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown path or a redirect chain longer than
    /// `MAX_REDIRECTS`.
    pub fn navigate(&self, raw: &str) -> Result<Navigation, AppError> {
        self.navigate_request(NavigationRequest::parse(raw)?)
    }

    /// Navigate to the current user's landing screen, or to login.
    ///
    /// # Errors
    ///
    /// Returns an error for a redirect chain longer than `MAX_REDIRECTS`.
    pub fn navigate_home(&self) -> Result<Navigation, AppError> {
        let target = self.session.user().map_or(Screen::Login, |u| Screen::landing_for(u.role));
        self.navigate_request(NavigationRequest::to(target))
    }

    fn navigate_request(&self, mut request: NavigationRequest) -> Result<Navigation, AppError> {
        let origin = request.target.clone();
        let mut decisions = Vec::new();
        loop {
            let decision = self.guard.check(&request);
            let next = decision.redirect();
            decisions.push(decision);
            let Some(next) = next else {
                *self.current.lock().unwrap_or_else(PoisonError::into_inner) = request.target.clone();
                return Ok(Navigation { screen: request.target, decisions });
            };
            if decisions.len() > MAX_REDIRECTS {
                tracing::error!(origin = %origin, "redirect loop detected");
                return Err(AppError::RedirectLoop(origin.path()));
            }
            request = NavigationRequest::to(next);
        }
    }
}

fn select_strategy(config: &ClientConfig) -> Arc<dyn AuthorizationStrategy> {
    if config.dev_bypass {
        #[cfg(feature = "dev-bypass")]
        {
            tracing::warn!("dev bypass guard enabled; never ship this build");
            return Arc::new(DevBypassAuthorization::default());
        }
        #[cfg(not(feature = "dev-bypass"))]
        tracing::warn!("IQUB_DEV_BYPASS set but dev-bypass feature not compiled; using standard guard");
    }
    Arc::new(StandardAuthorization)
}

/// Expire the session and park on login whenever the API answers 401.
fn install_unauthorized_redirect(
    api: &ApiClient,
    session: &Arc<SessionStore>,
    iqubs: &Arc<IqubStore>,
    current: &Arc<Mutex<Screen>>,
) {
    let session = Arc::downgrade(session);
    let iqubs = Arc::downgrade(iqubs);
    let current = Arc::clone(current);
    api.set_unauthorized_hook(Arc::new(move || {
        let Some(session) = session.upgrade() else {
            return;
        };
        if session.expire() {
            if let Some(iqubs) = iqubs.upgrade() {
                iqubs.clear();
            }
            *current.lock().unwrap_or_else(PoisonError::into_inner) = Screen::Login;
        }
    }));
}
