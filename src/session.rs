//! Session store: who is logged in, with which credential.
//!
//! SYSTEM CONTEXT
//! ==============
//! Read by the navigation guard on every navigation and mutated by login,
//! signup, logout and profile restore. Token and user are written through to
//! durable storage on every change, and the token also arms the API client's
//! bearer credential.
//!
//! CONCURRENCY
//! ===========
//! `login`, `signup` and `fetch_user` hold an async single-flight lock, so a
//! second call waits for the first. `logout` and `expire` are synchronous and
//! bump the session epoch; an operation that started under an older epoch
//! drops its result instead of committing it.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::api::{ApiError, AuthApi};
use crate::config::SignupMode;
use crate::storage::{KeyValueStore, TOKEN_KEY, USER_KEY};
use crate::types::{Credentials, SignupRequest, User};

pub const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please check your credentials and try again.";
pub const SIGNUP_FAILED_MESSAGE: &str = "Signup failed. Please check your details and try again.";
pub const SIGNUP_MALFORMED_MESSAGE: &str = "Signup completed but received unexpected data from server.";
pub const SIMULATION_FAILED_MESSAGE: &str = "Failed to simulate signup.";
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired or invalid. Please log in again.";

/// Lifecycle of the most recent authentication operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl AuthStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Login/signup failure surfaced to the initiating screen.
///
/// `Display` is the user-facing message, identical to what the store records
/// as its current error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The API refused the request.
    #[error("{message}")]
    Rejected { message: String },
    /// The API answered 2xx but without a usable `user` and `token`.
    #[error("{message}")]
    MalformedResponse { message: String },
    /// Simulation mode could not fabricate a session.
    #[error("{message}")]
    Simulation { message: String },
    /// A logout or expiry landed while the operation was in flight.
    #[error("superseded by a newer session change")]
    Superseded,
}

/// Point-in-time copy of the session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub token: Option<String>,
    pub user: Option<User>,
    pub status: AuthStatus,
    pub error: Option<String>,
}

impl SessionSnapshot {
    /// The token is the only input; a user without a token is not logged in.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }
}

struct Inner {
    session: SessionSnapshot,
    epoch: u64,
}

pub struct SessionStore {
    inner: Mutex<Inner>,
    storage: Arc<dyn KeyValueStore>,
    api: Arc<dyn AuthApi>,
    signup_mode: SignupMode,
    flight: tokio::sync::Mutex<()>,
}

impl SessionStore {
    /// Create a store hydrated from `storage`.
    ///
    /// A restored token re-arms the bearer credential. A persisted user that no
    /// longer parses is removed from storage and treated as absent.
    pub fn new(storage: Arc<dyn KeyValueStore>, api: Arc<dyn AuthApi>, signup_mode: SignupMode) -> Self {
        let token = storage.get(TOKEN_KEY).filter(|t| !t.is_empty());
        let user = storage
            .get(USER_KEY)
            .and_then(|raw| match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(error = %e, "persisted user unreadable; discarding");
                    storage.remove(USER_KEY);
                    None
                }
            });
        api.set_bearer(token.as_deref());
        if token.is_some() {
            tracing::debug!(has_user = user.is_some(), "session restored from storage");
        }

        let session = SessionSnapshot { token, user, ..SessionSnapshot::default() };
        Self {
            inner: Mutex::new(Inner { session, epoch: 0 }),
            storage,
            api,
            signup_mode,
            flight: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn signup_mode(&self) -> SignupMode {
        self.signup_mode
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().session.clone()
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.lock().session.is_logged_in()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.lock().session.token.clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.lock().session.user.clone()
    }

    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.lock().session.status
    }

    #[must_use]
    pub fn auth_error(&self) -> Option<String> {
        self.lock().session.error.clone()
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Set or clear the token, keeping storage and the bearer credential in step.
    /// An empty string counts as absent.
    pub fn set_token(&self, token: Option<&str>) {
        let mut inner = self.lock();
        self.write_token(&mut inner.session, token);
    }

    /// Set or clear the user record, keeping storage in step.
    pub fn set_user(&self, user: Option<&User>) {
        let mut inner = self.lock();
        self.write_user(&mut inner.session, user);
    }

    pub fn set_status(&self, status: AuthStatus) {
        self.lock().session.status = status;
    }

    pub fn set_error(&self, message: Option<&str>) {
        self.lock().session.error = message.map(str::to_owned);
    }

    /// Write token and user together under one lock.
    pub fn set_session(&self, token: &str, user: &User) {
        let mut inner = self.lock();
        self.write_token(&mut inner.session, Some(token));
        self.write_user(&mut inner.session, Some(user));
    }

    /// Clear token and user together under one lock.
    pub fn clear_session(&self) {
        let mut inner = self.lock();
        self.write_token(&mut inner.session, None);
        self.write_user(&mut inner.session, None);
    }

    /// Drop the session locally. No network call; idempotent.
    pub fn logout(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        self.write_token(&mut inner.session, None);
        self.write_user(&mut inner.session, None);
        inner.session.error = None;
        inner.session.status = AuthStatus::Idle;
        tracing::info!("session logged out");
    }

    /// Invalidate a session the server no longer accepts.
    ///
    /// Returns `false` without touching anything when no token is held.
    pub fn expire(&self) -> bool {
        let mut inner = self.lock();
        if inner.session.token.is_none() {
            return false;
        }
        self.expire_locked(&mut inner);
        true
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Authenticate against `POST /login`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` with the server's message (or a generic
    /// fallback) when the API refuses, `AuthError::MalformedResponse` when the
    /// returned token is empty, and `AuthError::Superseded` when a logout
    /// lands first. Token and user are untouched on failure.
    pub async fn login(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let _flight = self.flight.lock().await;
        let epoch = self.begin();

        match self.api.login(credentials).await {
            Ok(payload) => {
                self.commit(epoch, &payload.token, &payload.user, LOGIN_FAILED_MESSAGE)?;
                tracing::info!(user_id = %payload.user.id, role = %payload.user.role, "login succeeded");
                Ok(payload.user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "login failed");
                let message = e.message().unwrap_or(LOGIN_FAILED_MESSAGE).to_owned();
                Err(self.fail(epoch, AuthError::Rejected { message }))
            }
        }
    }

    /// Register a new account, remotely or by local simulation depending on
    /// the store's `SignupMode`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` when the API refuses,
    /// `AuthError::MalformedResponse` when the body is unreadable or lacks a
    /// `user` or a non-empty `token`,
    /// `AuthError::Simulation` if a local session cannot be fabricated, and
    /// `AuthError::Superseded` when a logout lands first.
    pub async fn signup(&self, request: &SignupRequest) -> Result<User, AuthError> {
        let _flight = self.flight.lock().await;
        let epoch = self.begin();

        match self.signup_mode {
            SignupMode::Simulation => self.simulate_signup(request, epoch),
            SignupMode::Operational => self.remote_signup(request, epoch).await,
        }
    }

    /// Load the profile for a token restored without a user.
    ///
    /// Does nothing unless a token is held and the user is missing. On failure
    /// the session is expired rather than an error being returned.
    pub async fn fetch_user(&self) {
        let _flight = self.flight.lock().await;
        let epoch = {
            let mut inner = self.lock();
            if inner.session.token.is_none() || inner.session.user.is_some() {
                return;
            }
            inner.session.status = AuthStatus::Loading;
            inner.epoch
        };

        match self.api.fetch_user().await {
            Ok(user) => {
                let mut inner = self.lock();
                if inner.epoch != epoch {
                    tracing::debug!("profile fetch superseded; dropping result");
                    return;
                }
                self.write_user(&mut inner.session, Some(&user));
                inner.session.status = AuthStatus::Success;
                tracing::info!(user_id = %user.id, "profile restored");
            }
            Err(e) => {
                tracing::warn!(error = %e, "profile fetch failed");
                let mut inner = self.lock();
                if inner.epoch == epoch {
                    self.expire_locked(&mut inner);
                }
            }
        }
    }

    async fn remote_signup(&self, request: &SignupRequest, epoch: u64) -> Result<User, AuthError> {
        tracing::debug!(phone = %request.phone, role = %request.role, "attempting signup");
        let response = match self.api.signup(request).await {
            Ok(response) => response,
            Err(e @ ApiError::Parse(_)) => {
                tracing::error!(error = %e, "signup response unreadable");
                let message = SIGNUP_MALFORMED_MESSAGE.to_owned();
                return Err(self.fail(epoch, AuthError::MalformedResponse { message }));
            }
            Err(e) => {
                tracing::warn!(error = %e, "signup failed");
                let message = e.message().unwrap_or(SIGNUP_FAILED_MESSAGE).to_owned();
                return Err(self.fail(epoch, AuthError::Rejected { message }));
            }
        };

        let token = response.token.filter(|t| !t.is_empty());
        let (Some(token), Some(user)) = (token, response.user) else {
            tracing::error!("signup response missing user or token");
            let message = SIGNUP_MALFORMED_MESSAGE.to_owned();
            return Err(self.fail(epoch, AuthError::MalformedResponse { message }));
        };
        self.commit(epoch, &token, &user, SIGNUP_MALFORMED_MESSAGE)?;
        tracing::info!(user_id = %user.id, role = %user.role, "signup succeeded");
        Ok(user)
    }

    fn simulate_signup(&self, request: &SignupRequest, epoch: u64) -> Result<User, AuthError> {
        tracing::warn!("simulation mode: fabricating signup locally");
        let millis = match unix_millis() {
            Ok(millis) => millis,
            Err(e) => {
                tracing::error!(error = %e, "simulated signup failed");
                let message = SIMULATION_FAILED_MESSAGE.to_owned();
                return Err(self.fail(epoch, AuthError::Simulation { message }));
            }
        };
        let user = simulated_user(request);
        let token = simulated_token(&user.id, millis);
        self.commit(epoch, &token, &user, SIMULATION_FAILED_MESSAGE)?;
        tracing::warn!(user_id = %user.id, role = %user.role, "simulation mode: session fabricated");
        Ok(user)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark an operation as started and return the epoch it runs under.
    fn begin(&self) -> u64 {
        let mut inner = self.lock();
        inner.session.status = AuthStatus::Loading;
        inner.session.error = None;
        inner.epoch
    }

    /// Commit a successful operation. An empty token is never committed; the
    /// operation fails with `malformed` as its message instead.
    fn commit(&self, epoch: u64, token: &str, user: &User, malformed: &str) -> Result<(), AuthError> {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            tracing::info!("auth operation superseded; dropping result");
            return Err(AuthError::Superseded);
        }
        if token.is_empty() {
            tracing::error!(user_id = %user.id, "auth response carried an empty token; not committing");
            let err = AuthError::MalformedResponse { message: malformed.to_owned() };
            inner.session.error = Some(err.to_string());
            inner.session.status = AuthStatus::Error;
            return Err(err);
        }
        self.write_token(&mut inner.session, Some(token));
        self.write_user(&mut inner.session, Some(user));
        inner.session.status = AuthStatus::Success;
        Ok(())
    }

    fn fail(&self, epoch: u64, err: AuthError) -> AuthError {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return AuthError::Superseded;
        }
        inner.session.error = Some(err.to_string());
        inner.session.status = AuthStatus::Error;
        err
    }

    fn expire_locked(&self, inner: &mut Inner) {
        inner.epoch += 1;
        self.write_token(&mut inner.session, None);
        self.write_user(&mut inner.session, None);
        inner.session.status = AuthStatus::Error;
        inner.session.error = Some(SESSION_EXPIRED_MESSAGE.to_owned());
        tracing::warn!("session expired; credentials cleared");
    }

    fn write_token(&self, session: &mut SessionSnapshot, token: Option<&str>) {
        let token = token.filter(|t| !t.is_empty());
        match token {
            Some(t) => self.storage.set(TOKEN_KEY, t),
            None => self.storage.remove(TOKEN_KEY),
        }
        self.api.set_bearer(token);
        session.token = token.map(str::to_owned);
    }

    fn write_user(&self, session: &mut SessionSnapshot, user: Option<&User>) {
        match user {
            Some(u) => match serde_json::to_string(u) {
                Ok(raw) => self.storage.set(USER_KEY, &raw),
                Err(e) => tracing::warn!(error = %e, "user serialize failed; not persisted"),
            },
            None => self.storage.remove(USER_KEY),
        }
        session.user = user.cloned();
    }
}

fn unix_millis() -> Result<u128, std::time::SystemTimeError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis())
}

fn simulated_user(request: &SignupRequest) -> User {
    User {
        id: format!("alpha_{}", Uuid::new_v4().simple()),
        name: request.name.clone(),
        email: request.email.clone(),
        phone: request.phone.clone(),
        role: request.role,
        gender: request.gender.clone(),
    }
}

fn simulated_token(user_id: &str, millis: u128) -> String {
    format!("mock_alpha_token_{user_id}_{millis}")
}
