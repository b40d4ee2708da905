//! REST client for the iqub API.
//!
//! ARCHITECTURE
//! ============
//! The bearer credential lives on the `ApiClient` instance, not in process
//! globals: the session store arms and disarms it through `AuthApi::set_bearer`
//! and every request made by that instance picks up the current value.
//!
//! ERROR HANDLING
//! ==============
//! Non-2xx responses carry the server's `message` field when the body has one.
//! A 401 on a call made under an existing session also fires the unauthorized
//! hook so the composition root can force a logout.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::config::{ClientConfig, Timeouts};
use crate::types::{
    AuthPayload, Credentials, ErrorBody, Iqub, IqubList, SignupRequest, SignupResponse, User, UserEnvelope,
};

/// Callback fired when a session call comes back `401 Unauthorized`.
pub type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

/// Errors produced by API client operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request never produced a response (connect, timeout, TLS).
    #[error("API request failed: {0}")]
    Request(String),

    /// The server rejected the bearer credential.
    #[error("unauthorized")]
    Unauthorized { message: Option<String> },

    /// The server returned another non-success status.
    #[error("API response error: status {status}")]
    Status { status: u16, message: Option<String> },

    /// The response body did not match the expected shape.
    #[error("API response parse failed: {0}")]
    Parse(String),
}

impl ApiError {
    /// The user-displayable message the server reported, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { message } | Self::Status { message, .. } => message.as_deref(),
            Self::HttpClientBuild(_) | Self::Request(_) | Self::Parse(_) => None,
        }
    }
}

/// The slice of the remote API the session store depends on.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /login`.
    async fn login(&self, credentials: &Credentials) -> Result<AuthPayload, ApiError>;

    /// `POST /signup`.
    async fn signup(&self, request: &SignupRequest) -> Result<SignupResponse, ApiError>;

    /// `GET /user` with the armed bearer credential.
    async fn fetch_user(&self) -> Result<User, ApiError>;

    /// Arm (`Some`) or disarm (`None`) the bearer credential for subsequent calls.
    fn set_bearer(&self, token: Option<&str>);
}

/// The iqub listing endpoints the iqub store depends on.
#[async_trait::async_trait]
pub trait IqubApi: Send + Sync {
    /// `GET /iqubs` with the armed bearer credential.
    async fn list_iqubs(&self) -> Result<Vec<Iqub>, ApiError>;
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    bearer: RwLock<Option<String>>,
    on_unauthorized: RwLock<Option<UnauthorizedHook>>,
}

impl ApiClient {
    /// Build a client rooted at `base_url` with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(base_url: &str, timeouts: Timeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            bearer: RwLock::new(None),
            on_unauthorized: RwLock::new(None),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_base_url, config.timeouts)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The currently armed bearer credential.
    #[must_use]
    pub fn bearer(&self) -> Option<String> {
        self.bearer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install the unauthorized callback, replacing any previous one.
    pub fn set_unauthorized_hook(&self, hook: UnauthorizedHook) {
        *self
            .on_unauthorized
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }

    /// Send `request`, attaching the bearer credential when armed.
    ///
    /// `session_call` marks requests that rely on an existing session; only
    /// those fire the unauthorized hook. A 401 from login or signup means bad
    /// credentials, not an expired session.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        session_call: bool,
    ) -> Result<T, ApiError> {
        let request = match self.bearer() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ApiError::Parse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message_from_body(&body);
        if status == StatusCode::UNAUTHORIZED {
            if session_call {
                tracing::warn!(base_url = %self.base_url, "api responded 401; firing unauthorized hook");
                self.fire_unauthorized();
            }
            return Err(ApiError::Unauthorized { message });
        }
        Err(ApiError::Status { status: status.as_u16(), message })
    }

    fn fire_unauthorized(&self) {
        let hook = self
            .on_unauthorized
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

#[async_trait::async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<AuthPayload, ApiError> {
        let url = endpoint(&self.base_url, "/login");
        self.send(self.http.post(url).json(credentials), false).await
    }

    async fn signup(&self, request: &SignupRequest) -> Result<SignupResponse, ApiError> {
        let url = endpoint(&self.base_url, "/signup");
        self.send(self.http.post(url).json(request), false).await
    }

    async fn fetch_user(&self) -> Result<User, ApiError> {
        let url = endpoint(&self.base_url, "/user");
        let envelope: UserEnvelope = self.send(self.http.get(url), true).await?;
        Ok(envelope.user)
    }

    fn set_bearer(&self, token: Option<&str>) {
        *self.bearer.write().unwrap_or_else(PoisonError::into_inner) = token.map(str::to_owned);
    }
}

#[async_trait::async_trait]
impl IqubApi for ApiClient {
    async fn list_iqubs(&self) -> Result<Vec<Iqub>, ApiError> {
        let url = endpoint(&self.base_url, "/iqubs");
        let list: IqubList = self.send(self.http.get(url), true).await?;
        Ok(list.into_iqubs())
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{base_url}{path}")
}

fn error_message_from_body(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
}
