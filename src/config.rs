//! Client configuration parsed from environment variables.
//!
//! Parsing goes through an injectable lookup so tests never touch the real
//! process environment.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_STORAGE_PATH: &str = ".iqub/session.json";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// How `signup` produces a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupMode {
    /// Calls `POST /signup`.
    Operational,
    /// Fabricates a local user and token without contacting the network.
    Simulation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub signup_mode: SignupMode,
    /// Request the development bypass strategy. Ignored unless the crate is
    /// built with the `dev-bypass` feature.
    pub dev_bypass: bool,
    pub storage_path: PathBuf,
    pub timeouts: Timeouts,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            signup_mode: SignupMode::Operational,
            dev_bypass: false,
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            timeouts: Timeouts::default(),
        }
    }
}

impl ClientConfig {
    /// Build typed config from the process environment.
    ///
    /// Optional:
    /// - `IQUB_API_BASE_URL`: default `http://127.0.0.1:8000/api`
    /// - `IQUB_ALPHA_MODE`: `true` selects simulated signup
    /// - `IQUB_DEV_BYPASS`: `true` selects the dev bypass guard (feature-gated)
    /// - `IQUB_STORAGE_PATH`: default `.iqub/session.json`
    /// - `IQUB_REQUEST_TIMEOUT_SECS`: default 30
    /// - `IQUB_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if a boolean or numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a boolean or numeric variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("IQUB_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let signup_mode = if parse_flag("IQUB_ALPHA_MODE", lookup("IQUB_ALPHA_MODE").as_deref())? {
            SignupMode::Simulation
        } else {
            SignupMode::Operational
        };
        let dev_bypass = parse_flag("IQUB_DEV_BYPASS", lookup("IQUB_DEV_BYPASS").as_deref())?;
        let storage_path = lookup("IQUB_STORAGE_PATH").map_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH), PathBuf::from);
        let timeouts = Timeouts {
            request_secs: parse_secs(
                "IQUB_REQUEST_TIMEOUT_SECS",
                lookup("IQUB_REQUEST_TIMEOUT_SECS").as_deref(),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            connect_secs: parse_secs(
                "IQUB_CONNECT_TIMEOUT_SECS",
                lookup("IQUB_CONNECT_TIMEOUT_SECS").as_deref(),
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
        };

        Ok(Self { api_base_url, signup_mode, dev_bypass, storage_path, timeouts })
    }
}

fn parse_flag(var: &'static str, raw: Option<&str>) -> Result<bool, ConfigError> {
    match raw.map(str::trim) {
        None | Some("" | "false" | "0") => Ok(false),
        Some("true" | "1") => Ok(true),
        Some(other) => Err(ConfigError::InvalidValue { var, value: other.to_owned() }),
    }
}

fn parse_secs(var: &'static str, raw: Option<&str>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue { var, value: value.to_owned() }),
    }
}
