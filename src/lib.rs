//! # iqub-client
//!
//! Client-side session management and route guarding for the iqub savings
//! group app.
//!
//! The session store holds the bearer token and user profile, persists both,
//! and runs login, signup and profile restore against the REST API. The
//! navigation guard decides, per navigation, whether a screen may render or
//! where to redirect. The iqub store holds the group list behind the
//! collector and member screens. `App` wires them together with the API
//! client and the 401 redirect hook.

pub mod api;
pub mod app;
pub mod config;
pub mod guard;
pub mod iqubs;
pub mod routes;
pub mod session;
pub mod storage;
pub mod types;
