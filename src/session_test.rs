use std::sync::Arc;

use super::test_helpers::{Gate, MockApi, credentials, payload, signup_request, store, user};
use super::*;
use crate::api::ApiError;
use crate::storage::MemoryStorage;
use crate::types::{Role, SignupResponse};

// =============================================================================
// hydration
// =============================================================================

#[test]
fn fresh_install_starts_empty() {
    let api = Arc::new(MockApi::default());
    let (store, _storage) = store(api.clone(), SignupMode::Operational);
    assert_eq!(store.snapshot(), SessionSnapshot::default());
    assert!(!store.is_logged_in());
    assert!(api.bearer().is_none());
}

#[test]
fn hydrates_token_and_user_and_arms_bearer() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(TOKEN_KEY, "t-restored");
    storage.set(USER_KEY, &serde_json::to_string(&user("u1", Role::Member)).unwrap());
    let api = Arc::new(MockApi::default());

    let store = SessionStore::new(storage, api.clone(), SignupMode::Operational);

    assert!(store.is_logged_in());
    assert_eq!(store.user().unwrap().role, Role::Member);
    assert_eq!(store.status(), AuthStatus::Idle);
    assert_eq!(api.bearer().as_deref(), Some("t-restored"));
}

#[test]
fn hydration_discards_corrupt_user() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(TOKEN_KEY, "t");
    storage.set(USER_KEY, "{not json");

    let store = SessionStore::new(storage.clone(), Arc::new(MockApi::default()), SignupMode::Operational);

    assert!(store.is_logged_in());
    assert!(store.user().is_none());
    assert!(storage.get(USER_KEY).is_none());
}

// =============================================================================
// setters and persistence sync
// =============================================================================

#[test]
fn set_token_tracks_storage_after_every_call() {
    let api = Arc::new(MockApi::default());
    let (store, storage) = store(api.clone(), SignupMode::Operational);

    for step in [Some("a"), Some("b"), None, None, Some("c"), None] {
        store.set_token(step);
        assert_eq!(store.token().as_deref(), step);
        assert_eq!(storage.get(TOKEN_KEY).as_deref(), step);
        assert_eq!(api.bearer().as_deref(), step);
    }
}

#[test]
fn set_token_empty_string_counts_as_absent() {
    let (store, storage) = store(Arc::new(MockApi::default()), SignupMode::Operational);
    store.set_token(Some("t"));
    store.set_token(Some(""));
    assert!(store.token().is_none());
    assert!(storage.get(TOKEN_KEY).is_none());
}

#[test]
fn set_user_writes_json_and_removes_on_clear() {
    let (store, storage) = store(Arc::new(MockApi::default()), SignupMode::Operational);
    let u = user("u7", Role::Collector);

    store.set_user(Some(&u));
    let raw = storage.get(USER_KEY).unwrap();
    assert_eq!(serde_json::from_str::<User>(&raw).unwrap(), u);

    store.set_user(None);
    assert!(storage.get(USER_KEY).is_none());
    assert!(store.user().is_none());
}

#[test]
fn user_without_token_is_not_logged_in() {
    let (store, _storage) = store(Arc::new(MockApi::default()), SignupMode::Operational);
    store.set_user(Some(&user("u1", Role::Member)));
    assert!(!store.is_logged_in());
}

#[test]
fn status_and_error_are_memory_only() {
    let (store, storage) = store(Arc::new(MockApi::default()), SignupMode::Operational);
    store.set_status(AuthStatus::Error);
    store.set_error(Some("boom"));
    assert_eq!(store.status(), AuthStatus::Error);
    assert_eq!(store.auth_error().as_deref(), Some("boom"));
    assert!(storage.get("status").is_none());
    store.set_error(None);
    assert!(store.auth_error().is_none());
}

#[test]
fn set_session_and_clear_session_pair_token_and_user() {
    let (store, storage) = store(Arc::new(MockApi::default()), SignupMode::Operational);
    store.set_session("t1", &user("u1", Role::Member));
    assert!(storage.get(TOKEN_KEY).is_some());
    assert!(storage.get(USER_KEY).is_some());

    store.clear_session();
    assert!(storage.get(TOKEN_KEY).is_none());
    assert!(storage.get(USER_KEY).is_none());
    assert!(store.user().is_none());
}

// =============================================================================
// login
// =============================================================================

#[tokio::test]
async fn login_success_commits_session() {
    let api = Arc::new(MockApi::default());
    api.push_login(Ok(payload("t1", user("u1", Role::Member))));
    let (store, storage) = store(api.clone(), SignupMode::Operational);

    let logged_in = store.login(&credentials()).await.unwrap();

    assert_eq!(logged_in.role, Role::Member);
    assert!(store.is_logged_in());
    assert_eq!(store.user().unwrap().role, Role::Member);
    assert_eq!(store.status(), AuthStatus::Success);
    assert!(store.auth_error().is_none());
    assert_eq!(storage.get(TOKEN_KEY).as_deref(), Some("t1"));
    assert_eq!(api.bearer().as_deref(), Some("t1"));
}

#[tokio::test]
async fn login_failure_records_server_message_and_keeps_session() {
    let api = Arc::new(MockApi::default());
    api.push_login(Err(ApiError::Status { status: 422, message: Some("invalid credentials".into()) }));
    let (store, _storage) = store(api, SignupMode::Operational);
    store.set_session("t0", &user("u0", Role::Collector));

    let err = store.login(&credentials()).await.unwrap_err();

    assert_eq!(err, AuthError::Rejected { message: "invalid credentials".into() });
    assert_eq!(store.status(), AuthStatus::Error);
    assert_eq!(store.auth_error().as_deref(), Some("invalid credentials"));
    assert_eq!(store.token().as_deref(), Some("t0"));
    assert_eq!(store.user().unwrap().id, "u0");
}

#[tokio::test]
async fn login_failure_without_message_uses_fallback() {
    let api = Arc::new(MockApi::default());
    api.push_login(Err(ApiError::Request("connection refused".into())));
    let (store, _storage) = store(api, SignupMode::Operational);

    let err = store.login(&credentials()).await.unwrap_err();

    assert_eq!(err.to_string(), LOGIN_FAILED_MESSAGE);
    assert_eq!(store.auth_error().as_deref(), Some(LOGIN_FAILED_MESSAGE));
    assert!(!store.is_logged_in());
}

#[tokio::test]
async fn login_with_empty_token_commits_nothing() {
    let api = Arc::new(MockApi::default());
    api.push_login(Ok(payload("", user("u3", Role::Member))));
    let (store, storage) = store(api.clone(), SignupMode::Operational);

    let err = store.login(&credentials()).await.unwrap_err();

    assert_eq!(err, AuthError::MalformedResponse { message: LOGIN_FAILED_MESSAGE.into() });
    assert_eq!(store.status(), AuthStatus::Error);
    assert!(store.user().is_none());
    assert!(storage.get(USER_KEY).is_none());
    assert!(api.bearer().is_none());
}

#[tokio::test]
async fn login_clears_previous_error_on_success() {
    let api = Arc::new(MockApi::default());
    api.push_login(Err(ApiError::Status { status: 422, message: Some("nope".into()) }));
    api.push_login(Ok(payload("t2", user("u2", Role::Collector))));
    let (store, _storage) = store(api, SignupMode::Operational);

    assert!(store.login(&credentials()).await.is_err());
    store.login(&credentials()).await.unwrap();

    assert!(store.auth_error().is_none());
    assert_eq!(store.status(), AuthStatus::Success);
}

#[tokio::test]
async fn logout_during_login_supersedes_result() {
    let gate = Arc::new(Gate::default());
    let api = Arc::new(MockApi::gated(gate.clone()));
    api.push_login(Ok(payload("late", user("u1", Role::Member))));
    let (store, storage) = store(api, SignupMode::Operational);
    let store = Arc::new(store);

    let pending = {
        let store = store.clone();
        tokio::spawn(async move { store.login(&credentials()).await })
    };
    gate.entered.notified().await;
    assert_eq!(store.status(), AuthStatus::Loading);

    store.logout();
    gate.release.notify_one();

    let result = pending.await.unwrap();
    assert_eq!(result, Err(AuthError::Superseded));
    assert!(!store.is_logged_in());
    assert_eq!(store.status(), AuthStatus::Idle);
    assert!(storage.get(TOKEN_KEY).is_none());
}

#[tokio::test]
async fn concurrent_logins_run_one_at_a_time() {
    let gate = Arc::new(Gate::default());
    let api = Arc::new(MockApi::gated(gate.clone()));
    api.push_login(Ok(payload("first", user("u1", Role::Member))));
    api.push_login(Ok(payload("second", user("u2", Role::Collector))));
    let (store, _storage) = store(api.clone(), SignupMode::Operational);
    let store = Arc::new(store);

    let first = {
        let store = store.clone();
        tokio::spawn(async move { store.login(&credentials()).await })
    };
    gate.entered.notified().await;
    let second = {
        let store = store.clone();
        tokio::spawn(async move { store.login(&credentials()).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(api.call_count(), 1);

    gate.release.notify_one();
    first.await.unwrap().unwrap();
    gate.entered.notified().await;
    assert_eq!(store.token().as_deref(), Some("first"));
    gate.release.notify_one();
    second.await.unwrap().unwrap();

    assert_eq!(store.token().as_deref(), Some("second"));
    assert_eq!(api.call_count(), 2);
}

// =============================================================================
// signup
// =============================================================================

#[tokio::test]
async fn operational_signup_commits_session() {
    let api = Arc::new(MockApi::default());
    api.push_signup(Ok(SignupResponse {
        token: Some("t-new".into()),
        user: Some(user("u9", Role::Collector)),
    }));
    let (store, _storage) = store(api, SignupMode::Operational);

    let created = store.signup(&signup_request(Role::Collector)).await.unwrap();

    assert_eq!(created.id, "u9");
    assert_eq!(store.token().as_deref(), Some("t-new"));
    assert_eq!(store.status(), AuthStatus::Success);
}

#[tokio::test]
async fn operational_signup_missing_token_is_malformed() {
    let api = Arc::new(MockApi::default());
    api.push_signup(Ok(SignupResponse { token: None, user: Some(user("u9", Role::Member)) }));
    let (store, _storage) = store(api, SignupMode::Operational);

    let err = store.signup(&signup_request(Role::Member)).await.unwrap_err();

    assert_eq!(err, AuthError::MalformedResponse { message: SIGNUP_MALFORMED_MESSAGE.into() });
    assert_eq!(store.status(), AuthStatus::Error);
    assert_eq!(store.auth_error().as_deref(), Some(SIGNUP_MALFORMED_MESSAGE));
    assert!(!store.is_logged_in());
    assert!(store.user().is_none());
}

#[tokio::test]
async fn operational_signup_empty_token_is_malformed() {
    let api = Arc::new(MockApi::default());
    api.push_signup(Ok(SignupResponse { token: Some(String::new()), user: Some(user("u9", Role::Member)) }));
    let (store, storage) = store(api, SignupMode::Operational);

    let err = store.signup(&signup_request(Role::Member)).await.unwrap_err();

    assert_eq!(err, AuthError::MalformedResponse { message: SIGNUP_MALFORMED_MESSAGE.into() });
    assert_eq!(store.status(), AuthStatus::Error);
    assert!(store.user().is_none());
    assert!(storage.get(USER_KEY).is_none());
}

#[tokio::test]
async fn operational_signup_unreadable_body_is_malformed() {
    let api = Arc::new(MockApi::default());
    api.push_signup(Err(ApiError::Parse("EOF while parsing a value".into())));
    let (store, _storage) = store(api, SignupMode::Operational);

    let err = store.signup(&signup_request(Role::Collector)).await.unwrap_err();

    assert_eq!(err, AuthError::MalformedResponse { message: SIGNUP_MALFORMED_MESSAGE.into() });
    assert_eq!(store.auth_error().as_deref(), Some(SIGNUP_MALFORMED_MESSAGE));
}

#[tokio::test]
async fn operational_signup_failure_uses_server_message_or_fallback() {
    let api = Arc::new(MockApi::default());
    api.push_signup(Err(ApiError::Status { status: 422, message: Some("phone already registered".into()) }));
    api.push_signup(Err(ApiError::Status { status: 500, message: None }));
    let (store, _storage) = store(api, SignupMode::Operational);

    let err = store.signup(&signup_request(Role::Member)).await.unwrap_err();
    assert_eq!(err.to_string(), "phone already registered");

    let err = store.signup(&signup_request(Role::Member)).await.unwrap_err();
    assert_eq!(err.to_string(), SIGNUP_FAILED_MESSAGE);
    assert_eq!(store.auth_error().as_deref(), Some(SIGNUP_FAILED_MESSAGE));
}

#[tokio::test]
async fn simulated_signup_never_calls_network() {
    let api = Arc::new(MockApi::default());
    let (store, storage) = store(api.clone(), SignupMode::Simulation);

    let created = store.signup(&signup_request(Role::Collector)).await.unwrap();

    assert_eq!(api.call_count(), 0);
    assert!(created.id.starts_with("alpha_"));
    assert_eq!(created.role, Role::Collector);
    assert_eq!(created.name, "Sara");
    let token = store.token().unwrap();
    assert!(token.starts_with(&format!("mock_alpha_token_{}_", created.id)));
    assert_eq!(storage.get(TOKEN_KEY), Some(token));
    assert_eq!(store.status(), AuthStatus::Success);
}

#[tokio::test]
async fn simulated_signups_with_identical_input_never_collide() {
    let (store, _storage) = store(Arc::new(MockApi::default()), SignupMode::Simulation);
    let request = signup_request(Role::Member);

    let first = store.signup(&request).await.unwrap();
    let first_token = store.token().unwrap();
    let second = store.signup(&request).await.unwrap();
    let second_token = store.token().unwrap();

    assert_ne!(first.id, second.id);
    assert_ne!(first_token, second_token);
    assert!(store.is_logged_in());
    assert_eq!(store.user().unwrap(), second);
}

// =============================================================================
// logout / expire
// =============================================================================

#[tokio::test]
async fn logout_twice_matches_logout_once() {
    let api = Arc::new(MockApi::default());
    api.push_login(Ok(payload("t1", user("u1", Role::Member))));
    let (store, storage) = store(api.clone(), SignupMode::Operational);
    store.login(&credentials()).await.unwrap();

    store.logout();
    let once = store.snapshot();
    store.logout();
    let twice = store.snapshot();

    assert_eq!(once, twice);
    assert_eq!(twice, SessionSnapshot::default());
    assert!(storage.get(TOKEN_KEY).is_none());
    assert!(storage.get(USER_KEY).is_none());
    assert!(api.bearer().is_none());
}

#[test]
fn expire_without_token_is_noop() {
    let (store, _storage) = store(Arc::new(MockApi::default()), SignupMode::Operational);
    assert!(!store.expire());
    assert_eq!(store.status(), AuthStatus::Idle);
    assert!(store.auth_error().is_none());
}

#[test]
fn expire_clears_session_with_message() {
    let (store, _storage) = store(Arc::new(MockApi::default()), SignupMode::Operational);
    store.set_session("t", &user("u1", Role::Member));

    assert!(store.expire());

    assert!(!store.is_logged_in());
    assert_eq!(store.status(), AuthStatus::Error);
    assert_eq!(store.auth_error().as_deref(), Some(SESSION_EXPIRED_MESSAGE));
}

// =============================================================================
// fetch_user
// =============================================================================

#[tokio::test]
async fn fetch_user_noop_without_token() {
    let api = Arc::new(MockApi::default());
    let (store, _storage) = store(api.clone(), SignupMode::Operational);
    store.fetch_user().await;
    assert_eq!(api.call_count(), 0);
    assert_eq!(store.status(), AuthStatus::Idle);
}

#[tokio::test]
async fn fetch_user_noop_when_user_present() {
    let api = Arc::new(MockApi::default());
    let (store, _storage) = store(api.clone(), SignupMode::Operational);
    store.set_session("t", &user("u1", Role::Member));
    store.fetch_user().await;
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn fetch_user_restores_profile() {
    let api = Arc::new(MockApi::default());
    api.push_profile(Ok(user("u5", Role::Collector)));
    let (store, storage) = store(api, SignupMode::Operational);
    store.set_token(Some("t"));

    store.fetch_user().await;

    assert_eq!(store.user().unwrap().id, "u5");
    assert_eq!(store.status(), AuthStatus::Success);
    assert!(storage.get(USER_KEY).is_some());
}

#[tokio::test]
async fn fetch_user_failure_self_heals_into_logout() {
    let api = Arc::new(MockApi::default());
    api.push_profile(Err(ApiError::Unauthorized { message: None }));
    let (store, storage) = store(api.clone(), SignupMode::Operational);
    store.set_token(Some("stale"));

    store.fetch_user().await;

    assert!(!store.is_logged_in());
    assert!(store.user().is_none());
    assert_eq!(store.status(), AuthStatus::Error);
    assert_eq!(store.auth_error().as_deref(), Some(SESSION_EXPIRED_MESSAGE));
    assert!(storage.get(TOKEN_KEY).is_none());
    assert!(api.bearer().is_none());
}
