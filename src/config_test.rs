use std::collections::HashMap;

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn from_lookup_defaults() {
    let cfg = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
    assert_eq!(cfg, ClientConfig::default());
    assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
    assert_eq!(cfg.signup_mode, SignupMode::Operational);
    assert!(!cfg.dev_bypass);
    assert_eq!(cfg.storage_path, PathBuf::from(DEFAULT_STORAGE_PATH));
    assert_eq!(
        cfg.timeouts,
        Timeouts { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    );
}

#[test]
fn from_lookup_parses_overrides() {
    let cfg = ClientConfig::from_lookup(lookup_from(&[
        ("IQUB_API_BASE_URL", "https://iqub.example.test/api/"),
        ("IQUB_ALPHA_MODE", "true"),
        ("IQUB_DEV_BYPASS", "1"),
        ("IQUB_STORAGE_PATH", "/tmp/iqub.json"),
        ("IQUB_REQUEST_TIMEOUT_SECS", "5"),
        ("IQUB_CONNECT_TIMEOUT_SECS", "2"),
    ]))
    .unwrap();
    assert_eq!(cfg.api_base_url, "https://iqub.example.test/api");
    assert_eq!(cfg.signup_mode, SignupMode::Simulation);
    assert!(cfg.dev_bypass);
    assert_eq!(cfg.storage_path, PathBuf::from("/tmp/iqub.json"));
    assert_eq!(cfg.timeouts, Timeouts { request_secs: 5, connect_secs: 2 });
}

#[test]
fn alpha_mode_false_is_operational() {
    let cfg = ClientConfig::from_lookup(lookup_from(&[("IQUB_ALPHA_MODE", "false")])).unwrap();
    assert_eq!(cfg.signup_mode, SignupMode::Operational);
}

#[test]
fn invalid_flag_errors() {
    let err = ClientConfig::from_lookup(lookup_from(&[("IQUB_ALPHA_MODE", "yes please")]))
        .unwrap_err()
        .to_string();
    assert!(err.contains("IQUB_ALPHA_MODE"));
}

#[test]
fn invalid_timeout_errors() {
    let err = ClientConfig::from_lookup(lookup_from(&[("IQUB_REQUEST_TIMEOUT_SECS", "soon")]))
        .unwrap_err()
        .to_string();
    assert!(err.contains("IQUB_REQUEST_TIMEOUT_SECS"));
    assert!(err.contains("soon"));
}
