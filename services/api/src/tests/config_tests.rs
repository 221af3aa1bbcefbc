use super::{Config, ConfigError};
use std::collections::HashMap;
use std::time::Duration;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_apply_when_only_upstream_is_set() {
    let config = Config::from_lookup(lookup(&[("UPSTREAM_BASE_URL", "https://backend.test")]))
        .expect("config");

    assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
    assert_eq!(config.upstream_base_url.as_str(), "https://backend.test/");
    assert_eq!(config.upstream_timeout, Duration::from_secs(10));
    assert_eq!(config.advance_delay, Duration::from_millis(300));
    assert_eq!(config.allowed_origin, "http://localhost:3000");
    assert_eq!(config.log_level, tracing::Level::INFO);
}

#[test]
fn missing_upstream_is_reported() {
    let err = Config::from_lookup(lookup(&[])).unwrap_err();
    assert!(matches!(err, ConfigError::MissingVar(var) if var == "UPSTREAM_BASE_URL"));
}

#[test]
fn overrides_are_parsed() {
    let config = Config::from_lookup(lookup(&[
        ("UPSTREAM_BASE_URL", "http://127.0.0.1:8080"),
        ("BIND_ADDRESS", "127.0.0.1:4000"),
        ("ADVANCE_DELAY_MS", "150"),
        ("UPSTREAM_TIMEOUT_SECS", "3"),
        ("RUST_LOG", "debug"),
    ]))
    .expect("config");

    assert_eq!(config.bind_address.port(), 4000);
    assert_eq!(config.advance_delay, Duration::from_millis(150));
    assert_eq!(config.upstream_timeout, Duration::from_secs(3));
    assert_eq!(config.log_level, tracing::Level::DEBUG);
}

#[test]
fn invalid_numbers_name_the_variable() {
    let err = Config::from_lookup(lookup(&[
        ("UPSTREAM_BASE_URL", "http://127.0.0.1:8080"),
        ("ADVANCE_DELAY_MS", "soon"),
    ]))
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "ADVANCE_DELAY_MS"));
}
