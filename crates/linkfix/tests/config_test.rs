//! Tests for configuration parsing and validation.

use linkfix::{LinkfixConfig, LinkfixErrorKind};
use std::path::Path;
use std::time::Duration;

const BUNDLED: &str = include_str!("../../../linkfix.toml");

#[test]
fn test_bundled_defaults_parse() {
    let config = LinkfixConfig::from_toml(BUNDLED).unwrap();

    assert_eq!(config.store().data_dir(), Path::new("data"));
    assert_eq!(*config.store().store_config().flush_interval_secs(), 30);
    assert_eq!(*config.store().store_config().max_retries(), 3);
    assert_eq!(*config.store().store_config().retry_backoff_ms(), 100);

    assert_eq!(*config.rate_limit().max_replies_per_minute(), 30);
    assert_eq!(config.rate_limit().window(), Duration::from_secs(60));
    assert_eq!(config.rate_limit().cleanup_interval(), Duration::from_secs(60));
    assert_eq!(config.rate_limit().burst().capacity(), 7);
    assert_eq!(config.rate_limit().burst().window(), Duration::from_secs(60));

    assert_eq!(config.cooldown("macro"), Some(Duration::from_secs(30)));
    assert_eq!(config.cooldown("rpg_combat"), Some(Duration::from_secs(60)));
    assert_eq!(config.cooldown("unknown"), None);

    assert_eq!(config.documents().rpg_players(), "rpg/players.json");
    assert!(!*config.logging().json());
}

#[test]
fn test_partial_file_falls_back_to_defaults() {
    let config = LinkfixConfig::from_toml(
        r#"
        [store]
        data_dir = "/var/lib/linkfix"
        flush_interval_secs = 5

        [rate_limit.burst]
        burst_allowance = 0
        "#,
    )
    .unwrap();

    assert_eq!(config.store().data_dir(), Path::new("/var/lib/linkfix"));
    assert_eq!(*config.store().store_config().flush_interval_secs(), 5);
    assert_eq!(*config.store().store_config().max_retries(), 3);
    assert_eq!(*config.rate_limit().burst().max_requests(), 5);
    assert_eq!(config.rate_limit().burst().capacity(), 5);
    assert_eq!(config.documents().macros(), "image_macros.json");
    assert!(config.cooldowns().is_empty());

    let store = config.store().store_config();
    assert_eq!(store.flush_interval(), Duration::from_secs(5));
}

#[test]
fn test_zero_flush_interval_rejected() {
    let err = LinkfixConfig::from_toml("[store]\nflush_interval_secs = 0\n").unwrap_err();
    match err.kind() {
        LinkfixErrorKind::Config(config) => {
            assert_eq!(config.setting.as_deref(), Some("store.flush_interval_secs"));
        }
        other => panic!("expected config error, got {other}"),
    }
}

#[test]
fn test_document_key_escaping_data_dir_rejected() {
    let err = LinkfixConfig::from_toml("[documents]\nmacros = \"../macros.json\"\n").unwrap_err();
    match err.kind() {
        LinkfixErrorKind::Config(config) => {
            assert_eq!(config.setting.as_deref(), Some("documents.macros"));
        }
        other => panic!("expected config error, got {other}"),
    }
}

#[test]
fn test_malformed_toml_is_config_error() {
    let err = LinkfixConfig::from_toml("[store\nflush_interval_secs = ").unwrap_err();
    assert!(matches!(err.kind(), LinkfixErrorKind::Config(_)));
}

#[test]
fn test_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linkfix.toml");
    std::fs::write(&path, "[cooldowns]\nmacro = 10\n").unwrap();

    let config = LinkfixConfig::from_file(&path).unwrap();
    assert_eq!(config.cooldown("macro"), Some(Duration::from_secs(10)));
    assert_eq!(*config.rate_limit().max_replies_per_minute(), 30);

    assert!(LinkfixConfig::from_file(dir.path().join("missing.toml")).is_err());
}
