//! Tests for the bot context over real and in-memory backends.

use linkfix::{BotContext, LinkfixConfig, LinkfixErrorKind, MemoryBackend};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Player {
    name: String,
    hp: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Players {
    players: Vec<Player>,
}

fn config() -> LinkfixConfig {
    LinkfixConfig::from_toml(
        r#"
        [rate_limit]
        max_replies_per_minute = 2

        [cooldowns]
        macro = 30
        "#,
    )
    .unwrap()
}

#[tokio::test]
async fn test_documents_persist_under_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let context = BotContext::new(config().with_data_dir(dir.path())).unwrap();

    let players: Players = context
        .load_document("rpg/players.json", Players::default())
        .await;
    assert!(players.players.is_empty());

    context
        .mutate_document("rpg/players.json", |mut doc: Players| {
            doc.players.push(Player {
                name: "alice".into(),
                hp: 10,
            });
            doc
        })
        .unwrap();
    assert_eq!(context.flush_all().await.unwrap(), 1);

    let text = std::fs::read_to_string(dir.path().join("rpg/players.json")).unwrap();
    let on_disk: Players = serde_json::from_str(&text).unwrap();
    assert_eq!(on_disk.players[0].name, "alice");
}

#[tokio::test]
async fn test_mutate_unloaded_document_fails() {
    let context = BotContext::with_backend(config(), Arc::new(MemoryBackend::new()));
    let err = context
        .mutate_document("requests.json", |doc: Value| doc)
        .unwrap_err();
    assert!(err.as_store().is_some_and(|e| e.is_not_cached()));
}

#[tokio::test]
async fn test_replace_and_atomic_mutation() {
    let backend = MemoryBackend::new();
    let context = BotContext::with_backend(config(), Arc::new(backend.clone()));

    context.load_document("requests.json", json!({"open": []})).await;
    context
        .replace_document("requests.json", json!({"open": ["dark mode"]}))
        .unwrap();
    assert!(context.store().is_dirty("requests.json"));

    let updated = context
        .mutate_document_atomically("requests.json", |mut doc: Value| {
            doc["closed"] = json!(1);
            doc
        })
        .await
        .unwrap();

    // The unflushed replace is carried into the atomic write.
    assert_eq!(updated, json!({"open": ["dark mode"], "closed": 1}));
    assert!(!context.store().is_dirty("requests.json"));
    assert_eq!(backend.get_json("requests.json"), Some(updated));
}

#[tokio::test]
async fn test_load_configured_documents_is_read_only() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("requests.json"), r#"{"open": []}"#).unwrap();
    let context = BotContext::new(config().with_data_dir(dir.path())).unwrap();

    let found = context.load_configured_documents().await;

    assert_eq!(found.len(), 5);
    assert_eq!(found["requests.json"], true);
    assert_eq!(found["image_macros.json"], false);
    assert_eq!(found["rpg/players.json"], false);
    assert!(context.store().is_cached("requests.json"));
    assert!(!dir.path().join("image_macros.json").exists());
    assert!(!dir.path().join("rpg").exists());
    assert_eq!(*context.store().stats().dirty_documents(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reply_limit_and_cooldowns() {
    let context = BotContext::with_backend(config(), Arc::new(MemoryBackend::new()));

    assert!(context.is_allowed("alice"));
    assert!(context.is_allowed("alice"));
    assert!(!context.is_allowed("alice"));

    assert_eq!(
        context.start_cooldown("alice", "macro").unwrap(),
        Duration::from_secs(30)
    );
    assert_eq!(context.check_cooldown("alice", "macro").remaining_seconds(), 30);

    context.set_cooldown("alice", "roll", Duration::from_secs(3));
    tokio::time::advance(Duration::from_secs(3)).await;
    assert!(!context.check_cooldown("alice", "roll").is_on_cooldown());
    assert!(context.check_cooldown("alice", "macro").is_on_cooldown());
}

#[tokio::test]
async fn test_start_cooldown_requires_configured_action() {
    let context = BotContext::with_backend(config(), Arc::new(MemoryBackend::new()));
    let err = context.start_cooldown("alice", "rpg_combat").unwrap_err();
    match err.kind() {
        LinkfixErrorKind::Config(config) => {
            assert_eq!(config.setting.as_deref(), Some("cooldowns.rpg_combat"));
        }
        other => panic!("expected config error, got {other}"),
    }
}

#[tokio::test]
async fn test_shutdown_flushes_and_stops_tasks() {
    let backend = MemoryBackend::new();
    let context = BotContext::with_backend(config(), Arc::new(backend.clone()));
    context.start();
    assert!(context.store().is_running());
    assert!(context.limiter().is_cleanup_running());

    context.load_document("image_macros.json", json!({})).await;
    context
        .mutate_document("image_macros.json", |mut doc: Value| {
            doc["shrug"] = json!("https://example.com/shrug.png");
            doc
        })
        .unwrap();

    assert_eq!(context.shutdown().await.unwrap(), 1);
    assert!(!context.store().is_running());
    assert!(!context.limiter().is_cleanup_running());
    assert_eq!(
        backend.get_json("image_macros.json"),
        Some(json!({"shrug": "https://example.com/shrug.png"}))
    );
}

#[tokio::test]
async fn test_clones_share_state() {
    let context = BotContext::with_backend(config(), Arc::new(MemoryBackend::new()));
    let handler = context.clone();

    handler.load_document("requests.json", json!({"open": []})).await;
    assert!(context.store().is_cached("requests.json"));

    handler.set_cooldown("bob", "macro", Duration::from_secs(60));
    assert!(context.check_cooldown("bob", "macro").is_on_cooldown());
}
