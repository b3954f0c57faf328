mod common;

use common::InMemoryBackend;
use identry::*;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_engine_keeps_draft_on_disk_until_merged() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = format!(
        r#"
draft_path: "{}"
public_base_url: "https://identry.app/"
preview:
  timeout_secs: 5
"#,
        dir.path().join("draft.json").display()
    );
    let config = parse_config_string(&yaml).unwrap();
    assert_eq!(config.preview.timeout_secs, 5);

    let backend = Arc::new(InMemoryBackend::new());
    let engine = Identry::with_backend(
        config,
        backend.clone(),
        Arc::new(StaticIdentity::authenticated(AccountId::new("acct-1"))),
    )
    .unwrap();

    let draft = match json!({"name": "Aiko", "customId": "aiko"}) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };
    engine.coordinator().save_draft(&draft);
    assert!(dir.path().join("draft.json").exists());

    let profile = engine
        .coordinator()
        .merge_draft_on_authentication()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(profile.custom_id.as_deref(), Some("aiko"));
    assert!(engine.coordinator().load_draft().is_none());
    assert_eq!(engine.public_url("aiko"), "https://identry.app/aiko");
}

#[test]
fn test_invalid_config_is_rejected() {
    assert!(parse_config_string("public_base_url: \"ftp://identry.app\"").is_err());
    assert!(parse_config_string("preview:\n  timeout_secs: 0").is_err());
}
