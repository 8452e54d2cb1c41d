use larp_domain::config::{ApiConfig, LoggingConfig, RulesConfig, ServerConfig};
use serde_json::json;
use std::path::PathBuf;

#[test]
fn defaults_are_usable() {
    let server = ServerConfig::default();
    assert_eq!(server.port, 4583);
    assert!(server.ssl.is_none());

    let rules = RulesConfig::default();
    assert_eq!(rules.ruleset_dir, PathBuf::from("rules"));
    assert_eq!(rules.undo_stack_size, 20);
    assert!(!rules.strict);

    let logging = LoggingConfig::default();
    assert_eq!(logging.level, "info");
    assert_eq!(logging.rotation, "daily");
}

#[test]
fn partial_sections_keep_defaults() {
    let raw = json!({
        "server": { "address": "::", "port": 8080 },
        "rules": { "ruleset_dir": "/srv/tempest" }
    });

    let cfg: ApiConfig = serde_json::from_value(raw).expect("config deserialize");
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.rules.ruleset_dir, PathBuf::from("/srv/tempest"));
    assert_eq!(cfg.rules.undo_stack_size, 20);
    assert_eq!(cfg.logging.level, "info");
}

#[test]
fn mutation_does_not_leak_into_clones() {
    let original = ApiConfig::default();
    let mut edited = original.clone();
    edited.rules.undo_stack_size = 3;

    assert_eq!(original.rules.undo_stack_size, 20);
    assert_eq!(edited.rules.undo_stack_size, 3);
}
