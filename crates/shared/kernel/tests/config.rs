use larp_kernel::config::load_config;
use larp_kernel::domain::config::ApiConfig;
use std::fs;

#[test]
fn file_values_fill_sections_and_defaults_remain() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("server.toml");
    fs::write(
        &path,
        "[server]\nport = 9000\n\n[rules]\nruleset_dir = \"/srv/tempest\"\nundo_stack_size = 5\n",
    )?;

    let cfg: ApiConfig = load_config(Some(&path))?;
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.rules.undo_stack_size, 5);
    assert_eq!(cfg.rules.ruleset_dir.to_str(), Some("/srv/tempest"));
    assert_eq!(cfg.logging.level, "info");
    Ok(())
}

#[test]
fn yaml_files_are_accepted() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("server.yaml");
    fs::write(&path, "logging:\n  level: debug\n  json: true\n")?;

    let cfg: ApiConfig = load_config(Some(&path))?;
    assert_eq!(cfg.logging.level, "debug");
    assert!(cfg.logging.json);
    Ok(())
}

#[test]
fn missing_file_is_an_error() {
    let err = load_config::<ApiConfig>(Some("definitely/not/here")).unwrap_err();
    assert_eq!(err.kind(), "config");
}
