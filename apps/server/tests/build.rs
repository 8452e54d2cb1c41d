use larp::domain::config::{ApiConfig, SslConfig};
use larp_server::Server;
use std::path::PathBuf;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../crates/features/character/tests/fixtures/tempest")
}

#[test]
fn builds_with_every_slice() {
    let server = Server::builder().ruleset_dir(fixture()).port(0).build().expect("server should build");
    assert_eq!(server.state().slice_names(), vec!["campaigns", "characters"]);
    assert_eq!(server.state().config.server.port, 0);
}

#[test]
fn missing_ruleset_stops_startup() {
    let dir = tempfile::tempdir().unwrap();
    let err = Server::builder().ruleset_dir(dir.path()).build().unwrap_err();
    assert!(format!("{err:#}").contains("bootstrap"), "{err:#}");
}

#[test]
fn missing_certificates_stop_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ApiConfig::default();
    config.rules.ruleset_dir = fixture();
    config.server.ssl = Some(SslConfig { cert: dir.path().join("cert.pem"), key: dir.path().join("key.pem") });

    let err = Server::builder().config(config).build().unwrap_err();
    assert!(err.to_string().contains("SSL certificate not found"), "{err}");
}
