use super::*;
use serial_test::serial;
use std::io::Write;

fn write_fixture(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
#[serial]
fn loads_base_document_with_defaults() {
    std::env::remove_var(ACTIVE_OVERLAY_VAR);
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "fns.yaml", "name: orders\n");

    let config = Config::load(&path).unwrap();
    assert_eq!(config.name, "orders");
    assert_eq!(config.log.level, "info");
    assert_eq!(config.transport.shutdown_deadline_ms, 5_000);
    assert!(!config.cluster.node_id.is_empty());
}

#[test]
#[serial]
fn json_document_is_recognized_by_extension() {
    std::env::remove_var(ACTIVE_OVERLAY_VAR);
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "fns.json", r#"{"name": "orders"}"#);

    let config = Config::load(&path).unwrap();
    assert_eq!(config.name, "orders");
}

#[test]
#[serial]
fn active_overlay_merges_over_base() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_fixture(dir.path(), "fns.yaml", "name: orders\ncluster:\n  max_workers: 4\n");
    write_fixture(dir.path(), "fns-local.yaml", "cluster:\n  max_workers: 2\n");

    std::env::set_var(ACTIVE_OVERLAY_VAR, "local");
    let config = Config::load(&base).unwrap();
    std::env::remove_var(ACTIVE_OVERLAY_VAR);

    assert_eq!(config.name, "orders");
    assert_eq!(config.cluster.max_workers, 2);
}

#[test]
#[serial]
fn missing_overlay_file_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_fixture(dir.path(), "fns.yaml", "name: orders\n");

    std::env::set_var(ACTIVE_OVERLAY_VAR, "production");
    let config = Config::load(&base).unwrap();
    std::env::remove_var(ACTIVE_OVERLAY_VAR);

    assert_eq!(config.name, "orders");
}

#[test]
#[serial]
fn services_section_is_opaque_json() {
    std::env::remove_var(ACTIVE_OVERLAY_VAR);
    let dir = tempfile::tempdir().unwrap();
    let path =
        write_fixture(dir.path(), "fns.yaml", "name: orders\nservices:\n  billing:\n    retries: 3\n");

    let config = Config::load(&path).unwrap();
    assert_eq!(config.services["billing"]["retries"], serde_json::json!(3));
}
