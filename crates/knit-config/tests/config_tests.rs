//! Configuration loading tests

use knit_config::{ConfigError, ConfigLoader, ProjectConfig, CONFIG_FILE_NAME};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn create_config_file(dir: &Path, content: &str) -> PathBuf {
    let config_path = dir.join(CONFIG_FILE_NAME);
    fs::write(&config_path, content).unwrap();
    config_path
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_from_file_sets_root() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(
        temp_dir.path(),
        r#"
[package]
name = "cbitcoin"

[build]
tests = "test"
examples = "examples"
"#,
    );

    let config = ConfigLoader::new().without_env().load_from_file(&path).unwrap();

    assert_eq!(config.package_name(), Some("cbitcoin"));
    assert_eq!(config.root(), temp_dir.path());
}

#[test]
fn test_missing_file_reports_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(CONFIG_FILE_NAME);

    let result = ConfigLoader::new().without_env().load_from_file(&path);

    assert!(matches!(result, Err(ConfigError::NotFound(p)) if p == path));
}

#[test]
fn test_parse_error_names_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), "[build\n");

    let err = ConfigLoader::new().without_env().load_from_file(&path).unwrap_err();

    match err {
        ConfigError::TomlParseError { file, .. } => assert_eq!(file, path),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_dependency_tables() {
    let config = ProjectConfig::parse(
        r#"
[dependencies.events]
location = "/usr/local/"
source = "dependencies/sockets/CBLibEventSockets.c"
headers = ["dependencies/sockets/CBLibEventSockets.h"]
"#,
    )
    .unwrap();

    let events = config.dependencies.get("events").unwrap();
    assert_eq!(
        events.headers.clone().unwrap(),
        vec![PathBuf::from("dependencies/sockets/CBLibEventSockets.h")]
    );
    assert!(config.dependencies.get("crypto").is_none());
    assert!(config.dependencies.get("libev").is_none());
}

#[rstest]
#[case("0")]
#[case("2")]
#[case("3")]
#[case("s")]
#[case("fast")]
fn test_valid_optimisation_levels(#[case] level: &str) {
    let content = format!("[build]\noptimisation_level = \"{level}\"\n");
    assert!(ProjectConfig::parse(&content).is_ok());
}

#[rstest]
#[case("4")]
#[case("-O2")]
#[case("")]
fn test_invalid_optimisation_levels(#[case] level: &str) {
    let content = format!("[build]\noptimisation_level = \"{level}\"\n");
    assert!(matches!(
        ProjectConfig::parse(&content),
        Err(ConfigError::InvalidValue { .. })
    ));
}

#[test]
fn test_unknown_dependency_section_rejected() {
    let result = ProjectConfig::parse("[dependencies.zlib]\nlocation = \"/usr\"\n");
    assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
}
