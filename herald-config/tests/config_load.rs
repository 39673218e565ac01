use herald_common::Language;
use herald_common::observability::LogFormat;
use herald_config::{DEFAULT_PACKAGE_INDEX_URL, HeraldConfigLoader};
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
#[serial]
fn test_config_load() {
    let tmp = TempDir::new().unwrap();

    let file_yaml = r#"
database_url: "sqlite://herald.db"
logging:
  format: json
  stderr: false
code_hosting:
  token: "${HERALD_IT_GITHUB_TOKEN}"
  freshness_days: 10
retention:
  window_days: 7
  min_rank: 3
notifier:
  accounts:
    python:
      access_token: "${HERALD_IT_PY_TOKEN}"
    javascript:
      access_token: "${HERALD_IT_UNSET_TOKEN}"
"#;
    let p = write_yaml(&tmp, "herald.yaml", file_yaml);

    temp_env::with_vars(
        [
            ("HERALD_IT_GITHUB_TOKEN", Some("gh-secret")),
            ("HERALD_IT_PY_TOKEN", Some("py-secret")),
            ("HERALD_IT_UNSET_TOKEN", None),
        ],
        || {
            let config = HeraldConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load herald config");

            assert_eq!(config.database_url, "sqlite://herald.db");
            assert_eq!(config.logging.format, LogFormat::Json);
            assert!(!config.logging.stderr);
            assert_eq!(config.code_hosting.token(), Some("gh-secret"));
            assert_eq!(config.code_hosting.freshness_days, 10);
            assert_eq!(config.retention.window_days, 7);
            assert_eq!(config.retention.min_rank, 3);
            assert_eq!(config.notifier.eligibility_days, 1);
            assert_eq!(config.notifier.credentials(Language::Python), Some("py-secret"));
            assert_eq!(config.notifier.credentials(Language::Javascript), None);
            assert_eq!(config.package_index.url, DEFAULT_PACKAGE_INDEX_URL);
            assert_eq!(config.package_index.language, Language::Python);
        },
    );
}

#[test]
#[serial]
fn missing_required_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("absent.yaml");
    assert!(HeraldConfigLoader::new().with_file(missing).load().is_err());
}

#[test]
#[serial]
fn optional_file_falls_back_to_environment() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("absent.yaml");
    temp_env::with_var("HERALD__DATABASE_URL", Some("sqlite://env.db"), || {
        let config = HeraldConfigLoader::new()
            .with_optional_file(&missing)
            .load()
            .expect("env-only config");
        assert_eq!(config.database_url, "sqlite://env.db");
        assert_eq!(config.notifier.releases_per_cycle, 1);
    });
}
