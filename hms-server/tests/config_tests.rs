//! Configuration system tests

use anyhow::Result;
use hms_server::config::{HmsConfig, Profile};
use std::fs;
use tempfile::TempDir;

fn create_test_config_content() -> String {
    r#"
profile = "development"

[server]
bind_address = "127.0.0.1:8080"
enable_cors = false
frontend_url = "https://hms.example.org"

[database]
postgres_url = "postgresql://myuser:mypassword@db:5432/hms_db"
max_connections = 5
acquire_timeout_secs = 10
run_migrations = false

[redis]
url = "redis://cache:6379/0"
catalog_cache_ttl_secs = 120

[auth]
jwt_algorithm = "HS384"
access_token_minutes = 30
refresh_token_days = 14

[logging]
level = "debug"
json = true
"#
    .to_string()
}

#[tokio::test]
async fn test_config_loading_from_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("hms.toml");
    fs::write(&config_path, create_test_config_content())?;

    let config = HmsConfig::from_file(config_path.to_str().unwrap())?;

    assert_eq!(config.profile, Profile::Development);
    assert_eq!(config.server.bind_address, "127.0.0.1:8080");
    assert!(!config.server.enable_cors);
    assert_eq!(config.database.max_connections, 5);
    assert!(!config.database.run_migrations);
    assert_eq!(config.redis.catalog_cache_ttl_secs, 120);
    assert_eq!(config.auth.jwt_algorithm, "HS384");
    assert_eq!(config.auth.access_token_minutes, 30);
    // Sections left out of the file keep their defaults
    assert_eq!(config.auth.password_reset_hours, 1);
    assert_eq!(config.notifications.default_cooldown_minutes, 5);
    assert!(config.logging.json);
    Ok(())
}

#[tokio::test]
async fn test_out_of_range_values_fail_validation() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("hms.toml");
    fs::write(
        &config_path,
        "[database]\npostgres_url = \"postgresql://a:b@localhost/hms\"\nmax_connections = 0\n",
    )?;

    assert!(HmsConfig::from_file(config_path.to_str().unwrap()).is_err());
    Ok(())
}

#[tokio::test]
async fn test_missing_file_is_an_error() {
    assert!(HmsConfig::from_file("/nonexistent/hms.toml").is_err());
}

#[test]
fn test_compose_mounts_project_into_app() -> Result<()> {
    let compose = fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/../docker-compose.yml"))?;
    let web = compose
        .split("\n  db:")
        .next()
        .unwrap_or_default();
    assert!(web.contains("volumes:"));
    assert!(web.contains("- .:/app"));
    assert!(compose.contains("image: postgres:13"));
    Ok(())
}
