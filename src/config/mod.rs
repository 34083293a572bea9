// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Load configuration from a file (YAML or JSON), overlay the environment
/// and pin the start time.
///
/// A missing file is not an error: the defaults plus environment are used.
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();

    let mut config = if tokio::fs::try_exists(path).await.unwrap_or(false) {
        let contents = tokio::fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        parse_config(path, &contents)?
    } else {
        tracing::warn!("Config file {} not found, using defaults", path.display());
        Config::default()
    };

    apply_env(&mut config, |key| std::env::var(key).ok())?;

    if config.health.started.is_none() {
        config.health.started = Some(Utc::now());
    }

    config.validate()?;
    Ok(config)
}

fn parse_config(path: &Path, contents: &str) -> Result<Config> {
    let config: Config = if path.extension().and_then(|s| s.to_str()) == Some("yaml")
        || path.extension().and_then(|s| s.to_str()) == Some("yml") {
        serde_yaml::from_str(contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(contents).context("Failed to parse JSON config")?
    };
    Ok(config)
}

/// Overlay deployment values that the container runtime hands us through the
/// environment. `lookup` is `std::env::var` outside of tests.
pub fn apply_env<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup("API_STARTED").filter(|v| !v.trim().is_empty()) {
        let started = DateTime::parse_from_rfc3339(raw.trim())
            .with_context(|| format!("API_STARTED is not an RFC 3339 timestamp: {}", raw))?;
        config.health.started = Some(started.with_timezone(&Utc));
    }

    if let Some(version) = lookup("API_VERSION").filter(|v| !v.trim().is_empty()) {
        config.api.version = Some(version.trim().to_string());
    }

    if let Some(address) = lookup("ES_ADDRESS").filter(|v| !v.trim().is_empty()) {
        config.dependency.address = address;
    }

    if let Some(name) = lookup("GIT_NAME") {
        config.deployment.name = Some(name);
    }

    if let Some(branch) = lookup("GIT_BRANCH") {
        config.deployment.branch = Some(branch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_enable_every_check() {
        let config = Config::default();
        assert_eq!(config.checks, CheckToggles::all());
        assert_eq!(config.dependency.address, DEFAULT_DEPENDENCY_ADDRESS);
        assert_eq!(config.dependency.timeout_ms, 1500);
        assert_eq!(config.health.path, "/health");
        assert_eq!(config.api_version(), env!("CARGO_PKG_VERSION"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
checks:
  system_stats: false
dependency:
  address: "http://es.internal:9200"
"#;
        let config = parse_config(Path::new("config.yaml"), yaml).unwrap();
        assert!(!config.checks.system_stats);
        assert!(config.checks.dependency_status);
        assert!(config.checks.origin_echo);
        assert_eq!(config.dependency.address, "http://es.internal:9200");
        assert_eq!(config.dependency.timeout_ms, 1500);
        assert_eq!(config.provenance.command, vec!["git", "rev-parse", "HEAD"]);
        assert_eq!(config.api.version, None);
    }

    #[test]
    fn api_version_comes_from_file() {
        let yaml = "api:\n  version: \"4.0.0-rc.1\"\n";
        let config = parse_config(Path::new("config.yml"), yaml).unwrap();
        assert_eq!(config.api_version(), "4.0.0-rc.1");
    }

    #[test]
    fn json_is_used_for_other_extensions() {
        let json = r#"{"health": {"path": "/status"}}"#;
        let config = parse_config(Path::new("config.json"), json).unwrap();
        assert_eq!(config.health.path, "/status");
    }

    #[test]
    fn env_overrides_deployment_values() {
        let mut config = Config::default();
        apply_env(
            &mut config,
            env(&[
                ("ES_ADDRESS", "search:9200"),
                ("GIT_NAME", "catalog-api"),
                ("GIT_BRANCH", "main"),
                ("API_STARTED", "2024-05-01T10:00:00Z"),
                ("API_VERSION", "2.3.1"),
            ]),
        )
        .unwrap();

        assert_eq!(config.dependency.address, "search:9200");
        assert_eq!(config.dependency.url().unwrap().as_str(), "http://search:9200/");
        assert_eq!(config.deployment.name.as_deref(), Some("catalog-api"));
        assert_eq!(config.deployment.branch.as_deref(), Some("main"));
        assert_eq!(config.api_version(), "2.3.1");
        assert_eq!(
            config.health.started.unwrap().to_rfc3339(),
            "2024-05-01T10:00:00+00:00"
        );
    }

    #[test]
    fn bad_start_time_is_rejected() {
        let mut config = Config::default();
        assert!(apply_env(&mut config, env(&[("API_STARTED", "yesterday")])).is_err());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.dependency.address = "http://[::1".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dependency.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.provenance.command.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.health.path = "health".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn load_config_reads_file_and_pins_start_time() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "server:\n  listen: \"127.0.0.1:9000\"").unwrap();

        let config = load_config(file.path()).await.unwrap();
        assert_eq!(config.server.listen.port(), 9000);
        assert!(config.health.started.is_some());
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.yaml")).await.unwrap();
        assert_eq!(config.health.path, "/health");
    }
}
