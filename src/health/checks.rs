// src/health/checks.rs
// The individual checks. Each one turns its expected failure modes into data;
// none of them return errors to the aggregator.

use chrono::{DateTime, Utc};
use reqwest::{header::ACCEPT, Client};
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use sysinfo::System;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use super::aggregator::RequestInfo;
use super::format::{format_uptime, pretty_bytes};
use super::report::{
    CheckPayload, CheckResult, DependencyStatus, MemoryStats, OriginEcho, OsStats, Provenance,
    SystemStats,
};
use crate::config::{DeploymentConfig, ProvenanceConfig};

/// Root document of the dependency, e.g. Elasticsearch's `GET /`.
#[derive(Debug, Deserialize)]
struct DependencyInfo {
    name: Option<String>,
    version: Option<DependencyVersion>,
    cluster_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DependencyVersion {
    number: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvenanceError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Error occurred: {0}")]
    Diagnostics(String),

    #[error("{program} did not finish within {elapsed:?}")]
    Timeout { program: String, elapsed: Duration },

    #[error("No provenance command configured")]
    EmptyCommand,
}

pub async fn dependency_status(client: &Client, url: &Url, limit: Duration) -> CheckResult {
    let status = match timeout(limit, fetch_dependency_info(client, url)).await {
        Ok(Ok(info)) => DependencyStatus {
            status: 200,
            name: info.name,
            version: info.version.and_then(|v| v.number),
            cluster: info.cluster_name,
            error: None,
        },
        Ok(Err(e)) => {
            warn!(%url, error = %e, "Dependency check failed");
            DependencyStatus::unreachable(e.to_string())
        }
        Err(_) => {
            warn!(%url, ?limit, "Dependency check timed out");
            DependencyStatus::unreachable("Request timeout")
        }
    };

    CheckResult::Success(CheckPayload::Dependency(status))
}

/// Any decodable body counts as reachable, whatever the HTTP status.
async fn fetch_dependency_info(
    client: &Client,
    url: &Url,
) -> Result<DependencyInfo, reqwest::Error> {
    let response = client
        .get(url.as_str())
        .header(ACCEPT, "application/json")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        debug!(%url, %status, "Dependency answered with a non-success status");
    }

    response.json::<DependencyInfo>().await
}

pub async fn provenance_status(
    config: &ProvenanceConfig,
    deployment: &DeploymentConfig,
) -> CheckResult {
    let mut details = Provenance {
        name: deployment.name.clone(),
        branch: deployment.branch.clone(),
        sha: None,
    };

    match current_revision(config).await {
        Ok(sha) => {
            details.sha = Some(sha);
            CheckResult::Success(CheckPayload::Provenance(details))
        }
        Err((e, sha)) => {
            warn!(error = %e, "Provenance check failed");
            details.sha = sha;
            CheckResult::Failure {
                error: e.to_string(),
                details: Some(CheckPayload::Provenance(details)),
            }
        }
    }
}

/// Run the VCS command and return the trimmed hash from stdout. On failure
/// whatever stdout held is handed back alongside the error.
async fn current_revision(
    config: &ProvenanceConfig,
) -> Result<String, (ProvenanceError, Option<String>)> {
    let (program, args) = config
        .command
        .split_first()
        .ok_or((ProvenanceError::EmptyCommand, None))?;

    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null()).kill_on_drop(true);

    let output = match timeout(config.timeout(), command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err((
                ProvenanceError::Spawn {
                    program: program.clone(),
                    source,
                },
                None,
            ))
        }
        Err(_) => {
            return Err((
                ProvenanceError::Timeout {
                    program: program.clone(),
                    elapsed: config.timeout(),
                },
                None,
            ))
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let sha = (!stdout.is_empty()).then(|| stdout.clone());

    if !output.status.success() {
        return Err((
            ProvenanceError::Exit {
                program: program.clone(),
                status: output.status,
                stderr,
            },
            sha,
        ));
    }

    if !stderr.is_empty() {
        return Err((ProvenanceError::Diagnostics(stderr), sha));
    }

    debug!(sha = %stdout, "Resolved current revision");
    Ok(stdout)
}

/// Echo back the URL the caller used: `referer`, else `origin`, else the
/// `host` header. Unparsable input gives empty parts.
pub fn origin_echo(request: &RequestInfo) -> CheckResult {
    let candidate = request
        .referer
        .clone()
        .or_else(|| request.origin.clone())
        .or_else(|| request.host.as_ref().map(|host| format!("http://{}", host)));

    let echo = candidate
        .and_then(|raw| Url::parse(&raw).ok())
        .map(|url| url_parts(&url))
        .unwrap_or_default();

    CheckResult::Success(CheckPayload::Origin(echo))
}

fn url_parts(url: &Url) -> OriginEcho {
    let host = url.host_str().map(|h| match url.port() {
        Some(port) => format!("{}:{}", h, port),
        None => h.to_string(),
    });

    OriginEcho {
        href: Some(url.as_str().to_string()),
        protocol: Some(format!("{}:", url.scheme())),
        host,
        hostname: url.host_str().map(str::to_string),
        port: url.port(),
        pathname: Some(url.path().to_string()),
        search: url.query().map(|q| format!("?{}", q)),
    }
}

pub fn api_version(version: &str) -> CheckResult {
    CheckResult::Success(CheckPayload::ApiVersion(version.to_string()))
}

pub fn system_stats(started: DateTime<Utc>) -> CheckResult {
    let mut sys = System::new();
    sys.refresh_memory();

    let stats = SystemStats {
        memory: MemoryStats {
            free: pretty_bytes(sys.available_memory()),
            total: pretty_bytes(sys.total_memory()),
        },
        os: OsStats {
            arch: std::env::consts::ARCH.to_string(),
            hostname: System::host_name().unwrap_or_default(),
        },
        uptime: format_uptime(Utc::now() - started),
    };

    CheckResult::Success(CheckPayload::System(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(host: Option<&str>, origin: Option<&str>, referer: Option<&str>) -> RequestInfo {
        RequestInfo {
            host: host.map(str::to_string),
            origin: origin.map(str::to_string),
            referer: referer.map(str::to_string),
        }
    }

    fn origin_of(result: CheckResult) -> OriginEcho {
        match result {
            CheckResult::Success(CheckPayload::Origin(echo)) => echo,
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn referer_wins_over_origin_and_host() {
        let echo = origin_of(origin_echo(&request(
            Some("internal:8080"),
            Some("https://app.example.com"),
            Some("http://example.com/path?x=1"),
        )));

        assert_eq!(echo.href.as_deref(), Some("http://example.com/path?x=1"));
        assert_eq!(echo.protocol.as_deref(), Some("http:"));
        assert_eq!(echo.hostname.as_deref(), Some("example.com"));
        assert_eq!(echo.pathname.as_deref(), Some("/path"));
        assert_eq!(echo.search.as_deref(), Some("?x=1"));
    }

    #[test]
    fn origin_is_used_without_referer() {
        let echo = origin_of(origin_echo(&request(
            Some("internal:8080"),
            Some("https://app.example.com"),
            None,
        )));
        assert_eq!(echo.href.as_deref(), Some("https://app.example.com/"));
    }

    #[test]
    fn host_header_falls_back_to_http() {
        let echo = origin_of(origin_echo(&request(Some("internal:8080"), None, None)));
        assert_eq!(echo.href.as_deref(), Some("http://internal:8080/"));
        assert_eq!(echo.host.as_deref(), Some("internal:8080"));
        assert_eq!(echo.port, Some(8080));
    }

    #[test]
    fn missing_or_garbage_headers_give_empty_parts() {
        assert_eq!(origin_of(origin_echo(&request(None, None, None))), OriginEcho::default());
        assert_eq!(
            origin_of(origin_echo(&request(None, None, Some("not a url")))),
            OriginEcho::default()
        );
    }

    #[test]
    fn api_version_reports_the_configured_version() {
        assert_eq!(
            api_version("3.2.0"),
            CheckResult::Success(CheckPayload::ApiVersion("3.2.0".into()))
        );
    }

    #[test]
    fn system_stats_reports_uptime_since_start() {
        let started = Utc::now() - chrono::Duration::seconds(125);
        match system_stats(started) {
            CheckResult::Success(CheckPayload::System(stats)) => {
                assert!(stats.uptime.starts_with("2 minutes"));
                assert_eq!(stats.os.arch, std::env::consts::ARCH);
                assert!(!stats.memory.total.is_empty());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn provenance_success_carries_deployment_fields() {
        let config = ProvenanceConfig {
            command: vec!["echo".into(), "abc123".into()],
            timeout_ms: 2000,
        };
        let deployment = DeploymentConfig {
            name: Some("catalog-api".into()),
            branch: Some("main".into()),
        };

        let result = provenance_status(&config, &deployment).await;
        assert_eq!(
            result,
            CheckResult::Success(CheckPayload::Provenance(Provenance {
                name: Some("catalog-api".into()),
                branch: Some("main".into()),
                sha: Some("abc123".into()),
            }))
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn provenance_stderr_output_is_a_failure() {
        let config = ProvenanceConfig {
            command: vec!["sh".into(), "-c".into(), "echo deadbeef; echo warning >&2".into()],
            timeout_ms: 2000,
        };

        let result = provenance_status(&config, &DeploymentConfig::default()).await;
        match result {
            CheckResult::Failure { error, details } => {
                assert_eq!(error, "Error occurred: warning");
                assert_eq!(
                    details,
                    Some(CheckPayload::Provenance(Provenance {
                        name: None,
                        branch: None,
                        sha: Some("deadbeef".into()),
                    }))
                );
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn provenance_hung_command_times_out() {
        let config = ProvenanceConfig {
            command: vec!["sleep".into(), "5".into()],
            timeout_ms: 100,
        };

        let result = provenance_status(&config, &DeploymentConfig::default()).await;
        assert!(result.error().unwrap().contains("did not finish"));
    }

    #[tokio::test]
    async fn provenance_missing_program_is_a_failure() {
        let config = ProvenanceConfig {
            command: vec!["definitely-not-a-vcs-binary".into()],
            timeout_ms: 2000,
        };
        let deployment = DeploymentConfig {
            name: Some("catalog-api".into()),
            branch: None,
        };

        let result = provenance_status(&config, &deployment).await;
        assert!(result.error().unwrap().starts_with("Failed to run"));
        assert!(matches!(
            result.payload(),
            Some(CheckPayload::Provenance(Provenance { name: Some(_), .. }))
        ));
    }
}
