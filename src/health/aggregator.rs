// src/health/aggregator.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hyper::header::{HeaderMap, HeaderName, HOST, ORIGIN, REFERER};
use reqwest::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

use super::checks;
use super::render::Evaluation;
use super::report::{CheckName, CheckResult, ReportState};
use crate::config::{CheckToggles, Config, DeploymentConfig, ProvenanceConfig};

/// The request headers the checks look at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInfo {
    pub host: Option<String>,
    pub origin: Option<String>,
    pub referer: Option<String>,
}

impl RequestInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            host: read(HOST),
            origin: read(ORIGIN),
            referer: read(REFERER),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("Check {check} panicked: {reason}")]
    CheckPanicked { check: CheckName, reason: String },

    #[error("Check {check} was cancelled")]
    CheckCancelled { check: CheckName },
}

/// Runs the enabled checks for one request at a time. Holds only immutable
/// configuration, so a single instance is shared across concurrent requests.
#[derive(Debug, Clone)]
pub struct HealthAggregator {
    checks: CheckToggles,
    started: DateTime<Utc>,
    api_version: Arc<str>,
    dependency_url: Url,
    dependency_timeout: std::time::Duration,
    provenance: Arc<ProvenanceConfig>,
    deployment: Arc<DeploymentConfig>,
    client: Client,
}

impl HealthAggregator {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.dependency.timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            checks: config.checks,
            started: config.started(),
            api_version: Arc::from(config.api_version()),
            dependency_url: config.dependency.url()?,
            dependency_timeout: config.dependency.timeout(),
            provenance: Arc::new(config.provenance.clone()),
            deployment: Arc::new(config.deployment.clone()),
            client,
        })
    }

    pub fn checks(&self) -> &CheckToggles {
        &self.checks
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    /// Run every enabled check concurrently and wait for all of them.
    pub async fn run(&self, request: &RequestInfo) -> Evaluation {
        let tasks: Vec<_> = CheckName::enabled(&self.checks)
            .into_iter()
            .map(|name| (name, self.spawn_check(name, request)))
            .collect();

        debug!(count = tasks.len(), "Launched health checks");

        let (report, join_error) = join_checks(tasks).await;
        let healthy = verdict(&self.checks, join_error.as_ref(), &report);

        info!(
            healthy,
            checks = report.len(),
            "Health check complete"
        );

        Evaluation::new(report, join_error, healthy)
    }

    fn spawn_check(&self, name: CheckName, request: &RequestInfo) -> JoinHandle<CheckResult> {
        match name {
            CheckName::DependencyStatus => {
                let client = self.client.clone();
                let url = self.dependency_url.clone();
                let limit = self.dependency_timeout;
                tokio::spawn(async move { checks::dependency_status(&client, &url, limit).await })
            }
            CheckName::ProvenanceStatus => {
                let provenance = self.provenance.clone();
                let deployment = self.deployment.clone();
                tokio::spawn(async move {
                    checks::provenance_status(&provenance, &deployment).await
                })
            }
            CheckName::OriginEcho => {
                let request = request.clone();
                tokio::spawn(async move { checks::origin_echo(&request) })
            }
            CheckName::ApiVersion => {
                let version = self.api_version.clone();
                tokio::spawn(async move { checks::api_version(&version) })
            }
            CheckName::SystemStats => {
                let started = self.started;
                tokio::spawn(async move { checks::system_stats(started) })
            }
        }
    }
}

/// Wait for every task. Each task owns its own slot; a task that panics
/// leaves its slot empty and becomes the join error.
pub(crate) async fn join_checks(
    tasks: Vec<(CheckName, JoinHandle<CheckResult>)>,
) -> (ReportState, Option<HealthError>) {
    let (names, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
    let results = futures::future::join_all(handles).await;

    let mut report = ReportState::new();
    let mut join_error = None;

    for (name, result) in names.into_iter().zip(results) {
        match result {
            Ok(check_result) => {
                if let Some(e) = check_result.error() {
                    debug!(check = %name, error = %e, "Check reported a failure");
                }
                report.insert(name, check_result);
            }
            Err(e) => {
                error!(check = %name, "Task join error: {}", e);
                let err = if e.is_panic() {
                    HealthError::CheckPanicked {
                        check: name,
                        reason: panic_message(e.into_panic()),
                    }
                } else {
                    HealthError::CheckCancelled { check: name }
                };
                join_error.get_or_insert(err);
            }
        }
    }

    (report, join_error)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Only the dependency check decides health; every other check is
/// informational. A disabled dependency check is never consulted.
pub fn verdict(checks: &CheckToggles, join_error: Option<&HealthError>, report: &ReportState) -> bool {
    if join_error.is_some() {
        return false;
    }

    if checks.dependency_status {
        return report.dependency().map_or(false, |status| status.is_ok());
    }

    true
}
