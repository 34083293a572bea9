// src/health/report.rs
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::CheckToggles;

/// The fixed set of checks a report can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    DependencyStatus,
    ProvenanceStatus,
    OriginEcho,
    ApiVersion,
    SystemStats,
}

impl CheckName {
    pub const ALL: [CheckName; 5] = [
        CheckName::DependencyStatus,
        CheckName::ProvenanceStatus,
        CheckName::OriginEcho,
        CheckName::ApiVersion,
        CheckName::SystemStats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckName::DependencyStatus => "dependency_status",
            CheckName::ProvenanceStatus => "provenance_status",
            CheckName::OriginEcho => "origin_echo",
            CheckName::ApiVersion => "api_version",
            CheckName::SystemStats => "system_stats",
        }
    }

    pub fn is_enabled(&self, toggles: &CheckToggles) -> bool {
        match self {
            CheckName::DependencyStatus => toggles.dependency_status,
            CheckName::ProvenanceStatus => toggles.provenance_status,
            CheckName::OriginEcho => toggles.origin_echo,
            CheckName::ApiVersion => toggles.api_version,
            CheckName::SystemStats => toggles.system_stats,
        }
    }

    pub fn enabled(toggles: &CheckToggles) -> Vec<CheckName> {
        Self::ALL
            .iter()
            .copied()
            .filter(|name| name.is_enabled(toggles))
            .collect()
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of the upstream dependency. Unreachable dependencies are reported
/// here with `status: 500` rather than as a failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyStatus {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DependencyStatus {
    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            status: 500,
            name: None,
            version: None,
            cluster: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.status == 200
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Provenance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Components of the URL the caller reached us through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OriginEcho {
    pub href: Option<String>,
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub pathname: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub free: String,
    pub total: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsStats {
    pub arch: String,
    pub hostname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemStats {
    pub memory: MemoryStats,
    pub os: OsStats,
    pub uptime: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CheckPayload {
    Dependency(DependencyStatus),
    Provenance(Provenance),
    Origin(OriginEcho),
    ApiVersion(String),
    System(SystemStats),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult {
    Success(CheckPayload),
    /// The check failed; `details` holds whatever it still managed to compute.
    Failure {
        error: String,
        details: Option<CheckPayload>,
    },
}

impl CheckResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CheckResult::Success(_))
    }

    pub fn payload(&self) -> Option<&CheckPayload> {
        match self {
            CheckResult::Success(payload) => Some(payload),
            CheckResult::Failure { details, .. } => details.as_ref(),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CheckResult::Success(_) => None,
            CheckResult::Failure { error, .. } => Some(error),
        }
    }
}

/// Results of a single run, keyed by check. Built fresh for every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportState {
    entries: BTreeMap<CheckName, CheckResult>,
}

impl ReportState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: CheckName, result: CheckResult) {
        self.entries.insert(name, result);
    }

    pub fn get(&self, name: CheckName) -> Option<&CheckResult> {
        self.entries.get(&name)
    }

    pub fn contains(&self, name: CheckName) -> bool {
        self.entries.contains_key(&name)
    }

    pub fn names(&self) -> impl Iterator<Item = CheckName> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dependency(&self) -> Option<&DependencyStatus> {
        match self.get(CheckName::DependencyStatus)?.payload()? {
            CheckPayload::Dependency(status) => Some(status),
            _ => None,
        }
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        match self.get(CheckName::ProvenanceStatus)?.payload()? {
            CheckPayload::Provenance(provenance) => Some(provenance),
            _ => None,
        }
    }

    pub fn origin(&self) -> Option<&OriginEcho> {
        match self.get(CheckName::OriginEcho)?.payload()? {
            CheckPayload::Origin(origin) => Some(origin),
            _ => None,
        }
    }

    pub fn api_version(&self) -> Option<&str> {
        match self.get(CheckName::ApiVersion)?.payload()? {
            CheckPayload::ApiVersion(version) => Some(version),
            _ => None,
        }
    }

    pub fn system(&self) -> Option<&SystemStats> {
        match self.get(CheckName::SystemStats)?.payload()? {
            CheckPayload::System(stats) => Some(stats),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_follows_toggles() {
        let mut toggles = CheckToggles::all();
        toggles.origin_echo = false;
        toggles.system_stats = false;

        assert_eq!(
            CheckName::enabled(&toggles),
            vec![
                CheckName::DependencyStatus,
                CheckName::ProvenanceStatus,
                CheckName::ApiVersion
            ]
        );
        assert!(CheckName::enabled(&CheckToggles::none()).is_empty());
    }

    #[test]
    fn failure_details_are_still_reachable() {
        let mut report = ReportState::new();
        report.insert(
            CheckName::ProvenanceStatus,
            CheckResult::Failure {
                error: "git exited with status 128".to_string(),
                details: Some(CheckPayload::Provenance(Provenance {
                    name: Some("catalog-api".to_string()),
                    branch: None,
                    sha: None,
                })),
            },
        );

        let result = report.get(CheckName::ProvenanceStatus).unwrap();
        assert!(!result.is_success());
        assert_eq!(result.error(), Some("git exited with status 128"));
        assert_eq!(
            report.provenance().and_then(|p| p.name.as_deref()),
            Some("catalog-api")
        );
    }

    #[test]
    fn dependency_status_ok_requires_200_and_no_error() {
        let mut status = DependencyStatus::unreachable("connection refused");
        assert!(!status.is_ok());

        status.status = 200;
        assert!(!status.is_ok());

        status.error = None;
        assert!(status.is_ok());
    }
}
