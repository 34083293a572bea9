// src/health/render.rs
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use super::aggregator::HealthError;
use super::report::{CheckName, DependencyStatus, ReportState, SystemStats};

/// Body of the health response before overrides are applied.
#[derive(Debug, Serialize)]
pub struct HealthPayload<'a> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'a str>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elastic: Option<&'a DependencyStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a SystemStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct GitPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one run of the aggregator. Owned by a single request and
/// rendered into a response at most once.
#[derive(Debug)]
pub struct Evaluation {
    report: ReportState,
    join_error: Option<HealthError>,
    healthy: bool,
    sent: bool,
}

impl Evaluation {
    pub(crate) fn new(report: ReportState, join_error: Option<HealthError>, healthy: bool) -> Self {
        Self {
            report,
            join_error,
            healthy,
            sent: false,
        }
    }

    pub fn report(&self) -> &ReportState {
        &self.report
    }

    pub fn join_error(&self) -> Option<&HealthError> {
        self.join_error.as_ref()
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub fn status(&self) -> StatusCode {
        if self.healthy {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    pub fn payload(&self) -> HealthPayload<'_> {
        let git = self
            .report
            .get(CheckName::ProvenanceStatus)
            .map(|result| {
                let details = self.report.provenance();
                GitPayload {
                    name: details.and_then(|d| d.name.clone()),
                    branch: details.and_then(|d| d.branch.clone()),
                    sha: details.and_then(|d| d.sha.clone()),
                    error: result.error().map(str::to_string),
                }
            });

        let name = self
            .report
            .provenance()
            .and_then(|p| p.name.as_deref())
            .unwrap_or("");

        HealthPayload {
            ok: self.healthy,
            version: self.report.api_version(),
            message: format!(
                "{} {}.",
                name,
                if self.healthy { "healthy" } else { "unhealthy" }
            ),
            elastic: self.report.dependency(),
            git,
            system: self.report.system(),
            endpoint: self.report.origin().and_then(|o| o.href.as_deref()),
        }
    }

    /// The default payload with `overrides` merged over its top-level keys.
    /// Anything other than a JSON object is ignored.
    pub fn body(&self, overrides: Option<Value>) -> Value {
        let mut body = match serde_json::to_value(self.payload()) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to serialize health payload: {}", e);
                serde_json::json!({ "ok": false })
            }
        };

        if let (Value::Object(target), Some(Value::Object(extra))) = (&mut body, overrides) {
            target.extend(extra);
        }

        body
    }

    /// Build the HTTP response. Only the first call produces one; later calls
    /// return `None`.
    pub fn render(&mut self, overrides: Option<Value>) -> Option<Response<Body>> {
        if self.sent {
            debug!("Health response already sent, skipping render");
            return None;
        }
        self.sent = true;

        Some(json_response(self.status(), &self.body(overrides)))
    }
}

pub fn json_response(status: StatusCode, body: &Value) -> Response<Body> {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(e) => {
            error!("Failed to encode response body: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, b"{\"ok\":false}".to_vec())
        }
    };

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
