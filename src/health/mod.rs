// src/health/mod.rs
mod aggregator;
mod checks;
mod format;
mod render;
mod report;

pub use aggregator::{verdict, HealthAggregator, HealthError, RequestInfo};
pub use checks::ProvenanceError;
pub use format::{format_uptime, pretty_bytes};
pub use render::{json_response, Evaluation, GitPayload, HealthPayload};
pub use report::{
    CheckName, CheckPayload, CheckResult, DependencyStatus, MemoryStats, OriginEcho, OsStats,
    Provenance, ReportState, SystemStats,
};
