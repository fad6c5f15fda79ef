//! Health checks and the `/hc`, `/mon` and `/ping` endpoints.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::validation::ConfigurationValidator;

/// Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Degraded => "Degraded",
            HealthStatus::Unhealthy => "Unhealthy",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
}

impl HealthCheckResult {
    pub fn healthy(description: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            description: Some(description.into()),
            data: BTreeMap::new(),
        }
    }

    pub fn unhealthy(description: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            description: Some(description.into()),
            data: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self) -> HealthCheckResult;
}

/// Result of running every registered check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub entries: BTreeMap<String, HealthCheckResult>,
}

/// Checks run on demand, in registration order.
#[derive(Clone, Default)]
pub struct HealthRegistry {
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_check(mut self, check: impl HealthCheck + 'static) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    #[must_use]
    pub fn run(&self) -> HealthReport {
        let mut status = HealthStatus::Healthy;
        let mut entries = BTreeMap::new();
        for check in &self.checks {
            let result = check.check();
            if result.status != HealthStatus::Healthy {
                tracing::warn!(
                    check = check.name(),
                    status = %result.status,
                    "health check failed"
                );
            }
            status = status.max(result.status);
            entries.insert(check.name().to_owned(), result);
        }
        HealthReport { status, entries }
    }
}

impl fmt::Debug for HealthRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.checks.iter().map(|c| c.name()).collect();
        f.debug_struct("HealthRegistry").field("checks", &names).finish()
    }
}

/// Unhealthy with `error-1..error-N` data when the validator reports errors.
pub struct ConfigurationHealthCheck {
    name: String,
    validator: Arc<dyn ConfigurationValidator>,
}

impl ConfigurationHealthCheck {
    pub fn new(name: impl Into<String>, validator: Arc<dyn ConfigurationValidator>) -> Self {
        Self {
            name: name.into(),
            validator,
        }
    }
}

impl HealthCheck for ConfigurationHealthCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> HealthCheckResult {
        let errors = self.validator.validate();
        if errors.is_empty() {
            return HealthCheckResult::healthy("Application configuration is valid!");
        }
        errors.into_iter().enumerate().fold(
            HealthCheckResult::unhealthy("Application configuration is invalid!"),
            |result, (i, error)| result.with_data(format!("error-{}", i + 1), error),
        )
    }
}

/// Always healthy; reports the application name and version.
pub struct ApplicationInfoHealthCheck {
    name: String,
    application: String,
    version: String,
}

impl ApplicationInfoHealthCheck {
    pub fn new(
        name: impl Into<String>,
        application: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            application: application.into(),
            version: version.into(),
        }
    }
}

impl HealthCheck for ApplicationInfoHealthCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy(format!("{} {}", self.application, self.version))
            .with_data("application", self.application.as_str())
            .with_data("version", self.version.as_str())
    }
}

/// `/hc` (plain status, 503 when unhealthy), `/mon` (JSON report) and `/ping`.
pub fn health_routes(registry: HealthRegistry) -> Router {
    Router::new()
        .route("/hc", get(health_status))
        .route("/mon", get(health_report))
        .route("/ping", get(|| async { "pong" }))
        .with_state(registry)
}

fn status_code(status: HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn health_status(State(registry): State<HealthRegistry>) -> Response {
    let report = registry.run();
    (status_code(report.status), report.status.to_string()).into_response()
}

async fn health_report(State(registry): State<HealthRegistry>) -> Response {
    let report = registry.run();
    (status_code(report.status), Json(report)).into_response()
}
