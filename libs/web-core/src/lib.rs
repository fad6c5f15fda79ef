//! HTTP plumbing shared by the Acme services
//!
//! - correlation ids (`x-request-id`, [`CorrelationId`])
//! - the error dispatch stage and the error page
//! - the declared middleware stack ([`pipeline`])
//! - configuration validators and health checks
//! - server/logging configuration and subscriber setup
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod correlation;
pub mod dispatch;
pub mod failure;
pub mod health;
pub mod humantime_serde;
pub mod logging;
pub mod negotiation;
pub mod page;
pub mod pipeline;
pub mod validation;

pub use config::{Environment, LogFormat, LoggingConfig, ServerConfig};
pub use correlation::CorrelationId;
pub use dispatch::{DispatchOutcome, ErrorDispatchState, error_dispatch_middleware};
pub use failure::{HandlerResult, Unhandled};
pub use health::{
    ApplicationInfoHealthCheck, ConfigurationHealthCheck, HealthCheck, HealthCheckResult,
    HealthRegistry, HealthReport, HealthStatus, health_routes,
};
pub use negotiation::{RepresentationFamily, negotiate};
pub use pipeline::{DEFAULT_STAGES, Stage, StackContext, StageOrderError, apply_stack};
pub use validation::{ConfigurationValidator, SettingsGroup, diagnostic_groups};
