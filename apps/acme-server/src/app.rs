//! Wires configuration, routes and the middleware stack together.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use problem_details::{ProblemCodec, ProblemFactory};
use web_core::{
    ApplicationInfoHealthCheck, ConfigurationHealthCheck, DEFAULT_STAGES, ErrorDispatchState,
    HealthRegistry, StackContext, apply_stack, health_routes,
};

use crate::config::AppConfig;
use crate::errors;
use crate::routes::{self, AppState};
use crate::settings::AcmeSettingsValidator;

pub const APPLICATION_NAME: &str = env!("CARGO_PKG_NAME");
pub const APPLICATION_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds the full service with the default stage order.
///
/// # Errors
/// Fails when the error detail registry or the stage order is invalid.
pub fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let options = config.effective_options();
    let codec = ProblemCodec::new(errors::registry().context("error detail registry")?)
        .pretty(options.pretty);
    let factory = ProblemFactory::new(Arc::new(options));
    let validator = Arc::new(AcmeSettingsValidator::new(config.acme.clone()));

    let health = HealthRegistry::new()
        .with_check(ConfigurationHealthCheck::new(
            "configuration",
            validator.clone(),
        ))
        .with_check(ApplicationInfoHealthCheck::new(
            "application",
            APPLICATION_NAME,
            APPLICATION_VERSION,
        ));

    let router = routes::router(AppState {
        factory: factory.clone(),
        validator,
    })
    .merge(health_routes(health));

    let ctx = StackContext::new(
        ErrorDispatchState::new(factory, codec),
        config.server.request_timeout,
    );
    apply_stack(router, DEFAULT_STAGES, &ctx).context("middleware stack")
}
