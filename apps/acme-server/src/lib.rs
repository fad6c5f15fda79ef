//! Acme demo service: problem details for APIs, error pages for browsers.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod app;
pub mod config;
pub mod errors;
pub mod routes;
pub mod settings;

pub use app::build_app;
pub use config::{AppConfig, ConfigError};
