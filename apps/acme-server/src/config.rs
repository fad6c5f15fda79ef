//! Application configuration.
//!
//! Layered: 1) defaults -> 2) YAML (if provided) -> 3) env (`ACME__*`) -> 4) CLI overrides

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use problem_details::{OptionsError, ProblemDetailsOptions};
use serde::{Deserialize, Serialize};
use web_core::{LoggingConfig, ServerConfig};

use crate::settings::AcmeSettings;

pub const ENV_PREFIX: &str = "ACME__";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid problem_details section: {0}")]
    InvalidOptions(#[from] OptionsError),
    #[error("failed to render configuration: {0}")]
    Render(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub problem_details: ProblemDetailsOptions,
    pub acme: AcmeSettings,
}

impl AppConfig {
    /// Loads defaults, the optional YAML file and `ACME__` environment
    /// variables, then validates the problem details options.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a layer fails to parse or the options are out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: AppConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        config.problem_details.validate()?;
        Ok(config)
    }

    /// Applies the CLI port override to `server.bind_addr`.
    pub fn apply_port_override(&mut self, port: Option<u16>) {
        let Some(port) = port else {
            return;
        };
        let host = self
            .server
            .bind_addr
            .rsplit_once(':')
            .map_or(self.server.bind_addr.as_str(), |(host, _)| host);
        self.server.bind_addr = format!("{host}:{port}");
    }

    /// Options with `include_detail` resolved for the environment.
    #[must_use]
    pub fn effective_options(&self) -> ProblemDetailsOptions {
        self.problem_details
            .clone()
            .with_detail_default(self.server.environment.is_development())
    }

    /// # Errors
    /// Returns [`ConfigError::Render`] if the YAML serializer fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_saphyr::to_string(self).map_err(|e| ConfigError::Render(e.to_string()))
    }
}
