//! The `acme` settings section and its validator.

use serde::{Deserialize, Serialize};
use web_core::ConfigurationValidator;

/// Accepted range for [`AcmeSettings::font_size`].
pub const FONT_SIZE_RANGE: std::ops::RangeInclusive<u32> = 8..=72;

/// Demo presentation settings bound from the `acme` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcmeSettings {
    pub background_color: String,
    pub font_color: String,
    pub font_size: u32,
    pub message: String,
    pub something_important: String,
}

impl Default for AcmeSettings {
    fn default() -> Self {
        Self {
            background_color: "white".to_owned(),
            font_color: "black".to_owned(),
            font_size: 14,
            message: "Hello from Acme".to_owned(),
            something_important: "keep calm".to_owned(),
        }
    }
}

impl AcmeSettings {
    /// `Name: value` lines shown on the settings endpoint and the home page.
    #[must_use]
    pub fn summary(&self) -> Vec<String> {
        vec![
            format!("BackgroundColor: {}", self.background_color),
            format!("FontColor: {}", self.font_color),
            format!("FontSize: {}", self.font_size),
            format!("Message: {}", self.message),
            format!("SomethingImportant: {}", self.something_important),
        ]
    }
}

/// Checks the bound [`AcmeSettings`] without failing startup.
#[derive(Debug, Clone)]
pub struct AcmeSettingsValidator {
    settings: AcmeSettings,
}

impl AcmeSettingsValidator {
    #[must_use]
    pub fn new(settings: AcmeSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &AcmeSettings {
        &self.settings
    }
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

impl ConfigurationValidator for AcmeSettingsValidator {
    fn validate(&self) -> Vec<String> {
        let s = &self.settings;
        let mut errors = Vec::new();
        if blank(&s.background_color) {
            errors.push("acme.background_color is required".to_owned());
        }
        if blank(&s.font_color) {
            errors.push("acme.font_color is required".to_owned());
        } else if s.font_color.eq_ignore_ascii_case(&s.background_color) {
            errors.push("acme.font_color must differ from acme.background_color".to_owned());
        }
        if !FONT_SIZE_RANGE.contains(&s.font_size) {
            errors.push(format!(
                "acme.font_size must be within {}..={}, got {}",
                FONT_SIZE_RANGE.start(),
                FONT_SIZE_RANGE.end(),
                s.font_size
            ));
        }
        if blank(&s.message) {
            errors.push("acme.message is required".to_owned());
        }
        if blank(&s.something_important) {
            errors.push("acme.something_important is required".to_owned());
        }
        errors
    }

    fn describe_all(&self) -> Vec<String> {
        let s = &self.settings;
        vec![
            format!("acme.background_color: {}", s.background_color),
            format!("acme.font_color: {}", s.font_color),
            format!("acme.font_size: {}", s.font_size),
            format!("acme.message: {}", s.message),
            format!("acme.something_important: {}", s.something_important),
        ]
    }
}
