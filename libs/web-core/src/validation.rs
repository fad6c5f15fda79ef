//! Configuration validators.

/// Validates a bound settings section.
pub trait ConfigurationValidator: Send + Sync {
    /// One message per violated rule, empty when valid.
    fn validate(&self) -> Vec<String>;

    /// One `key: value` line per setting.
    fn describe_all(&self) -> Vec<String>;

    fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Groups of lines for settings diagnostics pages.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SettingsGroup {
    pub name: String,
    pub values: Vec<String>,
}

impl SettingsGroup {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// `Validation Errors` (only when there are any) followed by `All Settings`.
#[must_use]
pub fn diagnostic_groups(validator: &dyn ConfigurationValidator) -> Vec<SettingsGroup> {
    let mut groups = Vec::with_capacity(2);
    let errors = validator.validate();
    if !errors.is_empty() {
        groups.push(SettingsGroup::new("Validation Errors", errors));
    }
    groups.push(SettingsGroup::new("All Settings", validator.describe_all()));
    groups
}
