//! Typed error detail payloads served by the demo API.

use chrono::{DateTime, Utc};
use problem_details::{ErrorDetails, ErrorDetailsRegistry, RegistryError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcmeErrorDetails {
    pub int_value: i32,
    pub string_value: String,
}

impl ErrorDetails for AcmeErrorDetails {
    const TYPE_TAG: &'static str = "acme-error";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcmeDataErrorDetails {
    pub int_value: i32,
    pub decimal_value: Decimal,
    pub string_value: String,
    pub date_value: DateTime<Utc>,
    pub boolean_value: bool,
}

impl ErrorDetails for AcmeDataErrorDetails {
    const TYPE_TAG: &'static str = "acme-data";
}

impl AcmeDataErrorDetails {
    /// The sample payload returned by the demo endpoints, stamped now.
    #[must_use]
    pub fn sample() -> Self {
        Self {
            int_value: 42,
            decimal_value: Decimal::new(263, 1),
            string_value: "Lorem Ipsum Honda Magna".to_owned(),
            date_value: Utc::now(),
            boolean_value: true,
        }
    }
}

/// Registry with every payload type the service emits.
///
/// # Errors
/// Returns [`RegistryError`] if two payload types share a tag.
pub fn registry() -> Result<ErrorDetailsRegistry, RegistryError> {
    Ok(ErrorDetailsRegistry::builder()
        .register::<AcmeErrorDetails>()?
        .register::<AcmeDataErrorDetails>()?
        .build())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn both_payloads_are_registered() {
        let registry = registry().unwrap();
        assert!(registry.contains("acme-error"));
        assert!(registry.contains("acme-data"));
    }

    #[test]
    fn data_payload_uses_camel_case() {
        let value = serde_json::to_value(AcmeDataErrorDetails::sample()).unwrap();
        assert_eq!(value["intValue"], 42);
        assert_eq!(value["decimalValue"], "26.3");
        assert_eq!(value["booleanValue"], true);
        assert!(value["dateValue"].is_string());
    }
}
