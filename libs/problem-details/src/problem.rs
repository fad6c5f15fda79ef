//! RFC 9457 Problem Details for HTTP APIs (pure data model).
//!
//! A [`Problem`] always carries exactly one [`ProblemExtension`]: a bounded
//! failure tree, a field-error map, or a typed error detail. The wire layout
//! lives in [`crate::codec`].

use std::collections::BTreeMap;

use http::StatusCode;

use crate::normalize::FailureNode;
use crate::registry::TypedErrorDetail;

/// Content type for Problem Details as per RFC 9457.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// Default problem type URI.
pub const ABOUT_BLANK: &str = "about:blank";

/// Field name -> validation messages. Keys are case-sensitive.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// The extension slot of a [`Problem`].
#[derive(Debug, Clone)]
pub enum ProblemExtension {
    Failure(FailureNode),
    Validation(FieldErrors),
    ErrorDetails(TypedErrorDetail),
}

/// Discriminator written to the `kind` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    Failure,
    Validation,
    ErrorDetails,
}

impl ExtensionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExtensionKind::Failure => "failure",
            ExtensionKind::Validation => "validation",
            ExtensionKind::ErrorDetails => "errorDetails",
        }
    }
}

impl ProblemExtension {
    #[must_use]
    pub fn kind(&self) -> ExtensionKind {
        match self {
            ProblemExtension::Failure(_) => ExtensionKind::Failure,
            ProblemExtension::Validation(_) => ExtensionKind::Validation,
            ProblemExtension::ErrorDetails(_) => ExtensionKind::ErrorDetails,
        }
    }
}

/// RFC 9457 Problem Details for HTTP APIs.
#[derive(Debug, Clone)]
#[must_use]
pub struct Problem {
    /// A URI reference that identifies the problem type.
    pub type_url: String,
    /// A short, human-readable summary of the problem type.
    pub title: String,
    /// The HTTP status code for this occurrence. Any code in 100..=999 is accepted.
    pub status: StatusCode,
    /// A human-readable explanation specific to this occurrence of the problem.
    pub detail: Option<String>,
    /// A URI reference that identifies the specific occurrence of the problem.
    pub instance: Option<String>,
    /// Correlation id of the request that produced the problem.
    pub trace_id: String,
    pub extension: ProblemExtension,
}

impl Problem {
    pub fn new(
        status: StatusCode,
        title: impl Into<String>,
        trace_id: impl Into<String>,
        extension: ProblemExtension,
    ) -> Self {
        Self {
            type_url: ABOUT_BLANK.to_owned(),
            title: title.into(),
            status,
            detail: None,
            instance: None,
            trace_id: trace_id.into(),
            extension,
        }
    }

    pub fn with_type(mut self, type_url: impl Into<String>) -> Self {
        self.type_url = type_url.into();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_instance(mut self, uri: impl Into<String>) -> Self {
        self.instance = Some(uri.into());
        self
    }

    /// Sets `instance` unless the handler already chose one.
    pub fn with_default_instance(mut self, uri: impl Into<String>) -> Self {
        self.instance.get_or_insert_with(|| uri.into());
        self
    }

    #[must_use]
    pub fn failure(&self) -> Option<&FailureNode> {
        match &self.extension {
            ProblemExtension::Failure(node) => Some(node),
            _ => None,
        }
    }

    #[must_use]
    pub fn validation_errors(&self) -> Option<&FieldErrors> {
        match &self.extension {
            ProblemExtension::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    #[must_use]
    pub fn error_details(&self) -> Option<&TypedErrorDetail> {
        match &self.extension {
            ProblemExtension::ErrorDetails(detail) => Some(detail),
            _ => None,
        }
    }
}

/// Axum integration: a returned `Problem` travels to the dispatch stage in the
/// response extensions and is encoded there with the shared codec.
#[cfg(feature = "axum")]
impl axum::response::IntoResponse for Problem {
    fn into_response(self) -> axum::response::Response {
        let mut resp = self.status.into_response();
        resp.extensions_mut().insert(self);
        resp
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn problem_builder_pattern() {
        let mut errors = FieldErrors::new();
        errors.insert("email".to_owned(), vec!["Email is required".to_owned()]);

        let p = Problem::new(
            StatusCode::BAD_REQUEST,
            "Validation Failed",
            "req-456",
            ProblemExtension::Validation(errors),
        )
        .with_instance("/users/123")
        .with_default_instance("/ignored")
        .with_detail("Input validation errors");

        assert_eq!(p.status, StatusCode::BAD_REQUEST);
        assert_eq!(p.type_url, ABOUT_BLANK);
        assert_eq!(p.instance.as_deref(), Some("/users/123"));
        assert_eq!(p.trace_id, "req-456");
        assert_eq!(p.extension.kind(), ExtensionKind::Validation);
        assert_eq!(p.validation_errors().map(FieldErrors::len), Some(1));
        assert!(p.failure().is_none());
        assert!(p.error_details().is_none());
    }

    #[cfg(feature = "axum")]
    #[test]
    fn into_response_defers_encoding_to_the_dispatch_stage() {
        use axum::response::IntoResponse;

        let p = Problem::new(
            StatusCode::IM_A_TEAPOT,
            "I'm a teapot",
            "trace",
            ProblemExtension::Validation(FieldErrors::new()),
        );
        let resp = p.into_response();
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
        assert!(resp.extensions().get::<Problem>().is_some());
    }
}
