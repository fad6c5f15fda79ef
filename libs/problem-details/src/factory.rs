//! Builds [`Problem`] payloads from the three failure shapes.

use std::sync::Arc;

use http::StatusCode;
use uuid::Uuid;

use crate::failure::FailureGraph;
use crate::normalize::normalize;
use crate::options::ProblemDetailsOptions;
use crate::problem::{FieldErrors, Problem, ProblemExtension};
use crate::registry::TypedErrorDetail;

pub const INTERNAL_SERVER_ERROR_TITLE: &str = "Internal Server Error";
pub const VALIDATION_TITLE: &str = "One or more validation errors occurred.";

/// Stateless apart from the shared, immutable options.
#[derive(Debug, Clone, Default)]
pub struct ProblemFactory {
    options: Arc<ProblemDetailsOptions>,
}

impl ProblemFactory {
    #[must_use]
    pub fn new(options: Arc<ProblemDetailsOptions>) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &ProblemDetailsOptions {
        &self.options
    }

    /// 500 with the bounded failure tree. `detail` carries the root message
    /// only when the options allow it.
    pub fn from_unexpected_failure(&self, failure: &FailureGraph, correlation_id: &str) -> Problem {
        let tree = normalize(failure, &self.options);
        let problem = Problem::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            INTERNAL_SERVER_ERROR_TITLE,
            ensure_correlation_id(correlation_id),
            ProblemExtension::Failure(tree),
        );
        if self.options.detail_enabled() {
            problem.with_detail(failure.root_failure().message.clone())
        } else {
            problem
        }
    }

    /// 400 with every field and message kept as given.
    #[allow(clippy::unused_self)]
    pub fn from_validation_errors(&self, errors: FieldErrors, correlation_id: &str) -> Problem {
        Problem::new(
            StatusCode::BAD_REQUEST,
            VALIDATION_TITLE,
            ensure_correlation_id(correlation_id),
            ProblemExtension::Validation(errors),
        )
    }

    /// Any status is accepted as is.
    #[allow(clippy::unused_self)]
    pub fn from_typed_error_detail(
        &self,
        detail: TypedErrorDetail,
        status: StatusCode,
        title: impl Into<String>,
        correlation_id: &str,
    ) -> Problem {
        Problem::new(
            status,
            title,
            ensure_correlation_id(correlation_id),
            ProblemExtension::ErrorDetails(detail),
        )
    }

    /// 400 with a caller title and detail and no field errors.
    #[allow(clippy::unused_self)]
    pub fn bad_request(
        &self,
        title: impl Into<String>,
        detail: impl Into<String>,
        correlation_id: &str,
    ) -> Problem {
        Problem::new(
            StatusCode::BAD_REQUEST,
            title,
            ensure_correlation_id(correlation_id),
            ProblemExtension::Validation(FieldErrors::new()),
        )
        .with_detail(detail)
    }
}

fn ensure_correlation_id(correlation_id: &str) -> String {
    if correlation_id.trim().is_empty() {
        let generated = Uuid::now_v7().to_string();
        tracing::debug!(correlation_id = %generated, "generated missing correlation id");
        generated
    } else {
        correlation_id.to_owned()
    }
}
