//! HTTP routes of the Acme service.

use std::sync::Arc;

use axum::Router;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use problem_details::{FieldErrors, Problem, ProblemFactory};
use web_core::{CorrelationId, Unhandled};

use crate::settings::AcmeSettingsValidator;

pub mod data;
pub mod data_v2;
pub mod pages;
pub mod settings;

/// Shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub factory: ProblemFactory,
    pub validator: Arc<AcmeSettingsValidator>,
}

/// What a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    /// A problem the handler built on purpose; always rendered as JSON.
    Problem(Box<Problem>),
    /// Anything unexpected; rendered per `Accept`.
    Unhandled(Unhandled),
    /// Bare status, passed through untouched.
    Status(StatusCode),
}

impl From<Problem> for ApiError {
    fn from(problem: Problem) -> Self {
        Self::Problem(Box::new(problem))
    }
}

impl From<Unhandled> for ApiError {
    fn from(failure: Unhandled) -> Self {
        Self::Unhandled(failure)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Problem(problem) => (*problem).into_response(),
            Self::Unhandled(failure) => failure.into_response(),
            Self::Status(status) => status.into_response(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Turns an extractor rejection into a validation problem for `field`.
pub(crate) fn invalid_argument(
    factory: &ProblemFactory,
    id: &CorrelationId,
    field: &str,
    message: String,
) -> ApiError {
    let mut errors = FieldErrors::new();
    errors.insert(field.to_owned(), vec![message]);
    factory.from_validation_errors(errors, id.as_str()).into()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(data::router())
        .merge(data_v2::router())
        .merge(settings::router())
        .merge(pages::router())
        .with_state(state)
}
