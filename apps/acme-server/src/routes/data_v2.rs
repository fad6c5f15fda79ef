//! Version 2 of the data API: failure trees, validation and typed details.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use problem_details::{AggregateFailure, FieldErrors, Raised, TypedErrorDetail};
use web_core::{CorrelationId, Unhandled};

use super::{ApiError, ApiResult, AppState, invalid_argument};
use crate::errors::{AcmeDataErrorDetails, AcmeErrorDetails};

const VALUES: [&str; 2] = [
    "Value 1 from Versioned API version 2",
    "Value 2 from Versioned API version 2",
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v2/data/exceptions/{value}", get(exceptions))
        .route("/api/v2/data/badrequests/{value}", get(bad_requests))
        .route("/api/v2/data/errordetails/{value}", get(error_details))
}

fn path_value(
    state: &AppState,
    id: &CorrelationId,
    value: Result<Path<i32>, PathRejection>,
) -> Result<i32, ApiError> {
    value
        .map(|Path(v)| v)
        .map_err(|e| invalid_argument(&state.factory, id, "value", e.body_text()))
}

/// Three independent branches, each with its own chain.
fn memory_aggregate(prefix: &str, out: &str, more: &str, range: &str) -> AggregateFailure {
    AggregateFailure::new([
        Raised::new("Exception", format!("Lorem Ipsum {prefix}-1")).caused_by(
            Raised::new("ArgumentException", format!("Honda Magna {prefix}-2")).caused_by(
                Raised::new("ArgumentNullException", format!("Dolor Sit Amet {prefix}-3")),
            ),
        ),
        Raised::new("OutOfMemoryException", format!("my memory is out {out}"))
            .caused_by(Raised::new("Exception", format!("need more mem! {more}"))),
        Raised::new(
            "ArgumentOutOfRangeException",
            format!("some message {range}"),
        ),
    ])
}

async fn exceptions(
    State(state): State<AppState>,
    id: CorrelationId,
    value: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<[&'static str; 2]>> {
    match path_value(&state, &id, value)? {
        1 => Err(Unhandled::from(Raised::new(
            "ArgumentNullException",
            "parameter can't be null (Parameter 'some parameter')",
        ))
        .into()),
        2 => Err(Unhandled::from(
            Raised::new("Exception", "Lorem Ipsum 1").caused_by(
                Raised::new("ArgumentException", "Honda Magna 2").caused_by(
                    Raised::new("ArgumentNullException", "Dolor Sit Amet 3")
                        .caused_by(memory_aggregate("4", "5", "6", "7")),
                ),
            ),
        )
        .into()),
        3 => Err(Unhandled::from(memory_aggregate("1", "2", "2-1", "3")).into()),
        _ => Ok(Json(VALUES)),
    }
}

async fn bad_requests(
    State(state): State<AppState>,
    id: CorrelationId,
    value: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<[&'static str; 2]>> {
    match path_value(&state, &id, value)? {
        1 => {
            let mut errors = FieldErrors::new();
            errors.insert(
                "modelState1".to_owned(),
                vec!["This is a invalid model 1-1 ".to_owned()],
            );
            errors.insert(
                "ModelState1".to_owned(),
                vec!["This is another invalid model 1-2".to_owned()],
            );
            errors.insert(
                "modelState2".to_owned(),
                vec!["This is another invalid model 2".to_owned()],
            );
            Err(state
                .factory
                .from_validation_errors(errors, id.as_str())
                .into())
        }
        2 => Err(state
            .factory
            .from_typed_error_detail(
                TypedErrorDetail::new(AcmeDataErrorDetails::sample()),
                StatusCode::BAD_REQUEST,
                "Bad Request",
                id.as_str(),
            )
            .into()),
        _ => Ok(Json(VALUES)),
    }
}

async fn error_details(
    State(state): State<AppState>,
    id: CorrelationId,
    value: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<[&'static str; 2]>> {
    match path_value(&state, &id, value)? {
        1 => Err(state
            .factory
            .from_typed_error_detail(
                TypedErrorDetail::new(AcmeErrorDetails {
                    int_value: 42,
                    string_value: "Lorem Ipsum Honda Magna".to_owned(),
                }),
                StatusCode::EXPECTATION_FAILED,
                "Expectation Failed",
                id.as_str(),
            )
            .into()),
        2 => Err(state
            .factory
            .from_typed_error_detail(
                TypedErrorDetail::new(AcmeDataErrorDetails::sample()),
                StatusCode::IM_A_TEAPOT,
                "I'm a teapot......",
                id.as_str(),
            )
            .into()),
        _ => Ok(Json(VALUES)),
    }
}
