//! `GET /api/data?value=N`

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use problem_details::Raised;
use serde::Deserialize;
use web_core::{CorrelationId, Unhandled};

use super::{ApiError, ApiResult, AppState, invalid_argument};

#[derive(Debug, Default, Deserialize)]
pub struct DataQuery {
    #[serde(default)]
    pub value: i32,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/data", get(data))
}

/// 0: two strings, 1: unhandled failure chain, 2: 400 problem, 3: bare 404.
async fn data(
    State(state): State<AppState>,
    id: CorrelationId,
    query: Result<Query<DataQuery>, QueryRejection>,
) -> ApiResult<Json<[&'static str; 2]>> {
    let Query(query) =
        query.map_err(|e| invalid_argument(&state.factory, &id, "value", e.body_text()))?;

    match query.value {
        1 => Err(Unhandled::from(
            Raised::new("ArgumentException", "some exception").caused_by(Raised::new(
                "ArgumentOutOfRangeException",
                "another inner exception (Parameter 'some param')",
            )),
        )
        .into()),
        2 => Err(state
            .factory
            .bad_request("some title", "more details", id.as_str())
            .into()),
        3 => Err(ApiError::Status(StatusCode::NOT_FOUND)),
        _ => Ok(Json([
            "Value 1 from Acme WebApi version 1",
            "Value 2 from Acme WebApi version 1",
        ])),
    }
}
