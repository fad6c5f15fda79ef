//! Error dispatch stage.
//!
//! Handlers hand failures over through response extensions with an empty
//! body: [`Unhandled`] for unexpected failures and [`Problem`] for
//! caller-constructed payloads. This stage renders them exactly once:
//!
//! - panics and [`Unhandled`] failures are negotiated on `Accept`: structured
//!   clients get a 500 problem payload, page clients get the generic page;
//! - a returned [`Problem`] is always encoded as `application/problem+json`;
//! - every other response passes through untouched.

use std::panic::AssertUnwindSafe;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use http::{HeaderValue, StatusCode, header};
use problem_details::{
    APPLICATION_PROBLEM_JSON, CodecError, FailureGraph, Problem, ProblemCodec, ProblemFactory,
};

use crate::correlation::CorrelationId;
use crate::failure::Unhandled;
use crate::negotiation::{RepresentationFamily, negotiate};
use crate::page::ErrorPageRequest;

/// Terminal state of the dispatch stage for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The stage produced the response body.
    Handled,
    /// The inner response was returned unchanged.
    PassThrough,
}

impl DispatchOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchOutcome::Handled => "handled",
            DispatchOutcome::PassThrough => "pass_through",
        }
    }
}

/// Shared, read-only state of the dispatch stage.
#[derive(Debug, Clone, Default)]
pub struct ErrorDispatchState {
    factory: ProblemFactory,
    codec: ProblemCodec,
}

impl ErrorDispatchState {
    #[must_use]
    pub fn new(factory: ProblemFactory, codec: ProblemCodec) -> Self {
        Self { factory, codec }
    }

    #[must_use]
    pub fn factory(&self) -> &ProblemFactory {
        &self.factory
    }

    #[must_use]
    pub fn codec(&self) -> &ProblemCodec {
        &self.codec
    }
}

/// Request facts captured before the request is handed to the next stage.
struct RequestInfo {
    correlation_id: CorrelationId,
    family: RepresentationFamily,
    instance: String,
}

pub async fn error_dispatch_middleware(
    State(state): State<ErrorDispatchState>,
    request: Request,
    next: Next,
) -> Response {
    let info = RequestInfo {
        correlation_id: CorrelationId::resolve(request.extensions(), request.headers()),
        family: negotiate(request.headers().get(header::ACCEPT)),
        instance: request.uri().path().to_owned(),
    };

    let mut response = match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let graph = FailureGraph::from_panic(&*payload);
            return finish(
                state.unhandled(&info, &graph),
                DispatchOutcome::Handled,
                &info,
            );
        }
    };

    if let Some(unhandled) = response.extensions_mut().remove::<Unhandled>() {
        return finish(
            state.unhandled(&info, unhandled.graph()),
            DispatchOutcome::Handled,
            &info,
        );
    }

    if let Some(problem) = response.extensions_mut().remove::<Problem>() {
        let problem = problem.with_default_instance(info.instance.as_str());
        let rendered = match state.encode(response, &problem) {
            Ok(rendered) => rendered,
            Err(err) => {
                tracing::error!(
                    correlation_id = %info.correlation_id,
                    error = %err,
                    status = problem.status.as_u16(),
                    "failed to encode problem payload"
                );
                let graph = FailureGraph::from_error(&err);
                state.structured(&info, &graph)
            }
        };
        return finish(rendered, DispatchOutcome::Handled, &info);
    }

    finish(response, DispatchOutcome::PassThrough, &info)
}

impl ErrorDispatchState {
    fn unhandled(&self, info: &RequestInfo, graph: &FailureGraph) -> Response {
        tracing::error!(
            correlation_id = %info.correlation_id,
            path = %info.instance,
            failure = %graph,
            "unhandled failure"
        );
        match info.family {
            RepresentationFamily::Structured => self.structured(info, graph),
            RepresentationFamily::Page => ErrorPageRequest {
                request_id: info.correlation_id.to_string(),
            }
            .into_response(),
        }
    }

    fn structured(&self, info: &RequestInfo, graph: &FailureGraph) -> Response {
        let problem = self
            .factory
            .from_unexpected_failure(graph, info.correlation_id.as_str())
            .with_instance(info.instance.as_str());
        let resp = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        self.encode(resp, &problem).unwrap_or_else(|err| {
            tracing::error!(
                correlation_id = %info.correlation_id,
                error = %err,
                "failed to encode unexpected failure"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
    }

    /// Writes `problem` as the body of `response`, keeping its other headers.
    fn encode(&self, response: Response, problem: &Problem) -> Result<Response, CodecError> {
        let body = self.codec.encode(problem)?;
        let (mut parts, _) = response.into_parts();
        parts.status = problem.status;
        parts.headers.remove(header::CONTENT_LENGTH);
        parts.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
        );
        Ok(Response::from_parts(parts, Body::from(body)))
    }
}

fn finish(mut response: Response, outcome: DispatchOutcome, info: &RequestInfo) -> Response {
    tracing::debug!(
        correlation_id = %info.correlation_id,
        status = response.status().as_u16(),
        outcome = outcome.as_str(),
        "error dispatch finished"
    );
    response.extensions_mut().insert(outcome);
    response
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use axum::Router;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use http_body_util::BodyExt;
    use problem_details::{ErrorDetailsRegistry, FieldErrors, ProblemDetailsOptions, Raised};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state(include_detail: bool) -> ErrorDispatchState {
        let options = ProblemDetailsOptions {
            include_detail: Some(include_detail),
            ..Default::default()
        };
        ErrorDispatchState::new(
            ProblemFactory::new(Arc::new(options)),
            ProblemCodec::new(ErrorDetailsRegistry::default()),
        )
    }

    async fn explode() -> &'static str {
        panic!("boom")
    }

    fn router(state: ErrorDispatchState) -> Router {
        Router::new()
            .route("/ok", get(|| async { "fine" }))
            .route(
                "/fail",
                get(|| async {
                    Err::<(), Unhandled>(
                        Raised::new("ArgumentException", "Lorem Ipsum 1")
                            .caused_by(Raised::new("ArgumentOutOfRangeException", "Honda Magna 2"))
                            .into(),
                    )
                }),
            )
            .route(
                "/problem",
                get(|| async {
                    let mut errors = FieldErrors::new();
                    errors.insert("name".to_owned(), vec!["required".to_owned()]);
                    let problem = ProblemFactory::default().from_validation_errors(errors, "p-1");
                    Err::<(), Problem>(problem)
                }),
            )
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .route("/panic", get(explode))
            .layer(from_fn_with_state(state, error_dispatch_middleware))
    }

    async fn call(state: ErrorDispatchState, path: &str, accept: Option<&str>) -> Response {
        let mut req = Request::builder()
            .uri(path)
            .header(crate::correlation::REQUEST_ID_HEADER, "corr-42");
        if let Some(accept) = accept {
            req = req.header(header::ACCEPT, accept);
        }
        router(state)
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unhandled_failure_becomes_problem_for_json_clients() {
        let resp = call(state(false), "/fail", Some("application/json")).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], APPLICATION_PROBLEM_JSON);
        assert_eq!(
            resp.extensions().get::<DispatchOutcome>(),
            Some(&DispatchOutcome::Handled)
        );

        let body = json(resp).await;
        assert_eq!(body["title"], "Internal Server Error");
        assert_eq!(body["traceId"], "corr-42");
        assert_eq!(body["instance"], "/fail");
        assert_eq!(body["kind"], "failure");
        assert_eq!(body["failure"]["message"], "Lorem Ipsum 1");
        assert_eq!(body["failure"]["innerErrors"][0]["message"], "Honda Magna 2");
        assert!(body.get("detail").is_none());
    }

    #[tokio::test]
    async fn detail_follows_options() {
        let body = json(call(state(true), "/fail", None).await).await;
        assert_eq!(body["detail"], "Lorem Ipsum 1");
    }

    #[tokio::test]
    async fn page_clients_get_a_marker_for_the_exception_handler() {
        let resp = call(state(true), "/fail", Some("text/html")).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let marker = resp.extensions().get::<ErrorPageRequest>().unwrap();
        assert_eq!(marker.request_id, "corr-42");
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn returned_problem_is_encoded_with_its_own_status() {
        let resp = call(state(false), "/problem", Some("text/html")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], APPLICATION_PROBLEM_JSON);
        let body = json(resp).await;
        assert_eq!(body["kind"], "validation");
        assert_eq!(body["traceId"], "p-1");
        assert_eq!(body["instance"], "/problem");
        assert_eq!(body["errors"]["name"][0], "required");
    }

    #[tokio::test]
    async fn bodies_and_bare_statuses_pass_through() {
        let resp = call(state(false), "/ok", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.extensions().get::<DispatchOutcome>(),
            Some(&DispatchOutcome::PassThrough)
        );

        let resp = call(state(false), "/missing", None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            resp.extensions().get::<DispatchOutcome>(),
            Some(&DispatchOutcome::PassThrough)
        );
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn panics_are_captured() {
        let resp = call(state(true), "/panic", None).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json(resp).await;
        assert_eq!(body["failure"]["type"], "panic");
        assert_eq!(body["detail"], "boom");
    }
}
