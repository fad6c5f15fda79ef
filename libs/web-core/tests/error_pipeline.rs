#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Drives the declared stack end to end:
//! set request id -> propagate -> trace -> correlation id -> timeout
//! -> exception handler -> error dispatch -> (authorization) -> router

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::routing::get;
use http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use problem_details::{
    AggregateFailure, ErrorDetailsRegistry, ProblemCodec, ProblemDetailsOptions, ProblemFactory,
    Raised,
};
use tower::ServiceExt;
use web_core::correlation::REQUEST_ID_HEADER;
use web_core::pipeline::Authorizer;
use web_core::{
    CorrelationId, DEFAULT_STAGES, ErrorDispatchState, HandlerResult, Stage, StackContext,
    apply_stack,
};

const SECRET: &str = "connection string leaked: password=hunter2";

async fn secret_failure() -> HandlerResult<&'static str> {
    Err(Raised::new("InvalidOperationException", SECRET).into())
}

async fn aggregate_failure() -> HandlerResult<&'static str> {
    Err(AggregateFailure::new([
        Raised::new("ArgumentException", "Lorem Ipsum 4-1"),
        Raised::new("OutOfMemoryException", "my memory is out 5"),
        Raised::new("InsufficientMemoryException", "need more mem! 6"),
    ])
    .into())
}

async fn echo_id(id: CorrelationId) -> String {
    id.to_string()
}

fn ctx(include_detail: bool, max_breadth: usize) -> StackContext {
    let options = ProblemDetailsOptions {
        include_detail: Some(include_detail),
        ..Default::default()
    }
    .with_limits(10, max_breadth);
    StackContext::new(
        ErrorDispatchState::new(
            ProblemFactory::new(Arc::new(options)),
            ProblemCodec::new(ErrorDetailsRegistry::default()),
        ),
        Duration::from_secs(5),
    )
}

fn app(stages: &[Stage], ctx: &StackContext) -> Router {
    let router = Router::new()
        .route("/secret", get(secret_failure))
        .route("/aggregate", get(aggregate_failure))
        .route("/id", get(echo_id));
    apply_stack(router, stages, ctx).expect("valid stack")
}

fn request(path: &str, accept: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header(header::ACCEPT, accept)
        .body(Body::empty())
        .unwrap()
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn html_client_gets_page_with_only_the_correlation_id() {
    let resp = app(DEFAULT_STAGES, &ctx(true, 10))
        .oneshot(request("/secret", "text/html,application/xhtml+xml"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-store");
    let request_id = resp.headers()[REQUEST_ID_HEADER]
        .to_str()
        .unwrap()
        .to_owned();

    let body = body_string(resp).await;
    assert!(body.contains(&request_id));
    assert!(!body.contains("hunter2"));
    assert!(!body.contains("InvalidOperationException"));
}

#[tokio::test]
async fn json_client_gets_problem_with_propagated_request_id() {
    let mut req = request("/secret", "application/json");
    req.headers_mut()
        .insert(REQUEST_ID_HEADER, "client-chosen-id".parse().unwrap());

    let resp = app(DEFAULT_STAGES, &ctx(false, 10))
        .oneshot(req)
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers()[REQUEST_ID_HEADER], "client-chosen-id");

    let body: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(body["traceId"], "client-chosen-id");
    assert_eq!(body["instance"], "/secret");
    assert!(body.get("detail").is_none());
}

#[tokio::test]
async fn aggregate_is_cut_to_breadth() {
    let resp = app(DEFAULT_STAGES, &ctx(false, 2))
        .oneshot(request("/aggregate", "application/problem+json"))
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
    let inner = body["failure"]["innerErrors"].as_array().unwrap();
    assert_eq!(inner.len(), 3);
    assert_eq!(inner[0]["message"], "Lorem Ipsum 4-1");
    assert_eq!(inner[1]["message"], "my memory is out 5");
    assert_eq!(inner[2]["type"], "truncated");
    assert_eq!(inner[2]["message"], "1 more omitted");
}

#[tokio::test]
async fn generated_request_id_reaches_handlers() {
    let resp = app(DEFAULT_STAGES, &ctx(false, 10))
        .oneshot(request("/id", "*/*"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let header_id = resp.headers()[REQUEST_ID_HEADER]
        .to_str()
        .unwrap()
        .to_owned();
    assert_eq!(body_string(resp).await, header_id);
}

#[tokio::test]
async fn authorization_rejections_pass_through_untouched() {
    let deny: Authorizer = Arc::new(|parts: &http::request::Parts| {
        if parts.uri.path() == "/id" {
            Err(StatusCode::FORBIDDEN)
        } else {
            Ok(())
        }
    });
    let mut stages = DEFAULT_STAGES.to_vec();
    stages.insert(stages.len() - 1, Stage::Authorization);
    let ctx = ctx(false, 10).with_authorizer(deny);

    let resp = app(&stages, &ctx)
        .oneshot(request("/id", "application/json"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(body_string(resp).await.is_empty());
}

#[tokio::test]
async fn unknown_routes_pass_through() {
    let resp = app(DEFAULT_STAGES, &ctx(false, 10))
        .oneshot(request("/nope", "application/json"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(body_string(resp).await.is_empty());
}
