//! Declared middleware stack.
//!
//! The stack is an ordered list of [`Stage`]s, outermost first. The list is
//! checked by [`validate_stage_order`] before any layer is applied, so a
//! misplaced error dispatch stage fails at startup instead of silently
//! rendering the wrong representation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{Next, from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use http::request::Parts;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::field::Empty;

use crate::correlation::{self, MakeReqId, push_correlation_id};
use crate::dispatch::{ErrorDispatchState, error_dispatch_middleware};
use crate::page::exception_handler_middleware;

/// One middleware stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Assign `x-request-id` when missing.
    SetRequestId,
    /// Copy `x-request-id` to the response.
    PropagateRequestId,
    /// `http_request` span per request.
    Trace,
    /// Record the request id in the span and the request extensions.
    CorrelationId,
    /// Request timeout.
    Timeout,
    /// Error page rendering and last-resort panic capture.
    ExceptionHandler,
    /// Problem payload and negotiation.
    ErrorDispatch,
    /// Caller-supplied authorization check.
    Authorization,
    /// The router itself.
    Routing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Runtime order, outermost first.
pub const DEFAULT_STAGES: &[Stage] = &[
    Stage::SetRequestId,
    Stage::PropagateRequestId,
    Stage::Trace,
    Stage::CorrelationId,
    Stage::Timeout,
    Stage::ExceptionHandler,
    Stage::ErrorDispatch,
    Stage::Routing,
];

const REQUIRED: &[Stage] = &[
    Stage::SetRequestId,
    Stage::CorrelationId,
    Stage::ExceptionHandler,
    Stage::ErrorDispatch,
    Stage::Routing,
];

/// `(outer, inner)`: when both are present `outer` must run first.
const ORDERING: &[(Stage, Stage)] = &[
    (Stage::SetRequestId, Stage::PropagateRequestId),
    (Stage::SetRequestId, Stage::Trace),
    (Stage::SetRequestId, Stage::CorrelationId),
    (Stage::Trace, Stage::CorrelationId),
    (Stage::CorrelationId, Stage::ErrorDispatch),
    (Stage::CorrelationId, Stage::ExceptionHandler),
    (Stage::Timeout, Stage::ErrorDispatch),
    (Stage::ExceptionHandler, Stage::ErrorDispatch),
    (Stage::ErrorDispatch, Stage::Authorization),
    (Stage::ErrorDispatch, Stage::Routing),
    (Stage::Authorization, Stage::Routing),
];

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum StageOrderError {
    #[error("stage {0} is declared more than once")]
    Duplicate(Stage),
    #[error("required stage {0} is missing")]
    Missing(Stage),
    #[error("stage {outer} must run before {inner}")]
    OutOfOrder { outer: Stage, inner: Stage },
    #[error("routing must be the innermost stage")]
    RoutingNotInnermost,
    #[error("stage {0} is declared but not configured")]
    Unconfigured(Stage),
}

/// Checks a declared stack.
///
/// # Errors
/// Returns the first violated rule as a [`StageOrderError`].
pub fn validate_stage_order(stages: &[Stage]) -> Result<(), StageOrderError> {
    for (i, stage) in stages.iter().enumerate() {
        if stages[..i].contains(stage) {
            return Err(StageOrderError::Duplicate(*stage));
        }
    }
    if let Some(missing) = REQUIRED.iter().find(|s| !stages.contains(s)) {
        return Err(StageOrderError::Missing(*missing));
    }
    if stages.last() != Some(&Stage::Routing) {
        return Err(StageOrderError::RoutingNotInnermost);
    }
    let position = |stage: Stage| stages.iter().position(|s| *s == stage);
    for (outer, inner) in ORDERING {
        if let (Some(o), Some(i)) = (position(*outer), position(*inner))
            && o > i
        {
            return Err(StageOrderError::OutOfOrder {
                outer: *outer,
                inner: *inner,
            });
        }
    }
    Ok(())
}

/// Authorization hook for [`Stage::Authorization`]. A rejection status is
/// returned as is, without a body.
pub type Authorizer = Arc<dyn Fn(&Parts) -> Result<(), StatusCode> + Send + Sync>;

/// Everything the stages need.
#[derive(Clone)]
pub struct StackContext {
    pub dispatch: ErrorDispatchState,
    pub request_timeout: Duration,
    pub authorizer: Option<Authorizer>,
}

impl StackContext {
    #[must_use]
    pub fn new(dispatch: ErrorDispatchState, request_timeout: Duration) -> Self {
        Self {
            dispatch,
            request_timeout,
            authorizer: None,
        }
    }

    #[must_use]
    pub fn with_authorizer(mut self, authorizer: Authorizer) -> Self {
        self.authorizer = Some(authorizer);
        self
    }
}

impl fmt::Debug for StackContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackContext")
            .field("dispatch", &self.dispatch)
            .field("request_timeout", &self.request_timeout)
            .field("authorizer", &self.authorizer.is_some())
            .finish()
    }
}

/// Applies `stages` to `router`.
///
/// Layers are registered innermost first, so the declared list is walked in
/// reverse. With [`DEFAULT_STAGES`] the runtime order is:
///   1. `SetRequestId`       - generate or keep `x-request-id`
///   2. `PropagateRequestId` - echo it on the response
///   3. `Trace`              - `http_request` span
///   4. `CorrelationId`      - record the id in span and extensions
///   5. `Timeout`            - request timeout
///   6. `ExceptionHandler`   - error page, last-resort panic capture
///   7. `ErrorDispatch`      - problem payloads and negotiation
///   8. `Routing`            - handlers (innermost)
///
/// # Errors
/// Returns [`StageOrderError`] when the list is invalid or a declared stage
/// has nothing configured.
pub fn apply_stack(
    mut router: Router,
    stages: &[Stage],
    ctx: &StackContext,
) -> Result<Router, StageOrderError> {
    validate_stage_order(stages)?;

    for stage in stages.iter().rev() {
        router = match stage {
            Stage::Routing => router,
            Stage::Authorization => {
                let authorizer = ctx
                    .authorizer
                    .clone()
                    .ok_or(StageOrderError::Unconfigured(Stage::Authorization))?;
                router.layer(from_fn_with_state(authorizer, authorize_middleware))
            }
            Stage::ErrorDispatch => router.layer(from_fn_with_state(
                ctx.dispatch.clone(),
                error_dispatch_middleware,
            )),
            Stage::ExceptionHandler => router.layer(from_fn(exception_handler_middleware)),
            Stage::Timeout => router.layer(TimeoutLayer::with_status_code(
                StatusCode::GATEWAY_TIMEOUT,
                ctx.request_timeout,
            )),
            Stage::CorrelationId => router.layer(from_fn(push_correlation_id)),
            Stage::Trace => apply_trace_layer(router),
            Stage::PropagateRequestId => {
                router.layer(PropagateRequestIdLayer::new(correlation::header()))
            }
            Stage::SetRequestId => {
                router.layer(SetRequestIdLayer::new(correlation::header(), MakeReqId))
            }
        };
    }

    tracing::debug!(stages = ?stages, "middleware stack applied");
    Ok(router)
}

fn apply_trace_layer(router: Router) -> Router {
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &http::Request<axum::body::Body>| {
                let rid = req
                    .headers()
                    .get(correlation::REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("n/a");
                tracing::info_span!(
                    "http_request",
                    method = %req.method(),
                    uri = %req.uri().path(),
                    version = ?req.version(),
                    request_id = %rid,
                    status = Empty,
                    latency_ms = Empty,
                )
            })
            .on_response(
                |res: &Response, latency: Duration, span: &tracing::Span| {
                    span.record("status", res.status().as_u16());
                    span.record("latency_ms", latency.as_millis());
                },
            ),
    )
}

async fn authorize_middleware(
    State(authorizer): State<Authorizer>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    if let Err(status) = authorizer(&parts) {
        tracing::debug!(status = status.as_u16(), path = %parts.uri.path(), "request rejected");
        return status.into_response();
    }
    next.run(Request::from_parts(parts, body)).await
}
