//! Generic HTML error page and the exception-handler stage that serves it.
//!
//! Page clients never see failure internals: the page carries the request id
//! and nothing else about the failure.

use std::panic::AssertUnwindSafe;

use axum::body::Body;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use http::{HeaderValue, StatusCode, header};
use problem_details::FailureGraph;

use crate::correlation::CorrelationId;

/// Marker left by the dispatch stage for page clients.
#[derive(Debug, Clone)]
pub struct ErrorPageRequest {
    pub request_id: String,
}

impl IntoResponse for ErrorPageRequest {
    fn into_response(self) -> Response {
        let mut resp = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        resp.extensions_mut().insert(self);
        resp
    }
}

/// Renders the page. The request id line is shown only when an id exists.
#[must_use]
pub fn render_error_page(request_id: Option<&str>) -> String {
    let request_id = request_id
        .filter(|id| !id.trim().is_empty())
        .map(|id| {
            format!(
                "<p><strong>Request ID:</strong> <code>{}</code></p>\n",
                escape_html(id)
            )
        })
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head><meta charset=\"utf-8\"><title>Error</title></head>\n\
         <body>\n\
         <h1 class=\"text-danger\">Error.</h1>\n\
         <h2 class=\"text-danger\">An error occurred while processing your request.</h2>\n\
         {request_id}\
         </body>\n\
         </html>\n"
    )
}

/// Full error page response, never cached.
#[must_use]
pub fn error_page_response(status: StatusCode, request_id: Option<&str>) -> Response {
    let mut resp = Response::new(Body::from(render_error_page(request_id)));
    *resp.status_mut() = status;
    let headers = resp.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    resp
}

/// Exception-handler stage.
///
/// Renders the page for [`ErrorPageRequest`] markers and is the last resort
/// for panics that escape the inner stages.
pub async fn exception_handler_middleware(request: Request, next: Next) -> Response {
    let request_id = CorrelationId::resolve(request.extensions(), request.headers());

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(mut response) => match response.extensions_mut().remove::<ErrorPageRequest>() {
            Some(page) => error_page_response(response.status(), Some(&page.request_id)),
            None => response,
        },
        Err(payload) => {
            let graph = FailureGraph::from_panic(&*payload);
            tracing::error!(
                correlation_id = %request_id,
                failure = %graph,
                "panic escaped the error dispatch stage"
            );
            error_page_response(StatusCode::INTERNAL_SERVER_ERROR, Some(request_id.as_str()))
        }
    }
}

/// Escapes text for HTML element content and attribute values.
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
