//! Request correlation ids.
//!
//! `SetRequestIdLayer` assigns an `x-request-id` (UUID v7) when the client did
//! not send one, [`push_correlation_id`] copies it into the request extensions
//! and the current span, and handlers read it through the [`CorrelationId`]
//! extractor.

use std::convert::Infallible;
use std::fmt;

use axum::extract::{FromRequestParts, Request};
use axum::middleware::Next;
use axum::response::Response;
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[must_use]
pub fn header() -> HeaderName {
    HeaderName::from_static(REQUEST_ID_HEADER)
}

/// Generates UUID v7 request ids.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeReqId;

impl MakeRequestId for MakeReqId {
    fn make_request_id<B>(&mut self, _req: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::now_v7().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Correlation id of the current request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Self(v.to_owned()))
    }

    /// Extensions first, then the header, then a fresh id.
    #[must_use]
    pub fn resolve(extensions: &http::Extensions, headers: &HeaderMap) -> Self {
        extensions
            .get::<Self>()
            .cloned()
            .or_else(|| Self::from_headers(headers))
            .unwrap_or_else(Self::generate)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Records the request id into the span and the request extensions.
pub async fn push_correlation_id(mut req: Request, next: Next) -> Response {
    let id = CorrelationId::resolve(req.extensions(), req.headers());
    tracing::Span::current().record("request_id", id.as_str());
    req.extensions_mut().insert(id);
    next.run(req).await
}

impl<S: Send + Sync> FromRequestParts<S> for CorrelationId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::resolve(&parts.extensions, &parts.headers))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_uuid_v7() {
        let req = http::Request::new(());
        let id = MakeReqId.make_request_id(&req).unwrap();
        let parsed = Uuid::parse_str(id.header_value().to_str().unwrap()).unwrap();
        assert_eq!(parsed.get_version_num(), 7);
    }

    #[test]
    fn resolve_prefers_extensions_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("from-header"));
        let mut extensions = http::Extensions::new();

        assert_eq!(
            CorrelationId::resolve(&extensions, &headers).as_str(),
            "from-header"
        );

        extensions.insert(CorrelationId("from-ext".to_owned()));
        assert_eq!(
            CorrelationId::resolve(&extensions, &headers).as_str(),
            "from-ext"
        );
    }

    #[test]
    fn blank_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("  "));
        assert!(CorrelationId::from_headers(&headers).is_none());
        let id = CorrelationId::resolve(&http::Extensions::new(), &headers);
        assert!(!id.as_str().is_empty());
    }
}
