//! Unexpected handler failures.

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use problem_details::FailureGraph;

/// Handler error for anything the handler did not turn into a [`Problem`].
///
/// Converting with `?` captures the whole cause chain and the call site. The
/// response carries no body: the dispatch stage renders it per `Accept`.
///
/// [`Problem`]: problem_details::Problem
#[derive(Debug, Clone)]
pub struct Unhandled(FailureGraph);

impl Unhandled {
    #[must_use]
    pub fn new(graph: FailureGraph) -> Self {
        Self(graph)
    }

    #[must_use]
    pub fn graph(&self) -> &FailureGraph {
        &self.0
    }

    #[must_use]
    pub fn into_graph(self) -> FailureGraph {
        self.0
    }
}

impl<E> From<E> for Unhandled
where
    E: Into<anyhow::Error>,
{
    #[track_caller]
    fn from(err: E) -> Self {
        let location = std::panic::Location::caller();
        let err = err.into();
        Self(FailureGraph::from_anyhow(&err).with_root_context(location.to_string()))
    }
}

impl IntoResponse for Unhandled {
    fn into_response(self) -> Response {
        let mut resp = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        resp.extensions_mut().insert(self);
        resp
    }
}

pub type HandlerResult<T> = Result<T, Unhandled>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("value out of range")]
    struct OutOfRange;

    fn fails() -> HandlerResult<()> {
        Err::<(), _>(OutOfRange)?;
        Ok(())
    }

    #[test]
    fn question_mark_records_call_site() {
        let err = fails().unwrap_err();
        let root = err.graph().root_failure();
        assert_eq!(root.kind, "OutOfRange");
        assert_eq!(root.message, "value out of range");
        assert!(root.source_context.as_deref().unwrap().contains("failure.rs"));
    }

    #[test]
    fn response_defers_rendering() {
        let resp = Unhandled::new(FailureGraph::leaf("io", "disk full")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.extensions().get::<Unhandled>().is_some());
    }
}
