//! JSON wire format for [`Problem`].
//!
//! ```json
//! {
//!   "type": "about:blank",
//!   "title": "I'm a teapot",
//!   "status": 418,
//!   "instance": "/api/v2/data/errordetails/2",
//!   "traceId": "0192...",
//!   "kind": "errorDetails",
//!   "errorType": "acme-data",
//!   "errorDetails": { "intValue": 2 }
//! }
//! ```
//!
//! The extension is flattened next to the standard members and discriminated
//! by `kind`. Absent optional members are omitted.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::normalize::FailureNode;
use crate::problem::{FieldErrors, Problem, ProblemExtension};
use crate::registry::ErrorDetailsRegistry;

/// Encoding and decoding failures.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("error detail tag '{0}' is not registered")]
    UnregisteredTag(String),
    #[error("unknown error detail tag '{0}'")]
    UnknownTag(String),
    #[error("error detail tagged '{tag}' is not a {expected}")]
    DetailTypeMismatch {
        tag: &'static str,
        expected: &'static str,
    },
    #[error("invalid '{tag}' error detail")]
    InvalidDetail {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid status code {0}")]
    InvalidStatus(u16),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireProblemRef<'a> {
    #[serde(rename = "type")]
    type_url: &'a str,
    title: &'a str,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance: Option<&'a str>,
    trace_id: &'a str,
    #[serde(flatten)]
    extension: WireExtensionRef<'a>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum WireExtensionRef<'a> {
    Failure {
        failure: &'a FailureNode,
    },
    Validation {
        errors: &'a FieldErrors,
    },
    #[serde(rename_all = "camelCase")]
    ErrorDetails {
        error_type: &'static str,
        error_details: Value,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProblem {
    #[serde(rename = "type")]
    type_url: String,
    title: String,
    status: u16,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    instance: Option<String>,
    trace_id: String,
    #[serde(flatten)]
    extension: WireExtension,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum WireExtension {
    Failure {
        failure: FailureNode,
    },
    Validation {
        errors: FieldErrors,
    },
    #[serde(rename_all = "camelCase")]
    ErrorDetails {
        error_type: String,
        error_details: Value,
    },
}

/// Shared serializer: the frozen detail registry plus output settings.
#[derive(Debug, Clone, Default)]
pub struct ProblemCodec {
    registry: ErrorDetailsRegistry,
    pretty: bool,
}

impl ProblemCodec {
    #[must_use]
    pub fn new(registry: ErrorDetailsRegistry) -> Self {
        Self {
            registry,
            pretty: false,
        }
    }

    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &ErrorDetailsRegistry {
        &self.registry
    }

    /// Converts `problem` into its JSON document.
    ///
    /// # Errors
    /// Returns [`CodecError::UnregisteredTag`] for typed details whose tag was
    /// never registered, or a serialization error from the detail itself.
    pub fn to_value(&self, problem: &Problem) -> Result<Value, CodecError> {
        Ok(serde_json::to_value(self.wire(problem)?)?)
    }

    /// Encodes `problem` to bytes, indented when the codec is pretty.
    ///
    /// # Errors
    /// Same as [`ProblemCodec::to_value`].
    pub fn encode(&self, problem: &Problem) -> Result<Vec<u8>, CodecError> {
        let wire = self.wire(problem)?;
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&wire)?
        } else {
            serde_json::to_vec(&wire)?
        };
        Ok(bytes)
    }

    /// Decodes a problem document.
    ///
    /// # Errors
    /// Returns [`CodecError`] for malformed JSON, status codes outside
    /// 100..=999, unknown detail tags or details that do not match their type.
    pub fn decode(&self, bytes: &[u8]) -> Result<Problem, CodecError> {
        let wire: WireProblem = serde_json::from_slice(bytes)?;
        self.from_wire(wire)
    }

    /// Same as [`ProblemCodec::decode`] for an already parsed document.
    ///
    /// # Errors
    /// Same as [`ProblemCodec::decode`].
    pub fn from_value(&self, value: Value) -> Result<Problem, CodecError> {
        let wire: WireProblem = serde_json::from_value(value)?;
        self.from_wire(wire)
    }

    fn wire<'a>(&self, problem: &'a Problem) -> Result<WireProblemRef<'a>, CodecError> {
        let extension = match &problem.extension {
            ProblemExtension::Failure(node) => WireExtensionRef::Failure { failure: node },
            ProblemExtension::Validation(errors) => WireExtensionRef::Validation { errors },
            ProblemExtension::ErrorDetails(detail) => WireExtensionRef::ErrorDetails {
                error_type: detail.tag(),
                error_details: self.registry.encode(detail)?,
            },
        };
        Ok(WireProblemRef {
            type_url: &problem.type_url,
            title: &problem.title,
            status: problem.status.as_u16(),
            detail: problem.detail.as_deref(),
            instance: problem.instance.as_deref(),
            trace_id: &problem.trace_id,
            extension,
        })
    }

    fn from_wire(&self, wire: WireProblem) -> Result<Problem, CodecError> {
        let status =
            StatusCode::from_u16(wire.status).map_err(|_| CodecError::InvalidStatus(wire.status))?;
        let extension = match wire.extension {
            WireExtension::Failure { failure } => ProblemExtension::Failure(failure),
            WireExtension::Validation { errors } => ProblemExtension::Validation(errors),
            WireExtension::ErrorDetails {
                error_type,
                error_details,
            } => ProblemExtension::ErrorDetails(self.registry.decode(&error_type, error_details)?),
        };
        Ok(Problem {
            type_url: wire.type_url,
            title: wire.title,
            status,
            detail: wire.detail,
            instance: wire.instance,
            trace_id: wire.trace_id,
            extension,
        })
    }
}
