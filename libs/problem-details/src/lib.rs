//! Problem details for the Acme services
//!
//! This crate has no dependency on an HTTP framework unless the `axum`
//! feature is enabled. It provides:
//! - the failure graph handlers raise (`FailureGraph`, `Raised`, `AggregateFailure`)
//! - the bounded failure-tree normalizer (`normalize`)
//! - RFC 9457 payloads (`Problem`) and their factory (`ProblemFactory`)
//! - the JSON wire format with typed error details (`ProblemCodec`, `ErrorDetailsRegistry`)
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod codec;
pub mod factory;
pub mod failure;
pub mod normalize;
pub mod options;
pub mod problem;
pub mod registry;

// Re-export commonly used types
pub use codec::{CodecError, ProblemCodec};
pub use factory::ProblemFactory;
pub use failure::{AggregateFailure, Causes, FailureGraph, FailureId, Raised, RawFailure};
pub use normalize::{FailureNode, Truncation, TruncationReason, normalize};
pub use options::{OptionsError, ProblemDetailsOptions};
pub use problem::{
    APPLICATION_PROBLEM_JSON, ExtensionKind, FieldErrors, Problem, ProblemExtension,
};
pub use registry::{ErrorDetails, ErrorDetailsRegistry, RegistryError, TypedErrorDetail};
