//! Disclosure options for problem payloads.
//!
//! The options are loaded once at startup and shared read-only by every
//! request. Nothing in the pipeline mutates them afterwards.

use serde::{Deserialize, Serialize};

/// Upper bound accepted for [`ProblemDetailsOptions::max_depth`].
pub const MAX_DEPTH_LIMIT: usize = 64;

/// Upper bound accepted for [`ProblemDetailsOptions::max_breadth`].
pub const MAX_BREADTH_LIMIT: usize = 256;

/// Controls how much of a failure is revealed to structured clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProblemDetailsOptions {
    /// Maximum number of failure-tree levels; the root is level 1.
    pub max_depth: usize,
    /// Maximum number of real children kept per failure node.
    pub max_breadth: usize,
    /// Emit captured stack traces. Stack traces are not multi-tenant safe, keep it off.
    pub include_stack_trace: bool,
    /// Emit the source location a failure was raised at.
    pub include_source_context: bool,
    /// Populate `detail` of unexpected-failure payloads with the failure message.
    /// `None` lets the environment decide.
    pub include_detail: Option<bool>,
    /// Indent JSON output.
    pub pretty: bool,
}

impl Default for ProblemDetailsOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_breadth: 10,
            include_stack_trace: false,
            include_source_context: false,
            include_detail: None,
            pretty: false,
        }
    }
}

/// Invalid option values.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum OptionsError {
    #[error("max_depth must be within 1..={MAX_DEPTH_LIMIT}, got {0}")]
    MaxDepth(usize),
    #[error("max_breadth must be within 1..={MAX_BREADTH_LIMIT}, got {0}")]
    MaxBreadth(usize),
}

impl ProblemDetailsOptions {
    /// Checks that the limits are usable.
    ///
    /// # Errors
    /// Returns [`OptionsError`] when a limit is zero or above its upper bound.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if !(1..=MAX_DEPTH_LIMIT).contains(&self.max_depth) {
            return Err(OptionsError::MaxDepth(self.max_depth));
        }
        if !(1..=MAX_BREADTH_LIMIT).contains(&self.max_breadth) {
            return Err(OptionsError::MaxBreadth(self.max_breadth));
        }
        Ok(())
    }

    /// Whether failure messages may be copied into `detail`.
    #[must_use]
    pub fn detail_enabled(&self) -> bool {
        self.include_detail.unwrap_or(false)
    }

    /// Fills `include_detail` when it was left to the environment.
    #[must_use]
    pub fn with_detail_default(mut self, enabled: bool) -> Self {
        self.include_detail.get_or_insert(enabled);
        self
    }

    #[must_use]
    pub fn with_limits(mut self, max_depth: usize, max_breadth: usize) -> Self {
        self.max_depth = max_depth;
        self.max_breadth = max_breadth;
        self
    }

    #[must_use]
    pub fn with_stack_traces(mut self, enabled: bool) -> Self {
        self.include_stack_trace = enabled;
        self
    }

    #[must_use]
    pub fn with_source_context(mut self, enabled: bool) -> Self {
        self.include_source_context = enabled;
        self
    }
}
