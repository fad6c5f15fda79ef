//! Raw failure graphs.
//!
//! A raised failure is captured into an arena of [`RawFailure`] records that
//! reference their causes by [`FailureId`]. Each record is a leaf, carries one
//! chained cause, or aggregates several sub-failures. Indices may form cycles
//! or dangle; consumers must treat the graph as untrusted input.

use std::any::Any;
use std::backtrace::BacktraceStatus;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::error::Error as StdError;
use std::fmt::{self, Write as _};
use std::panic::Location;

/// Index of a failure inside a [`FailureGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FailureId(usize);

impl FailureId {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Causes declared by one failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Causes {
    #[default]
    Leaf,
    Chained(FailureId),
    Aggregate(Vec<FailureId>),
}

impl Causes {
    /// Causes in declaration order.
    #[must_use]
    pub fn as_slice(&self) -> &[FailureId] {
        match self {
            Causes::Leaf => &[],
            Causes::Chained(id) => std::slice::from_ref(id),
            Causes::Aggregate(ids) => ids,
        }
    }
}

/// One raised failure as observed at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFailure {
    pub kind: String,
    pub message: String,
    pub source_context: Option<String>,
    pub stack_trace: Option<String>,
    pub causes: Causes,
}

impl RawFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            source_context: None,
            stack_trace: None,
            causes: Causes::Leaf,
        }
    }

    #[must_use]
    pub fn with_source_context(mut self, context: impl Into<String>) -> Self {
        self.source_context = Some(context.into());
        self
    }

    #[must_use]
    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    fn from_error(err: &(dyn StdError + 'static)) -> Self {
        if let Some(raised) = err.downcast_ref::<Raised>() {
            return Self::new(raised.kind.as_ref(), raised.message.as_str())
                .with_source_context(raised.location.to_string());
        }
        Self::new(kind_of(err), err.to_string())
    }
}

/// Longest kind taken from `Debug` output.
const MAX_KIND_LEN: usize = 128;

/// Best-effort type name of an error: the leading identifier of its `Debug` output.
///
/// Derived `Debug` gives the struct name, or the variant name for enums
/// (`NotFound(..)` yields `NotFound`). Hand-written `Debug` may yield
/// anything, and output without a leading identifier maps to `Error`.
/// Use [`Raised`] when the kind must be exact.
fn kind_of(err: &dyn StdError) -> String {
    let mut prefix = IdentPrefix::default();
    // formatting stops at the first non-identifier character
    write!(prefix, "{err:?}").ok();
    if prefix.0.is_empty() {
        "Error".to_owned()
    } else {
        prefix.0
    }
}

#[derive(Default)]
struct IdentPrefix(String);

impl fmt::Write for IdentPrefix {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if !(c.is_alphanumeric() || c == '_' || c == ':') || self.0.len() >= MAX_KIND_LEN {
                return Err(fmt::Error);
            }
            self.0.push(c);
        }
        Ok(())
    }
}

/// Arena of raw failures with a designated root.
#[derive(Debug, Clone)]
pub struct FailureGraph {
    nodes: Vec<RawFailure>,
    root: FailureId,
}

impl FailureGraph {
    /// A graph with a single failure and no causes.
    pub fn leaf(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            nodes: vec![RawFailure::new(kind, message)],
            root: FailureId(0),
        }
    }

    /// Captures an error and its `source()` chain. [`AggregateFailure`]s contribute
    /// all their sub-failures; errors reached twice are stored once.
    #[must_use]
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        ErrorWalker::default().run(err)
    }

    /// Captures an `anyhow` error, keeping its backtrace on the root when one was captured.
    #[must_use]
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let root: &(dyn StdError + 'static) = err.as_ref();
        let mut graph = Self::from_error(root);
        let backtrace = err.backtrace();
        if backtrace.status() == BacktraceStatus::Captured {
            let root = graph.root.0;
            graph.nodes[root].stack_trace = Some(backtrace.to_string());
        }
        graph
    }

    /// Captures a panic payload as a leaf failure.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic with a non-string payload".to_owned());
        Self::leaf("panic", message)
    }

    #[must_use]
    pub fn builder() -> FailureGraphBuilder {
        FailureGraphBuilder::default()
    }

    #[must_use]
    pub fn root(&self) -> FailureId {
        self.root
    }

    #[must_use]
    pub fn get(&self, id: FailureId) -> Option<&RawFailure> {
        self.nodes.get(id.0)
    }

    #[must_use]
    pub fn root_failure(&self) -> &RawFailure {
        &self.nodes[self.root.0]
    }

    /// Sets the root's source context unless it already has one.
    #[must_use]
    pub fn with_root_context(mut self, context: impl Into<String>) -> Self {
        let root = self.root.0;
        self.nodes[root].source_context.get_or_insert_with(|| context.into());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a graph holds at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Distinct failures reachable from `ids`, unresolved indices excluded.
    #[must_use]
    pub fn reachable_from(&self, ids: &[FailureId]) -> HashSet<FailureId> {
        let mut seen = HashSet::new();
        let mut stack: Vec<FailureId> = ids.to_vec();
        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else {
                continue;
            };
            if seen.insert(id) {
                stack.extend(node.causes.as_slice().iter().copied());
            }
        }
        seen
    }
}

/// Renders every reachable failure once, depth first, for log output.
impl fmt::Display for FailureGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut seen = HashSet::new();
        let mut stack = vec![self.root];
        let mut first = true;
        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else {
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            if !first {
                f.write_str(" <- ")?;
            }
            first = false;
            write!(f, "{}: {}", node.kind, node.message)?;
            stack.extend(node.causes.as_slice().iter().rev().copied());
        }
        Ok(())
    }
}

/// Incremental construction of a [`FailureGraph`].
#[derive(Debug, Default)]
pub struct FailureGraphBuilder {
    nodes: Vec<RawFailure>,
}

impl FailureGraphBuilder {
    pub fn push(&mut self, failure: RawFailure) -> FailureId {
        self.nodes.push(failure);
        FailureId(self.nodes.len() - 1)
    }

    /// Sets the causes of `id`. Unknown ids are ignored; cause ids are not checked.
    pub fn set_causes(&mut self, id: FailureId, causes: Causes) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.causes = causes;
        }
    }

    /// Finishes the graph, or `None` when `root` was never pushed.
    #[must_use]
    pub fn build(self, root: FailureId) -> Option<FailureGraph> {
        (root.0 < self.nodes.len()).then_some(FailureGraph {
            nodes: self.nodes,
            root,
        })
    }
}

type ErrorKey = (*const (), String);

#[derive(Default)]
struct ErrorWalker<'e> {
    builder: FailureGraphBuilder,
    seen: HashMap<ErrorKey, FailureId>,
    pending: Vec<(&'e (dyn StdError + 'static), FailureId)>,
}

impl<'e> ErrorWalker<'e> {
    fn visit(&mut self, err: &'e (dyn StdError + 'static)) -> FailureId {
        // Zero-sized errors share an address, the message disambiguates them.
        let key = (std::ptr::from_ref(err).cast::<()>(), err.to_string());
        if let Some(id) = self.seen.get(&key) {
            return *id;
        }
        let id = self.builder.push(RawFailure::from_error(err));
        self.seen.insert(key, id);
        self.pending.push((err, id));
        id
    }

    fn run(mut self, root: &'e (dyn StdError + 'static)) -> FailureGraph {
        let root_id = self.visit(root);
        while let Some((err, id)) = self.pending.pop() {
            let causes = if let Some(aggregate) = err.downcast_ref::<AggregateFailure>() {
                let ids = aggregate
                    .failures
                    .iter()
                    .map(|f| {
                        let inner: &'e (dyn StdError + 'static) = f.as_ref();
                        self.visit(inner)
                    })
                    .collect();
                Causes::Aggregate(ids)
            } else {
                err.source()
                    .map_or(Causes::Leaf, |src| Causes::Chained(self.visit(src)))
            };
            self.builder.set_causes(id, causes);
        }
        FailureGraph {
            nodes: self.builder.nodes,
            root: root_id,
        }
    }
}

/// Several independent failures raised together.
#[derive(Debug)]
pub struct AggregateFailure {
    message: String,
    failures: Vec<anyhow::Error>,
}

impl AggregateFailure {
    pub fn new<I, E>(failures: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<anyhow::Error>,
    {
        Self {
            message: "One or more errors occurred.".to_owned(),
            failures: failures.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn failures(&self) -> &[anyhow::Error] {
        &self.failures
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for AggregateFailure {}

/// An error with an explicit kind that remembers where it was raised.
#[derive(Debug)]
pub struct Raised {
    kind: Cow<'static, str>,
    message: String,
    location: &'static Location<'static>,
    source: Option<anyhow::Error>,
}

impl Raised {
    #[track_caller]
    pub fn new(kind: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            location: Location::caller(),
            source: None,
        }
    }

    #[must_use]
    pub fn caused_by(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.source = Some(cause.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl fmt::Display for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Raised {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| {
            let inner: &(dyn StdError + 'static) = e.as_ref();
            inner
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("{message}")]
    struct ArgumentError {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    }

    #[derive(Debug, thiserror::Error)]
    enum StoreError {
        #[error("no such key {0}")]
        NotFound(String),
    }

    struct Opaque;

    impl fmt::Debug for Opaque {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("<opaque>")
        }
    }

    impl fmt::Display for Opaque {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("opaque")
        }
    }

    impl StdError for Opaque {}

    #[test]
    fn kind_comes_from_the_debug_head() {
        assert_eq!(kind_of(&StoreError::NotFound("k".repeat(10_000))), "NotFound");
        let err = ArgumentError {
            message: "bad".to_owned(),
            source: None,
        };
        assert_eq!(kind_of(&err), "ArgumentError");
        assert_eq!(kind_of(&Opaque), "Error");
        let aggregate = AggregateFailure::new(Vec::<anyhow::Error>::new());
        assert_eq!(kind_of(&aggregate), "AggregateFailure");
    }

    #[test]
    fn chain_is_captured_in_order() {
        let err = ArgumentError {
            message: "outer".to_owned(),
            source: Some(Box::new(std::fmt::Error)),
        };
        let graph = FailureGraph::from_error(&err);

        let root = graph.root_failure();
        assert_eq!(root.kind, "ArgumentError");
        assert_eq!(root.message, "outer");
        let Causes::Chained(child) = root.causes else {
            panic!("expected a chained cause, got {:?}", root.causes);
        };
        let child = graph.get(child).unwrap();
        assert_eq!(child.kind, "Error");
        assert_eq!(child.causes, Causes::Leaf);
    }

    #[test]
    fn aggregate_keeps_declaration_order() {
        let err = AggregateFailure::new([
            Raised::new("First", "one"),
            Raised::new("Second", "two"),
            Raised::new("Third", "three"),
        ]);
        let graph = FailureGraph::from_error(&err);

        let Causes::Aggregate(ids) = &graph.root_failure().causes else {
            panic!("expected aggregate");
        };
        let kinds: Vec<_> = ids
            .iter()
            .map(|id| graph.get(*id).unwrap().kind.as_str())
            .collect();
        assert_eq!(kinds, ["First", "Second", "Third"]);
    }

    #[test]
    fn raised_records_call_site() {
        let err = Raised::new("Custom", "boom");
        let graph = FailureGraph::from_error(&err);
        let context = graph.root_failure().source_context.as_deref().unwrap();
        assert!(context.contains("failure.rs"), "unexpected context {context}");
    }

    #[test]
    fn anyhow_context_layers_become_chain_links() {
        let err = anyhow::Error::new(Raised::new("Inner", "inner")).context("outer");
        let graph = FailureGraph::from_anyhow(&err);
        assert_eq!(graph.root_failure().message, "outer");
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn panic_payloads_become_leaves() {
        let payload: Box<dyn Any + Send> = Box::new("exploded");
        let graph = FailureGraph::from_panic(payload.as_ref());
        assert_eq!(graph.root_failure().kind, "panic");
        assert_eq!(graph.root_failure().message, "exploded");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        let graph = FailureGraph::from_panic(payload.as_ref());
        assert_eq!(graph.root_failure().message, "panic with a non-string payload");
    }

    #[test]
    fn builder_rejects_unknown_root() {
        let mut builder = FailureGraph::builder();
        builder.push(RawFailure::new("a", "a"));
        assert!(builder.build(FailureId::new(5)).is_none());
    }

    #[test]
    fn reachable_count_survives_cycles() {
        let mut builder = FailureGraph::builder();
        let a = builder.push(RawFailure::new("a", "a"));
        let b = builder.push(RawFailure::new("b", "b"));
        builder.set_causes(a, Causes::Chained(b));
        builder.set_causes(b, Causes::Aggregate(vec![a, FailureId::new(99)]));
        let graph = builder.build(a).unwrap();

        assert_eq!(graph.reachable_from(&[b]).len(), 2);
        assert_eq!(graph.to_string(), "a: a <- b: b");
    }
}
