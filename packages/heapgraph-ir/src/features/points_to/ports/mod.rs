//! Ports of the heap analysis
//!
//! The analysis core depends on two outside collaborators:
//! - **AnnotationProvider**: purity / escape / freshness / write-confinement
//!   queries used to summarize methods whose bodies are not analyzed
//! - **SummaryConsumer**: receives each method summary as it is stored
//!
//! ## Example
//! ```ignore
//! use heapgraph_ir::features::points_to::ports::SummaryConsumer;
//!
//! struct Collect(Vec<MethodId>);
//!
//! impl SummaryConsumer for Collect {
//!     fn on_summary(&mut self, method: MethodId, _: &PTGraph, _: GraphContext<'_>) {
//!         self.0.push(method);
//!     }
//! }
//! ```

use crate::features::ir::{MethodId, Program, VarId};
use crate::features::points_to::domain::ptgraph::{GraphContext, PTGraph};

// ============================================================================
// Annotations
// ============================================================================

/// Declared effects of methods and parameters
///
/// Parameters are addressed by their variable; the receiver is the variable of
/// the method's `this` parameter.
pub trait AnnotationProvider {
    /// Declared pure, confined or state independent
    fn is_declared_pure(&self, program: &Program, method: MethodId) -> bool;

    /// Treated as pure at call sites (declared, or on the assumed-pure lists)
    fn is_assumed_pure(&self, program: &Program, method: MethodId) -> bool;

    /// Return value is fresh
    fn is_declared_fresh(&self, program: &Program, method: MethodId) -> bool;

    /// Out/ref parameter receives a fresh object
    fn is_declared_fresh_param(&self, program: &Program, param: VarId) -> bool;

    /// `Some(owned)` when the parameter may escape; `owned` means captured
    fn declared_escaping(&self, program: &Program, param: VarId) -> Option<bool>;

    fn is_declared_read(&self, program: &Program, param: VarId) -> bool;

    fn is_write_parameter(&self, program: &Program, method: MethodId, param: VarId) -> bool;

    fn is_write_confined_parameter(&self, program: &Program, method: MethodId, param: VarId) -> bool;

    fn is_declared_accessing_globals(&self, program: &Program, method: MethodId) -> bool;

    fn is_declared_reading_globals(&self, program: &Program, method: MethodId) -> bool;

    fn is_declared_writing_globals(&self, program: &Program, method: MethodId) -> bool;

    /// Carries any effect attribute on itself or its parameters
    fn is_annotated(&self, program: &Program, method: MethodId) -> bool;
}

// ============================================================================
// Results
// ============================================================================

/// Receives method summaries as the driver stores them
pub trait SummaryConsumer {
    fn on_summary(&mut self, method: MethodId, summary: &PTGraph, cx: GraphContext<'_>);
}

/// Consumer that ignores every summary
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConsumer;

impl SummaryConsumer for NoopConsumer {
    fn on_summary(&mut self, _method: MethodId, _summary: &PTGraph, _cx: GraphContext<'_>) {}
}
