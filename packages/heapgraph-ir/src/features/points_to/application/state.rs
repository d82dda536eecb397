//! Dataflow state of one method
//!
//! A points-to graph plus the type of the exception in flight (set by throws
//! and by callees declaring exceptional postconditions) and the dispatch
//! assumptions made while resolving virtual or generic calls.

use crate::features::ir::{MethodId, ParamMode, TypeId, VarId};
use crate::features::points_to::domain::ptgraph::{GraphContext, NodeSet, PTGraph};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct PointsToState {
    pub(crate) graph: PTGraph,
    pub(crate) current_exception: Option<TypeId>,
    pub(crate) assumptions: BTreeSet<MethodId>,
}

impl PartialEq for PointsToState {
    fn eq(&self, other: &Self) -> bool {
        self.graph == other.graph
    }
}

impl Eq for PointsToState {}

impl PointsToState {
    /// Entry state of `method`
    pub fn for_method(cx: GraphContext<'_>, method: MethodId) -> Self {
        Self::from_graph(PTGraph::for_method(cx, method))
    }

    pub fn from_graph(graph: PTGraph) -> Self {
        Self {
            graph,
            current_exception: None,
            assumptions: BTreeSet::new(),
        }
    }

    pub fn method(&self) -> MethodId {
        self.graph.method()
    }

    pub fn graph(&self) -> &PTGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut PTGraph {
        &mut self.graph
    }

    pub fn current_exception(&self) -> Option<TypeId> {
        self.current_exception
    }

    /// Methods whose selection at a virtual or generic call this state relies on
    pub fn assumptions(&self) -> &BTreeSet<MethodId> {
        &self.assumptions
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lattice
    // ═══════════════════════════════════════════════════════════════════════

    pub fn join(&mut self, cx: GraphContext<'_>, other: &PointsToState) {
        self.graph.join(&other.graph);
        self.current_exception = match (self.current_exception, other.current_exception) {
            (Some(a), Some(b)) => Some(cx.program.least_common_ancestor(a, b)),
            (a, b) => a.or(b),
        };
        self.assumptions.extend(other.assumptions.iter().copied());
    }

    pub fn includes(&self, other: &PointsToState) -> bool {
        self.graph.includes(&other.graph)
    }

    /// `includes`, extended to the pending exception and the assumptions
    pub fn covers(&self, cx: GraphContext<'_>, other: &PointsToState) -> bool {
        let exception_covered = match (self.current_exception, other.current_exception) {
            (_, None) => true,
            (Some(mine), Some(theirs)) => cx.program.is_assignable_to(theirs, mine),
            (None, Some(_)) => false,
        };
        exception_covered && other.assumptions.is_subset(&self.assumptions) && self.includes(other)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    pub fn values(&mut self, cx: GraphContext<'_>, v: VarId) -> NodeSet {
        self.graph.var_values(cx, v)
    }

    pub fn may_alias(&mut self, cx: GraphContext<'_>, v1: VarId, v2: VarId) -> bool {
        let a = self.values(cx, v1);
        let b = self.values(cx, v2);
        !a.is_disjoint(&b)
    }

    pub fn check_escapes(&self, cx: GraphContext<'_>, p: VarId) -> bool {
        self.graph.check_escape(cx, p)
    }

    /// Freshness of the return value; trivially true without one
    pub fn check_method_freshness(&self, cx: GraphContext<'_>) -> bool {
        self.graph.return_var().is_none() || self.graph.check_method_freshness(cx)
    }

    /// Freshness of an out parameter; trivially true for other parameters
    pub fn check_parameter_freshness(&self, cx: GraphContext<'_>, p: VarId) -> bool {
        cx.program.param_mode(p) != Some(ParamMode::Out) || self.graph.check_parameter_freshness(cx, p)
    }

    pub fn to_dot(&self, cx: GraphContext<'_>) -> String {
        self.graph.to_dot(cx)
    }
}
