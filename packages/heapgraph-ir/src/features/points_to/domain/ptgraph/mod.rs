//! Per-method points-to graph
//!
//! A graph is the tuple ⟨I, O, LV, E⟩:
//! - `I` inside edges: references created by the analyzed method
//! - `O` outside edges: reads of locations the method did not create
//! - `LV` the variable → location map
//! - `E` nodes known to escape
//!
//! Graphs form a join semilattice. The order used for fixpoint termination
//! ([`PTGraph::at_most`]) compares `I`, `O` and `E` by inclusion; `LV` only
//! names locations and is replaced on join.
//!
//! ## Usage
//! ```text
//! let cx = GraphContext::new(&program, &arena);
//! let mut g = PTGraph::for_method(cx, m);
//! g.new_inside_node(cx, x, label, ty);
//! g.apply_return(cx, x, label);
//! let summary = g.simplify(cx);
//! assert!(summary.check_method_freshness(cx));
//! ```

mod annotations;
mod assign;
mod checks;
mod fields;
mod reachability;
mod simplify;

pub use reachability::{Direction, EdgeFilter};

use crate::features::ir::{MethodId, ParamMode, Program, TypeId, VarId};
use crate::features::points_to::domain::edge::Edge;
use crate::features::points_to::domain::label::Label;
use crate::features::points_to::domain::node::{NodeId, NodeKind};
use crate::features::points_to::infrastructure::edge_index::EdgeSet;
use crate::features::points_to::infrastructure::node_arena::NodeArena;
use crate::features::points_to::ports::AnnotationProvider;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type NodeSet = FxHashSet<NodeId>;

/// Program and node arena shared by every graph of a session
#[derive(Clone, Copy)]
pub struct GraphContext<'a> {
    pub program: &'a Program,
    pub arena: &'a NodeArena,
}

impl<'a> GraphContext<'a> {
    pub fn new(program: &'a Program, arena: &'a NodeArena) -> Self {
        Self { program, arena }
    }

    #[inline]
    pub fn kind(&self, n: NodeId) -> NodeKind {
        self.arena.kind(n)
    }

    #[inline]
    pub fn intern(&self, kind: NodeKind) -> NodeId {
        self.arena.intern(kind)
    }

    #[inline]
    pub fn node_type(&self, n: NodeId) -> TypeId {
        self.arena.node_type(n, self.program)
    }

    pub fn is_primitive_node(&self, n: NodeId) -> bool {
        self.program.is_primitive(self.node_type(n))
    }

    pub fn var_type(&self, v: VarId) -> TypeId {
        self.program.var_type(v)
    }

    pub fn is_primitive_var(&self, v: VarId) -> bool {
        self.program.is_primitive_var(v)
    }
}

/// Size counters, reported in logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub inside_edges: usize,
    pub outside_edges: usize,
    pub variables: usize,
    pub escaping: usize,
}

#[derive(Debug, Clone)]
pub struct PTGraph {
    method: MethodId,
    pub(crate) inside: EdgeSet,
    pub(crate) outside: EdgeSet,
    pub(crate) locals: FxHashMap<VarId, NodeSet>,
    pub(crate) escaping: NodeSet,

    // Bookkeeping, not part of equality
    parameter_map: BTreeMap<VarId, NodeId>,
    parameter_nodes: NodeSet,
    parameter_old_value: FxHashMap<VarId, NodeId>,
    leaves: FxHashMap<VarId, NodeSet>,
    return_var: Option<VarId>,
    next_label: u32,
    from_non_analyzable: bool,
}

impl PartialEq for PTGraph {
    fn eq(&self, other: &Self) -> bool {
        self.inside == other.inside
            && self.outside == other.outside
            && self.locals == other.locals
            && self.escaping == other.escaping
    }
}

impl Eq for PTGraph {}

impl PTGraph {
    fn blank(cx: GraphContext<'_>, method: MethodId) -> Self {
        let def = cx.program.method(method);
        let return_var = (!cx.program.is_primitive(def.return_type)).then_some(cx.program.return_var);
        Self {
            method,
            inside: EdgeSet::new(),
            outside: EdgeSet::new(),
            locals: FxHashMap::default(),
            escaping: NodeSet::default(),
            parameter_map: BTreeMap::new(),
            parameter_nodes: NodeSet::default(),
            parameter_old_value: FxHashMap::default(),
            leaves: FxHashMap::default(),
            return_var,
            next_label: 0,
            from_non_analyzable: false,
        }
    }

    /// Entry graph of an analyzed method: global scope, parameters with their
    /// unknown prior values, and a `Return` placeholder bound to the result
    pub fn for_method(cx: GraphContext<'_>, method: MethodId) -> Self {
        let mut g = Self::blank(cx, method);
        g.initialize(cx, None);
        g
    }

    /// Entry graph of a method summarized from its annotations; parameter
    /// values are omega nodes
    pub(crate) fn for_non_analyzable(
        cx: GraphContext<'_>,
        annotations: &dyn AnnotationProvider,
        method: MethodId,
    ) -> Self {
        let mut g = Self::blank(cx, method);
        g.from_non_analyzable = true;
        g.initialize(cx, Some(annotations));
        g
    }

    fn initialize(&mut self, cx: GraphContext<'_>, annotations: Option<&dyn AnnotationProvider>) {
        let lb = self.method_label();
        self.assign_var_node(cx, cx.program.global_var, NodeId::GLOBAL, lb);

        let def = cx.program.method(self.method);
        let params = def
            .this_param
            .iter()
            .map(|p| (0u32, p.var))
            .chain(def.params.iter().enumerate().map(|(i, p)| (i as u32 + 1, p.var)));

        for (index, var) in params {
            let ty = cx.var_type(var);
            let mode = match cx.program.param_mode(var) {
                _ if index == 0 => ParamMode::ByValue,
                Some(ParamMode::Out) => ParamMode::Out,
                Some(ParamMode::Ref) if cx.program.is_reference(ty) => ParamMode::Ref,
                _ => ParamMode::ByValue,
            };
            let pn = cx.intern(NodeKind::Parameter {
                method: self.method,
                index,
                mode,
                ty,
            });
            self.locals.insert(var, std::iter::once(pn).collect());
            self.parameter_map.insert(var, pn);
            self.parameter_nodes.insert(pn);
            self.leaves.insert(var, NodeSet::default());
            if let Some(old) = self.attach_parameter_value(cx, annotations, var, pn, mode) {
                self.parameter_old_value.insert(var, old);
            }
        }

        if let Some(ret) = self.return_var {
            let r = cx.intern(NodeKind::Return {
                label: lb,
                ty: def.return_type,
            });
            self.assign_var_node(cx, ret, r, lb);
        }
    }

    /// Hangs the unknown prior value off a parameter node and records it as a leaf
    fn attach_parameter_value(
        &mut self,
        cx: GraphContext<'_>,
        annotations: Option<&dyn AnnotationProvider>,
        var: VarId,
        pn: NodeId,
        mode: ParamMode,
    ) -> Option<NodeId> {
        let ty = cx.var_type(var);
        if cx.program.is_primitive(ty) {
            return None;
        }
        let annotated = annotations.is_some();
        let confined = annotations
            .map_or(false, |a| a.is_write_confined_parameter(cx.program, self.method, var));
        let mark = |n: NodeId| {
            if annotated {
                cx.arena.set_omega(n);
                if confined {
                    cx.arena.set_omega_confined(n);
                }
            }
        };

        let val = if mode != ParamMode::ByValue && cx.program.is_reference(ty) {
            let elem = cx.program.element_type(ty);
            let an = cx.intern(NodeKind::ParameterValue {
                of: pn,
                ty: elem,
                annotated,
            });
            self.outside.add(Edge::deref(pn, an));
            let fresh = annotations.map_or(false, |a| a.is_declared_fresh_param(cx.program, var));
            let vn = if fresh {
                let label = self.next_label();
                cx.intern(NodeKind::Inside { label, ty: elem })
            } else {
                let vn = cx.intern(NodeKind::ParameterValue {
                    of: an,
                    ty: elem,
                    annotated,
                });
                mark(vn);
                vn
            };
            self.outside.add(Edge::deref(an, vn));
            an
        } else {
            let vn = cx.intern(NodeKind::ParameterValue { of: pn, ty, annotated });
            self.outside.add(Edge::deref(pn, vn));
            mark(vn);
            vn
        };
        self.leaves.entry(var).or_default().insert(val);
        Some(val)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn method(&self) -> MethodId {
        self.method
    }

    pub fn method_label(&self) -> Label {
        Label::entry(self.method)
    }

    /// Fresh synthetic label for nodes not tied to a statement
    pub fn next_label(&mut self) -> Label {
        let label = Label::synthetic(self.method, self.next_label);
        self.next_label += 1;
        label
    }

    pub fn inside(&self) -> &EdgeSet {
        &self.inside
    }

    pub fn outside(&self) -> &EdgeSet {
        &self.outside
    }

    pub fn escaping(&self) -> &NodeSet {
        &self.escaping
    }

    pub fn mark_escaping(&mut self, n: NodeId) {
        self.escaping.insert(n);
    }

    pub fn locals(&self) -> &FxHashMap<VarId, NodeSet> {
        &self.locals
    }

    /// Current locations of `v` without binding it
    pub fn locations_of(&self, v: VarId) -> Option<&NodeSet> {
        self.locals.get(&v)
    }

    pub fn parameter_map(&self) -> &BTreeMap<VarId, NodeId> {
        &self.parameter_map
    }

    /// Addresses of every parameter (`AddrPNodes`)
    pub fn parameter_nodes(&self) -> &NodeSet {
        &self.parameter_nodes
    }

    pub fn parameter_old_value(&self, p: VarId) -> Option<NodeId> {
        self.parameter_old_value.get(&p).copied()
    }

    pub fn leaves(&self, p: VarId) -> Option<&NodeSet> {
        self.leaves.get(&p)
    }

    /// The return pseudo variable, present for non-void non-primitive results
    pub fn return_var(&self) -> Option<VarId> {
        self.return_var
    }

    pub fn is_from_non_analyzable(&self) -> bool {
        self.from_non_analyzable
    }

    pub fn is_bottom(&self) -> bool {
        self.inside.is_empty() && self.outside.is_empty() && self.locals.is_empty() && self.escaping.is_empty()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            inside_edges: self.inside.len(),
            outside_edges: self.outside.len(),
            variables: self.locals.len(),
            escaping: self.escaping.len(),
        }
    }

    /// Every node mentioned by an edge, a variable binding or the escaping set
    pub fn nodes(&self) -> NodeSet {
        let mut ns = self.inside.nodes();
        ns.extend(self.outside.nodes());
        ns.extend(self.locals.values().flatten().copied());
        ns.extend(self.escaping.iter().copied());
        ns
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lattice
    // ═══════════════════════════════════════════════════════════════════════

    /// `a ⊑ b` over inside, outside and escaping sets
    pub fn at_most(a: &PTGraph, b: &PTGraph) -> bool {
        a.inside.is_subset(&b.inside)
            && a.outside.is_subset(&b.outside)
            && a.escaping.is_subset(&b.escaping)
    }

    /// `other ⊑ self`
    pub fn includes(&self, other: &PTGraph) -> bool {
        Self::at_most(other, self)
    }

    pub fn join(&mut self, other: &PTGraph) {
        self.inside.union_with(&other.inside);
        self.outside.union_with(&other.outside);
        self.escaping.extend(other.escaping.iter().copied());
        self.join_locals(&other.locals);
    }

    /// Bindings are unioned per variable. A struct temp bound to different
    /// struct nodes on two paths keeps both, so its fields are read from either.
    fn join_locals(&mut self, incoming: &FxHashMap<VarId, NodeSet>) {
        for (&var, locs) in incoming {
            if locs.is_empty() {
                continue;
            }
            self.locals.entry(var).or_default().extend(locs.iter().copied());
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::features::ir::{Program, ProgramBuilder, TypeId};

    /// `App.Node { next: Node }` with an instance method `Node.Run(Node p): Node`
    pub(crate) struct Fixture {
        pub program: Program,
        pub arena: NodeArena,
        pub node: TypeId,
        pub next: crate::features::ir::FieldId,
        pub run: MethodId,
        pub this: VarId,
        pub p: VarId,
        pub x: VarId,
        pub y: VarId,
    }

    impl Fixture {
        pub fn new() -> Self {
            let mut pb = ProgramBuilder::new("App");
            let node = pb.class("App", "Node");
            let next = pb.field(node, "next", node);
            let run = pb.method(node, "Run").instance().param("p", node).returns(node).build();
            let this = pb.param_var(run, 0).expect("this");
            let p = pb.param_var(run, 1).expect("p");
            let x = pb.local(run, "x", node);
            let y = pb.local(run, "y", node);
            Self {
                program: pb.finish(),
                arena: NodeArena::new(),
                node,
                next,
                run,
                this,
                p,
                x,
                y,
            }
        }

        pub fn cx(&self) -> GraphContext<'_> {
            GraphContext::new(&self.program, &self.arena)
        }

        pub fn label(&self, index: usize) -> Label {
            Label::stmt(self.run, crate::features::ir::BlockId(0), index)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::Fixture;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entry_graph_shape() {
        let f = Fixture::new();
        let cx = f.cx();
        let g = PTGraph::for_method(cx, f.run);

        assert_eq!(g.parameter_map().len(), 2);
        assert_eq!(g.parameter_nodes().len(), 2);
        assert_eq!(g.return_var(), Some(f.program.return_var));

        // global binding
        let global_locs = g.locations_of(f.program.global_var).expect("global bound");
        let global_values = g.values(cx, global_locs);
        assert_eq!(global_values, std::iter::once(NodeId::GLOBAL).collect());

        // every reference parameter has one outside edge to its prior value
        for (&var, &pn) in g.parameter_map() {
            let old = g.parameter_old_value(var).expect("old value");
            assert!(g.outside().contains(&Edge::deref(pn, old)));
            assert!(cx.kind(old).is_parameter_value());
            assert!(!cx.arena.is_omega(old));
        }

        // return placeholder
        let ret_locs = g.locations_of(f.program.return_var).expect("ret bound").clone();
        let ret_values = g.values(cx, &ret_locs);
        assert_eq!(ret_values.len(), 1);
        assert!(ret_values.iter().all(|&n| cx.kind(n).is_inside()));
    }

    #[test]
    fn test_join_is_idempotent_and_commutative() {
        let f = Fixture::new();
        let cx = f.cx();
        let mut a = PTGraph::for_method(cx, f.run);
        a.new_inside_node(cx, f.x, f.label(0), f.node);
        let mut b = PTGraph::for_method(cx, f.run);
        b.new_inside_node(cx, f.y, f.label(1), f.node);
        b.store(cx, f.y, crate::features::points_to::domain::field::Field::Named(f.next), f.p, f.label(2));

        let mut ab = a.clone();
        ab.join(&b);
        let mut ba = b.clone();
        ba.join(&a);
        assert_eq!(ab.inside(), ba.inside());
        assert_eq!(ab.outside(), ba.outside());
        assert_eq!(ab.escaping(), ba.escaping());

        let mut aa = ab.clone();
        aa.join(&ab);
        assert_eq!(aa, ab);
        assert!(ab.includes(&a));
        assert!(ab.includes(&b));
        assert!(!a.includes(&ab));
    }

    #[test]
    fn test_join_locals_unions_bindings() {
        let f = Fixture::new();
        let cx = f.cx();
        let mut a = PTGraph::for_method(cx, f.run);
        a.new_inside_node(cx, f.x, f.label(0), f.node);
        let mut b = a.clone();
        b.apply_assign_null(cx, f.x);

        a.join(&b);
        let xs = a.locations_of(f.x).expect("x bound").clone();
        let values = a.values(cx, &xs);
        // both the inside object and null are possible after the merge
        assert!(values.contains(&NodeId::NULL));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_join_of_struct_temps_bound_on_two_paths() {
        use crate::features::ir::{BlockId, ProgramBuilder};
        use crate::features::points_to::domain::field::Field;

        let mut pb = ProgramBuilder::new("App");
        let obj = pb.class("App", "Obj");
        let pair = pb.struct_type("App", "Pair");
        let x = Field::Named(pb.field(pair, "x", obj));
        let m = pb.method(obj, "Merge").build();
        let st = pb.local(m, "st", pair);
        let y = pb.local(m, "y", obj);
        let program = pb.finish();
        let arena = NodeArena::new();
        let cx = GraphContext::new(&program, &arena);
        let lb = |i| Label::stmt(m, BlockId(0), i);

        // each predecessor binds st to its own struct node, then st.x = y
        let path = |at: usize| {
            let mut g = PTGraph::for_method(cx, m);
            g.add_variable(cx, st, lb(at));
            g.new_inside_node(cx, y, lb(at + 1), obj);
            g.store(cx, st, x, y, lb(at + 2));
            g
        };
        let a = path(0);
        let b = path(10);

        let mut ab = a.clone();
        ab.join(&b);
        let mut ba = b.clone();
        ba.join(&a);
        assert_eq!(ab.inside(), ba.inside());
        assert_eq!(ab, ba);

        let bound = ab.locations_of(st).expect("st bound");
        assert_eq!(bound.len(), 2);
        let stored: NodeSet = bound
            .iter()
            .flat_map(|&n| ab.field_addresses(n, x))
            .flat_map(|slot| ab.values_of(cx, slot))
            .collect();
        let expected: NodeSet = [1, 11]
            .into_iter()
            .map(|i| cx.intern(NodeKind::Inside { label: lb(i), ty: obj }))
            .collect();
        assert_eq!(stored, expected, "st.x reads the value stored on either path");
    }
}
