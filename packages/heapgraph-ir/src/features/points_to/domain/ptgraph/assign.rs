//! Variable bindings, values and assignment

use super::{GraphContext, NodeSet, PTGraph};
use crate::features::ir::{MethodId, TypeId, VarId};
use crate::features::points_to::domain::edge::Edge;
use crate::features::points_to::domain::field::Field;
use crate::features::points_to::domain::label::Label;
use crate::features::points_to::domain::node::{LoadKind, NodeId, NodeKind};

impl PTGraph {
    // ═══════════════════════════════════════════════════════════════════════
    // Locations
    // ═══════════════════════════════════════════════════════════════════════

    /// Binds `v` to fresh storage: a `Struct` node for struct-typed variables,
    /// the variable's address otherwise
    pub fn add_variable(&mut self, cx: GraphContext<'_>, v: VarId, lb: Label) -> NodeId {
        let ty = cx.var_type(v);
        let node = if cx.program.is_struct(ty) {
            cx.intern(NodeKind::Struct { label: lb, ty })
        } else {
            self.variable_address(cx, v)
        };
        self.locals.insert(v, std::iter::once(node).collect());
        node
    }

    fn variable_address(&self, cx: GraphContext<'_>, v: VarId) -> NodeId {
        cx.intern(NodeKind::VariableRef {
            method: self.method,
            var: v,
            ty: cx.var_type(v),
        })
    }

    /// Parameters keep their address; everything else is re-bound before a write
    pub fn verify_and_set_location_for_assignment(&mut self, cx: GraphContext<'_>, v: VarId, lb: Label) {
        if !cx.program.var(v).is_parameter() || !self.locals.contains_key(&v) {
            self.add_variable(cx, v, lb);
        }
    }

    /// Locations of `v`, binding it on first use
    pub fn locations(&mut self, cx: GraphContext<'_>, v: VarId) -> NodeSet {
        if !self.locals.contains_key(&v) {
            let lb = self.method_label();
            self.add_variable(cx, v, lb);
        }
        self.locals.get(&v).cloned().unwrap_or_default()
    }

    /// Like [`Self::locations`] but always binds an address, even for structs
    pub fn locations_ref(&mut self, cx: GraphContext<'_>, v: VarId) -> NodeSet {
        if !self.locals.contains_key(&v) {
            let addr = self.variable_address(cx, v);
            self.locals.insert(v, std::iter::once(addr).collect());
        }
        self.locals.get(&v).cloned().unwrap_or_default()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Values
    // ═══════════════════════════════════════════════════════════════════════

    /// Nodes `n` dereferences to. A struct with no inside value is its own value.
    pub fn values_of(&self, cx: GraphContext<'_>, n: NodeId) -> NodeSet {
        let mut values: NodeSet = self.inside.successors(n, Field::Deref).collect();
        if values.is_empty() && cx.kind(n).is_struct() {
            values.insert(n);
        } else {
            values.extend(self.outside.successors(n, Field::Deref));
        }
        values
    }

    pub fn values(&self, cx: GraphContext<'_>, ns: &NodeSet) -> NodeSet {
        let mut res = NodeSet::default();
        for &n in ns {
            res.extend(self.values_of(cx, n));
        }
        res
    }

    pub fn var_values(&mut self, cx: GraphContext<'_>, v: VarId) -> NodeSet {
        let locs = self.locations(cx, v);
        self.values(cx, &locs)
    }

    /// Values of `v`, synthesizing a load when it has none
    pub fn values_or_load(&mut self, cx: GraphContext<'_>, v: VarId, lb: Label) -> NodeSet {
        let mut values = self.var_values(cx, v);
        self.check_values(cx, &mut values, lb, v);
        values
    }

    /// An unbound non-primitive variable reads an unknown value: hang a
    /// value node off each of its locations through an outside edge
    pub fn check_values(&mut self, cx: GraphContext<'_>, values: &mut NodeSet, lb: Label, v: VarId) {
        if !values.is_empty() || cx.is_primitive_var(v) {
            return;
        }
        let ty = cx.var_type(v);
        for addr in self.locations(cx, v) {
            let vn = self.new_value_node(cx, lb, addr, ty);
            self.set_load_field(cx, addr, Field::Deref, vn);
            values.insert(vn);
        }
    }

    /// [`Self::check_values`] for a bare address
    pub fn check_values_at(&mut self, cx: GraphContext<'_>, values: &mut NodeSet, lb: Label, addr: NodeId) {
        if !values.is_empty() || cx.is_primitive_node(addr) {
            return;
        }
        let ty = cx.node_type(addr);
        let vn = self.new_value_node(cx, lb, addr, ty);
        self.set_load_field(cx, addr, Field::Deref, vn);
        values.insert(vn);
    }

    pub(crate) fn new_value_node(&self, cx: GraphContext<'_>, lb: Label, addr: NodeId, ty: TypeId) -> NodeId {
        if let NodeKind::Parameter { mode, .. } = cx.kind(addr) {
            if mode == crate::features::ir::ParamMode::ByValue {
                return cx.intern(NodeKind::ParameterValue {
                    of: addr,
                    ty,
                    annotated: self.from_non_analyzable,
                });
            }
            if !cx.program.is_struct_ref(ty) {
                return cx.intern(NodeKind::Load {
                    label: lb,
                    ty,
                    kind: LoadKind::ParamAddress { param: addr },
                });
            }
        }
        self.new_value_or_struct(cx, lb, ty)
    }

    fn new_value_or_struct(&self, cx: GraphContext<'_>, lb: Label, ty: TypeId) -> NodeId {
        if cx.program.is_struct_ref(ty) {
            cx.intern(NodeKind::Struct {
                label: lb,
                ty: cx.program.element_type(ty),
            })
        } else {
            cx.intern(NodeKind::Load {
                label: lb,
                ty,
                kind: LoadKind::Value,
            })
        }
    }

    pub(crate) fn new_load_or_struct(&self, cx: GraphContext<'_>, lb: Label, ty: TypeId) -> NodeId {
        if cx.program.is_struct(ty) {
            cx.intern(NodeKind::Struct { label: lb, ty })
        } else {
            cx.intern(NodeKind::Load {
                label: lb,
                ty,
                kind: LoadKind::Value,
            })
        }
    }

    pub(crate) fn new_load_address(&self, cx: GraphContext<'_>, lb: Label, ty: TypeId) -> NodeId {
        cx.intern(NodeKind::Load {
            label: lb,
            ty,
            kind: LoadKind::Address,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Assignment
    // ═══════════════════════════════════════════════════════════════════════

    /// `v1 = v2` (strong)
    pub fn assign_var_var(&mut self, cx: GraphContext<'_>, v1: VarId, v2: VarId, lb: Label) {
        self.verify_and_set_location_for_assignment(cx, v1, lb);
        let mut values = self.var_values(cx, v2);
        self.check_values(cx, &mut values, lb, v2);
        let targets = self.locations(cx, v1);
        self.assign(cx, &targets, &values, lb, true);
    }

    pub fn assign_var_node(&mut self, cx: GraphContext<'_>, v1: VarId, n: NodeId, lb: Label) {
        self.assign_var_nodes(cx, v1, &std::iter::once(n).collect(), lb);
    }

    pub fn assign_var_nodes(&mut self, cx: GraphContext<'_>, v1: VarId, ns: &NodeSet, lb: Label) {
        self.verify_and_set_location_for_assignment(cx, v1, lb);
        let targets = self.locations(cx, v1);
        self.assign(cx, &targets, ns, lb, true);
    }

    pub fn assign(&mut self, cx: GraphContext<'_>, targets: &NodeSet, sources: &NodeSet, lb: Label, strong: bool) {
        for &n1 in targets {
            self.assign_node(cx, n1, sources, lb, strong);
        }
    }

    /// A strong update drops every dereference edge of `n1` first
    pub fn assign_node(&mut self, cx: GraphContext<'_>, n1: NodeId, sources: &NodeSet, lb: Label, strong: bool) {
        if strong {
            self.remove_values(n1);
        }
        for &n2 in sources {
            self.assign_one(cx, n1, n2, lb, false);
        }
    }

    pub(crate) fn assign_one(&mut self, cx: GraphContext<'_>, n1: NodeId, n2: NodeId, lb: Label, strong: bool) {
        if cx.kind(n1).is_struct() {
            self.remove_values(n1);
            self.copy_struct(cx, n1, n2, lb);
        } else {
            if strong {
                self.remove_values(n1);
            }
            self.inside.add(Edge::deref(n1, n2));
        }
    }

    /// Adds dereference edges without removing any
    pub fn assign_values(&mut self, targets: &NodeSet, sources: &NodeSet) {
        for &n1 in targets {
            for &n2 in sources {
                self.inside.add(Edge::deref(n1, n2));
            }
        }
    }

    pub fn remove_values(&mut self, addr: NodeId) {
        self.inside.remove_from(addr, Field::Deref);
        self.outside.remove_from(addr, Field::Deref);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Statement-level helpers
    // ═══════════════════════════════════════════════════════════════════════

    /// `v = v2`
    pub fn copy_loc_var(&mut self, cx: GraphContext<'_>, v1: VarId, v2: VarId, lb: Label) {
        self.assign_var_var(cx, v1, v2, lb);
    }

    /// `v = null`
    pub fn apply_assign_null(&mut self, cx: GraphContext<'_>, v: VarId) {
        let lb = self.method_label();
        self.assign_var_node(cx, v, NodeId::NULL, lb);
    }

    /// Drops `v` and its values from the graph
    pub fn forget_variable(&mut self, v: VarId) {
        if let Some(locs) = self.locals.remove(&v) {
            for n in locs {
                self.remove_values(n);
            }
        }
    }

    /// `return v`
    pub fn apply_return(&mut self, cx: GraphContext<'_>, v: VarId, lb: Label) {
        if cx.is_primitive_var(v) {
            return;
        }
        if let Some(ret) = self.return_var {
            self.assign_var_var(cx, ret, v, lb);
        }
    }

    /// `v = new T`: a delegate object for delegate types, an inside node otherwise
    pub fn new_inside_node(&mut self, cx: GraphContext<'_>, v: VarId, lb: Label, ty: TypeId) {
        let n = if cx.program.is_delegate(ty) {
            cx.intern(NodeKind::MethodDelegate { label: lb, ty })
        } else {
            cx.intern(NodeKind::Inside { label: lb, ty })
        };
        self.assign_var_node(cx, v, n, lb);
    }

    /// `v = &m` (static or instance method pointer)
    pub fn load_method(&mut self, cx: GraphContext<'_>, v: VarId, m: MethodId, lb: Label) {
        let ty = cx.program.method(m).return_type;
        let n = cx.intern(NodeKind::Method { label: lb, method: m, ty });
        self.assign_var_node(cx, v, n, lb);
    }

    /// Binds the delegate objects `v` denotes to the method `method_ptr` holds
    /// and the receiver values. An ambiguous method pointer nulls `v`.
    pub fn assign_delegate(
        &mut self,
        cx: GraphContext<'_>,
        v: VarId,
        receiver: Option<VarId>,
        method_ptr: VarId,
    ) {
        let pointers = self.var_values(cx, method_ptr);
        let target = match pointers.iter().next() {
            Some(&n) if pointers.len() == 1 => match cx.kind(n) {
                NodeKind::Method { method, .. } => Some(method),
                _ => None,
            },
            _ => None,
        };
        let Some(method) = target else {
            self.apply_assign_null(cx, v);
            return;
        };
        let receivers = match receiver {
            Some(r) => self.var_values(cx, r),
            None => NodeSet::default(),
        };
        for n in self.var_values(cx, v) {
            if cx.kind(n).is_method_delegate() {
                cx.arena.bind_delegate(n, method, receivers.clone());
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Struct copy
    // ═══════════════════════════════════════════════════════════════════════

    /// Copies the fields of struct `src` into struct `dst`. Slots already
    /// present in `dst` for a field are reused, otherwise a new slot labelled
    /// `lb` is created; struct slots recurse, other slots receive the source
    /// slot's values.
    pub fn copy_struct(&mut self, cx: GraphContext<'_>, dst: NodeId, src: NodeId, lb: Label) {
        let mut visited = NodeSet::default();
        let mut stack = vec![(dst, src, EdgeSide::Outside), (dst, src, EdgeSide::Inside)];

        while let Some((d, s, side)) = stack.pop() {
            visited.insert(s);
            let edges: Vec<Edge> = self.side(side).edges_from(s).copied().collect();
            for e in edges {
                let n = e.dst;
                if visited.contains(&n) {
                    continue;
                }
                let existing = self.side(side).successors(d, e.field).next();
                let slot = match existing {
                    Some(slot) => slot,
                    None => {
                        let ty = cx.node_type(n);
                        let slot = if cx.kind(n).is_struct() {
                            cx.intern(NodeKind::Struct { label: lb, ty })
                        } else {
                            cx.intern(NodeKind::Address { label: lb, ty })
                        };
                        self.side_mut(side).add_struct(Edge::new(d, e.field, slot));
                        slot
                    }
                };
                if cx.kind(n).is_struct() {
                    stack.push((slot, n, EdgeSide::Outside));
                    stack.push((slot, n, EdgeSide::Inside));
                } else {
                    let values = self.values_of(cx, n);
                    self.assign_values(&std::iter::once(slot).collect(), &values);
                }
            }
        }
    }

    fn side(&self, side: EdgeSide) -> &crate::features::points_to::infrastructure::edge_index::EdgeSet {
        match side {
            EdgeSide::Inside => &self.inside,
            EdgeSide::Outside => &self.outside,
        }
    }

    fn side_mut(&mut self, side: EdgeSide) -> &mut crate::features::points_to::infrastructure::edge_index::EdgeSet {
        match side {
            EdgeSide::Inside => &mut self.inside,
            EdgeSide::Outside => &mut self.outside,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum EdgeSide {
    Inside,
    Outside,
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Fixture;
    use super::*;
    use crate::features::ir::{ProgramBuilder, VarKind};
    use crate::features::points_to::infrastructure::node_arena::NodeArena;
    use pretty_assertions::assert_eq;

    fn single(n: NodeId) -> NodeSet {
        std::iter::once(n).collect()
    }

    #[test]
    fn test_strong_update_is_exclusive() {
        let f = Fixture::new();
        let cx = f.cx();
        let mut g = PTGraph::for_method(cx, f.run);
        g.new_inside_node(cx, f.x, f.label(0), f.node);
        g.assign_var_var(cx, f.y, f.p, f.label(1));
        g.assign_var_var(cx, f.y, f.x, f.label(2));

        let inside_x = g.var_values(cx, f.x);
        let y_locs = g.locations(cx, f.y);
        for &addr in &y_locs {
            let deref: NodeSet = g
                .inside()
                .successors(addr, Field::Deref)
                .chain(g.outside().successors(addr, Field::Deref))
                .collect();
            assert_eq!(deref, inside_x);
        }
    }

    #[test]
    fn test_unbound_read_synthesizes_outside_load() {
        let f = Fixture::new();
        let cx = f.cx();
        let mut g = PTGraph::for_method(cx, f.run);
        // `x` is a local never written: reading it creates a load reached by an outside edge
        let values = g.values_or_load(cx, f.x, f.label(0));
        assert_eq!(values.len(), 1);
        let v = *values.iter().next().expect("one value");
        assert!(cx.kind(v).is_load());
        let x_addr = *g.locations_of(f.x).expect("bound").iter().next().expect("addr");
        assert!(g.outside().contains(&Edge::deref(x_addr, v)));
    }

    #[test]
    fn test_parameter_reread_yields_prior_value() {
        let f = Fixture::new();
        let cx = f.cx();
        let mut g = PTGraph::for_method(cx, f.run);
        let old = g.parameter_old_value(f.p).expect("old");
        assert_eq!(g.var_values(cx, f.p), single(old));
    }

    #[test]
    fn test_forget_variable_and_null() {
        let f = Fixture::new();
        let cx = f.cx();
        let mut g = PTGraph::for_method(cx, f.run);
        g.apply_assign_null(cx, f.x);
        assert_eq!(g.var_values(cx, f.x), single(NodeId::NULL));
        g.forget_variable(f.x);
        assert!(g.locations_of(f.x).is_none());
    }

    #[test]
    fn test_delegate_binding() {
        let mut pb = ProgramBuilder::new("App");
        let t = pb.class("App", "T");
        let d = pb.delegate("App", "Handler");
        let target = pb.method(t, "OnEvent").instance().build();
        let m = pb.method(t, "Wire").instance().build();
        let this = pb.param_var(m, 0).expect("this");
        let del = pb.local(m, "d", d);
        let fp = pb.local(m, "fp", pb.object());
        let program = pb.finish();
        let arena = NodeArena::new();
        let cx = GraphContext::new(&program, &arena);

        let mut g = PTGraph::for_method(cx, m);
        let lb = Label::stmt(m, crate::features::ir::BlockId(0), 0);
        g.new_inside_node(cx, del, lb, d);
        g.load_method(cx, fp, target, lb);
        g.assign_delegate(cx, del, Some(this), fp);

        let dn = *g.var_values(cx, del).iter().next().expect("delegate");
        assert!(cx.kind(dn).is_method_delegate());
        let binding = arena.delegate(dn).expect("bound");
        assert_eq!(binding.method, Some(target));
        assert_eq!(binding.receivers, g.var_values(cx, this));
        assert!(matches!(program.var(this).kind, VarKind::Parameter { index: 0, .. }));
    }

    #[test]
    fn test_struct_copy_uses_fresh_storage() {
        let mut pb = ProgramBuilder::new("App");
        let obj = pb.class("App", "Obj");
        let inner = pb.struct_type("App", "Inner");
        let outer = pb.struct_type("App", "Outer");
        let r = pb.field(inner, "r", obj);
        let nested = pb.field(outer, "inner", inner);
        let m = pb.method(obj, "Copy").build();
        let a = pb.local(m, "a", outer);
        let b = pb.local(m, "b", outer);
        let program = pb.finish();
        let arena = NodeArena::new();
        let cx = GraphContext::new(&program, &arena);
        let lb = |i| Label::stmt(m, crate::features::ir::BlockId(0), i);

        let mut g = PTGraph::for_method(cx, m);
        // a.inner.r = new Obj, built by hand: a --inner--> s --r--> slot --*--> o
        let a_node = g.add_variable(cx, a, lb(0));
        let s = cx.intern(NodeKind::Struct { label: lb(1), ty: inner });
        g.inside.add_struct(Edge::new(a_node, Field::Named(nested), s));
        let slot = cx.intern(NodeKind::Address { label: lb(1), ty: obj });
        g.inside.add_struct(Edge::new(s, Field::Named(r), slot));
        let o = cx.intern(NodeKind::Inside { label: lb(2), ty: obj });
        g.inside.add(Edge::deref(slot, o));

        g.assign_var_var(cx, b, a, lb(3));

        let b_node = *g.locations_of(b).expect("b").iter().next().expect("node");
        assert_ne!(b_node, a_node);
        let b_inner: Vec<NodeId> = g.inside().successors(b_node, Field::Named(nested)).collect();
        assert_eq!(b_inner.len(), 1);
        assert_ne!(b_inner[0], s, "nested struct gets its own storage");
        let b_slot: Vec<NodeId> = g.inside().successors(b_inner[0], Field::Named(r)).collect();
        assert_eq!(b_slot.len(), 1);
        assert_ne!(b_slot[0], slot);
        assert_eq!(g.values_of(cx, b_slot[0]), single(o), "reference values are shared");
    }
}
