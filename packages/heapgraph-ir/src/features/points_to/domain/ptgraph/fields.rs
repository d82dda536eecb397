//! Field, element and indirect accesses

use super::{EdgeFilter, GraphContext, NodeSet, PTGraph};
use crate::features::ir::{FieldId, TypeId, VarId};
use crate::features::points_to::domain::edge::Edge;
use crate::features::points_to::domain::field::Field;
use crate::features::points_to::domain::label::Label;
use crate::features::points_to::domain::node::{NodeId, NodeKind};

impl PTGraph {
    // ───────────────────────────────────────────────────────────────────────
    // Edge helpers
    // ───────────────────────────────────────────────────────────────────────

    /// Inside field edge, struct-tagged when the holder is a struct
    pub(crate) fn assign_field(&mut self, cx: GraphContext<'_>, n1: NodeId, f: Field, n2: NodeId) {
        let e = Edge::new(n1, f, n2);
        if cx.kind(n1).is_struct() {
            self.inside.add_struct(e);
        } else {
            self.inside.add(e);
        }
    }

    /// Outside field edge, struct-tagged when the holder is a struct
    pub(crate) fn set_load_field(&mut self, cx: GraphContext<'_>, loc: NodeId, f: Field, n2: NodeId) {
        let e = Edge::new(loc, f, n2);
        if cx.kind(loc).is_struct() {
            self.outside.add_struct(e);
        } else {
            self.outside.add(e);
        }
    }

    fn assign_load_field(&mut self, cx: GraphContext<'_>, addrs: &NodeSet, f: Field, n2: NodeId) {
        for loc in self.values(cx, addrs) {
            self.set_load_field(cx, loc, f, n2);
        }
    }

    /// Slots of `n.f`, including the wildcard fields
    pub fn field_addresses(&self, n: NodeId, f: Field) -> NodeSet {
        let mut fa = self.field_addresses_store(n, f);
        for wildcard in [Field::AllFields, Field::AllFieldsNotOwned] {
            fa.extend(self.inside.successors(n, wildcard));
            fa.extend(self.outside.successors(n, wildcard));
        }
        fa
    }

    /// Slots of `n.f` for a write: concrete edges only
    pub fn field_addresses_store(&self, n: NodeId, f: Field) -> NodeSet {
        self.inside.successors(n, f).chain(self.outside.successors(n, f)).collect()
    }

    /// Field slots of `v`'s values, plus the slots reached through escaping
    /// bases. A base is escaping when it is reachable from the external nodes
    /// by outside edges only; when such bases have no slot for `f`, one
    /// outside load address is created for all of them.
    pub fn field_address_of_var(
        &mut self,
        cx: GraphContext<'_>,
        v: VarId,
        f: Field,
        lb: Label,
        target_ty: TypeId,
    ) -> (NodeSet, NodeSet) {
        let mut v_values = self.var_values(cx, v);
        self.check_values(cx, &mut v_values, lb, v);

        let external = self.external_nodes(cx);
        let reachable = self.nodes_reachable(&external, super::Direction::Forward, EdgeFilter::OUTSIDE);
        let bases: Vec<NodeId> = v_values
            .iter()
            .copied()
            .filter(|n| reachable.contains(n) && *n != NodeId::NULL)
            .collect();

        let mut addrs = NodeSet::default();
        for &loc in v_values.iter().filter(|&&n| n != NodeId::NULL) {
            addrs.extend(self.field_addresses(loc, f));
        }

        let mut escaping = NodeSet::default();
        for &loc in &bases {
            escaping.extend(self.field_addresses(loc, f));
        }
        if escaping.is_empty() && !bases.is_empty() {
            let addr = self.new_load_address(cx, lb, target_ty);
            escaping.insert(addr);
            for &loc in &bases {
                self.set_load_field(cx, loc, f, addr);
            }
        }
        (addrs, escaping)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Store
    // ═══════════════════════════════════════════════════════════════════════

    /// `v1.f = v2` (weak)
    pub fn store(&mut self, cx: GraphContext<'_>, v1: VarId, f: Field, v2: VarId, lb: Label) {
        if cx.is_primitive_var(v2) {
            return;
        }
        let mut v1_values = self.var_values(cx, v1);
        self.check_values(cx, &mut v1_values, lb, v1);
        let mut v2_values = self.var_values(cx, v2);
        self.check_values(cx, &mut v2_values, lb, v2);
        for obj in v1_values {
            self.store_nodes(cx, obj, f, &v2_values, lb);
        }
    }

    pub fn store_nodes(&mut self, cx: GraphContext<'_>, n1: NodeId, f: Field, n2s: &NodeSet, lb: Label) {
        for &n2 in n2s {
            self.store_node(cx, n1, f, n2, lb);
        }
    }

    /// `n1.f = n2`: creates the slot on first write
    pub fn store_node(&mut self, cx: GraphContext<'_>, n1: NodeId, f: Field, n2: NodeId, lb: Label) {
        if cx.is_primitive_node(n2) {
            return;
        }
        let mut addrs = self.field_addresses_store(n1, f);
        if addrs.is_empty() {
            let ty = cx.node_type(n2);
            // struct values are copied into their own storage, never aliased
            let addr = if cx.kind(n2).is_struct() {
                cx.intern(NodeKind::Struct { label: lb, ty })
            } else {
                cx.intern(NodeKind::Address { label: lb, ty })
            };
            self.assign_field(cx, n1, f, addr);
            addrs.insert(addr);
        }
        for addr in addrs {
            self.assign_one(cx, addr, n2, lb, false);
        }
    }

    /// `*v1 = v2`, always weak
    pub fn store_indirect(&mut self, cx: GraphContext<'_>, v1: VarId, v2: VarId, lb: Label) {
        if cx.is_primitive_var(v2) {
            return;
        }
        let mut values1 = self.var_values(cx, v1);
        self.check_values(cx, &mut values1, lb, v1);
        let mut values2 = self.var_values(cx, v2);
        self.check_values(cx, &mut values2, lb, v2);
        self.assign(cx, &values1, &values2, lb, false);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Load
    // ═══════════════════════════════════════════════════════════════════════

    /// `v1 = v2.f`
    pub fn load(&mut self, cx: GraphContext<'_>, v1: VarId, v2: VarId, f: Field, lb: Label) {
        if cx.is_primitive_var(v1) {
            self.forget_variable(v1);
            return;
        }
        let values = self.load_nodes(cx, cx.var_type(v1), v2, f, lb);
        self.assign_var_nodes(cx, v1, &values, lb);
    }

    /// Values read by `v2.f`, synthesizing outside loads where the graph has
    /// no information
    pub fn load_nodes(&mut self, cx: GraphContext<'_>, v1_ty: TypeId, v2: VarId, f: Field, lb: Label) -> NodeSet {
        let (mut addrs, escaping) = self.field_address_of_var(cx, v2, f, lb, v1_ty);

        if addrs.is_empty() && escaping.is_empty() {
            let ln = self.new_load_or_struct(cx, lb, v1_ty);
            let addr = if cx.program.is_struct(cx.var_type(v2)) {
                ln
            } else {
                let a = self.new_load_address(cx, lb, v1_ty);
                self.outside.add(Edge::deref(a, ln));
                a
            };
            let mut v2_values = self.var_values(cx, v2);
            self.check_values(cx, &mut v2_values, lb, v2);
            for loc in v2_values {
                self.set_load_field(cx, loc, f, addr);
            }
            addrs.insert(addr);
        }

        let mut values = self.values(cx, &addrs);
        if !escaping.is_empty() && self.values(cx, &escaping).is_empty() {
            let ln = self.new_load_or_struct(cx, lb, v1_ty);
            for &addr in &escaping {
                self.outside.add(Edge::deref(addr, ln));
            }
            values.insert(ln);
        }
        values
    }

    /// `v1 = *v2`
    pub fn load_indirect(&mut self, cx: GraphContext<'_>, v1: VarId, v2: VarId, lb: Label) {
        if cx.is_primitive_var(v1) {
            return;
        }
        let mut values2 = self.var_values(cx, v2);
        self.check_values(cx, &mut values2, lb, v2);
        let mut pointed = self.values(cx, &values2);
        if pointed.is_empty() {
            let ln = self.new_load_or_struct(cx, lb, cx.var_type(v1));
            let locs = self.locations(cx, v2);
            self.assign_load_field(cx, &locs, Field::Deref, ln);
            pointed.insert(ln);
        }
        let targets = self.locations(cx, v1);
        self.assign(cx, &targets, &pointed, lb, true);
    }

    /// `v1 = &v2`
    pub fn load_address(&mut self, cx: GraphContext<'_>, v1: VarId, v2: VarId) {
        let targets = self.locations_ref(cx, v1);
        for &t in &targets {
            self.remove_values(t);
        }
        let sources = self.locations(cx, v2);
        self.assign_values(&targets, &sources);
    }

    /// `v1 = &v2.f`
    pub fn load_field_address(&mut self, cx: GraphContext<'_>, v1: VarId, v2: VarId, f: Field, lb: Label) {
        let slot_ty = cx.program.element_type(cx.var_type(v1));
        if cx.program.is_primitive(slot_ty) {
            return;
        }
        let (mut addrs, escaping) = self.field_address_of_var(cx, v2, f, lb, slot_ty);
        if addrs.is_empty() && escaping.is_empty() {
            let addr = self.new_load_address(cx, lb, slot_ty);
            let mut v2_values = self.var_values(cx, v2);
            self.check_values(cx, &mut v2_values, lb, v2);
            let locs = self.locations(cx, v2);
            self.assign_load_field(cx, &locs, f, addr);
            addrs.insert(addr);
        }
        let targets = self.locations_ref(cx, v1);
        self.assign_values(&targets, &addrs);
    }

    // ───────────────────────────────────────────────────────────────────────
    // Elements and statics
    // ───────────────────────────────────────────────────────────────────────

    /// `v1 = a[i]`
    pub fn load_element(&mut self, cx: GraphContext<'_>, v1: VarId, array: VarId, lb: Label) {
        self.load(cx, v1, array, Field::ArrayElement, lb);
    }

    /// `a[i] = v2`
    pub fn store_element(&mut self, cx: GraphContext<'_>, array: VarId, v2: VarId, lb: Label) {
        self.store(cx, array, Field::ArrayElement, v2, lb);
    }

    /// `v1 = &a[i]`
    pub fn load_element_address(&mut self, cx: GraphContext<'_>, v1: VarId, array: VarId, lb: Label) {
        self.load_field_address(cx, v1, array, Field::ArrayElement, lb);
    }

    /// `v1 = T.f`: a field of the global scope
    pub fn load_static(&mut self, cx: GraphContext<'_>, v1: VarId, f: FieldId, lb: Label) {
        self.load(cx, v1, cx.program.global_var, Field::Named(f), lb);
    }

    /// `T.f = v2`
    pub fn store_static(&mut self, cx: GraphContext<'_>, f: FieldId, v2: VarId, lb: Label) {
        self.store(cx, cx.program.global_var, Field::Named(f), v2, lb);
    }

    /// `v1 = &T.f`
    pub fn load_static_address(&mut self, cx: GraphContext<'_>, v1: VarId, f: FieldId, lb: Label) {
        self.load_field_address(cx, v1, cx.program.global_var, Field::Named(f), lb);
    }

    /// Drops every `f` edge leaving the values of `v`
    pub fn forget_field(&mut self, cx: GraphContext<'_>, v: VarId, f: Field) {
        for n in self.var_values(cx, v) {
            self.inside.remove_from(n, f);
            self.outside.remove_from(n, f);
        }
    }
}
