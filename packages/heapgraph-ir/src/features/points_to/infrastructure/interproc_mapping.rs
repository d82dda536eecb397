//! Interprocedural binding (μ)
//!
//! Relates callee nodes to the caller nodes they stand for at one call site,
//! then splices the callee's effects into the caller graph.
//!
//! The mapping is the least fixpoint of three rules:
//! 1. formals ↦ actuals (addresses and values)
//! 2. a callee outside edge `(n1, f, n2)` maps `n2` to what the caller wrote
//!    into `μ(n1).f`
//! 3. a callee outside edge `(n1, f, n2)` aliased with a callee inside edge
//!    `(n3, f, n4)` maps `n2` to `n4` and its image
//!
//! Relating an omega node pulls in everything reachable from the caller node
//! and marks the loads found there omega-load.

use crate::features::ir::{MethodId, ParamMode, VarId};
use crate::features::points_to::domain::edge::Edge;
use crate::features::points_to::domain::field::Field;
use crate::features::points_to::domain::label::Label;
use crate::features::points_to::domain::node::{LoadKind, NodeId, NodeKind};
use crate::features::points_to::domain::ptgraph::{GraphContext, NodeSet, PTGraph};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// Operands of one call statement
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    pub receiver: Option<VarId>,
    pub args: &'a [VarId],
    pub result: Option<VarId>,
    pub label: Label,
}

#[derive(Debug, Clone)]
pub struct InterProcMapping {
    callee: MethodId,
    mapping: FxHashMap<NodeId, NodeSet>,
    removed_load_nodes: NodeSet,
}

impl InterProcMapping {
    fn new(callee: MethodId) -> Self {
        Self {
            callee,
            mapping: FxHashMap::default(),
            removed_load_nodes: NodeSet::default(),
        }
    }

    /// Binds `callee` into `caller` at `site` and returns the mapping used
    pub fn bind(cx: GraphContext<'_>, caller: &mut PTGraph, callee: &PTGraph, site: &CallSite<'_>) -> Self {
        let mut callee = callee.simplify(cx);
        let mut ipm = Self::compute(cx, caller, &mut callee, site);
        ipm.splice(cx, caller, &callee, site);
        debug!(
            caller = %caller.method(),
            callee = %ipm.callee,
            related = ipm.size(),
            removed_loads = ipm.removed_load_nodes.len(),
            "bound call"
        );
        ipm
    }

    /// μ for an already simplified callee
    pub fn compute(cx: GraphContext<'_>, caller: &mut PTGraph, callee: &mut PTGraph, site: &CallSite<'_>) -> Self {
        let mut ipm = Self::new(callee.method());
        ipm.relate_params(cx, caller, callee, site);

        let mut inside_by_field: FxHashMap<Field, Vec<Edge>> = FxHashMap::default();
        for e in callee.inside().iter() {
            inside_by_field.entry(e.field).or_default().push(*e);
        }

        loop {
            let before = ipm.size();
            ipm.match_outside_edges(cx, caller, callee);
            ipm.match_outside_with_inside_in_callee(cx, caller, callee, &inside_by_field);
            if ipm.size() == before {
                break;
            }
        }
        ipm
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Mapping queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Total number of related pairs
    pub fn size(&self) -> usize {
        self.mapping.values().map(|s| s.len()).sum()
    }

    pub fn related(&self, n: NodeId) -> NodeSet {
        self.mapping.get(&n).cloned().unwrap_or_default()
    }

    /// `μ(n) ∪ {n}`, leaving `n` out when it is a variable address, a load
    /// removed at this call, or a callee parameter value that has an image
    pub fn related_extended(&self, cx: GraphContext<'_>, n: NodeId) -> NodeSet {
        let mut res = self.related(n);
        let kind = cx.kind(n);
        if kind.is_variable_reference() || self.is_removed_load_node(cx, n) {
            return res;
        }
        let own_parameter_value = kind.is_parameter_value() && parameter_owner(cx, n) == Some(self.callee);
        if !(own_parameter_value && !res.is_empty()) {
            res.insert(n);
        }
        res
    }

    pub fn related_extended_all(&self, cx: GraphContext<'_>, ns: &NodeSet) -> NodeSet {
        let mut res = NodeSet::default();
        for &n in ns {
            res.extend(self.related_extended(cx, n));
        }
        res
    }

    pub fn removed_load_nodes(&self) -> &NodeSet {
        &self.removed_load_nodes
    }

    fn is_removed_load_node(&self, cx: GraphContext<'_>, n: NodeId) -> bool {
        cx.kind(n).is_load() && self.removed_load_nodes.contains(&n)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Relating
    // ═══════════════════════════════════════════════════════════════════════

    fn relate(&mut self, cx: GraphContext<'_>, caller: &PTGraph, n1: NodeId, n2: NodeId) {
        if cx.arena.is_omega(n1) {
            let confined = cx.arena.is_omega_confined(n1);
            let reach = if confined {
                caller.reach_refs_owned(cx, n2)
            } else {
                caller.reach_refs(cx, n2)
            };
            for &nr in &reach {
                if cx.kind(nr).is_load() {
                    cx.arena.set_omega_load(nr);
                    if confined {
                        cx.arena.set_omega_confined_load(nr);
                    }
                }
            }
            self.mapping.entry(n1).or_default().extend(reach);
        } else {
            self.mapping.entry(n1).or_default().insert(n2);
        }
    }

    fn relate_all(&mut self, cx: GraphContext<'_>, caller: &PTGraph, ns1: &NodeSet, ns2: &NodeSet) {
        for &n1 in ns1 {
            for &n2 in ns2 {
                self.relate(cx, caller, n1, n2);
            }
        }
    }

    fn relate_param_with_arg(
        &mut self,
        cx: GraphContext<'_>,
        caller: &mut PTGraph,
        callee: &mut PTGraph,
        p: VarId,
        arg: VarId,
    ) {
        if cx.is_primitive_var(arg) {
            return;
        }
        let p_locs = callee.locations(cx, p);
        let arg_locs = caller.locations(cx, arg);
        self.relate_all(cx, caller, &p_locs, &arg_locs);

        let callee_label = callee.method_label();
        let p_values = callee.values_or_load(cx, p, callee_label);
        let caller_label = caller.method_label();
        let arg_values = caller.values_or_load(cx, arg, caller_label);
        self.relate_all(cx, caller, &p_values, &arg_values);
    }

    fn relate_params(&mut self, cx: GraphContext<'_>, caller: &mut PTGraph, callee: &mut PTGraph, site: &CallSite<'_>) {
        let def = cx.program.method(callee.method());
        if let (Some(this), Some(receiver)) = (def.this_param.as_ref(), site.receiver) {
            self.relate_param_with_arg(cx, caller, callee, this.var, receiver);
        }
        let params: Vec<VarId> = def.params.iter().map(|p| p.var).collect();
        for (p, &arg) in params.into_iter().zip(site.args) {
            self.relate_param_with_arg(cx, caller, callee, p, arg);
        }
    }

    /// Callee reads matched with caller writes
    fn match_outside_edges(&mut self, cx: GraphContext<'_>, caller: &PTGraph, callee: &PTGraph) {
        for oe in callee.outside().iter() {
            let mut ns = self.related(oe.src);
            ns.remove(&NodeId::NULL);
            for n in ns {
                let adj: NodeSet = caller.inside().successors(n, oe.field).collect();
                let dst = std::iter::once(oe.dst).collect();
                self.relate_all(cx, caller, &dst, &adj);
            }
        }
    }

    /// Callee reads matched with callee writes through caller-resolved aliasing
    fn match_outside_with_inside_in_callee(
        &mut self,
        cx: GraphContext<'_>,
        caller: &PTGraph,
        callee: &PTGraph,
        inside_by_field: &FxHashMap<Field, Vec<Edge>>,
    ) {
        let outside: Vec<Edge> = callee.outside().iter().copied().collect();
        for oe in outside {
            let (n1, n2) = (oe.src, oe.dst);
            let mut ns1 = self.related(n1);
            ns1.insert(n1);
            let n1_is_load = cx.kind(n1).is_load();

            for ie in inside_by_field.get(&oe.field).into_iter().flatten() {
                let (n3, n4) = (ie.src, ie.dst);
                if n1 == n3 && !n1_is_load {
                    continue;
                }
                let mut ns3 = self.related(n3);
                ns3.insert(n3);
                if ns1.is_disjoint(&ns3) {
                    continue;
                }
                let mut targets = self.related(n4);
                if !matches!(cx.kind(n4), NodeKind::Parameter { .. }) {
                    targets.insert(n4);
                }
                trace!(%n2, %n4, field = ?oe.field, "aliased callee read");
                let dst = std::iter::once(n2).collect();
                self.relate_all(cx, caller, &dst, &targets);
            }

            for n in self.related(n1) {
                let adj: NodeSet = caller.inside().successors(n, oe.field).collect();
                let dst = std::iter::once(n2).collect();
                self.relate_all(cx, caller, &dst, &adj);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Splicing
    // ═══════════════════════════════════════════════════════════════════════

    fn splice(&mut self, cx: GraphContext<'_>, caller: &mut PTGraph, callee: &PTGraph, site: &CallSite<'_>) {
        let mut new_inside = Vec::new();
        for ie in callee.inside().iter() {
            let dsts = self.related_extended(cx, ie.dst);
            for nu1 in self.related_extended(cx, ie.src) {
                new_inside.extend(dsts.iter().map(|&nu2| (callee.inside().is_struct_edge(ie), Edge::new(nu1, ie.field, nu2))));
            }
        }
        let mut new_outside = Vec::new();
        for oe in callee.outside().iter() {
            for nu1 in self.related_extended(cx, oe.src) {
                if nu1 != NodeId::NULL {
                    new_outside.push(Edge::new(nu1, oe.field, oe.dst));
                }
            }
        }
        let escaping = self.related_extended_all(cx, callee.escaping());

        for (is_struct, e) in new_inside {
            if is_struct {
                caller.inside.add_struct(e);
            } else {
                caller.inside.add(e);
            }
        }
        for e in new_outside {
            caller.outside.add(e);
        }
        caller.escaping.extend(escaping);

        let mut arg_nodes = NodeSet::default();
        if let Some(r) = site.receiver {
            arg_nodes.extend(caller.locations(cx, r));
        }
        let def = cx.program.method(callee.method());
        let params: Vec<VarId> = def.params.iter().map(|p| p.var).collect();
        for (p, &arg) in params.into_iter().zip(site.args) {
            let by_ref = callee
                .parameter_map()
                .get(&p)
                .map_or(false, |&pn| matches!(cx.kind(pn), NodeKind::Parameter { mode, .. } if mode != ParamMode::ByValue));
            if by_ref {
                self.bind_ref_or_out(cx, caller, callee, arg, p, site.label);
            }
            arg_nodes.extend(caller.locations(cx, arg));
        }

        if let Some(vr) = site.result {
            match callee.return_var() {
                Some(ret) if !cx.is_primitive_var(vr) => {
                    caller.add_variable(cx, vr, site.label);
                    let ret_locs = callee.locations_of(ret).cloned().unwrap_or_default();
                    let related = self.related_extended_all(cx, &callee.values(cx, &ret_locs));
                    caller.assign_var_nodes(cx, vr, &related, site.label);
                }
                _ => caller.forget_variable(vr),
            }
        }

        self.remove_resolved_loads(cx, caller, &arg_nodes);
    }

    /// `*arg = μ(*out)`, strong
    fn bind_ref_or_out(
        &self,
        cx: GraphContext<'_>,
        caller: &mut PTGraph,
        callee: &PTGraph,
        arg: VarId,
        out: VarId,
        lb: Label,
    ) {
        let arg_locs = caller.locations(cx, arg);
        let caller_values = caller.values(cx, &arg_locs);
        let out_locs = callee.locations_of(out).cloned().unwrap_or_default();
        let referenced = callee.values(cx, &out_locs);
        let related = self.related_extended_all(cx, &callee.values(cx, &referenced));
        caller.assign(cx, &caller_values, &related, lb, true);
    }

    /// Drops caller loads that no longer matter: unreachable ones, and ones
    /// the callee resolved
    fn remove_resolved_loads(&mut self, cx: GraphContext<'_>, caller: &mut PTGraph, arg_nodes: &NodeSet) {
        let reachable = caller.reachable_from_parameters_return_and_globals_and(cx, arg_nodes);
        let loads: Vec<NodeId> = caller.nodes().into_iter().filter(|&n| cx.kind(n).is_load()).collect();
        for ln in loads {
            if !reachable.contains(&ln) || self.mapping.get(&ln).map_or(false, |s| !s.is_empty()) {
                caller.inside.remove_touching(ln);
                caller.outside.remove_touching(ln);
                self.removed_load_nodes.insert(ln);
            }
        }
    }
}

/// Method whose parameter a parameter value was read through
fn parameter_owner(cx: GraphContext<'_>, mut n: NodeId) -> Option<MethodId> {
    loop {
        match cx.kind(n) {
            NodeKind::ParameterValue { of, .. } => n = of,
            NodeKind::Load {
                kind: LoadKind::ParamAddress { param },
                ..
            } => n = param,
            NodeKind::Parameter { method, .. } => return Some(method),
            _ => return None,
        }
    }
}
