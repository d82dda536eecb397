//! Escape and freshness checks over a finished graph

use super::{Direction, EdgeFilter, GraphContext, NodeSet, PTGraph};
use crate::features::ir::VarId;
use crate::features::points_to::domain::node::NodeId;

impl PTGraph {
    /// True when a value of `p` is reachable from the other parameters, the
    /// global scope, the return value or the escaping nodes
    pub fn check_escape(&self, cx: GraphContext<'_>, p: VarId) -> bool {
        let locs = self.locals.get(&p).cloned().unwrap_or_default();
        let p_values = self.values(cx, &locs);

        let mut from: NodeSet = self.escaping.clone();
        if let Some(g) = self.locals.get(&cx.program.global_var) {
            from.extend(g.iter().copied());
        }
        if let Some(r) = self.return_var.and_then(|r| self.locals.get(&r)) {
            from.extend(r.iter().copied());
        }
        from.extend(self.parameter_nodes.iter().copied().filter(|pn| !locs.contains(pn)));

        self.is_reachable_from(&p_values, &from, Direction::Forward, EdgeFilter::ALL)
    }

    /// The return value is neither the global scope nor any parameter's value
    pub fn check_method_freshness(&self, cx: GraphContext<'_>) -> bool {
        let ret_locs = self
            .return_var
            .and_then(|r| self.locals.get(&r))
            .cloned()
            .unwrap_or_default();
        let ret_values = self.values(cx, &ret_locs);
        self.is_fresh_among_parameters(cx, &ret_values)
    }

    /// The object stored through out/ref parameter `p` is fresh
    pub fn check_parameter_freshness(&self, cx: GraphContext<'_>, p: VarId) -> bool {
        let locs = self.locals.get(&p).cloned().unwrap_or_default();
        let referenced = self.values(cx, &locs);
        let stored = self.values(cx, &referenced);
        self.is_fresh_among_parameters(cx, &stored)
    }

    fn is_fresh_among_parameters(&self, cx: GraphContext<'_>, values: &NodeSet) -> bool {
        if values.contains(&NodeId::GLOBAL) {
            return false;
        }
        self.parameter_nodes
            .iter()
            .all(|&pn| self.values_of(cx, pn).is_disjoint(values))
    }
}
