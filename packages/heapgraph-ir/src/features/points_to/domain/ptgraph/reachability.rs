//! Reachability queries
//!
//! All traversals are breadth-first worklists over the indexed edge sets.

use super::{GraphContext, NodeSet, PTGraph};
use crate::features::points_to::domain::node::NodeId;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Which edge sets a traversal follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeFilter {
    pub inside: bool,
    pub outside: bool,
}

impl EdgeFilter {
    pub const ALL: EdgeFilter = EdgeFilter {
        inside: true,
        outside: true,
    };
    pub const INSIDE: EdgeFilter = EdgeFilter {
        inside: true,
        outside: false,
    };
    pub const OUTSIDE: EdgeFilter = EdgeFilter {
        inside: false,
        outside: true,
    };
}

impl PTGraph {
    fn adjacent(&self, n: NodeId, direction: Direction, filter: EdgeFilter, out: &mut Vec<NodeId>) {
        let sets = [
            (filter.inside, &self.inside),
            (filter.outside, &self.outside),
        ];
        for (enabled, set) in sets {
            if !enabled {
                continue;
            }
            match direction {
                Direction::Forward => out.extend(set.edges_from(n).map(|e| e.dst)),
                Direction::Backward => out.extend(set.edges_to(n).map(|e| e.src)),
            }
        }
    }

    /// Nodes reachable from `starts` (inclusive)
    pub fn nodes_reachable(&self, starts: &NodeSet, direction: Direction, filter: EdgeFilter) -> NodeSet {
        let mut visited: NodeSet = starts.clone();
        let mut queue: VecDeque<NodeId> = starts.iter().copied().collect();
        let mut adj = Vec::new();
        while let Some(n) = queue.pop_front() {
            adj.clear();
            self.adjacent(n, direction, filter, &mut adj);
            for &a in &adj {
                if visited.insert(a) {
                    queue.push_back(a);
                }
            }
        }
        visited
    }

    pub fn nodes_forward_reachable_from(&self, n: NodeId) -> NodeSet {
        self.nodes_reachable(&std::iter::once(n).collect(), Direction::Forward, EdgeFilter::ALL)
    }

    pub fn nodes_forward_reachable_from_nodes(&self, ns: &NodeSet) -> NodeSet {
        self.nodes_reachable(ns, Direction::Forward, EdgeFilter::ALL)
    }

    pub fn nodes_backward_reachable_from(&self, n: NodeId) -> NodeSet {
        self.nodes_reachable(&std::iter::once(n).collect(), Direction::Backward, EdgeFilter::ALL)
    }

    pub fn nodes_forward_reachable_from_only_outside_edges(&self, ns: &NodeSet) -> NodeSet {
        self.nodes_reachable(ns, Direction::Forward, EdgeFilter::OUTSIDE)
    }

    /// Forward reachability through owned fields, `*`, `?` and array elements
    pub fn nodes_reachable_with_ownership(&self, cx: GraphContext<'_>, starts: &NodeSet) -> NodeSet {
        let mut visited: NodeSet = starts.clone();
        let mut queue: VecDeque<NodeId> = starts.iter().copied().collect();
        while let Some(n) = queue.pop_front() {
            let next: Vec<NodeId> = self
                .inside
                .edges_from(n)
                .chain(self.outside.edges_from(n))
                .filter(|e| e.field.is_owned(cx.program))
                .map(|e| e.dst)
                .collect();
            for a in next {
                if visited.insert(a) {
                    queue.push_back(a);
                }
            }
        }
        visited
    }

    /// Does any node of `who` lie on a path from `from`; stops at the first hit
    pub fn is_reachable_from(&self, who: &NodeSet, from: &NodeSet, direction: Direction, filter: EdgeFilter) -> bool {
        if from.iter().any(|n| who.contains(n)) {
            return true;
        }
        let mut visited: NodeSet = from.clone();
        let mut queue: VecDeque<NodeId> = from.iter().copied().collect();
        let mut adj = Vec::new();
        while let Some(n) = queue.pop_front() {
            adj.clear();
            self.adjacent(n, direction, filter, &mut adj);
            for &a in &adj {
                if who.contains(&a) {
                    return true;
                }
                if visited.insert(a) {
                    queue.push_back(a);
                }
            }
        }
        false
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Caller-visible nodes
    // ═══════════════════════════════════════════════════════════════════════

    fn bound(&self, v: Option<crate::features::ir::VarId>) -> NodeSet {
        v.and_then(|v| self.locals.get(&v)).cloned().unwrap_or_default()
    }

    /// Escaping nodes, global and return locations, parameter addresses and
    /// `extra`, closed under forward reachability
    pub fn reachable_from_parameters_return_and_globals_and(&self, cx: GraphContext<'_>, extra: &NodeSet) -> NodeSet {
        let mut starts: NodeSet = self.escaping.clone();
        starts.extend(self.bound(Some(cx.program.global_var)));
        starts.extend(self.bound(self.return_var));
        starts.extend(extra.iter().copied());
        starts.extend(self.parameter_nodes.iter().copied());
        self.nodes_reachable(&starts, Direction::Forward, EdgeFilter::ALL)
    }

    pub fn reachable_from_parameters_return_and_globals(&self, cx: GraphContext<'_>) -> NodeSet {
        self.reachable_from_parameters_return_and_globals_and(cx, &NodeSet::default())
    }

    /// Values of the parameters, the global scope and the return value
    pub fn external_nodes(&self, cx: GraphContext<'_>) -> NodeSet {
        let mut res = NodeSet::default();
        for &pn in self.parameter_map.values() {
            res.extend(self.values_of(cx, pn));
        }
        res.extend(self.values(cx, &self.bound(Some(cx.program.global_var))));
        res.extend(self.values(cx, &self.bound(self.return_var)));
        res
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Reach-refs
    // ═══════════════════════════════════════════════════════════════════════

    /// Objects and struct references: storage counts when it holds a struct
    pub(crate) fn is_reach_ref(cx: GraphContext<'_>, n: NodeId) -> bool {
        let ty = cx.node_type(n);
        if cx.kind(n).is_storage() {
            cx.program.is_struct(ty)
        } else {
            cx.program.is_object_or_struct_ref(ty)
        }
    }

    pub fn reach_refs(&self, cx: GraphContext<'_>, n: NodeId) -> NodeSet {
        self.nodes_forward_reachable_from(n)
            .into_iter()
            .filter(|&m| Self::is_reach_ref(cx, m))
            .collect()
    }

    pub fn reach_refs_of(&self, cx: GraphContext<'_>, ns: &NodeSet) -> NodeSet {
        self.nodes_forward_reachable_from_nodes(ns)
            .into_iter()
            .filter(|&m| Self::is_reach_ref(cx, m))
            .collect()
    }

    pub fn reach_refs_owned(&self, cx: GraphContext<'_>, n: NodeId) -> NodeSet {
        self.nodes_reachable_with_ownership(cx, &std::iter::once(n).collect())
            .into_iter()
            .filter(|&m| Self::is_reach_ref(cx, m))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Fixture;
    use super::*;
    use crate::features::ir::ProgramBuilder;
    use crate::features::points_to::domain::field::Field;
    use crate::features::points_to::domain::label::Label;
    use crate::features::points_to::infrastructure::node_arena::NodeArena;

    #[test]
    fn test_reachability_directions() {
        let f = Fixture::new();
        let cx = f.cx();
        let mut g = PTGraph::for_method(cx, f.run);
        g.new_inside_node(cx, f.x, f.label(0), f.node);
        g.store(cx, f.p, Field::Named(f.next), f.x, f.label(1));

        let old = g.parameter_old_value(f.p).expect("old");
        let x_obj = *g.var_values(cx, f.x).iter().next().expect("x");
        assert!(g.nodes_forward_reachable_from(old).contains(&x_obj));
        assert!(g.nodes_backward_reachable_from(x_obj).contains(&old));
        assert!(!g.nodes_forward_reachable_from(x_obj).contains(&old));

        let who: NodeSet = std::iter::once(x_obj).collect();
        let from: NodeSet = std::iter::once(old).collect();
        assert!(g.is_reachable_from(&who, &from, Direction::Forward, EdgeFilter::INSIDE));
        assert!(!g.is_reachable_from(&who, &from, Direction::Forward, EdgeFilter::OUTSIDE));
        assert!(g.reachable_from_parameters_return_and_globals(cx).contains(&x_obj));
    }

    #[test]
    fn test_ownership_reachability_skips_peer_fields() {
        let mut pb = ProgramBuilder::new("App");
        let t = pb.class("App", "T");
        let rep = pb.owned_field(t, "rep", t);
        let peer = pb.field(t, "peer", t);
        let m = pb.method(t, "M").instance().build();
        let this = pb.param_var(m, 0).expect("this");
        let a = pb.local(m, "a", t);
        let b = pb.local(m, "b", t);
        let program = pb.finish();
        let arena = NodeArena::new();
        let cx = GraphContext::new(&program, &arena);
        let lb = |i| Label::stmt(m, crate::features::ir::BlockId(0), i);

        let mut g = PTGraph::for_method(cx, m);
        g.new_inside_node(cx, a, lb(0), t);
        g.new_inside_node(cx, b, lb(1), t);
        g.store(cx, this, Field::Named(rep), a, lb(2));
        g.store(cx, this, Field::Named(peer), b, lb(3));

        let old_this = g.parameter_old_value(this).expect("this value");
        let a_obj = *g.var_values(cx, a).iter().next().expect("a");
        let b_obj = *g.var_values(cx, b).iter().next().expect("b");
        let owned = g.reach_refs_owned(cx, old_this);
        assert!(owned.contains(&a_obj));
        assert!(!owned.contains(&b_obj));
        let all = g.reach_refs(cx, old_this);
        assert!(all.contains(&a_obj) && all.contains(&b_obj));
        // field slots are storage, not references
        assert!(all.iter().all(|&n| !cx.kind(n).is_storage()));
    }
}
