//! Method call graph
//!
//! A directed multigraph over method ids; each edge is one call site.
//! SCCs are computed with two traversals (forward finishing order, then the
//! transposed graph consumed in reverse finishing order) and cached until the
//! graph changes.

use crate::features::ir::{MethodId, Program};
use crate::features::points_to::domain::label::Label;
use petgraph::algo::kosaraju_scc;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write;

/// One call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallEdge {
    pub label: Label,
    pub is_virtual: bool,
}

#[derive(Debug, Clone, Default)]
struct SccIndex {
    /// Component id per method
    component: FxHashMap<MethodId, usize>,
    /// Members per component, in insertion order of the graph
    members: Vec<Vec<MethodId>>,
}

#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    graph: StableDiGraph<MethodId, CallEdge>,
    index: FxHashMap<MethodId, NodeIndex>,
    sccs: OnceCell<SccIndex>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_method(&mut self, m: MethodId) -> NodeIndex {
        if let Some(&idx) = self.index.get(&m) {
            return idx;
        }
        self.sccs.take();
        let idx = self.graph.add_node(m);
        self.index.insert(m, idx);
        idx
    }

    pub fn add_call(&mut self, caller: MethodId, callee: MethodId, label: Label, is_virtual: bool) {
        let from = self.add_method(caller);
        let to = self.add_method(callee);
        let edge = CallEdge { label, is_virtual };
        let exists = self
            .graph
            .edges_directed(from, Direction::Outgoing)
            .any(|e| e.target() == to && *e.weight() == edge);
        if !exists {
            self.sccs.take();
            self.graph.add_edge(from, to, edge);
        }
    }

    pub fn contains(&self, m: MethodId) -> bool {
        self.index.contains_key(&m)
    }

    pub fn methods(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.graph.node_weights().copied()
    }

    pub fn method_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn call_count(&self) -> usize {
        self.graph.edge_count()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Adjacency
    // ═══════════════════════════════════════════════════════════════════════

    fn neighbors(&self, m: MethodId, dir: Direction) -> Vec<MethodId> {
        let Some(&idx) = self.index.get(&m) else {
            return Vec::new();
        };
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for e in self.graph.edges_directed(idx, dir) {
            let other = match dir {
                Direction::Outgoing => e.target(),
                Direction::Incoming => e.source(),
            };
            let om = self.graph[other];
            if seen.insert(om) {
                out.push(om);
            }
        }
        out.sort();
        out
    }

    /// Distinct callees of `m`
    pub fn callees(&self, m: MethodId) -> Vec<MethodId> {
        self.neighbors(m, Direction::Outgoing)
    }

    /// Distinct callers of `m`
    pub fn callers(&self, m: MethodId) -> Vec<MethodId> {
        self.neighbors(m, Direction::Incoming)
    }

    /// Callees of `m` grouped by call-site label
    pub fn calls(&self, m: MethodId) -> BTreeMap<Label, Vec<MethodId>> {
        let mut res: BTreeMap<Label, Vec<MethodId>> = BTreeMap::new();
        if let Some(&idx) = self.index.get(&m) {
            for e in self.graph.edges_directed(idx, Direction::Outgoing) {
                let callees = res.entry(e.weight().label).or_default();
                let callee = self.graph[e.target()];
                if !callees.contains(&callee) {
                    callees.push(callee);
                }
            }
        }
        res
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Traversals
    // ═══════════════════════════════════════════════════════════════════════

    /// Breadth-first order from `roots`, each method once
    pub fn bfs_from(&self, roots: &[MethodId]) -> Vec<MethodId> {
        let mut seen = FxHashSet::default();
        let mut queue: VecDeque<MethodId> = VecDeque::new();
        for &r in roots {
            if self.contains(r) && seen.insert(r) {
                queue.push_back(r);
            }
        }
        let mut order = Vec::new();
        while let Some(m) = queue.pop_front() {
            order.push(m);
            for c in self.callees(m) {
                if seen.insert(c) {
                    queue.push_back(c);
                }
            }
        }
        order
    }

    pub fn bfs(&self, m: MethodId) -> Vec<MethodId> {
        self.bfs_from(&[m])
    }

    /// Methods nobody calls
    pub fn roots(&self) -> Vec<MethodId> {
        let mut roots: Vec<MethodId> = self
            .graph
            .node_indices()
            .filter(|&i| self.graph.neighbors_directed(i, Direction::Incoming).next().is_none())
            .map(|i| self.graph[i])
            .collect();
        roots.sort();
        roots
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SCCs
    // ═══════════════════════════════════════════════════════════════════════

    fn scc_index(&self) -> &SccIndex {
        self.sccs.get_or_init(|| {
            let mut idx = SccIndex::default();
            for comp in kosaraju_scc(&self.graph) {
                let id = idx.members.len();
                let mut members: Vec<MethodId> = comp.into_iter().map(|n| self.graph[n]).collect();
                members.sort();
                for &m in &members {
                    idx.component.insert(m, id);
                }
                idx.members.push(members);
            }
            idx
        })
    }

    /// All strongly connected components
    pub fn sccs(&self) -> Vec<Vec<MethodId>> {
        self.scc_index().members.clone()
    }

    /// Methods in the same component as `m` (just `m` when it is not in the graph)
    pub fn scc_methods(&self, m: MethodId) -> Vec<MethodId> {
        let idx = self.scc_index();
        idx.component
            .get(&m)
            .map(|&c| idx.members[c].clone())
            .unwrap_or_else(|| vec![m])
    }

    /// Representative of `m`'s component: its smallest member
    pub fn scc_of(&self, m: MethodId) -> MethodId {
        self.scc_methods(m).first().copied().unwrap_or(m)
    }

    pub fn in_same_scc(&self, a: MethodId, b: MethodId) -> bool {
        let idx = self.scc_index();
        match (idx.component.get(&a), idx.component.get(&b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        }
    }

    /// One representative per component, callers before callees
    ///
    /// Each component is collapsed and the DFS follows the union of its
    /// members' outgoing calls; the order is the reverse finishing order.
    pub fn topological_sort(&self) -> Vec<MethodId> {
        let idx = self.scc_index();
        let n = idx.members.len();
        let mut succs: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (c, members) in idx.members.iter().enumerate() {
            let mut seen = FxHashSet::default();
            for &m in members {
                for callee in self.callees(m) {
                    let d = idx.component[&callee];
                    if d != c && seen.insert(d) {
                        succs[c].push(d);
                    }
                }
            }
            succs[c].sort_by_key(|&d| idx.members[d][0]);
        }

        let mut starts: Vec<usize> = (0..n).collect();
        starts.sort_by_key(|&c| idx.members[c][0]);

        let mut visited = vec![false; n];
        let mut finished = Vec::with_capacity(n);
        for s in starts {
            if visited[s] {
                continue;
            }
            visited[s] = true;
            let mut stack = vec![(s, 0usize)];
            while let Some((c, next)) = stack.pop() {
                if let Some(&d) = succs[c].get(next) {
                    stack.push((c, next + 1));
                    if !visited[d] {
                        visited[d] = true;
                        stack.push((d, 0));
                    }
                } else {
                    finished.push(c);
                }
            }
        }
        finished.reverse();
        finished.into_iter().map(|c| idx.members[c][0]).collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Rendering
    // ═══════════════════════════════════════════════════════════════════════

    pub fn to_dot(&self, program: &Program) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph CallGraph {{");
        let mut methods: Vec<MethodId> = self.methods().collect();
        methods.sort();
        for m in &methods {
            let _ = writeln!(out, "\"{}\" [shape = box]", program.method_full_name(*m));
        }
        for m in methods {
            for (label, callees) in self.calls(m) {
                for c in callees {
                    let _ = writeln!(
                        out,
                        "\"{}\" -> \"{}\" [label = \"{}\"]",
                        program.method_full_name(m),
                        program.method_full_name(c),
                        label
                    );
                }
            }
        }
        let _ = writeln!(out, "}}");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir::BlockId;
    use pretty_assertions::assert_eq;

    fn site(m: u32, i: usize) -> Label {
        Label::stmt(MethodId(m), BlockId(0), i)
    }

    /// A→B→C→A plus D→A
    fn cycle_with_entry() -> (CallGraph, [MethodId; 4]) {
        let [a, b, c, d] = [MethodId(0), MethodId(1), MethodId(2), MethodId(3)];
        let mut cg = CallGraph::new();
        cg.add_call(a, b, site(0, 0), false);
        cg.add_call(b, c, site(1, 0), false);
        cg.add_call(c, a, site(2, 0), false);
        cg.add_call(d, a, site(3, 0), false);
        (cg, [a, b, c, d])
    }

    #[test]
    fn test_scc_groups_cycle() {
        let (cg, [a, b, c, d]) = cycle_with_entry();
        for m in [a, b, c] {
            assert_eq!(cg.scc_methods(m), vec![a, b, c]);
        }
        assert_eq!(cg.scc_methods(d), vec![d]);
        assert_eq!(cg.scc_of(c), a);
        assert!(cg.in_same_scc(b, c));
        assert!(!cg.in_same_scc(a, d));
    }

    #[test]
    fn test_topological_sort_puts_caller_first() {
        let (cg, [a, _, _, d]) = cycle_with_entry();
        assert_eq!(cg.topological_sort(), vec![d, a]);
    }

    #[test]
    fn test_topological_sort_chain() {
        let mut cg = CallGraph::new();
        let [x, y, z] = [MethodId(5), MethodId(6), MethodId(7)];
        cg.add_call(z, y, site(7, 0), false);
        cg.add_call(y, x, site(6, 0), false);
        cg.add_call(z, x, site(7, 1), false);
        assert_eq!(cg.topological_sort(), vec![z, y, x]);
    }

    #[test]
    fn test_calls_grouped_by_label() {
        let mut cg = CallGraph::new();
        let [m, f, g] = [MethodId(0), MethodId(1), MethodId(2)];
        cg.add_call(m, f, site(0, 0), true);
        cg.add_call(m, g, site(0, 0), true);
        cg.add_call(m, f, site(0, 3), false);
        cg.add_call(m, f, site(0, 3), false);

        let calls = cg.calls(m);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[&site(0, 0)], vec![f, g]);
        assert_eq!(calls[&site(0, 3)], vec![f]);
        assert_eq!(cg.call_count(), 3);
        assert_eq!(cg.callers(f), vec![m]);
    }

    #[test]
    fn test_bfs_and_roots() {
        let (cg, [a, b, c, d]) = cycle_with_entry();
        assert_eq!(cg.bfs(d), vec![d, a, b, c]);
        assert_eq!(cg.bfs(b), vec![b, c, a]);
        assert_eq!(cg.roots(), vec![d]);
        assert!(cg.bfs(MethodId(42)).is_empty());
    }

    #[test]
    fn test_scc_cache_refreshes_after_new_edge() {
        let mut cg = CallGraph::new();
        let [a, b] = [MethodId(0), MethodId(1)];
        cg.add_call(a, b, site(0, 0), false);
        assert_eq!(cg.scc_methods(a), vec![a]);
        cg.add_call(b, a, site(1, 0), false);
        assert_eq!(cg.scc_methods(a), vec![a, b]);
    }
}
