//! Indexed edge sets
//!
//! Every statement transfer queries adjacency by `(node, field)` in one
//! direction or the other, so the set keeps four hash indexes next to the flat
//! edge set. All updates go through [`EdgeSet::add`] / [`EdgeSet::remove`]
//! to keep the indexes consistent.

use crate::features::points_to::domain::edge::Edge;
use crate::features::points_to::domain::field::Field;
use crate::features::points_to::domain::node::NodeId;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, Default)]
pub struct EdgeSet {
    edges: FxHashSet<Edge>,
    struct_edges: FxHashSet<Edge>,
    by_src: FxHashMap<NodeId, FxHashSet<Edge>>,
    by_dst: FxHashMap<NodeId, FxHashSet<Edge>>,
    by_src_field: FxHashMap<(NodeId, Field), FxHashSet<NodeId>>,
    by_dst_field: FxHashMap<(NodeId, Field), FxHashSet<NodeId>>,
}

impl PartialEq for EdgeSet {
    fn eq(&self, other: &Self) -> bool {
        self.edges == other.edges
    }
}

impl Eq for EdgeSet {}

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn contains(&self, edge: &Edge) -> bool {
        self.edges.contains(edge)
    }

    pub fn is_struct_edge(&self, edge: &Edge) -> bool {
        self.struct_edges.contains(edge)
    }

    /// Returns `true` if the edge was new
    pub fn add(&mut self, edge: Edge) -> bool {
        if !self.edges.insert(edge) {
            return false;
        }
        self.by_src.entry(edge.src).or_default().insert(edge);
        self.by_dst.entry(edge.dst).or_default().insert(edge);
        self.by_src_field
            .entry((edge.src, edge.field))
            .or_default()
            .insert(edge.dst);
        self.by_dst_field
            .entry((edge.dst, edge.field))
            .or_default()
            .insert(edge.src);
        true
    }

    /// Adds the edge tagged as a struct edge
    pub fn add_struct(&mut self, edge: Edge) -> bool {
        self.struct_edges.insert(edge);
        self.add(edge)
    }

    pub fn remove(&mut self, edge: &Edge) -> bool {
        if !self.edges.remove(edge) {
            return false;
        }
        self.struct_edges.remove(edge);
        unindex(&mut self.by_src, &edge.src, edge);
        unindex(&mut self.by_dst, &edge.dst, edge);
        unindex(&mut self.by_src_field, &(edge.src, edge.field), &edge.dst);
        unindex(&mut self.by_dst_field, &(edge.dst, edge.field), &edge.src);
        true
    }

    // ───────────────────────────────────────────────────────────────────────
    // Adjacency
    // ───────────────────────────────────────────────────────────────────────

    /// Targets of `node --field-->`
    pub fn successors(&self, node: NodeId, field: Field) -> impl Iterator<Item = NodeId> + '_ {
        self.by_src_field
            .get(&(node, field))
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Sources of `--field--> node`
    pub fn predecessors(&self, node: NodeId, field: Field) -> impl Iterator<Item = NodeId> + '_ {
        self.by_dst_field
            .get(&(node, field))
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    pub fn has_successor(&self, node: NodeId, field: Field) -> bool {
        self.by_src_field
            .get(&(node, field))
            .map_or(false, |s| !s.is_empty())
    }

    pub fn edges_from(&self, node: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.by_src.get(&node).into_iter().flat_map(|s| s.iter())
    }

    pub fn edges_to(&self, node: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.by_dst.get(&node).into_iter().flat_map(|s| s.iter())
    }

    /// Fields with at least one edge leaving `node`
    pub fn fields_from(&self, node: NodeId) -> FxHashSet<Field> {
        self.edges_from(node).map(|e| e.field).collect()
    }

    // ───────────────────────────────────────────────────────────────────────
    // Bulk updates
    // ───────────────────────────────────────────────────────────────────────

    /// Drops every `node --field-->` edge
    pub fn remove_from(&mut self, node: NodeId, field: Field) {
        let targets: Vec<NodeId> = self.successors(node, field).collect();
        for dst in targets {
            self.remove(&Edge::new(node, field, dst));
        }
    }

    /// Drops every edge incident to `node`
    pub fn remove_touching(&mut self, node: NodeId) {
        let incident: Vec<Edge> = self
            .edges_from(node)
            .chain(self.edges_to(node))
            .copied()
            .collect();
        for e in incident {
            self.remove(&e);
        }
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Edge) -> bool) {
        let doomed: Vec<Edge> = self.edges.iter().filter(|e| !keep(e)).copied().collect();
        for e in doomed {
            self.remove(&e);
        }
    }

    /// Union, preserving struct tags from both sides
    pub fn union_with(&mut self, other: &EdgeSet) {
        for e in other.iter() {
            if other.is_struct_edge(e) {
                self.add_struct(*e);
            } else {
                self.add(*e);
            }
        }
    }

    pub fn is_subset(&self, other: &EdgeSet) -> bool {
        self.len() <= other.len() && self.edges.iter().all(|e| other.contains(e))
    }

    /// Every node mentioned by an edge
    pub fn nodes(&self) -> FxHashSet<NodeId> {
        self.by_src.keys().chain(self.by_dst.keys()).copied().collect()
    }
}

fn unindex<K, V>(index: &mut FxHashMap<K, FxHashSet<V>>, key: &K, value: &V)
where
    K: std::hash::Hash + Eq,
    V: std::hash::Hash + Eq,
{
    if let Some(set) = index.get_mut(key) {
        set.remove(value);
        if set.is_empty() {
            index.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn n(i: u32) -> NodeId {
        NodeId(i)
    }

    #[test]
    fn test_add_and_index() {
        let mut es = EdgeSet::new();
        assert!(es.add(Edge::deref(n(2), n(3))));
        assert!(!es.add(Edge::deref(n(2), n(3))));
        es.add(Edge::new(n(2), Field::AllFields, n(4)));

        let succ: FxHashSet<NodeId> = es.successors(n(2), Field::Deref).collect();
        assert_eq!(succ, [n(3)].into_iter().collect());
        let pred: Vec<NodeId> = es.predecessors(n(4), Field::AllFields).collect();
        assert_eq!(pred, vec![n(2)]);
        assert_eq!(es.edges_from(n(2)).count(), 2);
    }

    #[test]
    fn test_remove_keeps_indexes_consistent() {
        let mut es = EdgeSet::new();
        es.add_struct(Edge::deref(n(2), n(3)));
        es.add(Edge::deref(n(2), n(4)));
        es.remove_from(n(2), Field::Deref);
        assert!(es.is_empty());
        assert_eq!(es.successors(n(2), Field::Deref).count(), 0);
        assert_eq!(es.edges_to(n(3)).count(), 0);
        assert!(!es.is_struct_edge(&Edge::deref(n(2), n(3))));
    }

    #[test]
    fn test_equality_ignores_struct_tag() {
        let mut a = EdgeSet::new();
        let mut b = EdgeSet::new();
        a.add_struct(Edge::deref(n(2), n(3)));
        b.add(Edge::deref(n(2), n(3)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_union_and_subset() {
        let mut a = EdgeSet::new();
        a.add(Edge::deref(n(2), n(3)));
        let mut b = EdgeSet::new();
        b.add_struct(Edge::deref(n(5), n(6)));
        assert!(!a.is_subset(&b));
        b.union_with(&a);
        assert!(a.is_subset(&b));
        assert!(b.is_struct_edge(&Edge::deref(n(5), n(6))));
    }

    #[test]
    fn test_remove_touching() {
        let mut es = EdgeSet::new();
        es.add(Edge::deref(n(2), n(3)));
        es.add(Edge::deref(n(3), n(4)));
        es.add(Edge::deref(n(5), n(6)));
        es.remove_touching(n(3));
        assert_eq!(es.len(), 1);
        assert_eq!(es.nodes(), [n(5), n(6)].into_iter().collect());
    }
}
