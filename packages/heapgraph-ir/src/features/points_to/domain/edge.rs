//! Labelled heap edges

use super::field::Field;
use super::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `src --field--> dst`
///
/// Whether the edge is a struct edge is tracked by the owning
/// [`EdgeSet`](crate::features::points_to::infrastructure::edge_index::EdgeSet)
/// and does not take part in equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub src: NodeId,
    pub field: Field,
    pub dst: NodeId,
}

impl Edge {
    #[inline]
    pub fn new(src: NodeId, field: Field, dst: NodeId) -> Self {
        Self { src, field, dst }
    }

    #[inline]
    pub fn deref(src: NodeId, dst: NodeId) -> Self {
        Self::new(src, Field::Deref, dst)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -{}-> {}", self.src, self.field, self.dst)
    }
}
