//! Domain models of the heap analysis
//!
//! - Node: abstract memory locations, interned by structural key
//! - Field: named fields plus the wildcard / element / dereference sentinels
//! - Edge: (source, field, destination) triples
//! - Label: program points identifying allocation and load sites
//! - PTGraph: the per-method points-to graph and its operations

pub mod edge;
pub mod field;
pub mod label;
pub mod node;
pub mod ptgraph;

pub use edge::Edge;
pub use field::Field;
pub use label::Label;
pub use node::{LoadKind, NodeId, NodeKind};
pub use ptgraph::{GraphContext, NodeSet, PTGraph};
