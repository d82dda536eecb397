//! Infrastructure layer of the heap analysis
//!
//! - **NodeArena**: node interning with omega and delegate side tables
//! - **EdgeSet**: edge storage indexed by (node, field) and direction
//! - **InterProcMapping**: callee → caller node mapping and edge splicing
//! - **AttributeAnnotations**: attribute-backed annotation policy
//! - **dot**: Graphviz rendering of points-to graphs

pub mod attribute_annotations;
pub mod dot;
pub mod edge_index;
pub mod interproc_mapping;
pub mod node_arena;

pub use attribute_annotations::AttributeAnnotations;
pub use edge_index::EdgeSet;
pub use interproc_mapping::{CallSite, InterProcMapping};
pub use node_arena::{DelegateBinding, NodeArena};
