//! Call graph of the methods under analysis
//!
//! Drives the bottom-up order of the interprocedural fixpoint: components are
//! analyzed callees first, and each component is iterated until its
//! summaries stop growing.

pub mod builder;
pub mod graph;

pub use builder::CallGraphBuilder;
pub use graph::{CallEdge, CallGraph};
