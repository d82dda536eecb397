//! # Interprocedural Points-to and Escape Analysis
//!
//! Compositional heap analysis over a three-address IR:
//! - **Points-to graphs**: per-method inside/outside edges over abstract
//!   nodes, with escaping nodes and a variable → location map
//! - **Summaries**: each method's exit graph, simplified to what callers can
//!   observe, bound at call sites through a node mapping
//! - **Annotations**: declared purity / escape / write effects summarize
//!   methods whose bodies are not analyzed (omega nodes)
//! - **Scheduling**: bottom-up fixpoint over call graph components, or
//!   depth-bounded inlining
//!
//! ## Usage
//! ```text
//! use heapgraph_ir::features::points_to::{AnalysisContext, PointsToAnalysis};
//!
//! let ctx = AnalysisContext::new(Arc::new(program), AnalysisConfig::default());
//! let mut analysis = PointsToAnalysis::new(&ctx);
//! analysis.whole_program_analysis();
//! let fresh = analysis.summary(make).map(|s| s.check_method_freshness(ctx.cx()));
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

// Re-exports for public API
pub use application::{AnalysisContext, AnalysisStats, PointsToAnalysis, PointsToState};
pub use domain::field::Field;
pub use domain::label::Label;
pub use domain::node::{LoadKind, NodeId, NodeKind};
pub use domain::ptgraph::{GraphContext, NodeSet, PTGraph};
pub use infrastructure::attribute_annotations::AttributeAnnotations;
pub use infrastructure::interproc_mapping::{CallSite, InterProcMapping};
pub use infrastructure::node_arena::NodeArena;
pub use ports::{AnnotationProvider, NoopConsumer, SummaryConsumer};
