//! Feature modules - Each feature follows Hexagonal Architecture
//!
//! Each feature contains:
//! - domain/     - Pure analysis logic (no external dependencies)
//! - ports/      - Interface definitions (traits)
//! - application/ - Use cases
//! - infrastructure/ - Supporting data structures and policies

/// Three-address IR consumed by the analysis
pub mod ir;

/// Interprocedural points-to and escape analysis
pub mod points_to;

/// Call graph: SCCs and bottom-up scheduling order
pub mod call_graph;
