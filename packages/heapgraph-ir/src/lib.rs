/*
 * Heapgraph IR - Interprocedural Points-to and Escape Analysis
 *
 * Feature-First Hexagonal Architecture:
 * - features/ir         : Input model (types, methods, statements, CFGs)
 * - features/points_to  : Points-to graphs, binding, annotations, driver
 * - features/call_graph : Call graph, SCCs, bottom-up order
 * - config/             : Presets, validation, YAML
 *
 * Single-threaded and synchronous: one session owns its node arena and
 * summaries.
 */

// Crate-level lint configuration
#![allow(clippy::too_many_arguments)] // Transfer functions mirror statement operands
#![allow(clippy::type_complexity)] // Split results of exception routing
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::module_inception)] // Module naming intentional
#![allow(clippy::unnecessary_map_or)] // map_or style for compatibility

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Feature modules (IR, points-to analysis, call graph)
pub mod features;

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{AnalysisConfig, ConfigError, Preset};
pub use errors::{HeapgraphError, Result};
pub use features::call_graph::{CallGraph, CallGraphBuilder};
pub use features::ir::{Program, ProgramBuilder};
pub use features::points_to::{
    AnalysisContext, AnalysisStats, AnnotationProvider, PTGraph, PointsToAnalysis, PointsToState,
    SummaryConsumer,
};
