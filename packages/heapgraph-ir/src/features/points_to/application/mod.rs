//! Application layer of the heap analysis
//!
//! - **AnalysisContext**: program, node arena, annotations and configuration
//!   of one session
//! - **PointsToState**: dataflow state (graph, pending exception, assumptions)
//! - **PointsToAnalysis**: the interprocedural driver (fixpoint or inlining)
//!
//! The inferer and the transfer functions are internal to the driver.

pub mod context;
pub mod driver;
mod inferer;
pub mod state;
mod transfer;

pub use context::AnalysisContext;
pub use driver::{AnalysisStats, PointsToAnalysis};
pub use state::PointsToState;
