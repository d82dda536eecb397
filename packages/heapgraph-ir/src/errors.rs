//! Error types for heapgraph-ir
//!
//! The analysis itself never fails: every method gets a summary. Errors only
//! surface at the crate boundary.

use crate::config::ConfigError;
use crate::features::ir::MethodId;
use thiserror::Error;

/// Main error type for heapgraph-ir operations
#[derive(Debug, Error)]
pub enum HeapgraphError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Method id not present in the program
    #[error("Unknown method {0}")]
    UnknownMethod(MethodId),

    /// Analysis error
    #[error("Analysis error: {0}")]
    Analysis(String),
}

impl HeapgraphError {
    /// Create an analysis error
    pub fn analysis(msg: impl Into<String>) -> Self {
        HeapgraphError::Analysis(msg.into())
    }
}

/// Result type alias for heapgraph operations
pub type Result<T> = std::result::Result<T, HeapgraphError>;
