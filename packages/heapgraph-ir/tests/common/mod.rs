//! Common test utilities for heapgraph-ir
//!
//! Builders for small programs and sessions shared by the integration
//! tests.

#![allow(dead_code)]

mod builders;

pub use builders::*;
