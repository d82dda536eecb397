//! Program-point labels
//!
//! Every synthesized node is keyed by the label of the statement that created
//! it, so re-running a statement yields the same node and summaries converge.

use crate::features::ir::{BlockId, MethodId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Site {
    /// Method entry (parameter and return setup)
    Entry,
    Stmt { block: u32, index: u32 },
    /// Per-graph counter for nodes not tied to a statement
    Synthetic(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    pub method: MethodId,
    pub site: Site,
}

impl Label {
    pub fn entry(method: MethodId) -> Self {
        Self {
            method,
            site: Site::Entry,
        }
    }

    pub fn stmt(method: MethodId, block: BlockId, index: usize) -> Self {
        Self {
            method,
            site: Site::Stmt {
                block: block.0,
                index: index as u32,
            },
        }
    }

    pub fn synthetic(method: MethodId, seq: u32) -> Self {
        Self {
            method,
            site: Site::Synthetic(seq),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.site {
            Site::Entry => write!(f, "{}:entry", self.method),
            Site::Stmt { block, index } => write!(f, "{}:b{}.{}", self.method, block, index),
            Site::Synthetic(n) => write!(f, "{}:#{}", self.method, n),
        }
    }
}
