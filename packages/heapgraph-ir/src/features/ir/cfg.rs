//! Per-method control flow graph
//!
//! Blocks carry their statements, normal successors and at most one exception
//! handler. The normal-exit and exception-exit blocks are distinguished
//! sentinels; a handler block starts with its [`HandlerKind`].

use super::statement::Statement;
use super::types::TypeId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a handler block does with an in-flight exception
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandlerKind {
    /// Catches exceptions assignable to the type
    Catch(TypeId),
    /// Filter/fault/finally: everything sticks
    Finally,
    /// Propagates to the caller
    Unwind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub statements: Vec<Statement>,
    pub successors: Vec<BlockId>,
    /// Handler guarding this block
    pub handler: Option<BlockId>,
    /// Set when this block is itself a handler
    pub handler_kind: Option<HandlerKind>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            statements: Vec::new(),
            successors: Vec::new(),
            handler: None,
            handler_kind: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlFlowGraph {
    pub blocks: Vec<BasicBlock>,
    pub entry: BlockId,
    pub normal_exit: BlockId,
    pub exception_exit: BlockId,
}

impl ControlFlowGraph {
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn successors(&self, id: BlockId) -> &[BlockId] {
        &self.blocks[id.index()].successors
    }

    /// Handler guarding `id`, skipping blocks without one
    pub fn handler_of(&self, id: BlockId) -> Option<BlockId> {
        self.blocks[id.index()].handler
    }

    /// Reverse post-order from the entry; unreachable blocks are appended in id order
    pub fn reverse_post_order(&self) -> Vec<BlockId> {
        let n = self.blocks.len();
        let mut visited = vec![false; n];
        let mut post = Vec::with_capacity(n);
        let mut stack: Vec<(BlockId, usize)> = vec![(self.entry, 0)];
        visited[self.entry.index()] = true;

        while let Some((block, next)) = stack.pop() {
            let succs = self.successors_with_handler(block);
            if next < succs.len() {
                stack.push((block, next + 1));
                let s = succs[next];
                if !visited[s.index()] {
                    visited[s.index()] = true;
                    stack.push((s, 0));
                }
            } else {
                post.push(block);
            }
        }
        post.reverse();
        for b in &self.blocks {
            if !visited[b.id.index()] {
                post.push(b.id);
            }
        }
        post
    }

    fn successors_with_handler(&self, id: BlockId) -> Vec<BlockId> {
        let block = &self.blocks[id.index()];
        let mut succs = block.successors.clone();
        if let Some(h) = block.handler {
            succs.push(h);
        }
        succs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(edges: &[(u32, u32)], n: u32) -> ControlFlowGraph {
        let mut blocks: Vec<BasicBlock> = (0..n).map(|i| BasicBlock::new(BlockId(i))).collect();
        for &(a, b) in edges {
            blocks[a as usize].successors.push(BlockId(b));
        }
        ControlFlowGraph {
            blocks,
            entry: BlockId(0),
            normal_exit: BlockId(n - 2),
            exception_exit: BlockId(n - 1),
        }
    }

    #[test]
    fn test_rpo_diamond() {
        let g = cfg(&[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4)], 6);
        let rpo = g.reverse_post_order();
        assert_eq!(rpo[0], BlockId(0));
        let pos = |b: u32| rpo.iter().position(|x| *x == BlockId(b)).unwrap();
        assert!(pos(1) < pos(3));
        assert!(pos(2) < pos(3));
        assert!(pos(3) < pos(4));
        // unreachable exception exit is still listed
        assert_eq!(rpo.len(), 6);
    }

    #[test]
    fn test_rpo_follows_handler() {
        let mut g = cfg(&[(0, 2)], 4);
        g.blocks[0].handler = Some(BlockId(1));
        let rpo = g.reverse_post_order();
        let pos = |b: u32| rpo.iter().position(|x| *x == BlockId(b)).unwrap();
        assert!(pos(0) < pos(1));
    }
}
