//! Intraprocedural dataflow over one method's CFG
//!
//! Blocks are visited from a worklist ordered by reverse post-order. Entry
//! states are joined at merge points. Raised states travel along the handler
//! chain, split at each catch handler by the pending exception type, and the
//! residue ends at the exception exit.

use super::driver::PointsToAnalysis;
use super::state::PointsToState;
use super::transfer::TransferFunctions;
use crate::features::ir::{BlockId, ControlFlowGraph, HandlerKind, MethodId, Program};
use crate::features::points_to::domain::label::Label;
use crate::features::points_to::domain::ptgraph::GraphContext;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use tracing::trace;

pub(crate) struct Inferer<'d, 'c> {
    transfer: TransferFunctions<'d, 'c>,
    cx: GraphContext<'c>,
    cfg: &'c ControlFlowGraph,
    method: MethodId,
    rank: FxHashMap<BlockId, usize>,
    worklist: BTreeSet<(usize, BlockId)>,
    at_entry: FxHashMap<BlockId, PointsToState>,
    at_exit: FxHashMap<BlockId, PointsToState>,
}

impl<'d, 'c> Inferer<'d, 'c> {
    pub(crate) fn new(driver: &'d mut PointsToAnalysis<'c>, method: MethodId, cfg: &'c ControlFlowGraph) -> Self {
        let cx = driver.ctx().cx();
        let rank = cfg
            .reverse_post_order()
            .into_iter()
            .enumerate()
            .map(|(i, b)| (b, i))
            .collect();
        Self {
            transfer: TransferFunctions::new(driver),
            cx,
            cfg,
            method,
            rank,
            worklist: BTreeSet::new(),
            at_entry: FxHashMap::default(),
            at_exit: FxHashMap::default(),
        }
    }

    /// Runs to a fixpoint and returns the state reaching the exits: the
    /// normal exit joined with the exception exit when both are reached
    pub(crate) fn run(mut self, initial: PointsToState) -> Option<PointsToState> {
        self.merge(self.cfg.entry, initial);

        while let Some((_, block)) = self.worklist.pop_first() {
            let Some(entry) = self.at_entry.get(&block).cloned() else {
                continue;
            };
            let Some(out) = self.visit_block(block, entry) else {
                continue;
            };
            if block == self.cfg.normal_exit || block == self.cfg.exception_exit {
                self.at_exit.insert(block, out.clone());
            }
            for &succ in self.cfg.successors(block) {
                self.merge(succ, out.clone());
            }
        }

        let normal = self.at_exit.remove(&self.cfg.normal_exit);
        let exceptional = self.at_exit.remove(&self.cfg.exception_exit);
        match (normal, exceptional) {
            (Some(mut n), Some(e)) => {
                n.join(self.cx, &e);
                Some(n)
            }
            (n, e) => n.or(e),
        }
    }

    fn visit_block(&mut self, block: BlockId, state: PointsToState) -> Option<PointsToState> {
        let cfg = self.cfg;
        let bb = cfg.block(block);
        trace!(method = %self.method, block = block.0, "visit block");

        if let Some(handler) = bb.handler {
            let catches = matches!(cfg.block(handler).handler_kind, Some(HandlerKind::Catch(_)));
            if !catches || state.current_exception.is_some() {
                self.push_exception(handler, state.clone());
            }
        }

        let mut current = Some(state);
        for (i, stmt) in bb.statements.iter().enumerate() {
            let Some(s) = current.take() else {
                break;
            };
            current = self.transfer.visit(s, stmt, Label::stmt(self.method, block, i));
            for raised in self.transfer.take_raised() {
                self.raise(block, raised);
            }
        }
        current
    }

    /// Routes a state raised inside `block` to its handler
    fn raise(&mut self, block: BlockId, state: PointsToState) {
        if block == self.cfg.exception_exit {
            return;
        }
        let handler = self.cfg.handler_of(block).unwrap_or(self.cfg.exception_exit);
        self.push_exception(handler, state);
    }

    fn push_exception(&mut self, handler: BlockId, state: PointsToState) {
        let program = self.cx.program;
        let mut target = handler;
        let mut pending = Some(state);

        // each hop moves to an enclosing handler; the exit ends the chain
        for _ in 0..=self.cfg.blocks.len() {
            let Some(s) = pending.take() else {
                return;
            };
            if target == self.cfg.exception_exit {
                self.merge(target, s);
                return;
            }
            let (sticks, residue) = split_exceptions(program, self.cfg.block(target).handler_kind, s);
            if let Some(caught) = sticks {
                self.merge(target, caught);
            }
            pending = residue;
            target = self.cfg.handler_of(target).unwrap_or(self.cfg.exception_exit);
        }
    }

    /// Joins `incoming` into the entry state of `block`, queueing it on change
    fn merge(&mut self, block: BlockId, incoming: PointsToState) {
        let changed = match self.at_entry.get_mut(&block) {
            None => {
                self.at_entry.insert(block, incoming);
                true
            }
            Some(current) if current.covers(self.cx, &incoming) => false,
            Some(current) => {
                current.join(self.cx, &incoming);
                true
            }
        };
        if changed {
            let rank = self.rank.get(&block).copied().unwrap_or(usize::MAX);
            self.worklist.insert((rank, block));
        }
    }
}

/// Splits a raised state at a handler into what the handler catches and
/// what continues to the next handler. A finally block runs and then
/// rethrows, so a pending exception also continues outward.
pub(crate) fn split_exceptions(
    program: &Program,
    kind: Option<HandlerKind>,
    state: PointsToState,
) -> (Option<PointsToState>, Option<PointsToState>) {
    match kind {
        None => (Some(state), None),
        Some(HandlerKind::Finally) => {
            let rethrown = state.current_exception.is_some().then(|| state.clone());
            (Some(state), rethrown)
        }
        Some(HandlerKind::Unwind) => (None, None),
        Some(HandlerKind::Catch(caught)) => {
            let Some(exception) = state.current_exception else {
                debug_assert!(false, "catch handler reached without a pending exception");
                return (None, None);
            };
            if program.is_assignable_to(exception, caught) {
                (Some(state), None)
            } else if program.is_assignable_to(caught, exception) {
                let mut narrowed = state.clone();
                narrowed.current_exception = Some(caught);
                (Some(narrowed), Some(state))
            } else {
                (None, Some(state))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir::ProgramBuilder;
    use crate::features::points_to::infrastructure::node_arena::NodeArena;

    #[test]
    fn test_split_exceptions_by_catch_type() {
        let mut pb = ProgramBuilder::new("App");
        let base = pb.class("System", "Exception");
        let io = pb.subclass(base, "System.IO", "IOException");
        let arg = pb.subclass(base, "System", "ArgumentException");
        let m = pb.method(base, "Run").build();
        let program = pb.finish();
        let arena = NodeArena::new();
        let cx = GraphContext::new(&program, &arena);

        let raised = |ty| {
            let mut s = PointsToState::for_method(cx, m);
            s.current_exception = Some(ty);
            s
        };

        // exact match sticks
        let (sticks, rest) = split_exceptions(&program, Some(HandlerKind::Catch(io)), raised(io));
        assert_eq!(sticks.map(|s| s.current_exception), Some(Some(io)));
        assert!(rest.is_none());

        // a narrower catch keeps a narrowed copy and forwards the rest
        let (sticks, rest) = split_exceptions(&program, Some(HandlerKind::Catch(io)), raised(base));
        assert_eq!(sticks.map(|s| s.current_exception), Some(Some(io)));
        assert_eq!(rest.map(|s| s.current_exception), Some(Some(base)));

        // unrelated types pass through
        let (sticks, rest) = split_exceptions(&program, Some(HandlerKind::Catch(io)), raised(arg));
        assert!(sticks.is_none());
        assert_eq!(rest.map(|s| s.current_exception), Some(Some(arg)));

        // finally runs and rethrows
        let (sticks, rest) = split_exceptions(&program, Some(HandlerKind::Finally), raised(arg));
        assert_eq!(sticks.map(|s| s.current_exception), Some(Some(arg)));
        assert_eq!(rest.map(|s| s.current_exception), Some(Some(arg)));

        // entered on the normal path there is nothing to rethrow
        let (sticks, rest) =
            split_exceptions(&program, Some(HandlerKind::Finally), PointsToState::for_method(cx, m));
        assert!(sticks.is_some() && rest.is_none());

        let (sticks, rest) = split_exceptions(&program, Some(HandlerKind::Unwind), raised(arg));
        assert!(sticks.is_none() && rest.is_none());
    }
}
