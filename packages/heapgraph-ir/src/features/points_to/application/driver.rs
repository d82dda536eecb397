//! Interprocedural driver
//!
//! Owns the per-method summaries of one session and schedules the
//! intraprocedural pass over them:
//! - **Fixpoint mode**: strongly connected components of the call graph are
//!   analyzed callees first, each iterated until no summary grows
//! - **Inlining mode**: callees are analyzed on demand, top down, bounded by
//!   the configured stack depth
//!
//! # Usage
//! ```text
//! let ctx = AnalysisContext::new(Arc::new(program), AnalysisConfig::default());
//! let mut analysis = PointsToAnalysis::new(&ctx);
//! analysis.whole_program_analysis();
//! let summary = analysis.summary(method).expect("analyzed");
//! assert!(summary.check_method_freshness(ctx.cx()));
//! ```

use super::context::AnalysisContext;
use super::inferer::Inferer;
use super::state::PointsToState;
use crate::errors::{HeapgraphError, Result};
use crate::features::call_graph::{CallGraph, CallGraphBuilder};
use crate::features::ir::MethodId;
use crate::features::points_to::domain::ptgraph::PTGraph;
use crate::features::points_to::ports::{NoopConsumer, SummaryConsumer};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeSet, VecDeque};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Session statistics
#[derive(Debug, Clone, Default)]
pub struct AnalysisStats {
    /// Distinct methods with a computed summary
    pub methods_analyzed: usize,
    /// Intraprocedural passes, re-analyses included
    pub passes: usize,
    pub sccs: usize,
    pub fixpoint_iterations: usize,
    /// Calls degraded to annotations by the inlining bound or recursion
    pub inlining_cutoffs: usize,
    /// Fixpoints stopped by the iteration bound
    pub fixpoint_cutoffs: usize,
    pub duration_ms: f64,
}

pub struct PointsToAnalysis<'c> {
    ctx: &'c AnalysisContext,
    call_graph: CallGraph,
    summaries: FxHashMap<MethodId, PointsToState>,
    /// callee → callers that bound its summary
    callers: FxHashMap<MethodId, BTreeSet<MethodId>>,
    analyzed: FxHashSet<MethodId>,
    call_stack: Vec<MethodId>,
    consumer: Box<dyn SummaryConsumer + 'c>,
    stats: AnalysisStats,
}

impl<'c> PointsToAnalysis<'c> {
    pub fn new(ctx: &'c AnalysisContext) -> Self {
        Self {
            ctx,
            call_graph: CallGraphBuilder::build(ctx),
            summaries: FxHashMap::default(),
            callers: FxHashMap::default(),
            analyzed: FxHashSet::default(),
            call_stack: Vec::new(),
            consumer: Box::new(NoopConsumer),
            stats: AnalysisStats::default(),
        }
    }

    /// Reports every stored summary to `consumer`
    pub fn with_consumer(mut self, consumer: Box<dyn SummaryConsumer + 'c>) -> Self {
        self.consumer = consumer;
        self
    }

    pub fn ctx(&self) -> &'c AnalysisContext {
        self.ctx
    }

    pub fn call_graph(&self) -> &CallGraph {
        &self.call_graph
    }

    pub fn stats(&self) -> &AnalysisStats {
        &self.stats
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Entry points
    // ═══════════════════════════════════════════════════════════════════════

    /// Summarizes every method of the call graph, callees first.
    ///
    /// The call graph only holds the static target of each call. Overrides
    /// chosen by virtual dispatch and delegate targets get no edge, so in
    /// fixpoint mode such a callee reached before its own component is bound
    /// through its entry summary, and callers outside its component are not
    /// revisited when it grows. Inlining mode analyzes them on demand.
    pub fn whole_program_analysis(&mut self) {
        let started = Instant::now();
        let order = self.call_graph.topological_sort();
        info!(
            methods = self.call_graph.method_count(),
            components = order.len(),
            fixpoint = self.ctx.config().fixpoint,
            "whole program analysis"
        );

        for &representative in order.iter().rev() {
            if self.analyzed.contains(&representative) {
                continue;
            }
            let scc = self.call_graph.scc_methods(representative);
            self.stats.sccs += 1;
            if self.ctx.config().fixpoint {
                self.fixpoint(&scc);
            } else {
                for m in scc {
                    if !self.analyzed.contains(&m) {
                        self.analyze_top_level(m);
                    }
                }
            }
        }

        self.stats.duration_ms += started.elapsed().as_secs_f64() * 1000.0;
        info!(
            summaries = self.summaries.len(),
            passes = self.stats.passes,
            duration_ms = self.stats.duration_ms,
            "whole program analysis done"
        );
    }

    /// Summary of `m`, computing it (and whatever it needs) first.
    /// A method already analyzed keeps its stored summary. Methods without
    /// an analyzable body get their annotation summary.
    pub fn analysis_for_method(&mut self, m: MethodId) -> Result<&PointsToState> {
        self.check_known(m)?;
        let started = Instant::now();
        let target = self.ctx.template_or_method(m);

        if self.analyzed.contains(&target) {
            debug!(method = %m, "summary already computed");
        } else if !self.ctx.is_analyzable(m) {
            if !self.summaries.contains_key(&target) {
                let graph = PTGraph::from_annotations(self.ctx.cx(), self.ctx.annotations(), target);
                self.summaries.insert(target, PointsToState::from_graph(graph));
            }
        } else if self.ctx.config().fixpoint {
            let mut closure: Vec<MethodId> = if self.call_graph.contains(target) {
                self.call_graph.bfs(target).into_iter().rev().collect()
            } else {
                vec![target]
            };
            closure.retain(|x| !self.analyzed.contains(x));
            self.fixpoint(&closure);
        } else {
            self.analyze_top_level(target);
        }

        self.stats.duration_ms += started.elapsed().as_secs_f64() * 1000.0;
        self.summaries
            .get(&target)
            .ok_or_else(|| HeapgraphError::analysis(format!("no summary for {}", m)))
    }

    /// Stored summary, or the analysis of `m` when there is none yet
    pub fn compute_only(&mut self, m: MethodId) -> Result<&PointsToState> {
        self.check_known(m)?;
        let target = self.ctx.template_or_method(m);
        if self.analyzed.contains(&target) {
            return self
                .summaries
                .get(&target)
                .ok_or_else(|| HeapgraphError::analysis(format!("no summary for {}", m)));
        }
        self.analysis_for_method(m)
    }

    pub fn summary(&self, m: MethodId) -> Option<&PointsToState> {
        self.summaries.get(&self.ctx.template_or_method(m))
    }

    pub fn summaries(&self) -> impl Iterator<Item = (MethodId, &PointsToState)> + '_ {
        self.summaries.iter().map(|(&m, s)| (m, s))
    }

    /// A summary was computed from the method body
    pub fn was_analyzed(&self, m: MethodId) -> bool {
        self.analyzed.contains(&self.ctx.template_or_method(m))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Scheduling
    // ═══════════════════════════════════════════════════════════════════════

    /// Worklist over `methods`; a changed summary re-queues its callers
    /// within the set
    fn fixpoint(&mut self, methods: &[MethodId]) {
        let members: FxHashSet<MethodId> = methods.iter().copied().collect();
        let mut worklist: VecDeque<MethodId> = methods.iter().copied().collect();
        let mut queued: FxHashSet<MethodId> = members.clone();
        let max_iterations = self.ctx.config().max_fixpoint_iterations;
        let mut iterations = 0usize;

        while let Some(m) = worklist.pop_front() {
            queued.remove(&m);
            if iterations >= max_iterations {
                warn!(
                    iterations,
                    pending = worklist.len() + 1,
                    "fixpoint iteration bound reached, keeping current summaries"
                );
                self.stats.fixpoint_cutoffs += 1;
                break;
            }
            iterations += 1;

            let changed = self.analyze_method(m);
            if changed && self.ctx.is_analyzable(m) {
                let callers: Vec<MethodId> = self
                    .callers
                    .get(&m)
                    .map(|cs| cs.iter().copied().filter(|c| members.contains(c)).collect())
                    .unwrap_or_default();
                for caller in callers {
                    if queued.insert(caller) {
                        worklist.push_back(caller);
                    }
                }
            }
        }

        self.stats.fixpoint_iterations += iterations;
        debug!(methods = methods.len(), iterations, "fixpoint done");
    }

    fn analyze_top_level(&mut self, m: MethodId) {
        self.call_stack.push(m);
        self.analyze_method(m);
        self.call_stack.pop();
    }

    /// Runs the intraprocedural pass and stores the joined, simplified
    /// summary. Returns whether it grew.
    fn analyze_method(&mut self, m: MethodId) -> bool {
        let ctx = self.ctx;
        let cx = ctx.cx();
        let program = ctx.program();
        let Some(cfg) = program.method(m).body.as_ref() else {
            return false;
        };

        debug!(method = %program.method_full_name(m), depth = self.call_stack.len(), "analyzing");
        let prior = self.summaries.get(&m).cloned();
        let default = prior.clone().unwrap_or_else(|| PointsToState::for_method(cx, m));

        let exit = Inferer::new(self, m, cfg).run(PointsToState::for_method(cx, m));
        let mut summary = match exit {
            Some(mut s) => {
                s.join(cx, &default);
                s
            }
            None => default,
        };
        summary.graph = summary.graph.simplify(cx);

        let changed = prior.as_ref().map_or(true, |old| !old.includes(&summary));
        self.verify_annotations(m, &summary);
        self.consumer.on_summary(m, summary.graph(), cx);
        self.summaries.insert(m, summary);
        if self.analyzed.insert(m) {
            self.stats.methods_analyzed += 1;
        }
        self.stats.passes += 1;
        changed
    }

    fn verify_annotations(&self, m: MethodId, summary: &PointsToState) {
        let ctx = self.ctx;
        if !ctx.config().verify_annotations {
            return;
        }
        let program = ctx.program();
        if ctx.annotations().is_declared_fresh(program, m) && !summary.check_method_freshness(ctx.cx()) {
            warn!(method = %program.method_full_name(m), "declared fresh but the result is not fresh");
        }
    }

    fn check_known(&self, m: MethodId) -> Result<()> {
        match self.ctx.program().try_method(m) {
            Some(_) => Ok(()),
            None => Err(HeapgraphError::UnknownMethod(m)),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Hooks for the transfer functions
    // ═══════════════════════════════════════════════════════════════════════

    pub(crate) fn summary_with_default(&self, m: MethodId) -> PointsToState {
        match self.summaries.get(&m) {
            Some(s) => s.clone(),
            None => PointsToState::for_method(self.ctx.cx(), m),
        }
    }

    pub(crate) fn add_caller(&mut self, callee: MethodId, caller: MethodId) {
        self.callers.entry(callee).or_default().insert(caller);
    }

    /// Analyzes `callee` nested in the current pass unless it is already on
    /// the stack or the depth bound is reached
    pub(crate) fn try_inline(&mut self, callee: MethodId) -> bool {
        let depth = self.call_stack.len().saturating_sub(1);
        if self.call_stack.contains(&callee) || depth >= self.ctx.config().max_stack_depth {
            debug!(%callee, depth, "inlining bound reached");
            self.stats.inlining_cutoffs += 1;
            return false;
        }
        self.call_stack.push(callee);
        self.analyze_method(callee);
        self.call_stack.pop();
        true
    }
}

impl std::fmt::Debug for PointsToAnalysis<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointsToAnalysis")
            .field("summaries", &self.summaries.len())
            .field("analyzed", &self.analyzed.len())
            .field("stats", &self.stats)
            .finish()
    }
}
