//! Statement transfer functions
//!
//! Each statement maps the incoming state to the outgoing one. Throwing
//! statements and callees with exceptional postconditions also raise states
//! that the inferer routes to the enclosing handler.

use super::driver::PointsToAnalysis;
use super::state::PointsToState;
use crate::features::ir::{CallKind, MethodId, Statement, VarId};
use crate::features::points_to::domain::field::Field;
use crate::features::points_to::domain::label::Label;
use crate::features::points_to::domain::ptgraph::PTGraph;
use crate::features::points_to::infrastructure::interproc_mapping::{CallSite, InterProcMapping};
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Contract helpers that behave like `dest = args[0]`
const COPY_LIKE_PREFIXES: &[&str] = &[
    "Microsoft.Contracts.NonNullType.IsNonNullGeneric",
    "Microsoft.Contracts.NonNullType.IsNonNullImplicitGeneric",
];

pub(crate) struct TransferFunctions<'d, 'c> {
    driver: &'d mut PointsToAnalysis<'c>,
    raised: Vec<PointsToState>,
}

impl<'d, 'c> TransferFunctions<'d, 'c> {
    pub(crate) fn new(driver: &'d mut PointsToAnalysis<'c>) -> Self {
        Self {
            driver,
            raised: Vec::new(),
        }
    }

    /// States raised since the last call, to be pushed to the handler
    pub(crate) fn take_raised(&mut self) -> Vec<PointsToState> {
        std::mem::take(&mut self.raised)
    }

    /// Applies `stmt`; `None` when control does not fall through
    pub(crate) fn visit(&mut self, mut state: PointsToState, stmt: &Statement, lb: Label) -> Option<PointsToState> {
        let ctx = self.driver.ctx();
        let cx = ctx.cx();
        let g = &mut state.graph;
        trace!(label = %lb, ?stmt, "transfer");

        match stmt {
            Statement::MethodEntry | Statement::Nop | Statement::Unwind => {}

            Statement::Copy { dest, source }
            | Statement::IsInstance { dest, source }
            | Statement::CastClass { dest, source }
            | Statement::Box { dest, source }
            | Statement::Unbox { dest, source }
            | Statement::MakeRefAny { dest, source } => g.copy_loc_var(cx, *dest, *source, lb),

            Statement::LoadConstant { dest }
            | Statement::BinaryOperator { dest }
            | Statement::UnaryOperator { dest }
            | Statement::SizeOf { dest }
            | Statement::RefAnyType { dest }
            | Statement::Catch { dest, .. } => g.forget_variable(*dest),

            Statement::LoadNull { dest } => g.apply_assign_null(cx, *dest),

            Statement::LoadField { dest, source, field } => match source {
                Some(src) => g.load(cx, *dest, *src, Field::Named(*field), lb),
                None => g.load_static(cx, *dest, *field, lb),
            },
            Statement::StoreField { target, field, source } => match target {
                Some(t) => g.store(cx, *t, Field::Named(*field), *source, lb),
                None => g.store_static(cx, *field, *source, lb),
            },
            Statement::LoadElement { dest, array } => g.load_element(cx, *dest, *array, lb),
            Statement::StoreElement { array, source } => g.store_element(cx, *array, *source, lb),
            Statement::LoadIndirect { dest, pointer } => g.load_indirect(cx, *dest, *pointer, lb),
            Statement::StoreIndirect { pointer, source } => g.store_indirect(cx, *pointer, *source, lb),
            Statement::LoadAddress { dest, source } => g.load_address(cx, *dest, *source),
            Statement::LoadFieldAddress { dest, source, field } => match source {
                Some(src) => g.load_field_address(cx, *dest, *src, Field::Named(*field), lb),
                None => g.load_static_address(cx, *dest, *field, lb),
            },
            Statement::LoadElementAddress { dest, array } => g.load_element_address(cx, *dest, *array, lb),

            Statement::NewObject { dest, ty }
            | Statement::NewArray { dest, ty }
            | Statement::InitObject { dest, ty } => g.new_inside_node(cx, *dest, lb, *ty),

            Statement::LoadFunction { dest, method, .. } => g.load_method(cx, *dest, *method, lb),

            Statement::Return { value } => {
                if let Some(v) = value {
                    g.apply_return(cx, *v, lb);
                }
            }

            Statement::Throw { exception } => {
                g.forget_variable(*exception);
                state.current_exception = Some(cx.var_type(*exception));
                self.raised.push(state);
                return None;
            }
            Statement::Rethrow => {
                self.raised.push(state);
                return None;
            }

            Statement::Call {
                dest,
                receiver,
                callee,
                args,
                kind,
            } => {
                let site = CallSite {
                    receiver: *receiver,
                    args,
                    result: *dest,
                    label: lb,
                };
                self.visit_call(&mut state, *callee, *kind, &site);
                self.raise_ensured_exceptions(&state, *callee);
            }
            Statement::CallIndirect { dest, args, .. } => self.apply_opaque_call(&mut state, *dest, args, lb),
        }
        Some(state)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Calls
    // ═══════════════════════════════════════════════════════════════════════

    fn visit_call(&mut self, state: &mut PointsToState, callee: MethodId, kind: CallKind, site: &CallSite<'_>) {
        let ctx = self.driver.ctx();
        let cx = ctx.cx();
        let program = ctx.program();
        let def = program.method(callee);
        let lb = site.label;

        if def.is_constructor() && program.is_delegate(def.declaring_type) {
            if let (Some(r), [target, pointer, ..]) = (site.receiver, site.args) {
                state.graph.assign_delegate(cx, r, Some(*target), *pointer);
            }
            return;
        }

        // indexers are modelled as array element accesses
        if def.name == "set_Item" {
            if let (Some(r), Some(&value)) = (site.receiver, site.args.get(1)) {
                state.graph.store_element(cx, r, value, lb);
            }
            return;
        }
        if def.name == "get_Item" {
            if let (Some(d), Some(r)) = (site.result, site.receiver) {
                state.graph.load_element(cx, d, r, lb);
            }
            return;
        }

        if let Some(summaries) = self.try_analyze_callee(state, callee, kind.is_virtual(), site.receiver) {
            if let [single] = summaries.as_slice() {
                InterProcMapping::bind(cx, &mut state.graph, single.graph(), site);
            } else {
                let original = state.clone();
                for summary in &summaries {
                    let mut copy = original.clone();
                    InterProcMapping::bind(cx, &mut copy.graph, summary.graph(), site);
                    state.join(cx, &copy);
                }
            }
            return;
        }

        let full_name = program.method_full_name(callee);
        if COPY_LIKE_PREFIXES.iter().any(|p| full_name.starts_with(p)) {
            if let (Some(d), Some(&src)) = (site.result, site.args.first()) {
                state.graph.copy_loc_var(cx, d, src, lb);
            }
        } else if ctx.is_excluded_namespace(callee) {
            if let Some(d) = site.result {
                state.graph.forget_variable(d);
            }
        } else {
            let summary = if self.driver.was_analyzed(callee) {
                self.driver.summary_with_default(callee).graph
            } else {
                PTGraph::from_annotations(cx, ctx.annotations(), callee)
            };
            InterProcMapping::bind(cx, &mut state.graph, &summary, site);
        }
    }

    /// Summaries of every method the call may reach, or `None` when the call
    /// must be bound through annotations
    fn try_analyze_callee(
        &mut self,
        state: &mut PointsToState,
        callee: MethodId,
        is_virtual_call: bool,
        receiver: Option<VarId>,
    ) -> Option<Vec<PointsToState>> {
        let ctx = self.driver.ctx();
        let program = ctx.program();
        let annotations = ctx.annotations();
        let config = ctx.config();
        let def = program.method(callee);

        if annotations.is_assumed_pure(program, callee) || annotations.is_annotated(program, callee) {
            return None;
        }
        if !config.interprocedural {
            return None;
        }

        let mut solved_virtual = false;
        let mut targets = Vec::new();
        if ctx.is_analyzable(callee) && !(def.flags.is_virtual && is_virtual_call) {
            targets.push(callee);
        }
        if targets.is_empty() && config.resolve_virtual_calls && def.flags.is_virtual && !def.flags.is_extern {
            if let Some(resolved) = self.resolve_virtual(state, callee, receiver) {
                targets = resolved;
                solved_virtual = true;
            }
        }
        if targets.is_empty() && def.flags.is_extern {
            if let Some(resolved) = self.resolve_delegate(state, receiver) {
                targets = resolved;
            }
        }
        if targets.is_empty() {
            return None;
        }

        let caller = state.method();
        let mut summaries = Vec::with_capacity(targets.len());
        for target in targets {
            let target = ctx.template_or_method(target);
            summaries.push(self.callee_summary(caller, target)?);
        }

        if (is_virtual_call && def.flags.is_virtual && solved_virtual) || def.template.is_some() {
            state.assumptions.insert(callee);
        }
        Some(summaries)
    }

    /// Implementations selected by the receiver's inside nodes; fails when
    /// any receiver value has an unknown dynamic type
    fn resolve_virtual(
        &self,
        state: &mut PointsToState,
        slot: MethodId,
        receiver: Option<VarId>,
    ) -> Option<Vec<MethodId>> {
        let ctx = self.driver.ctx();
        let cx = ctx.cx();
        let program = ctx.program();
        let values = state.graph.var_values(cx, receiver?);
        if values.is_empty() {
            return None;
        }

        let mut targets = BTreeSet::new();
        for n in values {
            if !cx.kind(n).is_inside() {
                return None;
            }
            let ty = cx.node_type(n);
            if program.ty(ty).is_interface_or_abstract() {
                return None;
            }
            let implementation = program.find_implementation(slot, ty)?;
            if !ctx.is_analyzable(implementation) {
                return None;
            }
            targets.insert(implementation);
        }
        Some(targets.into_iter().collect())
    }

    /// Targets bound to the delegate objects the receiver denotes
    fn resolve_delegate(&self, state: &mut PointsToState, receiver: Option<VarId>) -> Option<Vec<MethodId>> {
        let ctx = self.driver.ctx();
        let cx = ctx.cx();
        let values = state.graph.var_values(cx, receiver?);
        if values.is_empty() {
            return None;
        }

        let mut targets = BTreeSet::new();
        for n in values {
            if !cx.kind(n).is_method_delegate() {
                return None;
            }
            let method = cx.arena.delegate(n)?.method?;
            if !ctx.is_analyzable(method) {
                return None;
            }
            targets.insert(method);
        }
        Some(targets.into_iter().collect())
    }

    fn callee_summary(&mut self, caller: MethodId, callee: MethodId) -> Option<PointsToState> {
        if self.driver.ctx().config().fixpoint {
            self.driver.add_caller(callee, caller);
            return Some(self.driver.summary_with_default(callee));
        }
        if let Some(summary) = self.driver.summary(callee) {
            return Some(summary.clone());
        }
        if self.driver.try_inline(callee) {
            self.driver.summary(callee).cloned()
        } else {
            debug!(%caller, %callee, "callee not inlined, using annotations");
            None
        }
    }

    /// `CallIndirect`: arguments escape into the global scope, the result is unknown
    fn apply_opaque_call(&mut self, state: &mut PointsToState, dest: Option<VarId>, args: &[VarId], lb: Label) {
        let ctx = self.driver.ctx();
        let cx = ctx.cx();
        let global = ctx.program().global_var;
        for &a in args {
            if cx.is_primitive_var(a) {
                continue;
            }
            state.graph.store(cx, global, Field::AllFields, a, lb);
            for n in state.graph.var_values(cx, a) {
                state.graph.mark_escaping(n);
            }
        }
        if let Some(d) = dest {
            state.graph.forget_variable(d);
        }
    }

    fn raise_ensured_exceptions(&mut self, state: &PointsToState, callee: MethodId) {
        let program = self.driver.ctx().program();
        for &ty in &program.method(callee).ensures_exceptional {
            let mut exceptional = state.clone();
            exceptional.current_exception = Some(ty);
            self.raised.push(exceptional);
        }
    }
}
