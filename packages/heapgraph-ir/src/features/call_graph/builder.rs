//! Call graph construction from method bodies

use super::graph::CallGraph;
use crate::features::ir::{MethodId, Statement};
use crate::features::points_to::application::context::AnalysisContext;
use crate::features::points_to::domain::label::Label;
use tracing::debug;

pub struct CallGraphBuilder;

impl CallGraphBuilder {
    /// Walks every analyzable method and records its interesting calls
    pub fn build(ctx: &AnalysisContext) -> CallGraph {
        let program = ctx.program();
        let mut cg = CallGraph::new();

        for def in program.methods() {
            let m = def.id;
            if !ctx.is_analyzable(m) {
                continue;
            }
            cg.add_method(m);
            let Some(body) = def.body.as_ref() else {
                continue;
            };
            for block in &body.blocks {
                for (i, stmt) in block.statements.iter().enumerate() {
                    if let Statement::Call { callee, kind, .. } = stmt {
                        if !Self::is_interesting_call(ctx, *callee) {
                            continue;
                        }
                        let label = Label::stmt(m, block.id, i);
                        cg.add_call(m, *callee, label, kind.is_virtual());
                        if let Some(template) = program.method(*callee).template {
                            cg.add_call(m, template, label, kind.is_virtual());
                        }
                    }
                }
            }
        }

        debug!(methods = cg.method_count(), calls = cg.call_count(), "built call graph");
        cg
    }

    /// Calls worth an edge: in scope, not an indexer accessor, not in an
    /// excluded namespace and possibly analyzable
    pub fn is_interesting_call(ctx: &AnalysisContext, callee: MethodId) -> bool {
        let program = ctx.program();
        let def = program.method(callee);
        ctx.is_in_scope(callee)
            && def.name != "set_Item"
            && def.name != "get_Item"
            && !ctx.is_excluded_namespace(callee)
            && ctx.is_possibly_analyzable(ctx.template_or_method(callee))
    }
}
