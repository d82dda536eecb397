//! Test data builders
//!
//! `NodeProgram` is the usual playground: a class `App.Node` with a
//! reference field `next`, an owned field `rep` and a static `cache`.

use heapgraph_ir::config::AnalysisConfig;
use heapgraph_ir::features::ir::{
    BlockId, CallKind, CfgBuilder, FieldId, MethodId, Program, ProgramBuilder, Statement, TypeId,
    VarId,
};
use heapgraph_ir::features::points_to::{AnalysisContext, Label};
use std::sync::Arc;

pub struct NodeProgram {
    pub pb: ProgramBuilder,
    pub node: TypeId,
    pub next: FieldId,
    pub rep: FieldId,
    pub cache: FieldId,
}

impl NodeProgram {
    pub fn new() -> Self {
        let mut pb = ProgramBuilder::new("App");
        let node = pb.class("App", "Node");
        let next = pb.field(node, "next", node);
        let rep = pb.owned_field(node, "rep", node);
        let cache = pb.static_field(node, "cache", node);
        Self {
            pb,
            node,
            next,
            rep,
            cache,
        }
    }

    /// Static method `name(Node p0, ...)`, returning `Node` when `returns`
    pub fn static_method(&mut self, name: &str, params: usize, returns: bool) -> MethodId {
        let mut mb = self.pb.method(self.node, name);
        for i in 0..params {
            mb = mb.param(&format!("p{}", i), self.node);
        }
        if returns {
            mb = mb.returns(self.node);
        }
        mb.build()
    }

    /// Parameter `index` of a static method (0-based, receiver excluded)
    pub fn param(&self, m: MethodId, index: usize) -> VarId {
        self.pb.param_var(m, index + 1).expect("parameter exists")
    }

    pub fn local(&mut self, m: MethodId, name: &str) -> VarId {
        let node = self.node;
        self.pb.local(m, name, node)
    }

    pub fn body(&mut self, m: MethodId, statements: Vec<Statement>) {
        self.pb.set_body(m, CfgBuilder::straight_line(statements));
    }

    pub fn finish(self) -> Program {
        self.pb.finish()
    }
}

pub fn session(program: Program) -> AnalysisContext {
    AnalysisContext::new(Arc::new(program), AnalysisConfig::default())
}

pub fn session_with(program: Program, config: AnalysisConfig) -> AnalysisContext {
    AnalysisContext::new(Arc::new(program), config)
}

pub fn call(dest: Option<VarId>, callee: MethodId, args: Vec<VarId>) -> Statement {
    Statement::Call {
        dest,
        receiver: None,
        callee,
        args,
        kind: CallKind::Direct,
    }
}

pub fn virtual_call(dest: Option<VarId>, receiver: VarId, callee: MethodId, args: Vec<VarId>) -> Statement {
    Statement::Call {
        dest,
        receiver: Some(receiver),
        callee,
        args,
        kind: CallKind::Virtual,
    }
}

pub fn new_object(dest: VarId, ty: TypeId) -> Statement {
    Statement::NewObject { dest, ty }
}

pub fn store(target: VarId, field: FieldId, source: VarId) -> Statement {
    Statement::StoreField {
        target: Some(target),
        field,
        source,
    }
}

pub fn load(dest: VarId, source: VarId, field: FieldId) -> Statement {
    Statement::LoadField {
        dest,
        source: Some(source),
        field,
    }
}

pub fn ret(value: VarId) -> Statement {
    Statement::Return { value: Some(value) }
}

pub fn label(m: MethodId, index: usize) -> Label {
    Label::stmt(m, BlockId(0), index)
}
