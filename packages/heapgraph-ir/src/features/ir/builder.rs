//! Program and CFG builders
//!
//! Front ends (and tests) assemble a [`Program`] through these builders instead
//! of filling the tables by hand.
//!
//! ```text
//! let mut pb = ProgramBuilder::new("App");
//! let t = pb.class("App", "T");
//! let make = pb.method(t, "Make").returns(t).build();
//! let x = pb.local(make, "x", t);
//! pb.set_body(make, CfgBuilder::straight_line(vec![
//!     Statement::NewObject { dest: x, ty: t },
//!     Statement::Return { value: Some(x) },
//! ]));
//! let program = pb.finish();
//! ```

use super::cfg::{BasicBlock, BlockId, ControlFlowGraph, HandlerKind};
use super::program::{
    MethodAttributes, MethodDef, MethodFlags, ParamAttributes, ParamInfo, Program,
};
use super::statement::Statement;
use super::types::{
    FieldDef, FieldId, MethodId, ParamMode, TypeDef, TypeId, TypeKind, VarDef, VarId, VarKind,
};

// ═══════════════════════════════════════════════════════════════════════════
// ProgramBuilder
// ═══════════════════════════════════════════════════════════════════════════

pub struct ProgramBuilder {
    program: Program,
}

impl ProgramBuilder {
    pub fn new(module: impl Into<String>) -> Self {
        let mut program = Program {
            module: module.into(),
            types: Vec::new(),
            fields: Vec::new(),
            vars: Vec::new(),
            methods: Vec::new(),
            type_modules: Vec::new(),
            void_type: TypeId(0),
            object_type: TypeId(1),
            global_var: VarId(0),
            return_var: VarId(1),
        };
        push_type(&mut program, "System", "Void", TypeKind::Void, None, "mscorlib");
        push_type(&mut program, "System", "Object", TypeKind::Class, None, "mscorlib");
        push_var(&mut program, "Global", TypeId(1), VarKind::GlobalScope);
        push_var(&mut program, "return", TypeId(1), VarKind::ReturnValue);
        Self { program }
    }

    pub fn object(&self) -> TypeId {
        self.program.object_type
    }

    pub fn void(&self) -> TypeId {
        self.program.void_type
    }

    // ───────────────────────────────────────────────────────────────────────
    // Types
    // ───────────────────────────────────────────────────────────────────────

    pub fn class(&mut self, namespace: &str, name: &str) -> TypeId {
        let module = self.program.module.clone();
        let object = self.program.object_type;
        push_type(&mut self.program, namespace, name, TypeKind::Class, Some(object), &module)
    }

    /// Class declared outside the module under analysis
    pub fn external_class(&mut self, namespace: &str, name: &str, module: &str) -> TypeId {
        let object = self.program.object_type;
        push_type(&mut self.program, namespace, name, TypeKind::Class, Some(object), module)
    }

    pub fn subclass(&mut self, base: TypeId, namespace: &str, name: &str) -> TypeId {
        let module = self.program.module.clone();
        push_type(&mut self.program, namespace, name, TypeKind::Class, Some(base), &module)
    }

    pub fn interface(&mut self, namespace: &str, name: &str) -> TypeId {
        let module = self.program.module.clone();
        push_type(&mut self.program, namespace, name, TypeKind::Interface, None, &module)
    }

    pub fn struct_type(&mut self, namespace: &str, name: &str) -> TypeId {
        let module = self.program.module.clone();
        push_type(&mut self.program, namespace, name, TypeKind::Struct, None, &module)
    }

    pub fn delegate(&mut self, namespace: &str, name: &str) -> TypeId {
        let module = self.program.module.clone();
        let object = self.program.object_type;
        push_type(&mut self.program, namespace, name, TypeKind::Delegate, Some(object), &module)
    }

    pub fn primitive(&mut self, name: &str) -> TypeId {
        push_type(&mut self.program, "System", name, TypeKind::Primitive, None, "mscorlib")
    }

    pub fn array_of(&mut self, element: TypeId) -> TypeId {
        let name = format!("{}[]", self.program.ty(element).name);
        let object = self.program.object_type;
        push_type(&mut self.program, "", &name, TypeKind::Array { element }, Some(object), "mscorlib")
    }

    pub fn reference_to(&mut self, referent: TypeId) -> TypeId {
        let name = format!("{}@", self.program.ty(referent).name);
        push_type(&mut self.program, "", &name, TypeKind::Reference { referent }, None, "mscorlib")
    }

    pub fn pointer_to(&mut self, pointee: TypeId) -> TypeId {
        let name = format!("{}*", self.program.ty(pointee).name);
        push_type(&mut self.program, "", &name, TypeKind::Pointer { pointee }, None, "mscorlib")
    }

    pub fn implements(&mut self, ty: TypeId, interface: TypeId) {
        self.program.types[ty.index()].interfaces.push(interface);
    }

    pub fn set_abstract(&mut self, ty: TypeId) {
        self.program.types[ty.index()].is_abstract = true;
    }

    // ───────────────────────────────────────────────────────────────────────
    // Fields and locals
    // ───────────────────────────────────────────────────────────────────────

    pub fn field(&mut self, holder: TypeId, name: &str, ty: TypeId) -> FieldId {
        self.push_field(holder, name, ty, false, false)
    }

    pub fn owned_field(&mut self, holder: TypeId, name: &str, ty: TypeId) -> FieldId {
        self.push_field(holder, name, ty, false, true)
    }

    pub fn static_field(&mut self, holder: TypeId, name: &str, ty: TypeId) -> FieldId {
        self.push_field(holder, name, ty, true, false)
    }

    fn push_field(&mut self, holder: TypeId, name: &str, ty: TypeId, is_static: bool, is_owned: bool) -> FieldId {
        let id = FieldId(self.program.fields.len() as u32);
        self.program.fields.push(FieldDef {
            id,
            name: name.to_string(),
            declaring_type: holder,
            ty,
            is_static,
            is_owned,
        });
        if !is_static {
            self.program.types[holder.index()].fields.push(id);
        }
        id
    }

    pub fn local(&mut self, method: MethodId, name: &str, ty: TypeId) -> VarId {
        let id = push_var(&mut self.program, name, ty, VarKind::Local);
        self.program.methods[method.index()].locals.push(id);
        id
    }

    // ───────────────────────────────────────────────────────────────────────
    // Methods
    // ───────────────────────────────────────────────────────────────────────

    pub fn method(&mut self, declaring_type: TypeId, name: &str) -> MethodBuilder<'_> {
        MethodBuilder {
            builder: self,
            declaring_type,
            name: name.to_string(),
            params: Vec::new(),
            return_type: None,
            flags: MethodFlags {
                is_static: true,
                ..MethodFlags::default()
            },
            attributes: MethodAttributes::default(),
            this_attributes: ParamAttributes::default(),
            template: None,
            overrides: Vec::new(),
            ensures_exceptional: Vec::new(),
        }
    }

    /// Variable bound to parameter `index` (0 = receiver)
    pub fn param_var(&self, method: MethodId, index: usize) -> Option<VarId> {
        let def = self.program.method(method);
        if index == 0 {
            def.this_param.as_ref().map(|p| p.var)
        } else {
            def.params.get(index - 1).map(|p| p.var)
        }
    }

    pub fn set_body(&mut self, method: MethodId, cfg: ControlFlowGraph) {
        self.program.methods[method.index()].body = Some(cfg);
    }

    pub fn set_param_attributes(&mut self, method: MethodId, index: usize, attrs: ParamAttributes) {
        let def = &mut self.program.methods[method.index()];
        if index == 0 {
            if let Some(p) = def.this_param.as_mut() {
                p.attributes = attrs;
            }
        } else if let Some(p) = def.params.get_mut(index - 1) {
            p.attributes = attrs;
        }
    }

    pub fn method_mut(&mut self, method: MethodId) -> &mut MethodDef {
        &mut self.program.methods[method.index()]
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn finish(self) -> Program {
        self.program
    }
}

fn push_type(
    program: &mut Program,
    namespace: &str,
    name: &str,
    kind: TypeKind,
    base: Option<TypeId>,
    module: &str,
) -> TypeId {
    let id = TypeId(program.types.len() as u32);
    program.types.push(TypeDef {
        id,
        name: name.to_string(),
        namespace: namespace.to_string(),
        kind,
        base,
        interfaces: Vec::new(),
        fields: Vec::new(),
        methods: Vec::new(),
        is_abstract: false,
    });
    program.type_modules.push(module.to_string());
    id
}

fn push_var(program: &mut Program, name: &str, ty: TypeId, kind: VarKind) -> VarId {
    let id = VarId(program.vars.len() as u32);
    program.vars.push(VarDef {
        id,
        name: name.to_string(),
        ty,
        kind,
    });
    id
}

// ═══════════════════════════════════════════════════════════════════════════
// MethodBuilder
// ═══════════════════════════════════════════════════════════════════════════

pub struct MethodBuilder<'a> {
    builder: &'a mut ProgramBuilder,
    declaring_type: TypeId,
    name: String,
    params: Vec<(String, TypeId, ParamMode, ParamAttributes)>,
    return_type: Option<TypeId>,
    flags: MethodFlags,
    attributes: MethodAttributes,
    this_attributes: ParamAttributes,
    template: Option<MethodId>,
    overrides: Vec<MethodId>,
    ensures_exceptional: Vec<TypeId>,
}

impl<'a> MethodBuilder<'a> {
    pub fn param(mut self, name: &str, ty: TypeId) -> Self {
        self.params.push((name.to_string(), ty, ParamMode::ByValue, ParamAttributes::default()));
        self
    }

    /// `ref` parameter; `ty` is the referent type
    pub fn ref_param(mut self, name: &str, ty: TypeId) -> Self {
        let r = self.builder.reference_to(ty);
        self.params.push((name.to_string(), r, ParamMode::Ref, ParamAttributes::default()));
        self
    }

    /// `out` parameter; `ty` is the referent type
    pub fn out_param(mut self, name: &str, ty: TypeId) -> Self {
        let r = self.builder.reference_to(ty);
        self.params.push((name.to_string(), r, ParamMode::Out, ParamAttributes::default()));
        self
    }

    pub fn param_with(mut self, name: &str, ty: TypeId, attrs: ParamAttributes) -> Self {
        self.params.push((name.to_string(), ty, ParamMode::ByValue, attrs));
        self
    }

    pub fn returns(mut self, ty: TypeId) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn instance(mut self) -> Self {
        self.flags.is_static = false;
        self
    }

    pub fn virtual_(mut self) -> Self {
        self.flags.is_static = false;
        self.flags.is_virtual = true;
        self
    }

    pub fn abstract_(mut self) -> Self {
        self.flags.is_static = false;
        self.flags.is_virtual = true;
        self.flags.is_abstract = true;
        self
    }

    pub fn constructor(mut self) -> Self {
        self.flags.is_static = false;
        self.flags.is_constructor = true;
        self
    }

    pub fn extern_(mut self) -> Self {
        self.flags.is_extern = true;
        self
    }

    pub fn unsafe_(mut self) -> Self {
        self.flags.is_unsafe = true;
        self
    }

    pub fn attributes(mut self, attrs: MethodAttributes) -> Self {
        self.attributes = attrs;
        self
    }

    pub fn this_attributes(mut self, attrs: ParamAttributes) -> Self {
        self.this_attributes = attrs;
        self
    }

    pub fn template(mut self, template: MethodId) -> Self {
        self.template = Some(template);
        self
    }

    pub fn overrides(mut self, slot: MethodId) -> Self {
        self.overrides.push(slot);
        self
    }

    pub fn ensures_exceptional(mut self, ty: TypeId) -> Self {
        self.ensures_exceptional.push(ty);
        self
    }

    pub fn build(self) -> MethodId {
        let program = &mut self.builder.program;
        let id = MethodId(program.methods.len() as u32);
        let this_param = if self.flags.is_static {
            None
        } else {
            let var = push_var(
                program,
                "this",
                self.declaring_type,
                VarKind::Parameter {
                    method: id,
                    index: 0,
                    mode: ParamMode::ByValue,
                },
            );
            Some(ParamInfo {
                var,
                attributes: self.this_attributes,
            })
        };
        let params = self
            .params
            .into_iter()
            .enumerate()
            .map(|(i, (name, ty, mode, attributes))| {
                let var = push_var(
                    program,
                    &name,
                    ty,
                    VarKind::Parameter {
                        method: id,
                        index: i as u32 + 1,
                        mode,
                    },
                );
                ParamInfo { var, attributes }
            })
            .collect();
        let return_type = self.return_type.unwrap_or(program.void_type);
        program.methods.push(MethodDef {
            id,
            name: self.name,
            declaring_type: self.declaring_type,
            this_param,
            params,
            return_type,
            flags: self.flags,
            attributes: self.attributes,
            template: self.template,
            overrides: self.overrides,
            ensures_exceptional: self.ensures_exceptional,
            locals: Vec::new(),
            body: None,
        });
        program.types[self.declaring_type.index()].methods.push(id);
        id
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CfgBuilder
// ═══════════════════════════════════════════════════════════════════════════

/// Builds a CFG whose first three blocks are entry, normal exit and exception exit
pub struct CfgBuilder {
    blocks: Vec<BasicBlock>,
}

impl CfgBuilder {
    pub const ENTRY: BlockId = BlockId(0);
    pub const NORMAL_EXIT: BlockId = BlockId(1);
    pub const EXCEPTION_EXIT: BlockId = BlockId(2);

    pub fn new() -> Self {
        let mut entry = BasicBlock::new(Self::ENTRY);
        entry.statements.push(Statement::MethodEntry);
        let mut exception_exit = BasicBlock::new(Self::EXCEPTION_EXIT);
        exception_exit.handler_kind = Some(HandlerKind::Unwind);
        Self {
            blocks: vec![entry, BasicBlock::new(Self::NORMAL_EXIT), exception_exit],
        }
    }

    /// Entry block running `statements`, then the normal exit
    pub fn straight_line(statements: Vec<Statement>) -> ControlFlowGraph {
        let mut b = Self::new();
        b.append(Self::ENTRY, statements);
        b.edge(Self::ENTRY, Self::NORMAL_EXIT);
        b.finish()
    }

    pub fn block(&mut self, statements: Vec<Statement>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        let mut block = BasicBlock::new(id);
        block.statements = statements;
        self.blocks.push(block);
        id
    }

    pub fn handler_block(&mut self, kind: HandlerKind, statements: Vec<Statement>) -> BlockId {
        let id = self.block(statements);
        self.blocks[id.index()].handler_kind = Some(kind);
        id
    }

    pub fn append(&mut self, block: BlockId, statements: Vec<Statement>) {
        self.blocks[block.index()].statements.extend(statements);
    }

    pub fn edge(&mut self, from: BlockId, to: BlockId) -> &mut Self {
        self.blocks[from.index()].successors.push(to);
        self
    }

    pub fn protect(&mut self, block: BlockId, handler: BlockId) -> &mut Self {
        self.blocks[block.index()].handler = Some(handler);
        self
    }

    pub fn finish(self) -> ControlFlowGraph {
        ControlFlowGraph {
            blocks: self.blocks,
            entry: Self::ENTRY,
            normal_exit: Self::NORMAL_EXIT,
            exception_exit: Self::EXCEPTION_EXIT,
        }
    }
}

impl Default for CfgBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins() {
        let pb = ProgramBuilder::new("App");
        let p = pb.program();
        assert!(p.is_primitive(p.void_type));
        assert!(p.is_object(p.object_type));
        assert_eq!(p.var(p.global_var).kind, VarKind::GlobalScope);
        assert_eq!(p.var(p.return_var).kind, VarKind::ReturnValue);
    }

    #[test]
    fn test_method_params_indices() {
        let mut pb = ProgramBuilder::new("App");
        let t = pb.class("App", "T");
        let m = pb.method(t, "M").instance().param("a", t).ref_param("b", t).build();
        let this = pb.param_var(m, 0).unwrap();
        let b = pb.param_var(m, 2).unwrap();
        let p = pb.program();
        assert!(p.var(this).is_this());
        assert_eq!(p.param_mode(b), Some(ParamMode::Ref));
        assert!(p.is_reference(p.var_type(b)));
        assert!(p.is_in_module(m));
        assert_eq!(p.method_full_name(m), "App.T.M");
    }

    #[test]
    fn test_virtual_dispatch_resolution() {
        let mut pb = ProgramBuilder::new("App");
        let base = pb.class("App", "Base");
        let derived = pb.subclass(base, "App", "Derived");
        let slot = pb.method(base, "Run").virtual_().build();
        let over = pb.method(derived, "Run").virtual_().overrides(slot).build();
        let p = pb.program();
        assert_eq!(p.find_implementation(slot, derived), Some(over));
        assert_eq!(p.find_implementation(slot, base), Some(slot));
        assert!(p.is_assignable_to(derived, base));
        assert!(!p.is_assignable_to(base, derived));
        assert_eq!(p.least_common_ancestor(derived, base), base);
    }

    #[test]
    fn test_struct_ref_classification() {
        let mut pb = ProgramBuilder::new("App");
        let s = pb.struct_type("App", "S");
        let r = pb.reference_to(s);
        let int = pb.primitive("Int32");
        let p = pb.program();
        assert!(p.is_struct_ref(r));
        assert!(p.is_object_or_struct_ref(r));
        assert!(!p.is_object_or_struct_ref(int));
        assert_eq!(p.element_type(r), s);
    }
}
