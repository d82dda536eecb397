//! Methods and the program container
//!
//! `Program` owns every descriptor table and answers the type queries the heap
//! model needs (primitive/struct/object classification, assignability, virtual
//! dispatch targets).

use super::cfg::ControlFlowGraph;
use super::types::{
    FieldDef, FieldId, MethodId, ParamMode, TypeDef, TypeId, TypeKind, VarDef, VarId, VarKind,
};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════
// Attributes
// ═══════════════════════════════════════════════════════════════════════════

/// `[Escapes(value, owned)]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscapesAttr {
    pub value: bool,
    pub owned: bool,
}

/// Declared effect and purity attributes of a method
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodAttributes {
    pub pure: bool,
    pub confined: bool,
    pub state_independent: bool,
    /// `[Fresh]` on the method
    pub fresh: bool,
    /// `[Fresh]` on the return value
    pub return_fresh: bool,
    pub write_confined: bool,
    pub write: Option<bool>,
    pub global_read: Option<bool>,
    pub global_write: Option<bool>,
    pub global_access: Option<bool>,
    /// Receiver escape attribute
    pub escapes: Option<EscapesAttr>,
    /// Receiver captured
    pub captured: bool,
}

/// Declared effect attributes of a parameter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamAttributes {
    pub fresh: bool,
    pub captured: bool,
    pub escapes: Option<EscapesAttr>,
    pub read: Option<bool>,
    pub write: Option<bool>,
    pub write_confined: Option<bool>,
    pub pure: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodFlags {
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_abstract: bool,
    pub is_extern: bool,
    pub is_unsafe: bool,
    pub is_constructor: bool,
}

// ═══════════════════════════════════════════════════════════════════════════
// Methods
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamInfo {
    pub var: VarId,
    pub attributes: ParamAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDef {
    pub id: MethodId,
    pub name: String,
    pub declaring_type: TypeId,
    /// Receiver (parameter index 0)
    pub this_param: Option<ParamInfo>,
    /// Declared parameters (indices 1..)
    pub params: Vec<ParamInfo>,
    pub return_type: TypeId,
    pub flags: MethodFlags,
    pub attributes: MethodAttributes,
    /// Generic template this method instantiates
    pub template: Option<MethodId>,
    /// Base or interface slots this method implements
    pub overrides: Vec<MethodId>,
    /// Exception types the method's contract says it may throw
    pub ensures_exceptional: Vec<TypeId>,
    pub locals: Vec<VarId>,
    pub body: Option<ControlFlowGraph>,
}

impl MethodDef {
    /// Receiver first, then declared parameters
    pub fn all_params(&self) -> impl Iterator<Item = &ParamInfo> {
        self.this_param.iter().chain(self.params.iter())
    }

    pub fn is_constructor(&self) -> bool {
        self.flags.is_constructor
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Program
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// Module under analysis
    pub module: String,
    pub(crate) types: Vec<TypeDef>,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) vars: Vec<VarDef>,
    pub(crate) methods: Vec<MethodDef>,
    /// Module each type belongs to
    pub(crate) type_modules: Vec<String>,
    pub void_type: TypeId,
    pub object_type: TypeId,
    pub global_var: VarId,
    pub return_var: VarId,
}

impl Program {
    pub fn ty(&self, id: TypeId) -> &TypeDef {
        &self.types[id.index()]
    }

    pub fn field(&self, id: FieldId) -> &FieldDef {
        &self.fields[id.index()]
    }

    pub fn var(&self, id: VarId) -> &VarDef {
        &self.vars[id.index()]
    }

    pub fn method(&self, id: MethodId) -> &MethodDef {
        &self.methods[id.index()]
    }

    pub fn try_method(&self, id: MethodId) -> Option<&MethodDef> {
        self.methods.get(id.index())
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.iter()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn var_type(&self, v: VarId) -> TypeId {
        self.var(v).ty
    }

    pub fn type_module(&self, ty: TypeId) -> &str {
        &self.type_modules[ty.index()]
    }

    pub fn method_full_name(&self, m: MethodId) -> String {
        let def = self.method(m);
        format!("{}.{}", self.ty(def.declaring_type).full_name(), def.name)
    }

    pub fn declaring_type_name(&self, m: MethodId) -> String {
        self.ty(self.method(m).declaring_type).full_name()
    }

    /// Method declared in the module under analysis
    pub fn is_in_module(&self, m: MethodId) -> bool {
        self.type_module(self.method(m).declaring_type) == self.module
    }

    // ───────────────────────────────────────────────────────────────────────
    // Type classification
    // ───────────────────────────────────────────────────────────────────────

    pub fn is_primitive(&self, ty: TypeId) -> bool {
        self.ty(ty).is_primitive()
    }

    pub fn is_struct(&self, ty: TypeId) -> bool {
        self.ty(ty).is_struct()
    }

    pub fn is_object(&self, ty: TypeId) -> bool {
        self.ty(ty).is_object()
    }

    pub fn is_delegate(&self, ty: TypeId) -> bool {
        self.ty(ty).is_delegate()
    }

    pub fn is_pointer(&self, ty: TypeId) -> bool {
        self.ty(ty).is_pointer()
    }

    pub fn is_reference(&self, ty: TypeId) -> bool {
        self.ty(ty).is_reference()
    }

    /// Type behind a managed reference or pointer, or the type itself
    pub fn element_type(&self, ty: TypeId) -> TypeId {
        match self.ty(ty).kind {
            TypeKind::Reference { referent } => referent,
            TypeKind::Pointer { pointee } => pointee,
            TypeKind::Array { element } => element,
            _ => ty,
        }
    }

    /// `ref S` where `S` is a struct
    pub fn is_struct_ref(&self, ty: TypeId) -> bool {
        match self.ty(ty).kind {
            TypeKind::Reference { referent } => self.is_struct(referent),
            _ => false,
        }
    }

    /// Objects and references to structs (targets of reach-ref queries)
    pub fn is_object_or_struct_ref(&self, ty: TypeId) -> bool {
        self.is_object(ty) || self.is_struct_ref(ty)
    }

    pub fn is_primitive_var(&self, v: VarId) -> bool {
        self.is_primitive(self.var_type(v))
    }

    pub fn param_mode(&self, v: VarId) -> Option<ParamMode> {
        self.var(v).param_mode()
    }

    /// Declaration of a parameter variable, `None` for locals and pseudo variables
    pub fn param_info(&self, v: VarId) -> Option<&ParamInfo> {
        match self.var(v).kind {
            VarKind::Parameter { method, index, .. } => {
                let def = self.method(method);
                if index == 0 {
                    def.this_param.as_ref()
                } else {
                    def.params.get(index as usize - 1)
                }
            }
            _ => None,
        }
    }

    /// Method a parameter variable belongs to
    pub fn param_method(&self, v: VarId) -> Option<MethodId> {
        match self.var(v).kind {
            VarKind::Parameter { method, .. } => Some(method),
            _ => None,
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Subtyping
    // ───────────────────────────────────────────────────────────────────────

    /// Reflexive-transitive closure over base classes and interfaces
    pub fn supertypes(&self, ty: TypeId) -> Vec<TypeId> {
        let mut seen = FxHashSet::default();
        let mut order = Vec::new();
        let mut stack = vec![ty];
        while let Some(t) = stack.pop() {
            if !seen.insert(t) {
                continue;
            }
            order.push(t);
            let def = self.ty(t);
            stack.extend(def.interfaces.iter().copied());
            if let Some(b) = def.base {
                stack.push(b);
            }
        }
        if !seen.contains(&self.object_type) {
            order.push(self.object_type);
        }
        order
    }

    pub fn is_assignable_to(&self, sub: TypeId, sup: TypeId) -> bool {
        sub == sup || sup == self.object_type || self.supertypes(sub).contains(&sup)
    }

    /// First base class of `a` that `b` is also assignable to
    pub fn least_common_ancestor(&self, a: TypeId, b: TypeId) -> TypeId {
        let mut current = Some(a);
        while let Some(t) = current {
            if self.is_assignable_to(b, t) {
                return t;
            }
            current = self.ty(t).base;
        }
        self.object_type
    }

    /// Does `m` implement `slot`, directly or through its override chain
    pub fn implements_slot(&self, m: MethodId, slot: MethodId) -> bool {
        let mut stack = vec![m];
        let mut seen = FxHashSet::default();
        while let Some(cur) = stack.pop() {
            if cur == slot {
                return true;
            }
            if seen.insert(cur) {
                stack.extend(self.method(cur).overrides.iter().copied());
            }
        }
        false
    }

    /// Dispatch target of a virtual call on a receiver whose dynamic type is `receiver`
    pub fn find_implementation(&self, slot: MethodId, receiver: TypeId) -> Option<MethodId> {
        let mut current = Some(receiver);
        while let Some(t) = current {
            let def = self.ty(t);
            for &candidate in &def.methods {
                if self.implements_slot(candidate, slot) {
                    let cdef = self.method(candidate);
                    if !cdef.flags.is_abstract {
                        return Some(candidate);
                    }
                }
            }
            current = def.base;
        }
        None
    }
}
