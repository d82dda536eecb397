//! Three-address statements
//!
//! Operands are variables only; constants and arithmetic results collapse into
//! `LoadConstant` / `BinaryOperator` / `UnaryOperator`, which the heap model
//! treats as forgetting the destination.

use super::types::{FieldId, MethodId, TypeId, VarId};
use serde::{Deserialize, Serialize};

/// Dispatch flavour of a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    Direct,
    Virtual,
    /// `constrained.` prefix on a generic receiver
    Constrained,
}

impl CallKind {
    pub fn is_virtual(self) -> bool {
        !matches!(self, CallKind::Direct)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    MethodEntry,
    Nop,
    Copy {
        dest: VarId,
        source: VarId,
    },
    LoadConstant {
        dest: VarId,
    },
    LoadNull {
        dest: VarId,
    },
    /// `dest = source.field` (`source == None` for a static field)
    LoadField {
        dest: VarId,
        source: Option<VarId>,
        field: FieldId,
    },
    /// `target.field = source` (`target == None` for a static field)
    StoreField {
        target: Option<VarId>,
        field: FieldId,
        source: VarId,
    },
    LoadElement {
        dest: VarId,
        array: VarId,
    },
    StoreElement {
        array: VarId,
        source: VarId,
    },
    /// `dest = *pointer`
    LoadIndirect {
        dest: VarId,
        pointer: VarId,
    },
    /// `*pointer = source`
    StoreIndirect {
        pointer: VarId,
        source: VarId,
    },
    /// `dest = &source`
    LoadAddress {
        dest: VarId,
        source: VarId,
    },
    /// `dest = &source.field`
    LoadFieldAddress {
        dest: VarId,
        source: Option<VarId>,
        field: FieldId,
    },
    /// `dest = &array[i]`
    LoadElementAddress {
        dest: VarId,
        array: VarId,
    },
    NewObject {
        dest: VarId,
        ty: TypeId,
    },
    NewArray {
        dest: VarId,
        ty: TypeId,
    },
    /// `initobj` on the struct `dest` points to
    InitObject {
        dest: VarId,
        ty: TypeId,
    },
    Call {
        dest: Option<VarId>,
        receiver: Option<VarId>,
        callee: MethodId,
        args: Vec<VarId>,
        kind: CallKind,
    },
    CallIndirect {
        dest: Option<VarId>,
        pointer: VarId,
        args: Vec<VarId>,
    },
    Return {
        value: Option<VarId>,
    },
    Throw {
        exception: VarId,
    },
    Rethrow,
    Catch {
        dest: VarId,
        ty: TypeId,
    },
    Box {
        dest: VarId,
        source: VarId,
    },
    Unbox {
        dest: VarId,
        source: VarId,
    },
    CastClass {
        dest: VarId,
        source: VarId,
    },
    IsInstance {
        dest: VarId,
        source: VarId,
    },
    MakeRefAny {
        dest: VarId,
        source: VarId,
    },
    RefAnyType {
        dest: VarId,
    },
    SizeOf {
        dest: VarId,
    },
    /// `dest = &method`, with a receiver for `ldvirtftn`
    LoadFunction {
        dest: VarId,
        method: MethodId,
        receiver: Option<VarId>,
    },
    BinaryOperator {
        dest: VarId,
    },
    UnaryOperator {
        dest: VarId,
    },
    Unwind,
}
