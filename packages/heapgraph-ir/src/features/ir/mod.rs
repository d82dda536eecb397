//! Method-level intermediate representation consumed by the heap analysis
//!
//! The front end lowers each method to a [`ControlFlowGraph`] of typed
//! three-address [`Statement`]s over declared variables. Types, fields, variables
//! and methods live in one [`Program`] and are referenced by dense ids.

pub mod builder;
pub mod cfg;
pub mod program;
pub mod statement;
pub mod types;

pub use builder::{CfgBuilder, MethodBuilder, ProgramBuilder};
pub use cfg::{BasicBlock, BlockId, ControlFlowGraph, HandlerKind};
pub use program::{
    EscapesAttr, MethodAttributes, MethodDef, MethodFlags, ParamAttributes, ParamInfo, Program,
};
pub use statement::{CallKind, Statement};
pub use types::{
    FieldDef, FieldId, MethodId, ParamMode, TypeDef, TypeId, TypeKind, VarDef, VarId, VarKind,
};
