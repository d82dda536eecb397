//! Type, field and variable descriptors of the analyzed program
//!
//! Identifiers are dense `u32` handles into the owning [`Program`](super::Program)
//! tables. Every descriptor is plain data filled in by the front end; the analysis
//! only reads them.

use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════
// Handles
// ═══════════════════════════════════════════════════════════════════════════

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Handle of a [`TypeDef`]
    TypeId,
    "t"
);
id_type!(
    /// Handle of a [`FieldDef`]
    FieldId,
    "f"
);
id_type!(
    /// Handle of a [`VarDef`] (stable per declaration)
    VarId,
    "v"
);
id_type!(
    /// Handle of a [`MethodDef`](super::MethodDef)
    MethodId,
    "m"
);

// ═══════════════════════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════════════════════

/// Shape of a type as far as the heap model is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Void,
    /// Scalars (ints, floats, bool, char, enums)
    Primitive,
    /// User value type, copied on assignment
    Struct,
    Class,
    Interface,
    Delegate,
    Array { element: TypeId },
    /// Unmanaged pointer
    Pointer { pointee: TypeId },
    /// Managed reference (`ref T` / `out T`)
    Reference { referent: TypeId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDef {
    pub id: TypeId,
    pub name: String,
    pub namespace: String,
    pub kind: TypeKind,
    pub base: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    /// Instance fields declared by this type
    pub fields: Vec<FieldId>,
    /// Methods declared by this type
    pub methods: Vec<MethodId>,
    pub is_abstract: bool,
}

impl TypeDef {
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, TypeKind::Void | TypeKind::Primitive)
    }

    pub fn is_struct(&self) -> bool {
        self.kind == TypeKind::Struct
    }

    pub fn is_delegate(&self) -> bool {
        self.kind == TypeKind::Delegate
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer { .. })
    }

    /// Classes, interfaces, delegates and arrays
    pub fn is_object(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Class | TypeKind::Interface | TypeKind::Delegate | TypeKind::Array { .. }
        )
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, TypeKind::Reference { .. })
    }

    pub fn is_interface_or_abstract(&self) -> bool {
        self.kind == TypeKind::Interface || self.is_abstract
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Fields
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub id: FieldId,
    pub name: String,
    pub declaring_type: TypeId,
    pub ty: TypeId,
    pub is_static: bool,
    /// Field marked as owned by its holder (ownership-restricted reachability)
    pub is_owned: bool,
}

// ═══════════════════════════════════════════════════════════════════════════
// Variables
// ═══════════════════════════════════════════════════════════════════════════

/// How a parameter is passed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParamMode {
    ByValue,
    Ref,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarKind {
    Local,
    /// `index` 0 is the receiver, declared parameters start at 1
    Parameter {
        method: MethodId,
        index: u32,
        mode: ParamMode,
    },
    /// The static scope pseudo variable
    GlobalScope,
    /// The return value pseudo variable
    ReturnValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDef {
    pub id: VarId,
    pub name: String,
    pub ty: TypeId,
    pub kind: VarKind,
}

impl VarDef {
    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, VarKind::Parameter { .. })
    }

    pub fn param_mode(&self) -> Option<ParamMode> {
        match self.kind {
            VarKind::Parameter { mode, .. } => Some(mode),
            _ => None,
        }
    }

    pub fn is_this(&self) -> bool {
        matches!(self.kind, VarKind::Parameter { index: 0, .. })
    }
}
