//! Abstract heap nodes
//!
//! A node is an interned [`NodeKind`] key; the arena hands out a [`NodeId`]
//! per distinct key, so node sets are sets of integers and equality is
//! structural by construction.
//!
//! Variant summary:
//! - `Global` / `Null`: singletons
//! - `Address`: a field slot created by a store
//! - `VariableRef`: address of a variable (identity = owning method + variable)
//! - `Parameter`: address of a formal (identity = method + index)
//! - `Inside` / `Return`: objects created by the analyzed method
//! - `Struct`: value-type storage, copied on assignment
//! - `Load`: unknown content read through an outside edge
//! - `ParameterValue`: unknown prior value of a parameter (identity = the node it hangs off)
//! - `Method` / `MethodDelegate`: method pointers and delegate objects
//!
//! Storage nodes (`Address`, `VariableRef`, `Parameter` and the address-kind
//! loads) carry the type of the value they hold.

use super::label::Label;
use crate::features::ir::{MethodId, ParamMode, TypeId, VarId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of an interned node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The global scope object
    pub const GLOBAL: NodeId = NodeId(0);
    /// The null object
    pub const NULL: NodeId = NodeId(1);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LoadKind {
    /// Unknown value
    Value,
    /// Unknown field address
    Address,
    /// Unknown address reached through a by-ref parameter
    ParamAddress { param: NodeId },
    /// Address produced by a field-address load
    FieldAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Global,
    Null,
    Address {
        label: Label,
        ty: TypeId,
    },
    VariableRef {
        method: MethodId,
        var: VarId,
        ty: TypeId,
    },
    Parameter {
        method: MethodId,
        index: u32,
        mode: ParamMode,
        ty: TypeId,
    },
    Inside {
        label: Label,
        ty: TypeId,
    },
    Return {
        label: Label,
        ty: TypeId,
    },
    Struct {
        label: Label,
        ty: TypeId,
    },
    Load {
        label: Label,
        ty: TypeId,
        kind: LoadKind,
    },
    ParameterValue {
        of: NodeId,
        ty: TypeId,
        /// Created by an annotation summary rather than an analyzed body
        annotated: bool,
    },
    Method {
        label: Label,
        method: MethodId,
        ty: TypeId,
    },
    MethodDelegate {
        label: Label,
        ty: TypeId,
    },
}

impl NodeKind {
    /// Declared type; `None` for the singletons, which are typed as `Object`
    pub fn ty(&self) -> Option<TypeId> {
        match *self {
            NodeKind::Global | NodeKind::Null => None,
            NodeKind::Address { ty, .. }
            | NodeKind::VariableRef { ty, .. }
            | NodeKind::Parameter { ty, .. }
            | NodeKind::Inside { ty, .. }
            | NodeKind::Return { ty, .. }
            | NodeKind::Struct { ty, .. }
            | NodeKind::Load { ty, .. }
            | NodeKind::ParameterValue { ty, .. }
            | NodeKind::Method { ty, .. }
            | NodeKind::MethodDelegate { ty, .. } => Some(ty),
        }
    }

    pub fn label(&self) -> Option<Label> {
        match *self {
            NodeKind::Address { label, .. }
            | NodeKind::Inside { label, .. }
            | NodeKind::Return { label, .. }
            | NodeKind::Struct { label, .. }
            | NodeKind::Load { label, .. }
            | NodeKind::Method { label, .. }
            | NodeKind::MethodDelegate { label, .. } => Some(label),
            _ => None,
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Capability predicates
    // ───────────────────────────────────────────────────────────────────────

    pub fn is_global(&self) -> bool {
        matches!(self, NodeKind::Global)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, NodeKind::Null)
    }

    pub fn is_address(&self) -> bool {
        match self {
            NodeKind::Address { .. }
            | NodeKind::VariableRef { .. }
            | NodeKind::Parameter { .. }
            | NodeKind::ParameterValue { .. } => true,
            NodeKind::Load { kind, .. } => !matches!(kind, LoadKind::Value),
            _ => false,
        }
    }

    pub fn is_inside(&self) -> bool {
        matches!(
            self,
            NodeKind::Inside { .. } | NodeKind::Return { .. } | NodeKind::MethodDelegate { .. }
        )
    }

    pub fn is_load(&self) -> bool {
        matches!(self, NodeKind::Load { .. } | NodeKind::ParameterValue { .. })
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, NodeKind::Struct { .. })
    }

    /// Parameter addresses, including unknown addresses behind by-ref parameters
    pub fn is_parameter(&self) -> bool {
        matches!(
            self,
            NodeKind::Parameter { .. }
                | NodeKind::Load {
                    kind: LoadKind::ParamAddress { .. },
                    ..
                }
        )
    }

    pub fn is_parameter_value(&self) -> bool {
        matches!(self, NodeKind::ParameterValue { .. })
    }

    pub fn is_variable_reference(&self) -> bool {
        matches!(self, NodeKind::VariableRef { .. } | NodeKind::Parameter { .. })
    }

    pub fn is_method(&self) -> bool {
        matches!(self, NodeKind::Method { .. })
    }

    pub fn is_method_delegate(&self) -> bool {
        matches!(self, NodeKind::MethodDelegate { .. })
    }

    /// Nodes standing for objects rather than storage
    pub fn is_object_abstraction(&self) -> bool {
        match self {
            NodeKind::Inside { .. }
            | NodeKind::Return { .. }
            | NodeKind::MethodDelegate { .. }
            | NodeKind::Global
            | NodeKind::Null
            | NodeKind::ParameterValue { .. } => true,
            NodeKind::Load { kind, .. } => matches!(kind, LoadKind::Value),
            _ => false,
        }
    }

    /// Locations holding a value rather than standing for one
    pub fn is_storage(&self) -> bool {
        match self {
            NodeKind::Address { .. } | NodeKind::VariableRef { .. } | NodeKind::Parameter { .. } => true,
            NodeKind::Load { kind, .. } => !matches!(kind, LoadKind::Value),
            _ => false,
        }
    }

    /// Nodes whose omega flags may be set
    pub fn accepts_omega(&self) -> bool {
        self.is_load()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Omega flags
// ═══════════════════════════════════════════════════════════════════════════

/// Mutable side flags of load-like nodes; not part of node identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmegaFlags {
    pub omega: bool,
    pub omega_confined: bool,
    pub omega_load: bool,
    pub omega_confined_load: bool,
}

impl OmegaFlags {
    pub fn is_omega(&self) -> bool {
        self.omega || self.omega_confined || self.is_omega_load()
    }

    pub fn is_omega_load(&self) -> bool {
        self.omega_load || self.omega_confined_load
    }

    pub fn is_omega_confined(&self, parameter_value: bool) -> bool {
        if parameter_value {
            self.omega_confined
        } else {
            self.omega_confined_load
        }
    }

    /// Short marker used in graph dumps
    pub fn marker(&self, parameter_value: bool) -> &'static str {
        if self.is_omega_confined(parameter_value) {
            if self.is_omega_load() && !parameter_value {
                "(WCL)"
            } else {
                "(WC)"
            }
        } else if self.is_omega_load() {
            "(WL)"
        } else if self.is_omega() {
            "(W)"
        } else {
            ""
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lbl() -> Label {
        Label::entry(MethodId(0))
    }

    #[test]
    fn test_predicates() {
        let load = NodeKind::Load {
            label: lbl(),
            ty: TypeId(1),
            kind: LoadKind::Value,
        };
        let laddr = NodeKind::Load {
            label: lbl(),
            ty: TypeId(1),
            kind: LoadKind::Address,
        };
        assert!(load.is_load());
        assert!(!load.is_address());
        assert!(laddr.is_address());
        assert!(load.is_object_abstraction());

        let ret = NodeKind::Return {
            label: lbl(),
            ty: TypeId(1),
        };
        assert!(ret.is_inside());
        assert!(!ret.accepts_omega());

        let p = NodeKind::Parameter {
            method: MethodId(0),
            index: 1,
            mode: ParamMode::Ref,
            ty: TypeId(3),
        };
        assert!(p.is_parameter());
        assert!(p.is_variable_reference());
        assert_eq!(p.ty(), Some(TypeId(3)));
        assert_eq!(NodeKind::Global.ty(), None);
    }

    #[test]
    fn test_omega_flags() {
        let mut f = OmegaFlags::default();
        assert!(!f.is_omega());
        f.omega_confined_load = true;
        assert!(f.is_omega());
        assert!(f.is_omega_load());
        assert!(f.is_omega_confined(false));
        assert!(!f.is_omega_confined(true));
        assert_eq!(f.marker(false), "(WCL)");

        let pv = OmegaFlags {
            omega: true,
            ..OmegaFlags::default()
        };
        assert_eq!(pv.marker(true), "(W)");
    }
}
