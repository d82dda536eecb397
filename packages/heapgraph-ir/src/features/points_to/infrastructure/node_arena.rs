//! Node interning arena
//!
//! One arena is shared by every graph of an analysis session. Interning a
//! [`NodeKind`] twice returns the same [`NodeId`]. Omega flags and delegate
//! bindings are side tables keyed by id: they can change after creation
//! without affecting identity, and every graph holding the node observes the
//! change.

use crate::features::ir::{MethodId, Program, TypeId};
use crate::features::points_to::domain::node::{LoadKind, NodeId, NodeKind, OmegaFlags};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;

/// Target method and receiver values recorded on a delegate object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelegateBinding {
    pub method: Option<MethodId>,
    pub receivers: FxHashSet<NodeId>,
}

#[derive(Debug, Default)]
struct ArenaInner {
    kinds: Vec<NodeKind>,
    index: FxHashMap<NodeKind, NodeId>,
    flags: Vec<OmegaFlags>,
    delegates: FxHashMap<NodeId, DelegateBinding>,
}

#[derive(Debug)]
pub struct NodeArena {
    inner: RefCell<ArenaInner>,
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeArena {
    pub fn new() -> Self {
        let arena = Self {
            inner: RefCell::new(ArenaInner::default()),
        };
        arena.intern(NodeKind::Global);
        arena.intern(NodeKind::Null);
        arena
    }

    pub fn intern(&self, kind: NodeKind) -> NodeId {
        let mut inner = self.inner.borrow_mut();
        if let Some(&id) = inner.index.get(&kind) {
            return id;
        }
        let id = NodeId(inner.kinds.len() as u32);
        inner.kinds.push(kind);
        inner.flags.push(OmegaFlags::default());
        inner.index.insert(kind, id);
        id
    }

    /// Lookup without interning
    pub fn find(&self, kind: &NodeKind) -> Option<NodeId> {
        self.inner.borrow().index.get(kind).copied()
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.inner.borrow().kinds[id.index()]
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declared type, `Object` for the singletons
    pub fn node_type(&self, id: NodeId, program: &Program) -> TypeId {
        self.kind(id).ty().unwrap_or(program.object_type)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Omega flags
    // ───────────────────────────────────────────────────────────────────────

    pub fn flags(&self, id: NodeId) -> OmegaFlags {
        self.inner.borrow().flags[id.index()]
    }

    fn update_flags(&self, id: NodeId, parameter_value_only: bool, f: impl FnOnce(&mut OmegaFlags)) {
        let kind = self.kind(id);
        let allowed = if parameter_value_only {
            kind.is_parameter_value()
        } else {
            kind.accepts_omega()
        };
        if allowed {
            f(&mut self.inner.borrow_mut().flags[id.index()]);
        }
    }

    pub fn set_omega(&self, id: NodeId) {
        self.update_flags(id, true, |f| f.omega = true);
    }

    pub fn reset_omega(&self, id: NodeId) {
        self.update_flags(id, true, |f| f.omega = false);
    }

    pub fn set_omega_confined(&self, id: NodeId) {
        self.update_flags(id, true, |f| f.omega_confined = true);
    }

    pub fn reset_omega_confined(&self, id: NodeId) {
        self.update_flags(id, true, |f| f.omega_confined = false);
    }

    pub fn set_omega_load(&self, id: NodeId) {
        self.update_flags(id, false, |f| f.omega_load = true);
    }

    pub fn reset_omega_load(&self, id: NodeId) {
        self.update_flags(id, false, |f| f.omega_load = false);
    }

    pub fn set_omega_confined_load(&self, id: NodeId) {
        self.update_flags(id, false, |f| f.omega_confined_load = true);
    }

    pub fn reset_omega_confined_load(&self, id: NodeId) {
        self.update_flags(id, false, |f| f.omega_confined_load = false);
    }

    pub fn is_omega(&self, id: NodeId) -> bool {
        self.kind(id).accepts_omega() && self.flags(id).is_omega()
    }

    pub fn is_omega_load(&self, id: NodeId) -> bool {
        self.kind(id).accepts_omega() && self.flags(id).is_omega_load()
    }

    pub fn is_omega_confined(&self, id: NodeId) -> bool {
        let kind = self.kind(id);
        kind.accepts_omega() && self.flags(id).is_omega_confined(kind.is_parameter_value())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Delegates
    // ───────────────────────────────────────────────────────────────────────

    pub fn delegate(&self, id: NodeId) -> Option<DelegateBinding> {
        self.inner.borrow().delegates.get(&id).cloned()
    }

    pub fn bind_delegate(&self, id: NodeId, method: MethodId, receivers: FxHashSet<NodeId>) {
        if self.kind(id).is_method_delegate() {
            let mut inner = self.inner.borrow_mut();
            let binding = inner.delegates.entry(id).or_default();
            binding.method = Some(method);
            binding.receivers = receivers;
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Rendering
    // ───────────────────────────────────────────────────────────────────────

    pub fn describe(&self, id: NodeId, program: &Program) -> String {
        let kind = self.kind(id);
        let ty_name = |t: TypeId| program.ty(t).name.clone();
        let marker = self.flags(id).marker(kind.is_parameter_value());
        let body = match kind {
            NodeKind::Global => "GBL".to_string(),
            NodeKind::Null => "null".to_string(),
            NodeKind::Address { label, ty } => format!("<Addr:{} {}>", ty_name(ty), label),
            NodeKind::VariableRef { var, .. } => format!("<{}>", program.var(var).name),
            NodeKind::Parameter { method, index, mode, .. } => {
                let def = program.method(method);
                let param = if index == 0 {
                    def.this_param.as_ref()
                } else {
                    def.params.get(index as usize - 1)
                };
                let name = param
                    .map(|p| program.var(p.var).name.clone())
                    .unwrap_or_else(|| format!("p{}", index));
                format!("<P{:?}:{}>", mode, name)
            }
            NodeKind::Inside { label, ty } => format!("<IN:{} {}>", ty_name(ty), label),
            NodeKind::Return { label, ty } => format!("<R:{} {}>", ty_name(ty), label),
            NodeKind::Struct { label, ty } => format!("<Struct:{} {}>", ty_name(ty), label),
            NodeKind::Load { label, ty, kind } => {
                let tag = match kind {
                    LoadKind::Value => "LV",
                    LoadKind::Address => "LAddr",
                    LoadKind::ParamAddress { .. } => "LPAddr",
                    LoadKind::FieldAddress => "LFAddr",
                };
                format!("<{}:{} {}>", tag, ty_name(ty), label)
            }
            NodeKind::ParameterValue { of, .. } => format!("<PLN:{}>", self.describe(of, program)),
            NodeKind::Method { method, .. } => format!("<Method:{}>", program.method_full_name(method)),
            NodeKind::MethodDelegate { label, ty } => match self.delegate(id).and_then(|d| d.method) {
                Some(m) => format!("<Delegate:{} {}>", program.method_full_name(m), label),
                None => format!("<Delegate:{} {}>", ty_name(ty), label),
            },
        };
        format!("{}{}", marker, body)
    }
}
