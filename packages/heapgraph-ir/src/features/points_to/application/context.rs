//! Analysis session context
//!
//! Bundles what every pass needs: the program, the node arena, the
//! annotation provider and the configuration. Also decides which methods
//! have bodies worth analyzing.

use crate::config::AnalysisConfig;
use crate::features::ir::{MethodId, Program, TypeKind};
use crate::features::points_to::domain::ptgraph::GraphContext;
use crate::features::points_to::infrastructure::attribute_annotations::AttributeAnnotations;
use crate::features::points_to::infrastructure::node_arena::NodeArena;
use crate::features::points_to::ports::AnnotationProvider;
use std::sync::Arc;

pub struct AnalysisContext {
    program: Arc<Program>,
    arena: NodeArena,
    annotations: Box<dyn AnnotationProvider>,
    config: AnalysisConfig,
}

impl AnalysisContext {
    /// Context with the attribute-backed annotation provider
    pub fn new(program: Arc<Program>, config: AnalysisConfig) -> Self {
        let annotations = Box::new(AttributeAnnotations::from_config(&config));
        Self::with_annotations(program, config, annotations)
    }

    pub fn with_annotations(
        program: Arc<Program>,
        config: AnalysisConfig,
        annotations: Box<dyn AnnotationProvider>,
    ) -> Self {
        Self {
            program,
            arena: NodeArena::new(),
            annotations,
            config,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn annotations(&self) -> &dyn AnnotationProvider {
        self.annotations.as_ref()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    #[inline]
    pub fn cx(&self) -> GraphContext<'_> {
        GraphContext::new(&self.program, &self.arena)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Scope
    // ═══════════════════════════════════════════════════════════════════════

    /// Generic instances are analyzed through their template
    pub fn template_or_method(&self, m: MethodId) -> MethodId {
        self.program.method(m).template.unwrap_or(m)
    }

    /// Declared in the module under analysis and accepted by the filters
    pub fn is_in_scope(&self, m: MethodId) -> bool {
        if !self.program.is_in_module(m) {
            return false;
        }
        let type_name = self.program.declaring_type_name(m);
        let accepted = |filter: &Option<String>| filter.as_ref().map_or(true, |f| f.is_empty() || type_name.contains(f.as_str()));
        accepted(&self.config.module_filter) && accepted(&self.config.class_filter)
    }

    pub fn is_excluded_namespace(&self, m: MethodId) -> bool {
        let type_name = self.program.declaring_type_name(m);
        self.config
            .excluded_namespaces
            .iter()
            .any(|ns| type_name.starts_with(ns.as_str()))
    }

    /// Unsafe-marked, or taking a pointer-typed parameter
    pub fn is_unsafe(&self, m: MethodId) -> bool {
        let def = self.program.method(m);
        def.flags.is_unsafe
            || def
                .params
                .iter()
                .any(|p| self.program.is_pointer(self.program.var_type(p.var)))
    }

    /// Could have an analyzable body, scope aside
    pub fn is_possibly_analyzable(&self, m: MethodId) -> bool {
        let def = self.program.method(m);
        let declaring = self.program.ty(def.declaring_type);
        !self.is_unsafe(m)
            && !def.flags.is_extern
            && !def.flags.is_abstract
            && declaring.kind != TypeKind::Interface
            && !self.is_excluded_namespace(m)
    }

    /// In scope with a body that the dataflow pass can run over
    pub fn is_analyzable(&self, m: MethodId) -> bool {
        let t = self.template_or_method(m);
        self.is_in_scope(m) && self.is_possibly_analyzable(t) && self.program.method(t).body.is_some()
    }
}

impl std::fmt::Debug for AnalysisContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisContext")
            .field("module", &self.program.module)
            .field("nodes", &self.arena.len())
            .field("config", &self.config)
            .finish()
    }
}
