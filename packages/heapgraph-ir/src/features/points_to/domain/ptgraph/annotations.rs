//! Summaries built from declared effects
//!
//! A method whose body is not analyzed is summarized by a graph whose
//! parameter values are omega nodes. The declared escape, read and write
//! effects become wildcard-field stores between those nodes.

use super::{GraphContext, NodeSet, PTGraph};
use crate::features::ir::{MethodId, VarId};
use crate::features::points_to::domain::field::Field;
use crate::features::points_to::domain::node::{LoadKind, NodeId, NodeKind};
use crate::features::points_to::ports::AnnotationProvider;

#[derive(Default)]
struct Targets {
    capture: NodeSet,
    non_capture: NodeSet,
    read: NodeSet,
}

impl PTGraph {
    pub fn from_annotations(
        cx: GraphContext<'_>,
        annotations: &dyn AnnotationProvider,
        callee: MethodId,
    ) -> PTGraph {
        let program = cx.program;
        let mut g = PTGraph::for_non_analyzable(cx, annotations, callee);
        let params: Vec<(VarId, NodeId)> = g.parameter_map.iter().map(|(&v, &n)| (v, n)).collect();

        let mut t = Targets::default();
        for &(p, pn) in &params {
            let reach = g.reach_refs(cx, pn);
            match annotations.declared_escaping(program, p) {
                Some(true) => t.capture.extend(reach.iter().copied()),
                Some(false) => t.non_capture.extend(reach.iter().copied()),
                None => {}
            }
            if annotations.is_declared_read(program, p) {
                t.read.extend(reach);
            }
        }
        if annotations.is_declared_reading_globals(program, callee) {
            let global = g.locations(cx, program.global_var);
            t.non_capture.extend(g.values(cx, &global));
        }

        if let Some(ret) = g.return_var {
            let ret_locs = g.locations(cx, ret);
            for an in g.values(cx, &ret_locs) {
                let l = g.next_label();
                g.store_nodes(cx, an, Field::AllFieldsNotOwned, &t.non_capture, l);
                let l = g.next_label();
                g.store_nodes(cx, an, Field::AllFields, &t.capture, l);
                let l = g.next_label();
                g.store_nodes(cx, an, Field::AllFieldsNotOwned, &t.read, l);
            }
            if !annotations.is_declared_fresh(program, callee) {
                let ml = g.method_label();
                g.assign(cx, &ret_locs, &t.non_capture, ml, false);
                g.assign(cx, &ret_locs, &t.capture, ml, false);
            }
            t.non_capture.extend(g.values(cx, &ret_locs));
        }

        for &(p, pn) in &params {
            let write = annotations.is_write_parameter(program, callee, p);
            let confined = annotations.is_write_confined_parameter(program, callee, p);

            if (write || confined)
                && program.is_reference(cx.var_type(p))
                && !annotations.is_declared_fresh_param(program, p)
            {
                let referenced = g.values_of(cx, pn);
                g.assign_values(&referenced, &t.capture);
                g.assign_values(&referenced, &t.non_capture);
            }

            let leaves: Vec<NodeId> = g.leaves(p).map(|l| l.iter().copied().collect()).unwrap_or_default();
            for n1 in leaves {
                if write {
                    let l = g.next_label();
                    g.store_nodes(cx, n1, Field::AllFields, &t.capture, l);
                    let reach = g.reach_refs(cx, n1);
                    let l = g.next_label();
                    g.store_nodes(cx, n1, Field::AllFields, &reach, l);
                    let l = g.next_label();
                    g.store_nodes(cx, n1, Field::AllFieldsNotOwned, &t.non_capture, l);
                    let l = g.next_label();
                    g.store_nodes(cx, n1, Field::AllFieldsNotOwned, &t.read, l);
                }
                if confined {
                    let l = g.next_label();
                    let omega = cx.intern(NodeKind::Load {
                        label: l,
                        ty: program.object_type,
                        kind: LoadKind::Value,
                    });
                    cx.arena.set_omega_load(omega);
                    let l = g.next_label();
                    g.store_node(cx, n1, Field::AllFieldsNotOwned, omega, l);
                }
            }
        }

        if annotations.is_declared_writing_globals(program, callee) {
            let l = g.next_label();
            g.store_nodes(cx, NodeId::GLOBAL, Field::AllFields, &t.capture, l);
            let ml = g.method_label();
            g.store_nodes(cx, NodeId::GLOBAL, Field::AllFieldsNotOwned, &t.non_capture, ml);
        }

        g
    }
}
