//! Graphviz rendering of points-to graphs
//!
//! Variables are drawn as plain labels pointing at their locations; inside
//! edges are solid, outside edges dotted, struct edges green.

use crate::features::points_to::domain::edge::Edge;
use crate::features::points_to::domain::node::NodeId;
use crate::features::points_to::domain::ptgraph::{GraphContext, PTGraph};
use std::collections::BTreeSet;
use std::fmt::Write;

impl PTGraph {
    pub fn to_dot(&self, cx: GraphContext<'_>) -> String {
        let program = cx.program;
        let mut out = String::new();
        let _ = writeln!(out, "digraph PTG {{");

        let mut vars: Vec<_> = self.locals().iter().collect();
        vars.sort_by_key(|(v, _)| **v);
        for (&v, locs) in vars {
            let name = &program.var(v).name;
            let _ = writeln!(out, "\"{}\" [shape = none]", escape(name));
            let mut locs: Vec<_> = locs.iter().copied().collect();
            locs.sort();
            for n in locs {
                let _ = writeln!(out, "\"{}\" -> \"{}\" [label = \"\"]", escape(name), n);
            }
        }

        let mut nodes: BTreeSet<NodeId> = self.nodes().into_iter().collect();
        nodes.extend(self.locals().values().flatten().copied());
        for n in nodes {
            let kind = cx.kind(n);
            let shape = if kind.is_global() {
                "pentagon"
            } else if kind.is_address() {
                "ellipse"
            } else {
                "box"
            };
            let style = if kind.is_load() { "dotted" } else { "solid" };
            let _ = writeln!(
                out,
                "\"{}\" [label = \"{}\", shape = {}, style = {} ]",
                n,
                escape(&cx.arena.describe(n, program)),
                shape,
                style
            );
        }

        let mut inside: Vec<&Edge> = self.inside().iter().collect();
        inside.sort();
        for e in inside {
            let color = if self.inside().is_struct_edge(e) { "green" } else { "black" };
            write_edge(&mut out, cx, e, "solid", color);
        }
        let mut outside: Vec<&Edge> = self.outside().iter().collect();
        outside.sort();
        for e in outside {
            write_edge(&mut out, cx, e, "dotted", "black");
        }

        let _ = writeln!(out, "}}");
        out
    }
}

fn write_edge(out: &mut String, cx: GraphContext<'_>, e: &Edge, style: &str, color: &str) {
    let _ = writeln!(
        out,
        "\"{}\" -> \"{}\" [label = \"{}\", style = {}, color = {}]",
        e.src,
        e.dst,
        escape(&e.field.name(cx.program)),
        style,
        color
    );
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use crate::features::ir::{BlockId, ProgramBuilder};
    use crate::features::points_to::domain::label::Label;
    use crate::features::points_to::domain::ptgraph::{GraphContext, PTGraph};
    use crate::features::points_to::infrastructure::attribute_annotations::AttributeAnnotations;
    use crate::features::points_to::infrastructure::node_arena::NodeArena;

    #[test]
    fn test_dot_renders_variables_nodes_and_edges() {
        let mut pb = ProgramBuilder::new("App");
        let t = pb.class("App", "Node");
        let next = pb.field(t, "next", t);
        let m = pb.method(t, "Link").param("a", t).build();
        let a = pb.param_var(m, 1).unwrap();
        let x = pb.local(m, "x", t);
        let program = pb.finish();
        let arena = NodeArena::new();
        let cx = GraphContext::new(&program, &arena);

        let mut g = PTGraph::for_method(cx, m);
        let lb = Label::stmt(m, BlockId(0), 0);
        g.new_inside_node(cx, x, lb, t);
        g.store(cx, a, crate::features::points_to::domain::field::Field::Named(next), x, lb);
        let dot = g.to_dot(cx);

        assert!(dot.starts_with("digraph PTG {"));
        assert!(dot.trim_end().ends_with('}'));
        assert!(dot.contains("\"x\" [shape = none]"));
        assert!(dot.contains("shape = pentagon"));
        assert!(dot.contains("label = \"next\", style = solid, color = black"));
        assert!(dot.contains("style = dotted, color = black"));
    }

    #[test]
    fn test_dot_marks_omega_nodes() {
        let mut pb = ProgramBuilder::new("App");
        let t = pb.class("Lib", "Buffer");
        let m = pb.method(t, "Fill").param("b", t).build();
        let program = pb.finish();
        let arena = NodeArena::new();
        let cx = GraphContext::new(&program, &arena);

        let g = PTGraph::from_annotations(cx, &AttributeAnnotations::default(), m);
        assert!(g.to_dot(cx).contains("(W)"));
    }
}
