//! Summary simplification

use super::{GraphContext, PTGraph};
use crate::features::ir::VarId;

impl PTGraph {
    /// Caller-visible projection of the graph.
    ///
    /// Parameters get their entry value back (the callee's rebinding of a
    /// formal is invisible to the caller), every variable other than the
    /// parameters, the global scope and the return value is dropped, and so is
    /// every edge with an endpoint unreachable from what remains.
    pub fn simplify(&self, cx: GraphContext<'_>) -> PTGraph {
        let mut g = self.clone();
        let lb = g.method_label();

        let params: Vec<VarId> = g.parameter_map.keys().copied().collect();
        for &p in &params {
            if cx.is_primitive_var(p) {
                continue;
            }
            if let Some(old) = g.parameter_old_value.get(&p).copied() {
                g.assign_var_node(cx, p, old, lb);
            }
        }

        let global = cx.program.global_var;
        let ret = g.return_var;
        g.locals
            .retain(|v, _| g.parameter_map.contains_key(v) || *v == global || Some(*v) == ret);

        let keep = g.reachable_from_parameters_return_and_globals(cx);
        g.inside.retain(|e| keep.contains(&e.src) && keep.contains(&e.dst));
        g.outside.retain(|e| keep.contains(&e.src) && keep.contains(&e.dst));
        g
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Fixture;
    use super::*;
    use crate::features::points_to::domain::field::Field;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simplify_drops_locals_and_garbage() {
        let f = Fixture::new();
        let cx = f.cx();
        let mut g = PTGraph::for_method(cx, f.run);
        g.new_inside_node(cx, f.x, f.label(0), f.node);
        g.new_inside_node(cx, f.y, f.label(1), f.node);
        // x.next = y stays local; rebinding p is invisible to callers
        g.store(cx, f.x, Field::Named(f.next), f.y, f.label(2));
        g.assign_var_var(cx, f.p, f.y, f.label(3));

        let s = g.simplify(cx);
        assert!(s.locations_of(f.x).is_none());
        assert!(s.locations_of(f.y).is_none());
        // p is restored to its entry value
        let p_addr = *s.parameter_map().get(&f.p).expect("p");
        let old = s.parameter_old_value(f.p).expect("old");
        assert_eq!(s.values_of(cx, p_addr), std::iter::once(old).collect());
        // x's object is no longer reachable, so its field edge is gone
        assert!(s.inside().iter().all(|e| e.field != Field::Named(f.next)));
    }

    #[test]
    fn test_simplify_is_idempotent() {
        let f = Fixture::new();
        let cx = f.cx();
        let mut g = PTGraph::for_method(cx, f.run);
        g.new_inside_node(cx, f.x, f.label(0), f.node);
        g.store(cx, f.this, Field::Named(f.next), f.x, f.label(1));
        g.load(cx, f.y, f.p, Field::Named(f.next), f.label(2));
        g.apply_return(cx, f.y, f.label(3));

        let once = g.simplify(cx);
        let twice = once.simplify(cx);
        assert_eq!(once, twice);
    }
}
