//! End-to-end points-to scenarios driven through `PointsToAnalysis`

mod common;

use common::*;
use heapgraph_ir::config::AnalysisConfig;
use heapgraph_ir::features::ir::{
    CfgBuilder, FieldId, HandlerKind, MethodId, ParamAttributes, Program, ProgramBuilder, Statement, TypeId,
};
use heapgraph_ir::features::points_to::{Field, NodeId, PointsToAnalysis};
use pretty_assertions::assert_eq;

#[test]
fn test_factory_is_fresh_and_cache_reader_is_not() {
    let mut np = NodeProgram::new();
    let make = np.static_method("Make", 0, true);
    let n = np.local(make, "n");
    np.body(make, vec![new_object(n, np.node), ret(n)]);

    let get = np.static_method("Get", 0, true);
    let c = np.local(get, "c");
    let cache = np.cache;
    np.body(
        get,
        vec![
            Statement::LoadField {
                dest: c,
                source: None,
                field: cache,
            },
            ret(c),
        ],
    );

    let ctx = session(np.finish());
    let mut analysis = PointsToAnalysis::new(&ctx);
    analysis.whole_program_analysis();
    let cx = ctx.cx();

    assert!(analysis.summary(make).expect("make").check_method_freshness(cx));
    assert!(!analysis.summary(get).expect("get").check_method_freshness(cx));
    assert_eq!(analysis.stats().methods_analyzed, 2);
}

#[test]
fn test_identity_callee_result_stored_into_argument() {
    let mut np = NodeProgram::new();
    let identity = np.static_method("Identity", 1, true);
    let p = np.param(identity, 0);
    np.body(identity, vec![ret(p)]);

    let caller = np.static_method("Caller", 1, false);
    let a = np.param(caller, 0);
    let tmp = np.local(caller, "tmp");
    let next = np.next;
    np.body(caller, vec![call(Some(tmp), identity, vec![a]), store(a, next, tmp)]);

    let ctx = session(np.finish());
    let mut analysis = PointsToAnalysis::new(&ctx);
    let summary = analysis.analysis_for_method(caller).expect("caller").graph().clone();
    let cx = ctx.cx();

    // a.next = a, seen from the caller's entry value of `a`
    let old = summary.parameter_old_value(a).expect("reference parameter");
    let slots = summary.field_addresses(old, Field::Named(next));
    assert_eq!(slots.len(), 1);
    assert!(summary.values(cx, &slots).contains(&old));
    assert!(analysis.was_analyzed(identity));
}

#[test]
fn test_write_confined_callee_only_touches_owned_state() {
    let mut np = NodeProgram::new();
    let inspect = np.static_method("Inspect", 1, false);
    np.pb.set_param_attributes(
        inspect,
        1,
        ParamAttributes {
            write: Some(false),
            write_confined: Some(true),
            ..Default::default()
        },
    );

    let caller = np.static_method("Caller", 1, false);
    let a = np.param(caller, 0);
    let x = np.local(caller, "x");
    let rep = np.rep;
    np.body(caller, vec![load(x, a, rep), call(None, inspect, vec![a])]);

    let ctx = session(np.finish());
    let mut analysis = PointsToAnalysis::new(&ctx);
    let summary = analysis.analysis_for_method(caller).expect("caller").graph().clone();
    let arena = ctx.arena();

    let old = summary.parameter_old_value(a).expect("reference parameter");
    assert!(summary.inside().has_successor(old, Field::AllFieldsNotOwned));
    for e in summary.inside().edges_from(old) {
        assert_eq!(e.field, Field::AllFieldsNotOwned);
    }

    let confined_loads: Vec<NodeId> = summary
        .outside()
        .iter()
        .map(|e| e.dst)
        .filter(|&n| arena.is_omega_load(n) && arena.is_omega_confined(n))
        .collect();
    assert!(!confined_loads.is_empty(), "the owned load is marked confined");
    assert!(!analysis.was_analyzed(inspect));
}

/// `Caller` keeps a struct `Pair { item: Node }` inside `holder.pair` and
/// returns `holder.pair.item`; `write_after` sets `st.item` only after `st`
/// was stored. Returns whether the allocated item comes back.
fn returned_through_struct_field(write_after: bool) -> bool {
    let mut np = NodeProgram::new();
    let node = np.node;
    let pair_ty = np.pb.struct_type("App", "Pair");
    let item = np.pb.field(pair_ty, "item", node);
    let pair = np.pb.field(node, "pair", pair_ty);

    let caller = np.static_method("Caller", 0, true);
    let holder = np.local(caller, "holder");
    let y = np.local(caller, "y");
    let r = np.local(caller, "r");
    let st = np.pb.local(caller, "st", pair_ty);
    let t = np.pb.local(caller, "t", pair_ty);

    let mut body = vec![new_object(holder, node), new_object(y, node)];
    if write_after {
        body.extend([store(holder, pair, st), store(st, item, y)]);
    } else {
        body.extend([store(st, item, y), store(holder, pair, st)]);
    }
    body.extend([load(t, holder, pair), load(r, t, item), ret(r)]);
    np.body(caller, body);

    let ctx = session(np.finish());
    let mut analysis = PointsToAnalysis::new(&ctx);
    let mut g = analysis.analysis_for_method(caller).expect("caller").graph().clone();
    let cx = ctx.cx();
    let ret_var = g.return_var().expect("reference result");
    let returned = g.var_values(cx, ret_var);
    returned.iter().any(|&n| cx.kind(n).is_inside())
}

#[test]
fn test_struct_stored_in_field_is_copied() {
    assert!(returned_through_struct_field(false));
    assert!(
        !returned_through_struct_field(true),
        "holder.pair holds a copy, later writes to st stay local"
    );
}

#[test]
fn test_struct_argument_fields_reach_the_callee() {
    let mut np = NodeProgram::new();
    let node = np.node;
    let pair_ty = np.pb.struct_type("App", "Pair");
    let item = np.pb.field(pair_ty, "item", node);

    // Take(Pair s) { return s.item; }
    let take = np.pb.method(node, "Take").param("s", pair_ty).returns(node).build();
    let s = np.param(take, 0);
    let v = np.local(take, "v");
    np.body(take, vec![load(v, s, item), ret(v)]);

    let caller = np.static_method("Caller", 0, true);
    let y = np.local(caller, "y");
    let r = np.local(caller, "r");
    let st = np.pb.local(caller, "st", pair_ty);
    np.body(
        caller,
        vec![new_object(y, node), store(st, item, y), call(Some(r), take, vec![st]), ret(r)],
    );

    let ctx = session(np.finish());
    let mut analysis = PointsToAnalysis::new(&ctx);
    let mut g = analysis.analysis_for_method(caller).expect("caller").graph().clone();
    let cx = ctx.cx();
    assert!(analysis.was_analyzed(take));

    let ret_var = g.return_var().expect("reference result");
    let returned = g.var_values(cx, ret_var);
    assert!(
        returned.iter().any(|&n| cx.kind(n).is_inside() && cx.node_type(n) == node),
        "the caller's item comes back through the callee's read"
    );
}

/// `Shape.Run` is overridden by `Circle.Run`, which stores a fresh shape
/// into `this.child`; `Caller` allocates a circle and dispatches on it
fn dispatch_program() -> (Program, [MethodId; 3], TypeId, FieldId) {
    let mut pb = ProgramBuilder::new("App");
    let shape = pb.class("App", "Shape");
    let circle = pb.subclass(shape, "App", "Circle");
    let child = pb.field(shape, "child", shape);

    let slot = pb.method(shape, "Run").instance().virtual_().build();
    pb.set_body(slot, CfgBuilder::straight_line(vec![]));

    let over = pb.method(circle, "Run").instance().virtual_().overrides(slot).build();
    let this = pb.param_var(over, 0).expect("receiver");
    let fresh = pb.local(over, "fresh", shape);
    pb.set_body(
        over,
        CfgBuilder::straight_line(vec![
            Statement::NewObject { dest: fresh, ty: shape },
            Statement::StoreField {
                target: Some(this),
                field: child,
                source: fresh,
            },
        ]),
    );

    let caller = pb.method(shape, "Caller").returns(shape).build();
    let s = pb.local(caller, "s", shape);
    pb.set_body(
        caller,
        CfgBuilder::straight_line(vec![
            Statement::NewObject { dest: s, ty: circle },
            virtual_call(None, s, slot, vec![]),
            ret(s),
        ]),
    );
    (pb.finish(), [slot, over, caller], circle, child)
}

#[test]
fn test_virtual_call_resolved_by_receiver_type() {
    let (program, [slot, over, caller], circle, child) = dispatch_program();
    let ctx = session_with(program, AnalysisConfig::default().fixpoint(false));
    let mut analysis = PointsToAnalysis::new(&ctx);
    let state = analysis.analysis_for_method(caller).expect("caller").clone();
    let cx = ctx.cx();

    assert!(state.assumptions().contains(&slot));
    assert!(analysis.was_analyzed(over));

    let mut g = state.graph().clone();
    let ret_var = g.return_var().expect("reference result");
    let returned = g.var_values(cx, ret_var);
    let circle_node = returned
        .iter()
        .copied()
        .find(|&n| cx.node_type(n) == circle)
        .expect("the allocated circle is returned");
    let slots = g.field_addresses(circle_node, Field::Named(child));
    let stored = g.values(cx, &slots);
    assert!(stored.iter().any(|&n| cx.kind(n).is_inside()));
}

#[test]
fn test_dispatched_override_has_no_call_graph_edge() {
    let (program, [_, over, caller], circle, child) = dispatch_program();
    let ctx = session_with(program, AnalysisConfig::default().fixpoint(false));
    let mut analysis = PointsToAnalysis::new(&ctx);

    assert!(!analysis.call_graph().callees(caller).contains(&over));

    // inlining still reaches the override while summarizing the whole program
    analysis.whole_program_analysis();
    assert!(analysis.was_analyzed(over));
    let cx = ctx.cx();
    let mut g = analysis.summary(caller).expect("caller").graph().clone();
    let ret_var = g.return_var().expect("reference result");
    let returned = g.var_values(cx, ret_var);
    let circle_node = returned
        .iter()
        .copied()
        .find(|&n| cx.node_type(n) == circle)
        .expect("the allocated circle is returned");
    let slots = g.field_addresses(circle_node, Field::Named(child));
    assert!(!g.values(cx, &slots).is_empty());
}

#[test]
fn test_virtual_call_left_unresolved_when_disabled() {
    let (program, [slot, over, caller], _, _) = dispatch_program();
    let config = AnalysisConfig::default().fixpoint(false).resolve_virtual_calls(false);
    let ctx = session_with(program, config);
    let mut analysis = PointsToAnalysis::new(&ctx);
    let state = analysis.analysis_for_method(caller).expect("caller").clone();

    assert!(!state.assumptions().contains(&slot));
    assert!(!analysis.was_analyzed(over));
}

/// `Caller` calls `Fail` inside a region guarded by `catch (IOException)`;
/// the handler stores a fresh node into the static cache
fn guarded_call(fail_throws: bool) -> bool {
    let mut np = NodeProgram::new();
    let base = np.pb.class("System", "Exception");
    let io = np.pb.subclass(base, "System.IO", "IOException");
    let node = np.node;
    let cache = np.cache;

    let mut fail = np.pb.method(node, "Fail");
    if fail_throws {
        fail = fail.ensures_exceptional(io);
    }
    let fail = fail.build();

    let caller = np.static_method("Caller", 0, false);
    let e = np.pb.local(caller, "e", io);
    let caught = np.local(caller, "caught");
    let mut cb = CfgBuilder::new();
    let body = cb.block(vec![call(None, fail, vec![])]);
    let handler = cb.handler_block(
        HandlerKind::Catch(io),
        vec![
            Statement::Catch { dest: e, ty: io },
            new_object(caught, node),
            Statement::StoreField {
                target: None,
                field: cache,
                source: caught,
            },
        ],
    );
    cb.edge(CfgBuilder::ENTRY, body);
    cb.edge(body, CfgBuilder::NORMAL_EXIT);
    cb.protect(body, handler);
    cb.edge(handler, CfgBuilder::NORMAL_EXIT);
    np.pb.set_body(caller, cb.finish());

    let ctx = session(np.finish());
    let mut analysis = PointsToAnalysis::new(&ctx);
    let summary = analysis.analysis_for_method(caller).expect("caller").graph().clone();
    let cx = ctx.cx();
    let found = summary
        .inside()
        .iter()
        .any(|e| e.field == Field::Named(cache) && cx.kind(e.dst).is_inside());
    found
}

#[test]
fn test_exceptional_postcondition_reaches_catch_handler() {
    assert!(guarded_call(true));
    assert!(!guarded_call(false), "no pending exception, the handler never runs");
}

/// `try { try { Fail() } finally { } } catch (IOException) { cache = new Node }`
#[test]
fn test_exception_leaves_finally_for_enclosing_catch() {
    let mut np = NodeProgram::new();
    let base = np.pb.class("System", "Exception");
    let io = np.pb.subclass(base, "System.IO", "IOException");
    let node = np.node;
    let cache = np.cache;
    let fail = np.pb.method(node, "Fail").ensures_exceptional(io).build();

    let caller = np.static_method("Caller", 0, false);
    let e = np.pb.local(caller, "e", io);
    let caught = np.local(caller, "caught");
    let mut cb = CfgBuilder::new();
    let body = cb.block(vec![call(None, fail, vec![])]);
    let finally = cb.handler_block(HandlerKind::Finally, vec![]);
    let handler = cb.handler_block(
        HandlerKind::Catch(io),
        vec![
            Statement::Catch { dest: e, ty: io },
            new_object(caught, node),
            Statement::StoreField {
                target: None,
                field: cache,
                source: caught,
            },
        ],
    );
    cb.edge(CfgBuilder::ENTRY, body);
    cb.edge(body, CfgBuilder::NORMAL_EXIT);
    cb.protect(body, finally);
    cb.edge(finally, CfgBuilder::NORMAL_EXIT);
    cb.protect(finally, handler);
    cb.edge(handler, CfgBuilder::NORMAL_EXIT);
    np.pb.set_body(caller, cb.finish());

    let ctx = session(np.finish());
    let mut analysis = PointsToAnalysis::new(&ctx);
    let summary = analysis.analysis_for_method(caller).expect("caller").graph().clone();
    let cx = ctx.cx();
    assert!(summary
        .inside()
        .iter()
        .any(|e| e.field == Field::Named(cache) && cx.kind(e.dst).is_inside()));
}

#[test]
fn test_indirect_call_lets_arguments_escape() {
    let mut np = NodeProgram::new();
    let int_ptr = np.pb.primitive("IntPtr");

    let opaque = np.static_method("Opaque", 1, false);
    let a = np.param(opaque, 0);
    let fp = np.pb.local(opaque, "fp", int_ptr);
    np.body(
        opaque,
        vec![Statement::CallIndirect {
            dest: None,
            pointer: fp,
            args: vec![a],
        }],
    );

    let keep = np.static_method("Keep", 1, false);
    let b = np.param(keep, 0);
    np.body(keep, vec![]);

    let ctx = session(np.finish());
    let mut analysis = PointsToAnalysis::new(&ctx);
    analysis.whole_program_analysis();
    let cx = ctx.cx();

    assert!(analysis.summary(opaque).expect("opaque").check_escapes(cx, a));
    assert!(!analysis.summary(keep).expect("keep").check_escapes(cx, b));
}

#[test]
fn test_summary_renders_as_dot() {
    let mut np = NodeProgram::new();
    let link = np.static_method("Link", 2, false);
    let a = np.param(link, 0);
    let b = np.param(link, 1);
    let next = np.next;
    np.body(link, vec![store(a, next, b)]);

    let ctx = session(np.finish());
    let mut analysis = PointsToAnalysis::new(&ctx);
    let dot = analysis.analysis_for_method(link).expect("link").to_dot(ctx.cx());

    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("next"));
    assert!(dot.trim_end().ends_with('}'));
}
