//! Whole-program analysis benchmarks
//!
//! Linked-list style programs: `Link_i(Node a, Node b)` stores `b` into
//! `a.next`, allocates, and calls `Link_{i+1}`. The cyclic variant closes the
//! chain back to `Link_0` so everything lands in one component.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use heapgraph_ir::config::{AnalysisConfig, Preset};
use heapgraph_ir::features::ir::{CallKind, CfgBuilder, Program, ProgramBuilder, Statement};
use heapgraph_ir::features::points_to::{AnalysisContext, PointsToAnalysis};
use std::sync::Arc;

fn chain_program(len: usize, cyclic: bool) -> Program {
    let mut pb = ProgramBuilder::new("Bench");
    let node = pb.class("Bench", "Node");
    let next = pb.field(node, "next", node);

    let methods: Vec<_> = (0..len)
        .map(|i| {
            pb.method(node, &format!("Link{}", i))
                .param("a", node)
                .param("b", node)
                .returns(node)
                .build()
        })
        .collect();

    for (i, &m) in methods.iter().enumerate() {
        let a = pb.param_var(m, 1).expect("a");
        let b = pb.param_var(m, 2).expect("b");
        let fresh = pb.local(m, "fresh", node);
        let result = pb.local(m, "result", node);
        let mut stmts = vec![
            Statement::StoreField {
                target: Some(a),
                field: next,
                source: b,
            },
            Statement::NewObject { dest: fresh, ty: node },
        ];
        let callee = if i + 1 < len {
            Some(methods[i + 1])
        } else if cyclic {
            Some(methods[0])
        } else {
            None
        };
        if let Some(callee) = callee {
            stmts.push(Statement::Call {
                dest: Some(result),
                receiver: None,
                callee,
                args: vec![fresh, a],
                kind: CallKind::Direct,
            });
            stmts.push(Statement::Return { value: Some(result) });
        } else {
            stmts.push(Statement::Return { value: Some(fresh) });
        }
        pb.set_body(m, CfgBuilder::straight_line(stmts));
    }
    pb.finish()
}

fn run(program: &Arc<Program>, config: &AnalysisConfig) -> usize {
    let ctx = AnalysisContext::new(Arc::clone(program), config.clone());
    let mut analysis = PointsToAnalysis::new(&ctx);
    analysis.whole_program_analysis();
    analysis.stats().passes
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_acyclic_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("acyclic_chain");
    let config = AnalysisConfig::from_preset(Preset::Balanced);

    for len in [8usize, 32, 128] {
        let program = Arc::new(chain_program(len, false));
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &program, |b, program| {
            b.iter(|| black_box(run(program, &config)));
        });
    }

    group.finish();
}

fn bench_cyclic_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("cyclic_chain");
    let config = AnalysisConfig::from_preset(Preset::Balanced);

    for len in [4usize, 16, 48] {
        let program = Arc::new(chain_program(len, true));
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &program, |b, program| {
            b.iter(|| black_box(run(program, &config)));
        });
    }

    group.finish();
}

fn bench_fixpoint_vs_inlining(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixpoint_vs_inlining");
    let program = Arc::new(chain_program(32, false));

    for (name, config) in [
        ("fixpoint", AnalysisConfig::from_preset(Preset::Balanced)),
        ("inlining", AnalysisConfig::from_preset(Preset::Fast)),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &config, |b, config| {
            b.iter(|| black_box(run(&program, config)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_acyclic_chain, bench_cyclic_chain, bench_fixpoint_vs_inlining);
criterion_main!(benches);
