//! Parser and serializer throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use plansync_markdown::{parse_plan, serialize, SerializeOptions};
use plansync_test_utils::large_plan_markdown;

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_plan");
    for tasks in [10, 100, 1000] {
        let source = large_plan_markdown(10, tasks / 10);
        group.bench_with_input(BenchmarkId::from_parameter(tasks), &source, |b, src| {
            b.iter(|| parse_plan(black_box(src)));
        });
    }
    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let source = large_plan_markdown(10, 100);
    let Ok(plan) = parse_plan(&source) else {
        return;
    };
    let options = SerializeOptions::new(plan.title.clone());
    c.bench_function("serialize_1000_tasks", |b| {
        b.iter(|| serialize(black_box(&plan.document), &options));
    });
}

criterion_group!(benches, bench_parse, bench_serialize);
criterion_main!(benches);
