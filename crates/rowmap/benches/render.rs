use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rowmap::{Assignments, BoolOp, Filters, Value, render_assignment, render_predicate};

/// `n` equality filters alternating integer and text values, with every fifth one null.
fn build_filters(n: usize) -> Filters {
    (0..n).fold(Filters::new(), |filters, i| {
        let value = match i % 5 {
            0 => Value::Null,
            1 | 3 => Value::Int(i as i64),
            _ => Value::Text(format!("value '{i}'")),
        };
        filters.eq(format!("col{i}"), value)
    })
}

fn bench_predicate(c: &mut Criterion) {
    let mut group = c.benchmark_group("render/predicate");

    for n in [1, 5, 10, 50, 100] {
        let filters = build_filters(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &filters, |b, filters| {
            b.iter(|| black_box(render_predicate(filters, BoolOp::And).unwrap()));
        });
    }

    group.finish();
}

fn bench_in_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("render/in_set");

    for n in [5, 20, 100, 500] {
        let filters = Filters::new().in_set("id", 0..n as i64);
        group.bench_with_input(BenchmarkId::from_parameter(n), &filters, |b, filters| {
            b.iter(|| black_box(filters.to_predicate().unwrap()));
        });
    }

    group.finish();
}

fn bench_assignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("render/assignment");

    for n in [1, 5, 10, 50] {
        let data = (0..n).fold(Assignments::new(), |data, i| {
            data.with(format!("col{i}"), format!("it's value {i}"))
        });
        group.bench_with_input(BenchmarkId::from_parameter(n), &data, |b, data| {
            b.iter(|| black_box(render_assignment(data).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_predicate, bench_in_set, bench_assignment);
criterion_main!(benches);
