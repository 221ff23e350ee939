//! Benchmarks for dbtrack

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dbtrack::session::is_valid_identifier;
use dbtrack::IsolationLevel;

fn bench_identifier_validation(c: &mut Criterion) {
    c.bench_function("identifier_validation", |b| {
        b.iter(|| {
            is_valid_identifier(black_box("order_items_2024"))
                && !is_valid_identifier(black_box("sp1; DROP TABLE users"))
        });
    });
}

fn bench_isolation_parse(c: &mut Criterion) {
    c.bench_function("isolation_parse", |b| {
        b.iter(|| {
            IsolationLevel::from_show(black_box("repeatable read"))
                .map(IsolationLevel::as_sql)
        });
    });
}

criterion_group!(benches, bench_identifier_validation, bench_isolation_parse);
criterion_main!(benches);
