use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use lexcalc::{DataLayout, DataMap, ExprCompiler, Regex};

pub fn regex_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("a?^na^n benchmark");
    group.measurement_time(Duration::from_secs(1));

    let inputs = (1..=8).map(|n| (n, ("a?".repeat(n) + &"a".repeat(n), "a".repeat(n))));

    for (n, input) in inputs {
        group.bench_with_input(
            BenchmarkId::new(format!("n={n}"), 0),
            &input,
            |b, (pattern, text)| {
                b.iter(|| {
                    let re = Regex::new(pattern).unwrap();
                    re.is_match(text)
                })
            },
        );
    }
}

pub fn expr_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("expression");
    group.measurement_time(Duration::from_secs(1));

    let layout = Arc::new(DataLayout::from_iter(["x", "y", "z"]));
    let mut record = DataMap::new(layout.clone());
    record.set("x", 3.0);
    record.set("y", 4.0);
    record.set("z", -1.0);

    let compiler = ExprCompiler::new();
    let text = "IF(z < 0, HYPOT(x, y) * 2 + 1, MAX(x, y) ** 2) - 10 % 3";

    group.bench_function("compile", |b| {
        b.iter(|| compiler.compile(&*layout, text, &[]).unwrap())
    });

    let expr = compiler.compile(&*layout, text, &[]).unwrap();
    group.bench_function("eval", |b| b.iter(|| expr.eval(&record)));
}

criterion_group!(benches, regex_benchmark, expr_benchmark);
criterion_main!(benches);
